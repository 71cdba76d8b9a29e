use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use httpwrap::Client;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "httpwrap")]
#[command(about = "Send a single HTTP request and print the response")]
#[command(version)]
struct Cli {
    /// HTTP method to use
    #[arg(short, long, default_value = "get")]
    method: MethodArg,

    /// URL to request
    #[arg(value_name = "URL")]
    url: String,

    /// Request headers (format: "Name: Value")
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameters (format: "key=value")
    #[arg(short, long = "query")]
    query: Vec<String>,

    /// Request body
    #[arg(short, long)]
    body: Option<String>,

    /// Timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// PEM bundle of trusted root certificates
    #[arg(long)]
    pem: Option<PathBuf>,

    /// Print these response headers (comma separated)
    #[arg(long, value_delimiter = ',')]
    show_headers: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy)]
enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl MethodArg {
    fn as_str(self) -> &'static str {
        match self {
            MethodArg::Get => "GET",
            MethodArg::Post => "POST",
            MethodArg::Put => "PUT",
            MethodArg::Delete => "DELETE",
            MethodArg::Patch => "PATCH",
            MethodArg::Head => "HEAD",
            MethodArg::Options => "OPTIONS",
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_pair<'a>(raw: &'a str, separator: char, what: &str) -> anyhow::Result<(&'a str, &'a str)> {
    match raw.split_once(separator) {
        Some((key, value)) => Ok((key.trim(), value.trim())),
        None => bail!("invalid {} {:?}, expected key{}value", what, raw, separator),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut client = Client::new();
    client.set_timeout(Duration::from_secs(cli.timeout));

    if let Some(pem) = &cli.pem {
        client.set_pem_certificate(pem)?;
    }

    for header in &cli.headers {
        let (name, value) = parse_pair(header, ':', "header")?;
        client.set_header(name, value);
    }

    let query = cli
        .query
        .iter()
        .map(|pair| parse_pair(pair, '=', "query parameter"))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if !query.is_empty() {
        client.set_query(query);
    }

    let body = cli.body.clone().unwrap_or_default();
    let result = match cli.method {
        MethodArg::Get => client.get(&cli.url).await,
        MethodArg::Post => client.post(&cli.url, body).await,
        MethodArg::Put => client.put(&cli.url, body).await,
        MethodArg::Delete => client.delete(&cli.url, body).await,
        other => {
            let url = client.build_url(&cli.url);
            client.request(other.as_str(), &url, body).await
        }
    };

    let response = match result {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            eprintln!("{} {}", "TIMEOUT".red().bold(), e);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context(format!("{} {} failed", cli.method.as_str(), cli.url)),
    };

    match cli.format {
        OutputFormat::Text => {
            let status = response.status_code();
            let line = format!("Status: {}", status);
            if (200..300).contains(&status) {
                println!("{}", line.green());
            } else {
                println!("{}", line.yellow());
            }

            for name in &cli.show_headers {
                println!("{}: {}", name, response.header(name));
            }
            println!();
            println!("{}", response.text()?);
        }
        OutputFormat::Json => {
            let headers: serde_json::Map<String, serde_json::Value> = cli
                .show_headers
                .iter()
                .map(|name| (name.clone(), response.header(name).into()))
                .collect();

            let json_response = serde_json::json!({
                "status": response.status_code(),
                "headers": headers,
                "body": response.text()?,
            });
            println!("{}", serde_json::to_string_pretty(&json_response)?);
        }
    }

    Ok(())
}
