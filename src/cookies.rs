use std::collections::BTreeMap;
use std::sync::Mutex;

use cookie::time::OffsetDateTime;
use cookie::Cookie;
use reqwest::header::HeaderValue;
use url::Url;

/// Stored cookies are keyed by (domain, path, name)
type CookieKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredCookie {
    cookie: Cookie<'static>,
    host_only: bool,
}

impl StoredCookie {
    fn matches(&self, host: &str, path: &str, secure: bool) -> bool {
        let domain = self.cookie.domain().unwrap_or("");
        let domain_ok = if domain.is_empty() {
            true
        } else if self.host_only {
            host == domain
        } else {
            domain_matches(host, domain)
        };

        domain_ok
            && path_matches(path, self.cookie.path().unwrap_or("/"))
            && (secure || self.cookie.secure() != Some(true))
    }
}

/// Cookie jar shared between a client's transport and the caller
///
/// Cookies received in `Set-Cookie` headers are stored here and sent back
/// on later requests whose host, path and scheme match. A cookie without a
/// `Domain` attribute is only returned to the exact host that set it, and a
/// `Secure` cookie is only sent over https. Hand the same `Arc<CookieJar>`
/// to [`Client::set_cookie_jar`](crate::Client::set_cookie_jar) and keep a
/// clone to inspect what the server set.
///
/// Cookies added by hand without a domain are sent to every host.
#[derive(Debug, Default)]
pub struct CookieJar {
    inner: Mutex<BTreeMap<CookieKey, StoredCookie>>,
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cookie to the jar
    pub fn add(&self, mut cookie: Cookie<'static>) {
        if let Some(domain) = cookie.domain().map(normalize_domain) {
            cookie.set_domain(domain);
        }
        self.insert(StoredCookie {
            cookie,
            host_only: false,
        });
    }

    /// Add a cookie with no attributes
    pub fn add_simple(&self, name: &str, value: &str) {
        self.add(Cookie::new(name.to_string(), value.to_string()));
    }

    fn insert(&self, stored: StoredCookie) {
        let key = key_of(&stored.cookie);
        if let Ok(mut jar) = self.inner.lock() {
            jar.insert(key, stored);
        }
    }

    /// Store a cookie received from `url`
    fn store_from_response(&self, set_cookie: &str, url: &Url) {
        let Ok(cookie) = Cookie::parse(set_cookie.to_string()) else {
            tracing::debug!(url = %url, "ignoring malformed Set-Cookie header");
            return;
        };
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return;
        };
        let mut cookie = cookie.into_owned();

        let host_only = match cookie.domain().map(normalize_domain) {
            Some(domain) if !domain.is_empty() => {
                if !domain_matches(&host, &domain) {
                    tracing::debug!(url = %url, domain = %domain, "rejecting cookie for foreign domain");
                    return;
                }
                cookie.set_domain(domain);
                false
            }
            _ => {
                cookie.set_domain(host);
                true
            }
        };

        if !cookie.path().map_or(false, |path| path.starts_with('/')) {
            cookie.set_path(default_path(url));
        }

        let stored = StoredCookie { cookie, host_only };
        if is_expired(&stored.cookie) {
            if let Ok(mut jar) = self.inner.lock() {
                jar.remove(&key_of(&stored.cookie));
            }
        } else {
            self.insert(stored);
        }
    }

    /// Get cookies for a specific URL, longest path first
    pub fn cookies_for_url(&self, url: &Url) -> Vec<Cookie<'static>> {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return Vec::new();
        };
        let secure = url.scheme() == "https";

        let Ok(mut jar) = self.inner.lock() else {
            return Vec::new();
        };
        jar.retain(|_, stored| !is_expired(&stored.cookie));

        let mut cookies: Vec<Cookie<'static>> = jar
            .values()
            .filter(|stored| stored.matches(&host, url.path(), secure))
            .map(|stored| stored.cookie.clone())
            .collect();
        cookies.sort_by_key(|cookie| std::cmp::Reverse(cookie.path().map_or(0, str::len)));
        cookies
    }

    /// Render the `Cookie` request header for a URL
    pub fn header_value_for(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Remove every cookie with this name
    pub fn remove(&self, name: &str) {
        if let Ok(mut jar) = self.inner.lock() {
            jar.retain(|(_, _, cookie_name), _| cookie_name != name);
        }
    }

    /// Get the number of cookies in the jar
    pub fn len(&self) -> usize {
        self.inner.lock().map(|jar| jar.len()).unwrap_or(0)
    }

    /// Check if the cookie jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a cookie exists
    pub fn has_cookie(&self, name: &str) -> bool {
        self.get_cookie(name).is_some()
    }

    /// Get a cookie by name, from any domain
    pub fn get_cookie(&self, name: &str) -> Option<Cookie<'static>> {
        let jar = self.inner.lock().ok()?;
        let found = jar
            .values()
            .find(|stored| stored.cookie.name() == name)
            .map(|stored| stored.cookie.clone());
        found
    }
}

fn key_of(cookie: &Cookie<'static>) -> CookieKey {
    (
        cookie.domain().unwrap_or("").to_string(),
        cookie.path().unwrap_or("/").to_string(),
        cookie.name().to_string(),
    )
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

/// `host` is `domain` or a subdomain of it
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path[cookie_path.len()..].starts_with('/')))
}

/// Directory of the request path, `/` at the top level
fn default_path(url: &Url) -> String {
    match url.path().rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => url.path()[..idx].to_string(),
    }
}

fn is_expired(cookie: &Cookie<'static>) -> bool {
    if let Some(age) = cookie.max_age() {
        return age.is_zero() || age.is_negative();
    }
    cookie
        .expires_datetime()
        .map_or(false, |at| at <= OffsetDateTime::now_utc())
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.store_from_response(value, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_value_for(url)
            .and_then(|value| HeaderValue::from_str(&value).ok())
    }
}
