use std::time::Duration;

/// Timeout applied to a request when none was configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Timeout state of a client
///
/// A client starts `Unset`. The first request made while unset latches the
/// setting to `Default`, which then stays in place for the life of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutSetting {
    /// No timeout configured yet
    #[default]
    Unset,
    /// The default timeout, latched in by a request
    Default,
    /// A timeout chosen by the caller
    Explicit(Duration),
}

impl TimeoutSetting {
    /// Build a setting from a caller supplied duration.
    ///
    /// Zero is not a valid timeout and maps back to `Unset`.
    pub fn from_duration(duration: Duration) -> Self {
        if duration.is_zero() {
            TimeoutSetting::Unset
        } else {
            TimeoutSetting::Explicit(duration)
        }
    }

    /// Get the effective timeout, if any
    pub fn duration(&self) -> Option<Duration> {
        match self {
            TimeoutSetting::Unset => None,
            TimeoutSetting::Default => Some(DEFAULT_REQUEST_TIMEOUT),
            TimeoutSetting::Explicit(duration) => Some(*duration),
        }
    }

    /// Check if a timeout has been configured or latched
    pub fn is_set(&self) -> bool {
        !matches!(self, TimeoutSetting::Unset)
    }

    /// Latch the default if unset and return the effective timeout
    pub fn resolve(&mut self) -> Duration {
        if let TimeoutSetting::Unset = self {
            *self = TimeoutSetting::Default;
        }
        self.duration().unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unset() {
        let setting = TimeoutSetting::default();
        assert!(!setting.is_set());
        assert_eq!(setting.duration(), None);
    }

    #[test]
    fn test_from_duration() {
        assert_eq!(
            TimeoutSetting::from_duration(Duration::from_secs(3)),
            TimeoutSetting::Explicit(Duration::from_secs(3))
        );
        assert_eq!(TimeoutSetting::from_duration(Duration::ZERO), TimeoutSetting::Unset);
    }

    #[test]
    fn test_resolve_latches_default() {
        let mut setting = TimeoutSetting::Unset;
        assert_eq!(setting.resolve(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(setting, TimeoutSetting::Default);
        assert_eq!(setting.duration(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_resolve_keeps_explicit() {
        let mut setting = TimeoutSetting::Explicit(Duration::from_millis(250));
        assert_eq!(setting.resolve(), Duration::from_millis(250));
        assert_eq!(setting, TimeoutSetting::Explicit(Duration::from_millis(250)));
    }
}
