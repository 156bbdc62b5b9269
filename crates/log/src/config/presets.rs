//! Configuration presets.

use super::{Config, Format};

impl Config {
    /// Configuration from the process environment.
    ///
    /// `GANTRY_LOG` wins over `RUST_LOG`; `GANTRY_LOG_FORMAT` selects the
    /// format; `NO_COLOR` disables colors.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(level) = lookup("GANTRY_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }
        if let Some(format) = lookup("GANTRY_LOG_FORMAT") {
            // Unknown names keep the default.
            config = config.with_format(format.parse().unwrap_or_default());
        }
        if lookup("NO_COLOR").is_some() {
            config.ansi = false;
        }
        config
    }

    /// Verbose, colored, multi-line output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_owned(),
            format: Format::Pretty,
            span_events: true,
            ..Self::default()
        }
    }

    /// JSON lines at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self::default().with_format(Format::Json)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_is_default() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn gantry_log_wins_over_rust_log() {
        let config = Config::from_lookup(lookup(&[("GANTRY_LOG", "debug"), ("RUST_LOG", "trace")]));
        assert_eq!(config.level, "debug");
        let config = Config::from_lookup(lookup(&[("RUST_LOG", "trace")]));
        assert_eq!(config.level, "trace");
    }

    #[rstest]
    #[case("json", Format::Json)]
    #[case("PRETTY", Format::Pretty)]
    #[case("compact", Format::Compact)]
    #[case("logfmt", Format::Compact)]
    fn format_from_env(#[case] raw: &str, #[case] expected: Format) {
        let config = Config::from_lookup(lookup(&[("GANTRY_LOG_FORMAT", raw)]));
        assert_eq!(config.format, expected);
    }

    #[test]
    fn json_and_no_color_disable_ansi() {
        assert!(!Config::from_lookup(lookup(&[("GANTRY_LOG_FORMAT", "json")])).ansi);
        assert!(!Config::from_lookup(lookup(&[("NO_COLOR", "1")])).ansi);
        assert!(!Config::production().ansi);
    }

    #[test]
    fn presets() {
        assert_eq!(Config::development().format, Format::Pretty);
        assert_eq!(Config::production().level, "info");
    }

    #[test]
    fn partial_serde_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"level": "warn", "format": "json"}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, Format::Json);
        assert!(config.target);
    }

    #[test]
    fn unknown_format_is_error() {
        assert!("xml".parse::<Format>().is_err());
    }
}
