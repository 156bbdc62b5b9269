//! Logger installation.

mod reload;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, fmt};

use self::reload::{ReloadHandle, parse_filter};
use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Installs the global `tracing` subscriber described by a [`Config`].
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the logger alive; lets the filter be changed at runtime.
pub struct LoggerGuard {
    reload: ReloadHandle,
}

impl std::fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerGuard")
            .field("filter", &self.reload.current())
            .finish()
    }
}

/// Same subscriber stack for every format; only the fmt layer differs.
macro_rules! try_init {
    ($filter:expr, $layer:expr) => {
        Registry::default().with($filter).with($layer).try_init()
    };
}

impl LoggerBuilder {
    /// Builder for `config`.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Install the subscriber. Output goes to stderr.
    ///
    /// Fails with [`LogError::Filter`] for a bad directive and with
    /// [`LogError::AlreadyInitialized`] if a global subscriber exists.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let Config {
            level,
            format,
            ansi,
            target,
            span_events,
        } = self.config;

        let filter = parse_filter(&level)?;
        let (filter, handle) = tracing_subscriber::reload::Layer::new(filter);
        let spans = if span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(ansi)
            .with_target(target)
            .with_span_events(spans);

        let installed = match format {
            Format::Compact => try_init!(filter, base.compact()),
            Format::Pretty => try_init!(filter, base.pretty()),
            Format::Json => try_init!(filter, base.json().with_current_span(true)),
        };
        installed.map_err(|_| LogError::AlreadyInitialized)?;

        tracing::debug!(filter = %level, %format, "logger initialized");
        Ok(LoggerGuard {
            reload: ReloadHandle::new(handle, &level),
        })
    }
}

impl LoggerGuard {
    /// Replace the active filter directive.
    pub fn reload(&self, directive: &str) -> LogResult<()> {
        self.reload.reload(directive)
    }

    /// The active filter directive.
    #[must_use]
    pub fn filter(&self) -> String {
        self.reload.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_fails_before_install() {
        let err = LoggerBuilder::from_config(Config::default().with_level("gantry=notalevel"))
            .build()
            .unwrap_err();
        assert!(matches!(err, LogError::Filter(_)), "{err}");
    }
}
