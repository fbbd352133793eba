use std::fmt;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab_case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[clap(rename_all = "kebab_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

/// `RUST_LOG` wins; otherwise everything at `level` and above.
fn filter_directive(rust_log: Option<&str>, level: LogLevel) -> String {
    match rust_log.map(str::trim) {
        Some(spec) if !spec.is_empty() => spec.to_string(),
        _ => level.to_string(),
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout carries only
/// the JSON report.
pub fn init(level: LogLevel, format: LogFormat) {
    use std::io::IsTerminal;
    use tracing_subscriber::{fmt, EnvFilter};

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(filter_directive(rust_log.as_deref(), level))
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();

    let result = match format {
        LogFormat::Json => {
            let subscriber = fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Text => {
            let subscriber = fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(use_ansi)
                .with_target(false)
                .compact()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };
    if let Err(err) = result {
        eprintln!("wbg-runner: logging already initialised: {err}");
    }
}
