use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

/// Log levels accepted by `--loglevel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevelArg {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevelArg {
    /// CRITICAL has no counterpart in `log`; it filters like ERROR
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevelArg::Debug => LevelFilter::Debug,
            LogLevelArg::Info => LevelFilter::Info,
            LogLevelArg::Warning => LevelFilter::Warn,
            LogLevelArg::Error | LogLevelArg::Critical => LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(LogLevelArg::Debug),
            "INFO" => Ok(LogLevelArg::Info),
            "WARNING" => Ok(LogLevelArg::Warning),
            "ERROR" => Ok(LogLevelArg::Error),
            "CRITICAL" => Ok(LogLevelArg::Critical),
            _ => Err(format!(
                "invalid log level {s:?}. Valid options: DEBUG, INFO, WARNING, ERROR, CRITICAL"
            )),
        }
    }
}

impl std::fmt::Display for LogLevelArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevelArg::Debug => write!(f, "DEBUG"),
            LogLevelArg::Info => write!(f, "INFO"),
            LogLevelArg::Warning => write!(f, "WARNING"),
            LogLevelArg::Error => write!(f, "ERROR"),
            LogLevelArg::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ledger-node", about = "Run a signed-block ledger node")]
pub struct Opt {
    #[arg(long, help = "Port number to listen on")]
    pub port: Option<u16>,

    #[arg(
        long,
        default_value = "DEBUG",
        help = "Set the log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)"
    )]
    pub loglevel: LogLevelArg,

    #[arg(long = "log-file", help = "Append log output to this file instead of stderr")]
    pub log_file: Option<PathBuf>,

    #[arg(long, help = "TOML settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Key file to load, or create when missing")]
    pub keys: Option<PathBuf>,

    #[arg(
        long = "demo-transactions",
        default_value_t = 500,
        help = "Demo transactions to generate and mine at startup (0 to skip)"
    )]
    pub demo_transactions: usize,

    #[arg(long = "no-bootstrap", help = "Do not dial the bootstrap peers")]
    pub no_bootstrap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opt = Opt::try_parse_from(["ledger-node"]).unwrap();
        assert_eq!(opt.loglevel, LogLevelArg::Debug);
        assert_eq!(opt.port, None);
        assert_eq!(opt.demo_transactions, 500);
        assert!(!opt.no_bootstrap);
    }

    #[test]
    fn test_flags() {
        let opt = Opt::try_parse_from([
            "ledger-node",
            "--port",
            "20000",
            "--loglevel",
            "CRITICAL",
            "--log-file",
            "app.log",
            "--demo-transactions",
            "3",
            "--no-bootstrap",
        ])
        .unwrap();

        assert_eq!(opt.port, Some(20000));
        assert_eq!(opt.loglevel.to_level_filter(), LevelFilter::Error);
        assert_eq!(opt.log_file, Some(PathBuf::from("app.log")));
        assert_eq!(opt.demo_transactions, 3);
        assert!(opt.no_bootstrap);
    }

    #[test]
    fn test_level_names_are_case_sensitive() {
        assert!(Opt::try_parse_from(["ledger-node", "--loglevel", "debug"]).is_err());
        assert_eq!("WARNING".parse::<LogLevelArg>().unwrap().to_string(), "WARNING");
    }
}
