//! CLI argument definitions for the TariffBot binary.
//!
//! Uses `clap` with derive macros. Priority resolution: CLI args > env vars >
//! config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TariffBot: HTS tariff lookups, duty calculation and General Notes Q&A.
#[derive(Parser, Debug)]
#[command(name = "tariffbot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the catalog database and reference document.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Answer one question and print it.
    Ask {
        /// The question, as one or more words.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Load a USITC HTS JSON export into the catalog.
    Import {
        /// Path to the export file.
        file: PathBuf,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TARIFFBOT_CONFIG env var > ~/.tariffbot/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TARIFFBOT_CONFIG") {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        default_config_path()
    }

    /// Resolve the data directory override, if any.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

/// Resolve the API server port.
///
/// Priority: --port flag > TARIFFBOT_PORT env var > config file value.
pub fn resolve_port(flag: Option<u16>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    std::env::var("TARIFFBOT_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(config_port)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tariffbot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tariffbot").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_joins_words() {
        let args = CliArgs::parse_from(["tariffbot", "ask", "HTS", "code", "for", "donkeys"]);
        match args.command {
            Command::Ask { question } => assert_eq!(question.join(" "), "HTS code for donkeys"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from([
            "tariffbot",
            "serve",
            "--port",
            "9000",
            "--config",
            "/tmp/tb.toml",
            "-l",
            "debug",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/tb.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Command::Serve { port } => assert_eq!(port, Some(9000)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_import_requires_file() {
        assert!(CliArgs::try_parse_from(["tariffbot", "import"]).is_err());
        assert!(CliArgs::try_parse_from(["tariffbot", "ask"]).is_err());
    }

    #[test]
    fn test_port_flag_wins() {
        assert_eq!(resolve_port(Some(1234), 8501), 1234);
    }
}
