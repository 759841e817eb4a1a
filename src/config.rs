//! Command-line configuration
//!
//! ```text
//! shadowfp <trace-file> [--debug-info <path>] [--poi <iid>] [--precision <bits>] [--nan] [--tui]
//! ```

use crate::analysis::blame::{BlameConfig, Precision};
use crate::interpreter::operand::Iid;
use std::path::PathBuf;
use thiserror::Error;

/// Directory searched for `debug.bin` when `--debug-info` is not given
pub const LOG_DIR_VAR: &str = "SHADOWFP_LOG_DIR";
pub const DEBUG_INFO_FILE: &str = "debug.bin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no trace file provided")]
    MissingTrace,

    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),

    #[error("`{0}` expects a value")]
    MissingValue(&'static str),

    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: &'static str, value: String },

    #[error("no precision level has {0} mantissa bits (choose 23, 27, 33, 39, 45 or 52)")]
    UnknownPrecision(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub trace: PathBuf,
    pub debug_info: Option<PathBuf>,
    /// Report root; defaults to the last floating operation
    pub poi: Option<Iid>,
    pub precision: Precision,
    pub nan: bool,
    pub tui: bool,
}

impl Config {
    /// Parse arguments, excluding the program name
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut trace = None;
        let mut config = Config {
            trace: PathBuf::new(),
            debug_info: None,
            poi: None,
            precision: Precision::Double,
            nan: false,
            tui: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug-info" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--debug-info"))?;
                    config.debug_info = Some(PathBuf::from(value));
                }
                "--poi" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--poi"))?;
                    let iid = value.parse::<Iid>().map_err(|_| ConfigError::InvalidValue {
                        flag: "--poi",
                        value: value.clone(),
                    })?;
                    config.poi = Some(iid);
                }
                "--precision" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--precision"))?;
                    let bits = value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                        flag: "--precision",
                        value: value.clone(),
                    })?;
                    config.precision =
                        Precision::from_bits(bits).ok_or(ConfigError::UnknownPrecision(bits))?;
                }
                "--nan" => config.nan = true,
                "--tui" => config.tui = true,
                other if other.starts_with("--") => {
                    return Err(ConfigError::UnexpectedArgument(arg));
                }
                _ if trace.is_none() => trace = Some(PathBuf::from(arg)),
                _ => return Err(ConfigError::UnexpectedArgument(arg)),
            }
        }

        config.trace = trace.ok_or(ConfigError::MissingTrace)?;
        Ok(config)
    }

    /// The debug table to read: the explicit path, else `debug.bin` under
    /// `$SHADOWFP_LOG_DIR` (or the working directory)
    pub fn debug_info_path(&self) -> PathBuf {
        if let Some(path) = &self.debug_info {
            return path.clone();
        }
        let dir = std::env::var_os(LOG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_default();
        dir.join(DEBUG_INFO_FILE)
    }

    pub fn blame(&self) -> BlameConfig {
        BlameConfig {
            point_of_interest: self.poi,
            precision: self.precision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_flag() {
        let config = Config::from_args([
            "run.trace",
            "--debug-info",
            "out/debug.bin",
            "--poi",
            "42",
            "--precision",
            "33",
            "--nan",
            "--tui",
        ])
        .unwrap();
        assert_eq!(config.trace, PathBuf::from("run.trace"));
        assert_eq!(config.debug_info_path(), PathBuf::from("out/debug.bin"));
        assert_eq!(config.poi, Some(42));
        assert_eq!(config.precision, Precision::Bits33);
        assert!(config.nan && config.tui);
        assert_eq!(config.blame().point_of_interest, Some(42));
    }

    #[test]
    fn defaults_to_double_without_root() {
        let config = Config::from_args(["run.trace"]).unwrap();
        assert_eq!(config.precision, Precision::Double);
        assert_eq!(config.poi, None);
        assert!(!config.nan && !config.tui);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            Config::from_args(Vec::<String>::new()),
            Err(ConfigError::MissingTrace)
        );
        assert_eq!(
            Config::from_args(["a", "b"]),
            Err(ConfigError::UnexpectedArgument("b".to_string()))
        );
        assert_eq!(
            Config::from_args(["a", "--poi"]),
            Err(ConfigError::MissingValue("--poi"))
        );
        assert_eq!(
            Config::from_args(["a", "--precision", "30"]),
            Err(ConfigError::UnknownPrecision(30))
        );
        assert!(matches!(
            Config::from_args(["a", "--poi", "x"]),
            Err(ConfigError::InvalidValue { flag: "--poi", .. })
        ));
        assert_eq!(
            Config::from_args(["a", "--verbose"]),
            Err(ConfigError::UnexpectedArgument("--verbose".to_string()))
        );
    }
}
