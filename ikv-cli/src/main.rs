//! InlineKV CLI
//!
//! Runs any command from the descriptor table by keyword and prints the
//! decoded reply.
//!
//! ```text
//! ikv-cli --server 127.0.0.1:6379 SET greeting hello
//! ikv-cli INCRBY counter 5
//! ikv-cli --config client.json KEYS 'user:*'
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ikv_client::command::{self, CommandInfo};
use ikv_client::{Arg, ArgType, Client, ClientConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// InlineKV CLI
#[derive(Parser, Debug)]
#[command(name = "ikv-cli")]
#[command(about = "Send one command to an inline-protocol key-value server")]
#[command(version)]
struct Args {
    /// Server address; overrides the config file
    #[arg(short, long)]
    server: Option<String>,

    /// Execution timeout in milliseconds; overrides the config file
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// JSON file holding a client configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List every supported command and exit
    #[arg(long)]
    list: bool,

    /// Command keyword, case-insensitive
    #[arg(required_unless_present = "list")]
    keyword: Option<String>,

    /// Command arguments
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,ikv_client=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        for info in command::all() {
            println!("{}", usage(&info));
        }
        return Ok(());
    }

    let keyword = args.keyword.as_deref().unwrap_or_default();
    let info = command::find(keyword).with_context(|| format!("unknown command '{}'", keyword))?;
    let config = load_config(&args)?;

    let mut client = Client::with_config(config.clone())
        .with_context(|| format!("failed to connect to {}", config.addr))?;

    let owned = parse_args(&info, &args.args)?;
    let call_args: Vec<Arg<'_>> = owned.iter().map(OwnedArg::as_arg).collect();

    match client.call_info(info, &call_args) {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(err) => {
            tracing::debug!(metrics = ?client.metrics(), "command failed");
            Err(err).with_context(|| format!("{} failed", info.keyword))
        }
    }
}

/// Config file first, then flag overrides.
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<ClientConfig>(&raw)
                .with_context(|| format!("invalid config in {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Some(server) = &args.server {
        config.addr = server.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.command_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

/// Argument parsed from the command line, owning its bytes.
#[derive(Debug, PartialEq)]
enum OwnedArg {
    Str(Vec<u8>),
    Int(i64),
    Blob(Vec<u8>),
}

impl OwnedArg {
    fn as_arg(&self) -> Arg<'_> {
        match self {
            OwnedArg::Str(bytes) => Arg::Str(bytes),
            OwnedArg::Int(value) => Arg::Int(*value),
            OwnedArg::Blob(bytes) => Arg::Blob(bytes),
        }
    }
}

fn parse_args(info: &CommandInfo, raw: &[String]) -> Result<Vec<OwnedArg>> {
    if raw.len() != info.args.len() {
        bail!(
            "{} takes {} argument(s), got {}\nusage: {}",
            info.keyword,
            info.args.len(),
            raw.len(),
            usage(info)
        );
    }

    info.args
        .iter()
        .zip(raw)
        .map(|(kind, value)| match kind {
            ArgType::Str => Ok(OwnedArg::Str(value.as_bytes().to_vec())),
            ArgType::Blob => Ok(OwnedArg::Blob(value.as_bytes().to_vec())),
            ArgType::Int => value
                .parse::<i64>()
                .map(OwnedArg::Int)
                .with_context(|| format!("'{}' is not an integer", value)),
        })
        .collect()
}

fn usage(info: &CommandInfo) -> String {
    let mut line = info.keyword.to_string();
    for kind in info.args {
        line.push_str(&format!(" <{}>", kind));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        Args::parse_from(std::iter::once("ikv-cli").chain(list.iter().copied()))
    }

    #[test]
    fn parses_typed_arguments() {
        let info = command::find("zadd").unwrap();
        let raw = vec!["board".to_string(), "-3".to_string(), "alice".to_string()];
        assert_eq!(
            parse_args(&info, &raw).unwrap(),
            vec![
                OwnedArg::Str(b"board".to_vec()),
                OwnedArg::Int(-3),
                OwnedArg::Blob(b"alice".to_vec()),
            ]
        );
    }

    #[test]
    fn rejects_bad_integer_and_arity() {
        let info = command::find("EXPIRE").unwrap();
        let raw = vec!["k".to_string(), "soon".to_string()];
        assert!(parse_args(&info, &raw).is_err());

        let err = parse_args(&info, &raw[..1]).unwrap_err().to_string();
        assert!(err.contains("EXPIRE <string> <integer>"), "{}", err);
    }

    #[test]
    fn flags_override_defaults() {
        let parsed = args(&["--server", "10.0.0.1:7000", "-t", "250", "get", "k"]);
        let config = load_config(&parsed).unwrap();
        assert_eq!(config.addr, "10.0.0.1:7000");
        assert_eq!(config.command_timeout_ms, 250);
        assert_eq!(parsed.keyword.as_deref(), Some("get"));
        assert_eq!(parsed.args, vec!["k".to_string()]);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let parsed = args(&["--timeout-ms", "0", "DBSIZE"]);
        assert!(load_config(&parsed).is_err());
    }

    #[test]
    fn usage_lists_argument_kinds() {
        let info = command::find("set").unwrap();
        assert_eq!(usage(&info), "SET <string> <blob>");
        assert_eq!(usage(&command::find("DBSIZE").unwrap()), "DBSIZE");
    }
}
