//! Layered configuration: defaults, an optional TOML file, environment
//! variables prefixed `H42_`, and CLI flags, in increasing priority.

use std::path::PathBuf;

use clap::Parser;
use figment::providers::Format;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Environment variable prefix used to resolve settings not given on the
/// command line.
const ENV_PREFIX: &str = "H42_";

#[skip_serializing_none]
#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(author, version, about = "Bridges CAN-bus nodes to a backend MQTT broker over per-node TCP connections")]
pub struct Args {
    /// Path to an optional TOML config file.
    #[clap(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Name of the CAN interface to open (e.g. `can0`).
    #[clap(long, env = "H42_CAN_INTERFACE", default_value = None)]
    pub can_interface: Option<String>,

    /// Backend MQTT broker host.
    #[clap(long, env = "H42_BACKEND_HOST", default_value = None)]
    pub backend_host: Option<String>,

    /// Backend MQTT broker port.
    #[clap(long, env = "H42_BACKEND_PORT", default_value = None)]
    pub backend_port: Option<u16>,

    /// Log filter directive, e.g. `info` or `h42_can_bridge=debug`.
    #[clap(long, env = "H42_LOG", default_value = None)]
    pub log: Option<String>,

    /// Print a human-readable MQTT decode of every packet crossing the bridge.
    #[clap(long, env = "H42_DIAGNOSTICS", default_value = None)]
    pub diagnostics: Option<bool>,
}

/// The fully-resolved configuration driving one run of the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub can_interface: String,
    pub backend_host: String,
    pub backend_port: u16,
    pub log: String,
    pub diagnostics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            can_interface: "can0".to_owned(),
            backend_host: "127.0.0.1".to_owned(),
            backend_port: 1883,
            log: "info".to_owned(),
            diagnostics: false,
        }
    }
}

impl Config {
    /// Resolves configuration from defaults, an optional TOML file, `H42_`
    /// prefixed environment variables, and CLI flags, in that increasing
    /// priority order.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut figment = figment::Figment::from(figment::providers::Serialized::defaults(Config::default()));

        if let Some(path) = &args.config {
            figment = figment.merge(figment::providers::Toml::file(path));
        }
        figment = figment
            .merge(figment::providers::Env::prefixed(ENV_PREFIX))
            .merge(figment::providers::Serialized::defaults(args));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        let args = Args::parse_from(["h42-can-bridge"]);
        let config = Config::load(&args).unwrap();
        assert_eq!(config.can_interface, "can0");
        assert_eq!(config.backend_port, 1883);
        assert!(!config.diagnostics);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let args = Args::parse_from([
            "h42-can-bridge",
            "--can-interface",
            "vcan0",
            "--backend-host",
            "10.0.0.1",
            "--backend-port",
            "8883",
            "--diagnostics",
            "true",
        ]);
        let config = Config::load(&args).unwrap();
        assert_eq!(config.can_interface, "vcan0");
        assert_eq!(config.backend_host, "10.0.0.1");
        assert_eq!(config.backend_port, 8883);
        assert!(config.diagnostics);
    }
}
