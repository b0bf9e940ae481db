use anyhow::{Context, Result};
use mixboard::{Channel, DEFAULT_COMMAND_PORT, DEFAULT_EVENT_PORT, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Layered config: defaults → mixboard.toml → MIXBOARD_* env vars → CLI flags
// =============================================================================
//
//   mixboard.toml:   host = "10.0.0.20"
//                    channel = "CH_1"
//
//   env var:         MIXBOARD_HOST=10.0.0.20
//                    MIXBOARD_EVENT_PORT=801

pub const DEFAULT_CONFIG_FILE: &str = "mixboard.toml";

/// Connection settings, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileConfig {
    /// Device address. No default; it has to come from somewhere.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_event_port")]
    pub event_port: u16,
    /// Log raw device traffic
    #[serde(default)]
    pub protocol_log: bool,
    #[serde(default)]
    pub channel: Channel,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            event_port: default_event_port(),
            protocol_log: false,
            channel: Channel::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_COMMAND_PORT
}

fn default_event_port() -> u16 {
    DEFAULT_EVENT_PORT
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_log: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

/// Build the layered figment. A missing config file is not an error.
pub fn load_config(path: &Path, overrides: &Overrides) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MIXBOARD_"))
        .merge(Serialized::defaults(overrides))
}

impl FileConfig {
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        load_config(path, overrides)
            .extract()
            .with_context(|| format!("Invalid configuration (file: {})", path.display()))
    }

    /// Runtime session settings. Fails when no host is configured.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let host = self
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .context("No MixBoard host configured; set `host` in mixboard.toml, MIXBOARD_HOST, or --host")?;

        Ok(SessionConfig {
            host,
            port: self.port,
            event_port: self.event_port,
            channel: self.channel,
            protocol_log: self.protocol_log,
            ..SessionConfig::default()
        })
    }
}
