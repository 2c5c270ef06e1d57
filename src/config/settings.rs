use serde::Deserialize;

/// Top-level configuration settings for the client.
///
/// Includes the remote server address, client protocol knobs and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub log: LogSettings,
}

/// Where the JMQT server lives.
///
/// `enable_ssl` selects the `wss://` scheme instead of `ws://`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub enable_ssl: bool,
}

/// Client-side protocol parameters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientSettings {
    /// Packet identifiers reset to 1 when the counter reaches this value.
    pub packet_id_limit: u32,
    /// Channel names starting with this prefix are control channels.
    pub control_prefix: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub client: Option<PartialClientSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub enable_ssl: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub packet_id_limit: Option<u32>,
    pub control_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl ServerSettings {
    /// WebSocket address of the server, `scheme://host:port/`.
    pub fn address(&self) -> String {
        let scheme = if self.enable_ssl { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                enable_ssl: false,
            },
            client: ClientSettings {
                packet_id_limit: 99999,
                control_prefix: "$".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
