mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{ClientSettings, LogSettings, ServerSettings, Settings};

/// Loads the configuration from the default file and `JMQT_*` environment
/// variables (`JMQT_SERVER__PORT=9000`), then fills whatever is missing
/// from `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("JMQT")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let client = partial.client;
    let log = partial.log;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            enable_ssl: server
                .as_ref()
                .and_then(|s| s.enable_ssl)
                .unwrap_or(default.server.enable_ssl),
        },
        client: ClientSettings {
            packet_id_limit: client
                .as_ref()
                .and_then(|c| c.packet_id_limit)
                .unwrap_or(default.client.packet_id_limit),
            control_prefix: client
                .as_ref()
                .and_then(|c| c.control_prefix.clone())
                .unwrap_or(default.client.control_prefix),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    }
}

#[cfg(test)]
mod tests;
