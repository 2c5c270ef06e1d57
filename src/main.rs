//! CLI for JMQT
//!
//! Subcommands:
//! - `run`: keep a session alive, subscribe to a channel and publish on it
//!   periodically (useful for smoke tests against a server)
//! - `publish`: publish a single message and print the acknowledgement

use std::time::Duration;

use clap::Parser;
use jmqt::config::load_config;
use jmqt::protocol::is_control_channel;
use jmqt::{JmqtClient, StatusCode};
use serde_json::{Value, json};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "jmqt")]
enum Command {
    /// Authenticate, connect, subscribe and publish every few seconds until Ctrl-C
    Run {
        /// Client name sent in the auth packet
        #[arg(long, default_value = "jmqt-rs")]
        name: String,
        /// Channel to subscribe and publish to
        #[arg(long, default_value = "ch")]
        channel: String,
        /// Seconds between publishes (and reconnect attempts)
        #[arg(long, default_value_t = 10)]
        every: u64,
    },
    /// Publish one message and wait for its acknowledgement
    Publish {
        #[arg(long, default_value = "jmqt-rs")]
        name: String,
        channel: String,
        /// JSON payload; anything that is not valid JSON is sent as a string
        payload: String,
        #[arg(long, default_value_t = 1)]
        qos: u8,
        #[arg(long)]
        retain: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return;
        }
    };
    jmqt::utils::logging::init(&settings.log.level);

    let client = JmqtClient::new(&settings);
    let result = match Command::parse() {
        Command::Run {
            name,
            channel,
            every,
        } => run(&client, &name, &channel, every).await,
        Command::Publish {
            name,
            channel,
            payload,
            qos,
            retain,
        } => {
            let control = is_control_channel(&channel, &settings.client.control_prefix);
            publish_once(&client, &name, &channel, &payload, qos, retain, control).await
        }
    };

    if let Err(e) = result {
        error!("Client failed: {}", e);
    }
}

/// authenticate + connect
async fn open_session(client: &JmqtClient, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let auth = client.authenticate(json!({ "name": name })).await;
    if auth.status != StatusCode::Ok {
        return Err(format!("auth failed: {} {}", auth.status, auth.message).into());
    }
    info!("Authenticated as client {}", auth.client_id);

    let status = client.connect(&auth.client_id, &auth.token).await;
    if status != StatusCode::Ok {
        return Err(format!("conn failed: {status}").into());
    }
    info!("Connected to {}", client.address());
    Ok(())
}

async fn run(
    client: &JmqtClient,
    name: &str,
    channel: &str,
    every: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    client.on_push(|push| {
        info!(
            "[push] '{}' from '{}': {} (qos {}, retained {})",
            push.channel, push.sender, push.payload, push.qos, push.retained
        );
    });
    client.on_disconnect(|_, address| warn!("Disconnected from {address}"));

    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !client.is_connected().await {
                    info!("Retry connect..");
                    if let Err(e) = open_session(client, name).await {
                        warn!("{e}");
                        continue;
                    }
                    let sub = client.subscribe(channel, false).await;
                    info!("sub '{}': {}", sub.channel, sub.status);
                }

                let publication = client.publish(channel, json!(chrono::Utc::now().to_rfc3339()), true, 1);
                info!("pub packet # {}", publication.packet_id());
                tokio::spawn(async move {
                    let ack = publication.await;
                    info!("pubAck packet # {}: {}", ack.packet_id, ack.status);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                client.disconnect(true).await;
                return Ok(());
            }
        }
    }
}

async fn publish_once(
    client: &JmqtClient,
    name: &str,
    channel: &str,
    payload: &str,
    qos: u8,
    retain: bool,
    control: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    open_session(client, name).await?;

    let payload = serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()));
    let publication = client.publish(channel, payload, retain, qos);
    let packet_id = publication.packet_id().to_string();

    if qos == 0 && !control {
        // nothing comes back for fire-and-forget publishes
        println!("published packet # {packet_id}");
    } else {
        match tokio::time::timeout(Duration::from_secs(10), publication).await {
            Ok(ack) => {
                println!("pubAck packet # {}: {}", ack.packet_id, ack.status);
                if let Some(response) = ack.response {
                    println!("{response}");
                }
            }
            Err(_) => warn!("no pubAck for packet # {packet_id}"),
        }
    }

    client.disconnect(true).await;
    Ok(())
}
