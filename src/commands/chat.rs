//! Chat command for encrypted point-to-point messaging over TCP.
//!
//! One peer listens, the other connects. After the handshake every line read
//! from stdin is sent as `NAME: line` and every incoming message is printed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args};
use tokio::io::{AsyncBufReadExt, BufReader};

use cipherlink::channel::{ChannelConfig, SecureChannel, TcpTransport};
use cipherlink::logging::init_logging;

use super::CommandExecutor;

/// Start a chat session with one peer.
///
/// Examples:
///   cipherlink chat alice --listen 0.0.0.0:7000
///   cipherlink chat bob --connect 192.168.1.20:7000
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["listen", "connect"])))]
pub struct ChatCommand {
    /// Name shown in front of your messages
    pub name: String,

    /// Wait for one peer on this address
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Connect to a listening peer
    #[arg(short, long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Channel settings (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// ElGamal modulus size, overrides the config file
    #[arg(long)]
    pub key_bits: Option<u64>,

    /// Log level: trace, debug, info, warn or error (RUST_LOG wins)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl CommandExecutor for ChatCommand {
    fn execute(&self) -> Result<()> {
        init_logging(&self.log_level).context("Failed to initialize logging")?;
        let config = self.load_config()?;

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        let result = rt.block_on(async {
            let channel = self.open_channel(config).await?;
            self.run_chat(channel).await
        });

        // A stdin read may still be parked on a blocking thread
        rt.shutdown_background();
        result
    }
}

impl ChatCommand {
    /// Config file (or defaults) with command-line overrides applied.
    fn load_config(&self) -> Result<ChannelConfig> {
        let mut config = match &self.config {
            Some(path) => ChannelConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ChannelConfig::default(),
        };
        if let Some(bits) = self.key_bits {
            config = config.with_key_bits(bits);
        }
        config.validate().context("Invalid channel configuration")?;
        Ok(config)
    }

    async fn open_channel(&self, config: ChannelConfig) -> Result<SecureChannel> {
        let transport = TcpTransport::new().with_config(config);

        let channel = match (&self.listen, &self.connect) {
            (Some(addr), _) => {
                let listener = transport
                    .with_bind_addr(addr.as_str())
                    .listen()
                    .await
                    .with_context(|| format!("Failed to listen on {}", addr))?;
                println!("Listening on {}", listener.local_addr()?);

                let (channel, peer) = listener.accept().await.context("Handshake failed")?;
                println!("Peer connected from {}", peer);
                channel
            }
            (None, Some(addr)) => {
                println!("Connecting to {}...", addr);
                transport
                    .connect(addr.as_str())
                    .await
                    .with_context(|| format!("Failed to connect to {}", addr))?
            }
            (None, None) => bail!("Either --listen or --connect is required"),
        };

        println!("Secure channel established.");
        println!("  Your fingerprint: {}", channel.local_public_key().fingerprint_hex());
        println!("  Peer fingerprint: {}", channel.peer_key().fingerprint_hex());
        println!("Compare fingerprints out of band. Type to chat, Ctrl+D to quit.");
        Ok(channel)
    }

    async fn run_chat(&self, mut channel: SecureChannel) -> Result<()> {
        let sender = channel.sender()?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            if sender.is_closed() {
                // close() below reports why the outbound direction stopped
                println!("Connection lost.");
                break;
            }

            tokio::select! {
                line = lines.next_line() => {
                    match line.context("Failed to read stdin")? {
                        Some(line) => {
                            match sender.send(format!("{}: {}", self.name, line)).await {
                                Ok(()) => {}
                                Err(e) if !e.is_fatal() => {
                                    println!("Connection lost.");
                                    break;
                                }
                                Err(e) => return Err(e).context("Failed to send message"),
                            }
                        }
                        None => break,
                    }
                }
                incoming = channel.recv() => {
                    match incoming.context("Connection failed")? {
                        Some(message) => println!("{}", String::from_utf8_lossy(&message)),
                        None => {
                            println!("Peer disconnected.");
                            return Ok(());
                        }
                    }
                }
            }
        }

        drop(sender);
        channel.close().await.context("Failed to close channel")?;
        Ok(())
    }
}
