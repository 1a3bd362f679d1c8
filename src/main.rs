//! cipherlink - encrypted point-to-point chat
//!
//! A small CLI around the cipherlink library: one peer listens, the other
//! connects, and lines typed on stdin travel over the secure channel.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ChatCommand, CommandExecutor};

/// cipherlink - encrypted point-to-point chat
///
/// ElGamal handshake, AES-128 framed transport.
#[derive(Parser)]
#[command(name = "cipherlink")]
#[command(version = cipherlink::VERSION)]
#[command(about = "Encrypted point-to-point chat over TCP")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with one peer over a secure channel
    ///
    /// One side runs with --listen, the other with --connect.
    /// Compare the printed fingerprints out of band: the handshake does not
    /// authenticate the peer.
    Chat(ChatCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(cmd) => cmd.execute()?,
    }

    Ok(())
}
