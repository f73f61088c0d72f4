// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_qualifications,
    unused_results,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::todo,
    clippy::future_not_send
)]

mod command;

use std::{path::PathBuf, process};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::error;
use scribble_fm::{error::Result, logging, metadata, storage::BundleIdentifier};

#[derive(Debug, Subcommand)]
enum Command {
    Create(command::lifecycle::Create),
    Info(command::lifecycle::Info),
    Delete(command::lifecycle::Delete),
    Text(command::text::Command),
    Keygen(command::cipher::Keygen),
    Encrypt(command::cipher::Encrypt),
    Decrypt(command::cipher::Decrypt),
    Seal(command::seal::Seal),
    Unseal(command::seal::Unseal),
    Checksum(command::checksum::Command),
    Watch(command::watch::Command),
}

#[async_trait]
impl command::Command for Command {
    async fn execute(self, ctx: &mut command::Context) -> Result<()> {
        match self {
            Self::Create(cmd) => cmd.execute(ctx).await,
            Self::Info(cmd) => cmd.execute(ctx).await,
            Self::Delete(cmd) => cmd.execute(ctx).await,
            Self::Text(cmd) => cmd.execute(ctx).await,
            Self::Keygen(cmd) => cmd.execute(ctx).await,
            Self::Encrypt(cmd) => cmd.execute(ctx).await,
            Self::Decrypt(cmd) => cmd.execute(ctx).await,
            Self::Seal(cmd) => cmd.execute(ctx).await,
            Self::Unseal(cmd) => cmd.execute(ctx).await,
            Self::Checksum(cmd) => cmd.execute(ctx).await,
            Self::Watch(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Reverse-DNS identifier that namespaces keys in the credential store.
    #[arg(long, env = "SCRIBBLE_BUNDLE_ID", default_value_t = metadata::DEFAULT_BUNDLE_IDENTIFIER.clone())]
    bundle_id: String,

    /// Keep keys in memory only, so that nothing is read from or written to
    /// the system credential store.
    #[arg(long)]
    no_credential_store: bool,

    /// Append log records to this file instead of standard error.
    #[arg(long, env = "SCRIBBLE_LOG_FILE", value_hint = clap::ValueHint::FilePath)]
    log_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

async fn run(args: Args) -> Result<()> {
    let mut ctx = command::Context::new(
        BundleIdentifier::new(args.bundle_id),
        !args.no_credential_store,
    );
    command::Command::execute(args.command, &mut ctx).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = logging::init(args.log_file.as_deref()) {
        eprintln!("We could not open the log file: {e}");
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("We encountered an error: {} (code {})", e, e.code());
        process::exit(1);
    };
}
