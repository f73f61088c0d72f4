// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{fs, io, path::PathBuf};

use async_trait::async_trait;
use clap::Parser;
use scribble_fm::{crypto, error::Result};

/// Encrypt a file with the key kept in the credential store, creating that
/// key first if necessary.
#[derive(Debug, Parser)]
pub(crate) struct Seal {
    #[clap()]
    input: PathBuf,

    #[clap()]
    output: PathBuf,
}

#[async_trait]
impl super::Command for Seal {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let store = ctx.store().await;
        _ = crypto::ensure_key(store).await?;
        crypto::seal(store, &self.input, &self.output).await
    }
}

/// Decrypt a sealed file with the key kept in the credential store.
#[derive(Debug, Parser)]
pub(crate) struct Unseal {
    #[clap()]
    input: PathBuf,

    /// Where to write the plaintext. Without it, the plaintext is written to
    /// standard output.
    #[clap()]
    output: Option<PathBuf>,
}

#[async_trait]
impl super::Command for Unseal {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let store = ctx.store().await;
        match self.output {
            Some(output) => crypto::unseal_to(store, &self.input, &output).await,
            None => {
                let plain = crypto::unseal(store, &self.input).await?;
                _ = io::copy(&mut fs::File::open(plain.path())?, &mut io::stdout().lock())?;
                Ok(())
            }
        }
    }
}
