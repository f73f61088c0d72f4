// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use clap::Parser;
use log::info;
use scribble_fm::{
    crypto::{self, KeyMaterial},
    error::Result,
};
use secrecy::ExposeSecret;

fn read_key_file(path: &Path) -> Result<KeyMaterial> {
    let bytes = secrecy::SecretVec::new(fs::read(path)?);
    KeyMaterial::from_concatenated(bytes.expose_secret())
}

/// Generate a key file holding a random AES-256 key followed by its IV.
#[derive(Debug, Parser)]
pub(crate) struct Keygen {
    /// Where to write the key file. Existing files are never overwritten.
    #[clap()]
    output: PathBuf,
}

#[async_trait]
impl super::Command for Keygen {
    async fn execute(self, _: &mut super::Context) -> Result<()> {
        let material = KeyMaterial::generate()?;

        let mut options = fs::OpenOptions::new();
        _ = options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            _ = options.mode(0o600);
        }
        options
            .open(&self.output)?
            .write_all(material.to_bytes().expose_secret())?;

        info!("Wrote key file {}", self.output.display());
        println!("{}", material.fingerprint());
        Ok(())
    }
}

/// Encrypt a file with the key and IV from a key file.
#[derive(Debug, Parser)]
pub(crate) struct Encrypt {
    /// Key file produced by `keygen`.
    #[arg(long, short)]
    key_file: PathBuf,

    #[clap()]
    input: PathBuf,

    #[clap()]
    output: PathBuf,
}

#[async_trait]
impl super::Command for Encrypt {
    async fn execute(self, _: &mut super::Context) -> Result<()> {
        let material = read_key_file(&self.key_file)?;
        crypto::encrypt_file(&self.input, &self.output, &material)
    }
}

/// Decrypt a file produced by `encrypt` with the same key file.
#[derive(Debug, Parser)]
pub(crate) struct Decrypt {
    /// Key file produced by `keygen`.
    #[arg(long, short)]
    key_file: PathBuf,

    #[clap()]
    input: PathBuf,

    #[clap()]
    output: PathBuf,
}

#[async_trait]
impl super::Command for Decrypt {
    async fn execute(self, _: &mut super::Context) -> Result<()> {
        let material = read_key_file(&self.key_file)?;
        crypto::decrypt_file(&self.input, &self.output, &material)
    }
}
