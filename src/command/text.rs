// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{fs, path::PathBuf};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use scribble_fm::{checksum, error::Result};
use tabled::{settings::Style, Table, Tabled};
use tokio::io::{self, AsyncReadExt as _};

/// Work with the text entries of an archive.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// The archive to operate on.
    #[arg(long, short)]
    archive: PathBuf,

    #[clap(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Store a text entry, reading its content from a file or standard input.
    Write {
        /// Read the content from this file instead of standard input.
        #[arg(long, short)]
        file: Option<PathBuf>,

        #[clap()]
        name: String,
    },
    /// Print a text entry.
    Read {
        #[clap()]
        name: String,
    },
    /// Remove a text entry.
    Remove {
        #[clap()]
        name: String,
    },
    /// List the text entries with their sizes and checksums.
    List,
}

#[derive(Tabled)]
struct Entry {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Bytes")]
    len: usize,
    #[tabled(rename = "CRC-32")]
    crc32: String,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let mut archive = ctx.open_archive(&self.archive).await?;

        match self.action {
            Action::Write { file, name } => {
                let content = match file {
                    Some(path) => fs::read_to_string(path)?,
                    None => {
                        let mut content = String::new();
                        _ = io::stdin().read_to_string(&mut content).await?;
                        content
                    }
                };
                archive.write_text(&name, &content)?;
            }
            Action::Read { name } => print!("{}", archive.read_text(&name)?),
            Action::Remove { name } => archive.remove_text(&name)?,
            Action::List => {
                let mut entries = Vec::new();
                for name in archive.list_texts()? {
                    let content = archive.read_text(&name)?;
                    entries.push(Entry {
                        len: content.len(),
                        crc32: format!("{:08x}", checksum::crc32(content.as_bytes())),
                        name,
                    });
                }
                if !entries.is_empty() {
                    println!("{}", Table::new(entries).with(Style::rounded()));
                }
            }
        }
        Ok(())
    }
}
