// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;
use log::error;
use scribble_fm::{
    checksum,
    error::{self, Result},
};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct Sum {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "CRC-32")]
    crc32: String,
}

fn hex(crc: u32) -> String {
    format!("{crc:08x}")
}

/// Print CRC-32 checksums of a file, or of every file in an archive.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Fail unless the file's checksum equals this hexadecimal value.
    #[arg(long, value_parser = |s: &str| u32::from_str_radix(s.trim_start_matches("0x"), 16))]
    expect: Option<u32>,

    #[clap()]
    path: PathBuf,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        if self.path.is_dir() {
            let archive = ctx.open_archive(&self.path).await?;
            let sums = archive
                .checksums()?
                .into_iter()
                .map(|(path, crc)| Sum {
                    path,
                    crc32: hex(crc),
                });
            println!(
                "{}",
                Table::new(sums)
                    .with(Style::rounded())
                    .with(Modify::new(Columns::single(1)).with(Alignment::right()))
            );
            return Ok(());
        }

        let crc = checksum::file_crc32(&self.path)?;
        println!("{}  {}", hex(crc), self.path.display());
        match self.expect {
            Some(expected) if expected != crc => {
                error!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    self.path.display(),
                    hex(expected),
                    hex(crc)
                );
                Err(error::Error::Command)
            }
            _ => Ok(()),
        }
    }
}
