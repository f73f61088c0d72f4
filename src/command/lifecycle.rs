// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;
use log::error;
use scribble_fm::{
    config::ProjectConfig,
    error::{self, Result},
    Archive,
};
use tabled::{settings::Style, Table, Tabled};

/// Create a new archive.
#[derive(Debug, Parser)]
pub(crate) struct Create {
    /// Project name recorded in the configuration. Defaults to the final
    /// component of the archive path.
    #[arg(long, short)]
    name: Option<String>,

    /// Author recorded in the configuration.
    #[arg(long, short, env = "SCRIBBLE_AUTHOR", default_value = "")]
    author: String,

    /// Seal the configuration with a key kept in the credential store.
    #[arg(long)]
    encrypt: bool,

    /// Location of the new archive.
    #[clap()]
    path: PathBuf,
}

#[async_trait]
impl super::Command for Create {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let name = match self.name {
            Some(name) => name,
            None => match self.path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => {
                    error!("Cannot derive a project name from {}", self.path.display());
                    return Err(error::Error::Command);
                }
            },
        };
        let config = ProjectConfig::new(name, self.author);

        let archive = if self.encrypt {
            Archive::create_encrypted(&self.path, config, ctx.store().await).await?
        } else {
            Archive::create(&self.path, config)?
        };
        println!("{}", archive.root().display());
        Ok(())
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Show the configuration of an archive.
#[derive(Debug, Parser)]
pub(crate) struct Info {
    /// Print the raw configuration document instead of a summary.
    #[arg(long)]
    json: bool,

    #[clap()]
    path: PathBuf,
}

#[async_trait]
impl super::Command for Info {
    async fn execute(self, ctx: &mut super::Context) -> Result<()> {
        let archive = ctx.open_archive(&self.path).await?;
        let config = archive.config();

        if self.json {
            println!("{}", config.to_json()?);
            return Ok(());
        }

        let rows = [
            ("Name", config.project.name.clone()),
            ("Author", config.project.author.clone()),
            ("Created", config.project.created_at.to_rfc3339()),
            ("Last changed", config.project.last_changed_at.to_rfc3339()),
            ("Editor version", config.project.editor_version.clone()),
            ("Encoding", config.document_settings.encoding.clone()),
            (
                "Line endings",
                config
                    .document_settings
                    .line_endings
                    .as_str()
                    .escape_default()
                    .to_string(),
            ),
            ("Encrypted", archive.is_encrypted().to_string()),
            ("Encryption", config.security.encryption_method.clone()),
            ("Favorite", config.flags.is_favorite.to_string()),
            ("Texts", config.references.text_files.len().to_string()),
            ("Images", config.references.images.len().to_string()),
        ]
        .map(|(field, value)| Row { field, value });

        println!("{}", Table::new(rows).with(Style::rounded()));
        Ok(())
    }
}

/// Delete an archive and everything in it.
#[derive(Debug, Parser)]
pub(crate) struct Delete {
    #[clap()]
    path: PathBuf,
}

#[async_trait]
impl super::Command for Delete {
    async fn execute(self, _: &mut super::Context) -> Result<()> {
        Archive::delete(&self.path)
    }
}
