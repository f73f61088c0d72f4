// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The `.scconfig` project document stored at the root of every archive.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{crypto, error::Result, metadata};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub project: Project,
    #[serde(default)]
    pub document_settings: DocumentSettings,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub references: References,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Project {
    pub name: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub last_changed_at: DateTime<Utc>,
    pub editor_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSettings {
    pub encoding: String,
    pub line_endings: LineEnding,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_owned(),
            line_endings: LineEnding::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    CrLf,
    #[serde(rename = "CR")]
    Cr,
}

impl LineEnding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Security {
    pub password_protected: bool,
    pub encryption_method: String,
}

impl Default for Security {
    fn default() -> Self {
        Self {
            password_protected: false,
            encryption_method: "none".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Flags {
    #[serde(rename = "is_Favorite")]
    pub is_favorite: bool,
}

/// Names of the entries the archive knows about, relative to their
/// directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct References {
    pub images: Vec<String>,
    pub text_files: Vec<String>,
    pub temporary: Vec<String>,
}

impl References {
    pub(crate) fn register(list: &mut Vec<String>, name: &str) -> bool {
        if list.iter().any(|existing| existing == name) {
            false
        } else {
            list.push(name.to_owned());
            true
        }
    }

    pub(crate) fn unregister(list: &mut Vec<String>, name: &str) -> bool {
        let before = list.len();
        list.retain(|existing| existing != name);
        list.len() != before
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

impl ProjectConfig {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, author: A) -> Self {
        let created_at = now();
        Self {
            project: Project {
                name: name.into(),
                author: author.into(),
                created_at,
                last_changed_at: created_at,
                editor_version: metadata::CORE_VERSION.to_owned(),
            },
            document_settings: DocumentSettings::default(),
            security: Security::default(),
            flags: Flags::default(),
            references: References::default(),
        }
    }

    /// Records a modification.
    pub fn touch(&mut self) {
        self.project.last_changed_at = now().max(self.project.created_at);
    }

    pub(crate) fn mark_encrypted(&mut self) {
        self.security.password_protected = true;
        crypto::ENCRYPTION_METHOD.clone_into(&mut self.security.encryption_method);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_test::{assert_tokens, Token};

    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = ProjectConfig::new("Notebook", "Ada");
        assert_eq!(config.project.name, "Notebook");
        assert_eq!(config.project.author, "Ada");
        assert_eq!(config.project.created_at, config.project.last_changed_at);
        assert_eq!(config.project.editor_version, metadata::CORE_VERSION);
        assert_eq!(config.document_settings.encoding, "UTF-8");
        assert_eq!(config.document_settings.line_endings, LineEnding::Lf);
        assert!(!config.security.password_protected);
        assert_eq!(config.security.encryption_method, "none");
        assert!(!config.flags.is_favorite);
        assert!(config.references.text_files.is_empty());
    }

    #[test]
    fn json_layout_matches_document_format() -> Result<()> {
        let mut config = ProjectConfig::new("Notebook", "Ada");
        config.flags.is_favorite = true;
        config.mark_encrypted();

        let value: serde_json::Value = serde_json::from_str(&config.to_json()?)?;
        assert_eq!(value["project"]["name"], "Notebook");
        assert_eq!(value["document_settings"]["line_endings"], "LF");
        assert_eq!(value["security"]["password_protected"], true);
        assert_eq!(value["security"]["encryption_method"], "AES-256-CBC");
        assert_eq!(value["flags"]["is_Favorite"], true);
        assert!(value["references"]["images"].is_array());
        assert!(value["references"]["text_files"].is_array());
        assert!(value["references"]["temporary"].is_array());
        Ok(())
    }

    #[test]
    fn minimal_document_is_accepted() -> Result<()> {
        let config = ProjectConfig::from_json(
            r#"{
                "project": {
                    "name": "Old",
                    "author": "Someone",
                    "created_at": "2024-07-15T10:00:00Z",
                    "last_changed_at": "2024-07-16T10:00:00Z",
                    "editor_version": "0.0.1"
                },
                "unknown": 42
            }"#,
        )?;
        assert_eq!(
            config.project.created_at,
            Utc.with_ymd_and_hms(2024, 7, 15, 10, 0, 0).unwrap()
        );
        assert_eq!(config.references, References::default());
        assert_eq!(config.security, Security::default());
        Ok(())
    }

    #[test]
    fn flags_tokens() {
        assert_tokens(
            &Flags { is_favorite: true },
            &[
                Token::Struct {
                    name: "Flags",
                    len: 1,
                },
                Token::Str("is_Favorite"),
                Token::Bool(true),
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn document_settings_tokens() {
        assert_tokens(
            &DocumentSettings {
                encoding: "UTF-16".to_owned(),
                line_endings: LineEnding::CrLf,
            },
            &[
                Token::Struct {
                    name: "DocumentSettings",
                    len: 2,
                },
                Token::Str("encoding"),
                Token::Str("UTF-16"),
                Token::Str("line_endings"),
                Token::UnitVariant {
                    name: "LineEnding",
                    variant: "CRLF",
                },
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn references_register_once() {
        let mut refs = References::default();
        assert!(References::register(&mut refs.text_files, "a.txt"));
        assert!(!References::register(&mut refs.text_files, "a.txt"));
        assert!(References::unregister(&mut refs.text_files, "a.txt"));
        assert!(!References::unregister(&mut refs.text_files, "a.txt"));
    }
}
