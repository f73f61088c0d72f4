// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use directories::ProjectDirs;
use inflector::Inflector;
use once_cell::sync::Lazy;

pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub static CLIENT_TYPE_ID: Lazy<String> =
    Lazy::new(|| option_env!("CARGO_PKG_NAME").unwrap_or("scribble-fm").to_owned());
pub static CLIENT_DISPLAY_NAME: Lazy<String> = Lazy::new(|| CLIENT_TYPE_ID.to_title_case());

/// Reverse-DNS identifier used to namespace credential store entries when the
/// caller does not provide one.
pub static DEFAULT_BUNDLE_IDENTIFIER: Lazy<String> =
    Lazy::new(|| format!("com.scribblelab.{}", *CLIENT_TYPE_ID));

pub static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("com", "ScribbleLab", &CLIENT_DISPLAY_NAME));
