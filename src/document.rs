// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Standalone JSON documents and file access helpers.

use std::{
    fs,
    ops::BitOr,
    path::{Path, PathBuf},
};

use log::debug;
use serde_json::Value;

use crate::error::{self, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    fn options(self) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        match self {
            Self::Read => {
                _ = options.read(true);
            }
            Self::Write => {
                _ = options.write(true);
            }
            Self::ReadWrite => {
                _ = options.read(true).write(true);
            }
        }
        options
    }
}

/// Permission mask checked by [`check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access(u8);

impl Access {
    pub const READ: Self = Self(0x01);
    pub const WRITE: Self = Self(0x02);
    pub const EXECUTE: Self = Self(0x04);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Access {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Writes `value` as JSON to `path`, replacing any previous content.
pub fn write_document<P: AsRef<Path>>(path: P, value: &Value) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_vec(value)?)?;
    debug!("Wrote document {}", path.display());
    Ok(())
}

pub fn read_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn delete_document<P: AsRef<Path>>(path: P) -> Result<()> {
    fs::remove_file(path)?;
    Ok(())
}

pub fn open_document<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<fs::File> {
    Ok(mode.options().open(path)?)
}

/// Fails unless the owner of `path` holds every permission in `access`.
pub fn check_access<P: AsRef<Path>>(path: P, access: Access) -> Result<()> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)?;

    #[cfg(unix)]
    let granted = {
        use std::os::unix::fs::PermissionsExt as _;

        let mode = metadata.permissions().mode();
        [
            (Access::READ, 0o400_u32),
            (Access::WRITE, 0o200_u32),
            (Access::EXECUTE, 0o100_u32),
        ]
        .into_iter()
        .filter(|&(_, bit)| mode & bit != 0)
        .fold(Access(0), |acc, (flag, _)| acc | flag)
    };
    #[cfg(not(unix))]
    let granted = if metadata.permissions().readonly() {
        Access::READ | Access::EXECUTE
    } else {
        Access::READ | Access::WRITE | Access::EXECUTE
    };

    if granted.contains(access) {
        Ok(())
    } else {
        Err(error::Archive::AccessDenied(PathBuf::from(path)).into())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};

    use serde_json::json;

    use super::*;

    #[test]
    fn document_lifecycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("doc.json");
        let value = json!({ "title": "Scribble", "pages": [1, 2, 3] });

        write_document(&path, &value)?;
        assert_eq!(read_document(&path)?, value);

        delete_document(&path)?;
        let err = read_document(&path);
        assert!(err.is_err_and(|e| e.code() == error::code::FILE_NOT_FOUND));
        Ok(())
    }

    #[test]
    fn open_modes_restrict_operations() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("doc.json");
        fs::write(&path, "{}")?;

        let mut reader = open_document(&path, OpenMode::Read)?;
        let mut content = String::new();
        let _ = reader.read_to_string(&mut content)?;
        assert_eq!(content, "{}");
        assert!(reader.write_all(b"x").is_err());

        let mut writer = open_document(&path, OpenMode::ReadWrite)?;
        writer.write_all(b"[]")?;
        assert_eq!(fs::read_to_string(&path)?, "[]");

        assert!(open_document(dir.path().join("missing"), OpenMode::Write).is_err());
        Ok(())
    }

    #[test]
    fn access_mask_combines() {
        let rw = Access::READ | Access::WRITE;
        assert_eq!(rw.bits(), 0x03);
        assert!(rw.contains(Access::READ));
        assert!(!rw.contains(Access::EXECUTE));
    }

    #[cfg(unix)]
    #[test]
    fn access_follows_owner_mode_bits() -> Result<()> {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("file");
        fs::write(&path, "")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        check_access(&path, Access::READ | Access::WRITE)?;
        assert!(matches!(
            check_access(&path, Access::EXECUTE),
            Err(error::Error::Archive(error::Archive::AccessDenied(_)))
        ));
        assert!(check_access(dir.path().join("missing"), Access::READ)
            .is_err_and(|e| e.code() == error::code::FILE_NOT_FOUND));
        Ok(())
    }
}
