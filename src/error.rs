// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::{convert::Infallible, io, path::PathBuf, result};

use thiserror::Error;

pub type Result<T, E = Error> = result::Result<T, E>;

/// Stable numeric codes reported across the crate boundary (for example as
/// part of CLI diagnostics). The values are negative so that `0` remains
/// success.
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = -1;
    pub const MEMORY: i32 = -2;
    pub const FILE_NOT_FOUND: i32 = -3;
    pub const PERMISSION_DENIED: i32 = -4;
    pub const FILE_EXISTS: i32 = -5;
    pub const INVALID_ARGS: i32 = -6;
    pub const IO: i32 = -7;
    pub const READ: i32 = -8;
    pub const WRITE: i32 = -9;
    pub const UNKNOWN: i32 = -10;
    pub const GENKEY: i32 = -11;
    pub const ENCRYPT: i32 = -12;
    pub const DECRYPT: i32 = -13;
    pub const INIT: i32 = -14;
    pub const CIPHER: i32 = -15;
    pub const CREDENTIAL_DATA: i32 = -20;
    pub const CREDENTIAL_IDENTIFIER: i32 = -21;
    pub const CREDENTIAL_ADD: i32 = -22;
    pub const CREDENTIAL_RETRIEVE: i32 = -23;
    pub const LAYOUT_PARSE: i32 = -30;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("data conversion error: {0}")]
    Conversion(#[from] Conversion),
    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] Crypto),
    #[error("credential storage error: {0}")]
    Storage(#[from] Storage),
    #[error("archive error: {0}")]
    Archive(#[from] Archive),
    #[error("canvas layout is malformed: {0}")]
    Layout(serde_json::Error),
    #[error("command execution failed")]
    Command,
}

impl Error {
    /// Returns the numeric code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(e) => io_code(e),
            Self::Json(_) | Self::Conversion(_) => code::INVALID_ARGS,
            Self::Crypto(e) => e.code(),
            Self::Storage(e) => e.code(),
            Self::Archive(e) => e.code(),
            Self::Layout(_) => code::LAYOUT_PARSE,
            Self::Command => code::FAILURE,
        }
    }
}

fn io_code(e: &io::Error) -> i32 {
    // LINT: Deliberate fall-through that should catch future cases added to
    // the enum.
    #[allow(clippy::wildcard_enum_match_arm)]
    match e.kind() {
        io::ErrorKind::NotFound => code::FILE_NOT_FOUND,
        io::ErrorKind::PermissionDenied => code::PERMISSION_DENIED,
        io::ErrorKind::AlreadyExists => code::FILE_EXISTS,
        io::ErrorKind::OutOfMemory => code::MEMORY,
        io::ErrorKind::InvalidInput => code::INVALID_ARGS,
        io::ErrorKind::UnexpectedEof => code::READ,
        io::ErrorKind::WriteZero => code::WRITE,
        _ => code::IO,
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

impl From<Infallible> for Error {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

#[derive(Error, Debug)]
pub enum Conversion {
    #[error("unexpected key material length (wanted {0} bytes, but got {1} bytes)")]
    KeyLength(usize, usize),
    #[error("data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unexpected non-UTF-8-encoded bytes in input: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum Crypto {
    #[error("random number generator could not produce key material")]
    KeyGeneration,
    #[error("ciphertext could not be decrypted (wrong key or corrupted data)")]
    Decrypt,
    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    CiphertextLength(u64),
    #[error("sealed archive header is invalid")]
    SealedHeader,
    #[error("sealed archive version {0} is not supported")]
    SealedVersion(u8),
}

impl Crypto {
    const fn code(&self) -> i32 {
        match self {
            Self::KeyGeneration => code::GENKEY,
            Self::Decrypt | Self::CiphertextLength(_) => code::DECRYPT,
            Self::SealedHeader | Self::SealedVersion(_) => code::INIT,
        }
    }
}

impl From<block_padding::UnpadError> for Crypto {
    fn from(_: block_padding::UnpadError) -> Self {
        Self::Decrypt
    }
}

#[derive(Error, Debug)]
pub enum Storage {
    #[error(r#"credential suffix "{}" is invalid"#, .0.escape_default())]
    InvalidSuffix(String),
    #[error(r#"credential "{}" could not be stored"#, .0.escape_default())]
    Add(String),
    #[error(r#"credential "{}" is not present in the store"#, .0.escape_default())]
    Retrieve(String),
    #[error("stored credential data is corrupt")]
    Data,
    #[cfg(feature = "keychain")]
    #[error("keychain error: {0}")]
    Keychain(#[from] security_framework::base::Error),
    #[cfg(feature = "secret-service")]
    #[error("secret service error: {0}")]
    SecretService(#[from] oo7::Error),
}

impl Storage {
    const fn code(&self) -> i32 {
        match self {
            Self::InvalidSuffix(_) => code::CREDENTIAL_IDENTIFIER,
            Self::Add(_) => code::CREDENTIAL_ADD,
            Self::Retrieve(_) => code::CREDENTIAL_RETRIEVE,
            Self::Data => code::CREDENTIAL_DATA,
            #[cfg(feature = "keychain")]
            Self::Keychain(_) => code::CREDENTIAL_ADD,
            #[cfg(feature = "secret-service")]
            Self::SecretService(_) => code::CREDENTIAL_ADD,
        }
    }
}

#[derive(Error, Debug)]
pub enum Archive {
    #[error("archive {} already exists", .0.display())]
    Exists(PathBuf),
    #[error("archive {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("archive {} is missing {1}", .0.display())]
    InvalidLayout(PathBuf, &'static str),
    #[error(r#"entry name "{}" is not a single path component"#, .0.escape_default())]
    InvalidName(String),
    #[error(r#"archive has no entry named "{}""#, .0.escape_default())]
    EntryNotFound(String),
    #[error("{} is not accessible with the requested permissions", .0.display())]
    AccessDenied(PathBuf),
    #[error("archive {} is encrypted and needs a credential store to open", .0.display())]
    Encrypted(PathBuf),
}

impl Archive {
    const fn code(&self) -> i32 {
        match self {
            Self::Exists(_) => code::FILE_EXISTS,
            Self::NotFound(_) | Self::EntryNotFound(_) => code::FILE_NOT_FOUND,
            Self::InvalidLayout(..) => code::READ,
            Self::InvalidName(_) => code::INVALID_ARGS,
            Self::AccessDenied(_) | Self::Encrypted(_) => code::PERMISSION_DENIED,
        }
    }
}
