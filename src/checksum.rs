// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! CRC-32 (ISO-HDLC, reflected polynomial `0xEDB88320`) over buffers and
//! files.

use std::{
    fs,
    io::{BufReader, Read},
    path::Path,
};

use crate::error::Result;

const CHUNK_SIZE: usize = 64 * 1024;

#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Computes the checksum of a file without loading it into memory.
pub fn file_crc32<P: AsRef<Path>>(path: P) -> Result<u32> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0_u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn file_matches_buffer() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        let data: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&data)?;
        file.flush()?;

        assert_eq!(file_crc32(file.path())?, crc32(&data));
        Ok(())
    }
}
