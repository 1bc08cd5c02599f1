use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use md5::{Digest, Md5};
use thiserror::Error;

use crate::shared::constants::DIGEST_CHUNK_SIZE;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("file not found or unreadable: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid digest {value:?}: expected 32 hexadecimal characters")]
    InvalidDigest { value: String },
}

/// MD5 fingerprint of a file's full byte content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntegrityDigest([u8; 16]);

impl IntegrityDigest {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// 32-character lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for IntegrityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for IntegrityDigest {
    type Err = DigestError;

    /// Accepts upper- or lowercase hex, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(trimmed, &mut bytes).map_err(|_| DigestError::InvalidDigest {
            value: trimmed.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

/// Streams files through an incremental MD5 accumulator.
///
/// Memory use is bounded by the chunk size regardless of file size.
/// Holds no state between calls; safe to share across threads.
#[derive(Clone, Debug)]
pub struct DigestVerifier {
    chunk_size: usize,
}

impl DigestVerifier {
    pub fn new() -> Self {
        Self::with_chunk_size(DIGEST_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn digest(&self, path: &Path) -> Result<IntegrityDigest, DigestError> {
        let mut file = File::open(path).map_err(|e| DigestError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.digest_reader(&mut file).map_err(|e| DigestError::Read {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Recomputes the digest of `path` and compares it with `expected` hex.
    pub fn verify(&self, path: &Path, expected: &str) -> Result<bool, DigestError> {
        let expected: IntegrityDigest = expected.parse()?;
        let actual = self.digest(path)?;
        if actual != expected {
            log::warn!(
                "Digest mismatch for {}: expected {expected}, got {actual}",
                path.display()
            );
        }
        Ok(actual == expected)
    }

    fn digest_reader(&self, reader: &mut impl Read) -> std::io::Result<IntegrityDigest> {
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(IntegrityDigest(bytes))
    }
}

impl Default for DigestVerifier {
    fn default() -> Self {
        Self::new()
    }
}
