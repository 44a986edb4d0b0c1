//! Rendered artifacts as returned by the typesetting service.
//!
//! The service ships the PDF as a hex string: two hex characters per byte,
//! left to right, either case.

use thiserror::Error;

const PDF_SIGNATURE: &[u8] = b"%PDF";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("Hex payload has odd length")]
    OddLength,
    #[error("Invalid hex character {c:?} at index {index}")]
    InvalidCharacter { c: char, index: usize },
}

impl From<hex::FromHexError> for ArtifactError {
    fn from(e: hex::FromHexError) -> Self {
        match e {
            hex::FromHexError::InvalidHexCharacter { c, index } => {
                ArtifactError::InvalidCharacter { c, index }
            }
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                ArtifactError::OddLength
            }
        }
    }
}

/// Decode a hex string into bytes.
pub fn decode_hex(encoded: &str) -> Result<Vec<u8>, ArtifactError> {
    Ok(hex::decode(encoded)?)
}

/// Lowercase hex encoding, the inverse of [`decode_hex`].
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Binary output of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_hex(encoded: &str) -> Result<Self, ArtifactError> {
        decode_hex(encoded).map(Self::new)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Starts with the `%PDF` magic.
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(PDF_SIGNATURE)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
