//! Binary model artifact.
//!
//! Layout: 8-byte magic, little-endian `u16` format version, 32-byte SHA-256
//! of the payload, then the bincode-encoded [`TrainedModel`].

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::info;
use triage_core::TrainedModel;

use crate::atomic::write_atomic;
use crate::error::{Result, StoreError};

pub const MAGIC: &[u8; 8] = b"TRIAGEMD";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 8 + 2 + 32;

/// Facts about a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Hex SHA-256 of the payload.
    pub digest: String,
    /// Total file size in bytes.
    pub size: usize,
}

/// Encode `model` into artifact bytes.
pub fn encode_model(model: &TrainedModel) -> Result<Vec<u8>> {
    let payload = bincode::serialize(model)?;
    let digest = Sha256::digest(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&digest);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode artifact bytes, verifying magic, version and digest.
pub fn decode_model(bytes: &[u8]) -> Result<TrainedModel> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
        return Err(StoreError::InvalidArtifact(
            "missing magic header".to_string(),
        ));
    }
    let found = u16::from_le_bytes([bytes[8], bytes[9]]);
    if found != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            expected: FORMAT_VERSION,
            found,
        });
    }

    let stored = &bytes[10..HEADER_LEN];
    let payload = &bytes[HEADER_LEN..];
    let actual = Sha256::digest(payload);
    if stored != actual.as_slice() {
        return Err(StoreError::DigestMismatch {
            expected: hex::encode(stored),
            actual: hex::encode(actual),
        });
    }
    Ok(bincode::deserialize(payload)?)
}

/// Serialize `model` to `path`, replacing any existing file atomically.
pub fn save_model(path: &Path, model: &TrainedModel) -> Result<ArtifactInfo> {
    let bytes = encode_model(model)?;
    write_atomic(path, &bytes)?;

    let info = ArtifactInfo {
        digest: hex::encode(&bytes[10..HEADER_LEN]),
        size: bytes.len(),
    };
    info!(
        path = %path.display(),
        model_id = %model.model_id,
        digest = %info.digest,
        bytes = info.size,
        "Saved model artifact"
    );
    Ok(info)
}

pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let bytes = std::fs::read(path)?;
    let model = decode_model(&bytes)?;
    info!(path = %path.display(), model_id = %model.model_id, "Loaded model artifact");
    Ok(model)
}
