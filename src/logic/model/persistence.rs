//! Model Persistence
//!
//! Fitted state is written as a JSON envelope:
//!
//! ```json
//! { "model": "isolation_forest", "layout": {..}, "checksum": "<sha256>",
//!   "saved_at": "...", "state": "<json string>" }
//! ```
//!
//! The state is embedded as a string so the checksum covers the exact bytes
//! that are parsed back. Loading rejects a different model kind, a changed
//! feature layout, or a checksum mismatch.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, PipelineResult};
use crate::logic::features::layout::LayoutInfo;

use super::ModelKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub model: ModelKind,
    pub layout: LayoutInfo,
    /// Hex SHA-256 of `state`
    pub checksum: String,
    pub saved_at: DateTime<Utc>,
    pub state: String,
}

fn checksum(state: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(state.as_bytes());
    hex::encode(hasher.finalize())
}

/// Save fitted state to disk
pub fn save_state<T: Serialize>(model: ModelKind, state: &T, path: &Path) -> PipelineResult<()> {
    // Ensure directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let state = serde_json::to_string(state)?;
    let envelope = ModelEnvelope {
        model,
        layout: LayoutInfo::current(),
        checksum: checksum(&state),
        saved_at: Utc::now(),
        state,
    };

    fs::write(path, serde_json::to_vec_pretty(&envelope)?)?;
    log::info!("Saved {} model to {}", model, path.display());
    Ok(())
}

/// Read the envelope without validating it
pub fn read_envelope(path: &Path) -> PipelineResult<ModelEnvelope> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Load and validate fitted state
pub fn load_state<T: DeserializeOwned>(expected: ModelKind, path: &Path) -> PipelineResult<T> {
    let envelope = read_envelope(path)?;

    if envelope.model != expected {
        return Err(PipelineError::ModelKindMismatch {
            expected: expected.to_string(),
            found: envelope.model.to_string(),
        });
    }

    envelope.layout.validate()?;

    if checksum(&envelope.state) != envelope.checksum {
        log::warn!("Checksum mismatch in {}", path.display());
        return Err(PipelineError::ChecksumMismatch);
    }

    let state = serde_json::from_str(&envelope.state)?;
    log::info!(
        "Loaded {} model from {} (saved {})",
        expected,
        path.display(),
        envelope.saved_at
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        weights: Vec<f64>,
    }

    fn dummy() -> Dummy {
        Dummy { weights: vec![0.1, -2.5, 1e-9] }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");

        save_state(ModelKind::IsolationForest, &dummy(), &path).unwrap();
        let loaded: Dummy = load_state(ModelKind::IsolationForest, &path).unwrap();
        assert_eq!(loaded, dummy());
    }

    #[test]
    fn test_kind_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_state(ModelKind::Autoencoder, &dummy(), &path).unwrap();

        let err = load_state::<Dummy>(ModelKind::IsolationForest, &path).unwrap_err();
        assert!(matches!(err, PipelineError::ModelKindMismatch { .. }));
    }

    #[test]
    fn test_tampered_state_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_state(ModelKind::IsolationForest, &dummy(), &path).unwrap();

        let mut envelope = read_envelope(&path).unwrap();
        envelope.state = envelope.state.replace("-2.5", "-2.6");
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        let err = load_state::<Dummy>(ModelKind::IsolationForest, &path).unwrap_err();
        assert!(matches!(err, PipelineError::ChecksumMismatch));
    }

    #[test]
    fn test_layout_change_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_state(ModelKind::IsolationForest, &dummy(), &path).unwrap();

        let mut envelope = read_envelope(&path).unwrap();
        envelope.layout.hash ^= 1;
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        let err = load_state::<Dummy>(ModelKind::IsolationForest, &path).unwrap_err();
        assert!(matches!(err, PipelineError::LayoutMismatch(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_state::<Dummy>(ModelKind::IsolationForest, &dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
