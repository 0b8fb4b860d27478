use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{dataset::FeatureIndex, Param, Result};

/// A trained model as written to disk: the parameters and the feature keys they belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub f_size: usize,
    pub curr_batch: u64,
    pub theta: Vec<Param>,
    pub features: FeatureIndex,
}

impl ModelSnapshot {
    /// Writes the snapshot as pretty printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let mut snapshot: Self = serde_json::from_str(s)?;
        snapshot.features.rebuild_lookup();
        Ok(snapshot)
    }
}
