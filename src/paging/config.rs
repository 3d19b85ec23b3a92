//! Paging configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Tunables for chunk synthesis and caching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Weight of the shared-state benefit against vertex cost when deciding to merge
    pub merge_factor: f32,
    /// Smallest on-screen size (radius over distance) an object may have and still be paged
    pub min_size: f32,
    /// Seconds an unreferenced chunk stays cached
    pub expiry_delay: f64,
    /// World units per cell
    pub cell_size: f32,
    /// Chunks at least this many cells wide drop containers
    pub far_type_filter_size: f32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            merge_factor: 250.0,
            min_size: 0.01,
            expiry_delay: 0.5,
            cell_size: 8192.0,
            far_type_filter_size: 2.0,
        }
    }
}

impl PagingConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PagingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded paging config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size > 0.0) {
            return Err(Error::Config(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if !(self.min_size >= 0.0) {
            return Err(Error::Config(format!(
                "min_size must not be negative, got {}",
                self.min_size
            )));
        }
        if !(self.expiry_delay >= 0.0) {
            return Err(Error::Config(format!(
                "expiry_delay must not be negative, got {}",
                self.expiry_delay
            )));
        }
        if !self.merge_factor.is_finite() {
            return Err(Error::Config("merge_factor must be finite".to_string()));
        }
        Ok(())
    }
}
