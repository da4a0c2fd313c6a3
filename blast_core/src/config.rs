//! Server tuning for explosion previews and commits.
//!
//! Loaded from `explosion_config.json` with support for an environment
//! variable override.

use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_EXPLOSION_CONFIG: &str = include_str!("data/explosion_config.json");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    pub command_bind: SocketAddr,
    /// Mixed into every per-explosion roll seed.
    pub world_seed: u64,
    /// Hard cap on breaks per tile, applied on top of the reroll reduction.
    pub max_tile_breaks: u32,
    pub max_rings: u32,
    pub default_slope: f32,
    pub default_max_intensity: f32,
    pub tick_interval_ms: u64,
    pub station_width: u32,
    pub station_height: u32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            command_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 41001),
            world_seed: 0,
            max_tile_breaks: 8,
            max_rings: 64,
            default_slope: 5.0,
            default_max_intensity: 100.0,
            tick_interval_ms: 100,
            station_width: 24,
            station_height: 16,
        }
    }
}

impl ExplosionConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_EXPLOSION_CONFIG)
                .expect("builtin explosion config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ExplosionConfigError> {
        let config: ExplosionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExplosionConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ExplosionConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    fn validate(&self) -> Result<(), ExplosionConfigError> {
        if self.max_tile_breaks == 0 {
            return Err(ExplosionConfigError::Invalid {
                field: "max_tile_breaks",
                reason: "must be at least 1",
            });
        }
        if self.max_rings == 0 {
            return Err(ExplosionConfigError::Invalid {
                field: "max_rings",
                reason: "must be at least 1",
            });
        }
        if !(self.default_slope.is_finite() && self.default_slope > 0.0) {
            return Err(ExplosionConfigError::Invalid {
                field: "default_slope",
                reason: "must be positive",
            });
        }
        if !(self.default_max_intensity.is_finite() && self.default_max_intensity > 0.0) {
            return Err(ExplosionConfigError::Invalid {
                field: "default_max_intensity",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ExplosionConfigError {
    #[error("failed to parse explosion config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read explosion config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid explosion config field {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Resource, Debug, Clone)]
pub struct ExplosionConfigHandle(pub Arc<ExplosionConfig>);

impl ExplosionConfigHandle {
    pub fn new(config: Arc<ExplosionConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<ExplosionConfig> {
        Arc::clone(&self.0)
    }
}

pub fn load_explosion_config_from_env() -> Arc<ExplosionConfig> {
    load_explosion_config(env::var("EXPLOSION_CONFIG_PATH").ok().map(PathBuf::from))
}

pub fn load_explosion_config(path: Option<PathBuf>) -> Arc<ExplosionConfig> {
    let Some(path) = path else {
        tracing::info!(target: "blast::config", "explosion_config.loaded=builtin");
        return ExplosionConfig::builtin();
    };

    match ExplosionConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "blast::config",
                path = %path.display(),
                "explosion_config.loaded=file"
            );
            Arc::new(config)
        }
        Err(err) => {
            tracing::warn!(
                target: "blast::config",
                path = %path.display(),
                error = %err,
                "explosion_config.load_failed; using builtin"
            );
            ExplosionConfig::builtin()
        }
    }
}
