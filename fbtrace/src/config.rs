// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Configuration (ambient, `SPEC_FULL.md` §6): an optional TOML file
//! layered under `FBTRACE_`-prefixed environment variables, in turn
//! overridden by CLI flags the front end applies after loading. Mirrors
//! the teacher's `infrastructure::config` + `bootstrap::config` split:
//! this module owns the schema and the file/env layer; the bootstrap
//! crate's CLI layer applies flag overrides on top of the result.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::control::SinkParams;

/// Runtime configuration for a sink and its surrounding pipeline.
/// Every field has a built-in default, so an absent config file and
/// absent environment variables still produce a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FbtraceConfig {
    /// Directory `record` writes new log files into when the caller
    /// doesn't name an explicit path.
    pub log_directory: PathBuf,
    /// Capacity, in bytes, of each trace-buffer slot.
    pub buffer_slot_capacity: usize,
    /// Number of trace-buffer slots kept in the ring.
    pub buffer_slot_count: usize,
    /// Maximum number of not-yet-flushed image-info chunks.
    pub image_info_queue_capacity: usize,
    /// `tracing` `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_verbosity: String,
    /// Address the optional `/metrics` listener binds, if enabled.
    pub metrics_listen_address: Option<String>,
}

impl Default for FbtraceConfig {
    fn default() -> Self {
        let params = SinkParams::default();
        Self {
            log_directory: PathBuf::from("."),
            buffer_slot_capacity: params.buffer_slot_capacity,
            buffer_slot_count: params.buffer_slot_count,
            image_info_queue_capacity: params.image_info_queue_capacity,
            log_verbosity: "info".to_string(),
            metrics_listen_address: None,
        }
    }
}

impl FbtraceConfig {
    pub fn sink_params(&self) -> SinkParams {
        SinkParams {
            image_info_queue_capacity: self.image_info_queue_capacity,
            buffer_slot_count: self.buffer_slot_count,
            buffer_slot_capacity: self.buffer_slot_capacity,
        }
    }

    /// Loads defaults, layers an optional TOML file (if `path` exists),
    /// then layers `FBTRACE_`-prefixed environment variables on top.
    /// CLI flags are applied by the caller afterward via the plain
    /// struct setters, so they always win.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("log_directory", defaults.log_directory.to_string_lossy().into_owned())?
            .set_default("buffer_slot_capacity", defaults.buffer_slot_capacity as i64)?
            .set_default("buffer_slot_count", defaults.buffer_slot_count as i64)?
            .set_default("image_info_queue_capacity", defaults.image_info_queue_capacity as i64)?
            .set_default("log_verbosity", defaults.log_verbosity.clone())?;

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("FBTRACE").separator("_"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sink_params_defaults() {
        let config = FbtraceConfig::default();
        let params = config.sink_params();
        let default_params = SinkParams::default();
        assert_eq!(params.buffer_slot_capacity, default_params.buffer_slot_capacity);
        assert_eq!(params.buffer_slot_count, default_params.buffer_slot_count);
        assert_eq!(
            params.image_info_queue_capacity,
            default_params.image_info_queue_capacity
        );
    }

    #[test]
    fn load_with_no_file_and_no_env_returns_defaults() {
        let config = FbtraceConfig::load(None).unwrap();
        assert_eq!(config, FbtraceConfig::default());
    }

    #[test]
    fn load_reads_an_existing_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fbtrace.toml");
        std::fs::write(&path, "log_verbosity = \"debug\"\nbuffer_slot_count = 16\n").unwrap();

        let config = FbtraceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_verbosity, "debug");
        assert_eq!(config.buffer_slot_count, 16);
        assert_eq!(
            config.buffer_slot_capacity,
            FbtraceConfig::default().buffer_slot_capacity
        );
    }

    #[test]
    fn load_with_a_missing_file_path_falls_back_to_defaults() {
        let config = FbtraceConfig::load(Some(Path::new("/nonexistent/fbtrace.toml"))).unwrap();
        assert_eq!(config, FbtraceConfig::default());
    }
}
