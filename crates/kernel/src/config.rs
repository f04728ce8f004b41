//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::content::ValidationMode;
use crate::tree::{DEFAULT_SEGMENT_WIDTH, MAX_SEGMENT_WIDTH};

/// Kernel configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Mode used by `save_revision` when the caller does not pick one
    /// (default: strict).
    pub validation_mode: ValidationMode,

    /// Width of one path segment in characters (default: 4).
    pub segment_width: usize,

    /// Capacity of the content event channel (default: 256).
    pub event_capacity: usize,

    /// Site definition used by the CLI when none is given on the command line.
    pub site_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::Strict,
            segment_width: DEFAULT_SEGMENT_WIDTH,
            event_capacity: 256,
            site_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let validation_mode = env::var("RAMO_VALIDATION_MODE")
            .unwrap_or_else(|_| "strict".to_string())
            .parse()
            .context("RAMO_VALIDATION_MODE must be 'strict' or 'lenient'")?;

        let segment_width: usize = env::var("RAMO_SEGMENT_WIDTH")
            .unwrap_or_else(|_| DEFAULT_SEGMENT_WIDTH.to_string())
            .parse()
            .context("RAMO_SEGMENT_WIDTH must be a positive integer")?;
        if !(1..=MAX_SEGMENT_WIDTH).contains(&segment_width) {
            bail!("RAMO_SEGMENT_WIDTH must be between 1 and {MAX_SEGMENT_WIDTH}");
        }

        let event_capacity: usize = env::var("RAMO_EVENT_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .context("RAMO_EVENT_CAPACITY must be a positive integer")?;
        if event_capacity == 0 {
            bail!("RAMO_EVENT_CAPACITY must be greater than zero");
        }

        let site_file = env::var("RAMO_SITE_FILE").ok().map(PathBuf::from);

        Ok(Self {
            validation_mode,
            segment_width,
            event_capacity,
            site_file,
        })
    }
}
