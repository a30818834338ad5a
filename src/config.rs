use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::filter::FilterCriteria;
use crate::data::model::{linspace, FrequencyGrid};
use crate::error::Result;
use crate::physics::InputSet;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BICYCLE_ID_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "bicycle_id.json";

/// Log-spaced frequency grid, `10^start_exponent ..= 10^stop_exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogGrid {
    pub start_exponent: f64,
    pub stop_exponent: f64,
    pub points: usize,
}

impl LogGrid {
    pub fn build(&self) -> Result<FrequencyGrid> {
        FrequencyGrid::logspace(self.start_exponent, self.stop_exponent, self.points)
    }
}

/// Evenly spaced speeds, `start ..= stop` m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

impl SpeedRange {
    pub fn values(&self) -> Vec<f64> {
        linspace(self.start, self.stop, self.points)
    }
}

/// File locations and evaluation grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run matrix file (`.json`, `.parquet` or `.csv`).
    pub run_file: PathBuf,
    /// Run table CSV.
    pub metadata_file: PathBuf,
    /// Directory of `<Rider>.json` parameter overrides.
    pub parameter_dir: Option<PathBuf>,
    pub bode_frequencies: LogGrid,
    pub locus_speeds: SpeedRange,
    pub coefficient_speeds: SpeedRange,
    pub inputs: InputSet,
    pub criteria: FilterCriteria,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            run_file: PathBuf::from("sample_runs.parquet"),
            metadata_file: PathBuf::from("sample_metadata.csv"),
            parameter_dir: None,
            bode_frequencies: LogGrid {
                start_exponent: -1.0,
                stop_exponent: 2.0,
                points: 200,
            },
            locus_speeds: SpeedRange {
                start: 0.0,
                stop: 10.0,
                points: 100,
            },
            coefficient_speeds: SpeedRange {
                start: 0.0,
                stop: 10.0,
                points: 8,
            },
            inputs: InputSet::SteerTorque,
            criteria: FilterCriteria::all(),
        }
    }
}

impl Config {
    /// Parse a JSON configuration; absent keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read `path`, or fall back to the defaults when it does not exist.
    /// Relative file paths inside the configuration resolve against the
    /// configuration file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from [`CONFIG_ENV`], defaulting to [`DEFAULT_CONFIG_FILE`].
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load(&path)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.run_file);
        resolve(&mut self.metadata_file);
        if let Some(dir) = self.parameter_dir.as_mut() {
            resolve(dir);
        }
    }
}
