//! Benchmark configuration
//!
//! Settings come from an optional `bench.json` in the experiment directory;
//! command-line flags override them afterwards. Relative paths are resolved
//! against the experiment directory.
//!
//! ```json
//! {
//!   "replications": 5,
//!   "limit": null,
//!   "export_arrivals": false,
//!   "timeout_secs": 600,
//!   "engine": { "program": "sparql-engine", "args": ["--source", "{store}"] },
//!   "store": { "versions": 10 }
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::measure::MeasureOptions;
use crate::{Error, Result};

/// Name of the optional config file inside the experiment directory.
pub const CONFIG_FILE: &str = "bench.json";

/// Default replication count.
pub const DEFAULT_REPLICATIONS: usize = 5;

/// File layout of an experiment, relative to its directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Query catalog JSON
    pub catalog: PathBuf,
    /// Versioned store location handed to the engine
    pub store: PathBuf,
    /// Checkpoint record
    pub checkpoint: PathBuf,
    /// Directory for result tables
    pub results: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("queries.json"),
            store: PathBuf::from("data.ostrich"),
            checkpoint: PathBuf::from("progress.txt"),
            results: PathBuf::from("results"),
        }
    }
}

/// External engine command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to run per replication
    pub program: String,
    /// Arguments; `{store}` is replaced with the store path
    pub args: Vec<String>,
}

/// Source of the store's version count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Fixed version count (takes precedence over `program`)
    pub versions: Option<usize>,
    /// Program printing the version count
    pub program: Option<String>,
    /// Arguments; `{store}` is replaced with the store path
    pub args: Vec<String>,
}

/// Complete benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Replications per cell
    pub replications: usize,
    /// Optional result cap appended to every query
    pub limit: Option<usize>,
    /// Write one arrival curve file per cell
    pub export_arrivals: bool,
    /// Per-replication timeout in seconds
    pub timeout_secs: Option<u64>,
    /// File layout
    pub paths: PathsConfig,
    /// Engine command
    pub engine: EngineConfig,
    /// Version count source
    pub store: StoreConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            replications: DEFAULT_REPLICATIONS,
            limit: None,
            export_arrivals: false,
            timeout_secs: None,
            paths: PathsConfig::default(),
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load `bench.json` from `experiment_dir`, or defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid JSON.
    pub fn load<P: AsRef<Path>>(experiment_dir: P) -> Result<Self> {
        let path = experiment_dir.as_ref().join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                Error::InvalidConfig(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.replications == 0 {
            return Err(Error::InvalidConfig(
                "replications must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(Error::InvalidConfig(
                "timeout_secs must be positive when set".to_string(),
            ));
        }
        if self.engine.program.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "engine.program is not set; add it to {CONFIG_FILE} or pass --engine"
            )));
        }
        if self.store.versions.is_none() && self.store.program.is_none() {
            return Err(Error::InvalidConfig(format!(
                "store needs either `versions` or `program` in {CONFIG_FILE} (or pass --versions)"
            )));
        }
        Ok(())
    }

    /// Measurement settings derived from this config.
    #[must_use]
    pub fn measure_options(&self) -> MeasureOptions {
        MeasureOptions {
            replications: self.replications,
            record_arrivals: self.export_arrivals,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// A configuration bound to its experiment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    dir: PathBuf,
    config: BenchConfig,
}

impl Experiment {
    /// Bind `config` to `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, config: BenchConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    /// Load the config file of `dir`.
    ///
    /// # Errors
    ///
    /// See [`BenchConfig::load`].
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let config = BenchConfig::load(&dir)?;
        Ok(Self { dir, config })
    }

    /// Experiment directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bound configuration.
    #[must_use]
    pub const fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Mutable configuration, for command-line overrides.
    pub fn config_mut(&mut self) -> &mut BenchConfig {
        &mut self.config
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Catalog file.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.resolve(&self.config.paths.catalog)
    }

    /// Store location.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.resolve(&self.config.paths.store)
    }

    /// Checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.resolve(&self.config.paths.checkpoint)
    }

    /// Results directory.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.results)
    }
}
