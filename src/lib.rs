//! # vqbench: Resumable Benchmark Driver for Versioned Queries
//!
//! vqbench measures how long a fixed catalog of queries takes against a
//! versioned store, in three evaluation modes:
//!
//! - **VM** (version materialization): the data as of one version
//! - **DM** (delta materialization): facts present at one version, gone at another
//! - **VQ** (version query): the whole history, version left as a variable
//!
//! A sweep walks every (query, mode, version) cell in one fixed order,
//! replicates each measurement, and records one row per cell. After every
//! cell it checkpoints its position, so a killed or crashed sweep picks up at
//! exactly the next unmeasured cell.
//!
//! ## Example Usage
//!
//! ```rust
//! use vqbench::catalog::{Catalog, QueryDefinition};
//! use vqbench::checkpoint::MemoryCheckpointStore;
//! use vqbench::engine::ScriptedEngine;
//! use vqbench::measure::{MeasureOptions, Measurer};
//! use vqbench::runner::Runner;
//! use vqbench::sink::MemorySink;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vqbench::Result<()> {
//! let catalog = Catalog::new(vec![QueryDefinition::new(
//!     vec!["PREFIX ex: <http://example.org/>".to_string()],
//!     vec!["?s ex:p ?o .".to_string()],
//! )]);
//! let measurer = Measurer::new(ScriptedEngine::constant(10), MeasureOptions::default());
//! let checkpoints = MemoryCheckpointStore::new();
//! let mut runner = Runner::new(catalog, measurer, checkpoints, MemorySink::new());
//!
//! let bounds = runner.bounds(3);
//! let summary = runner.run(bounds).await?;
//! assert_eq!(summary.completed, 7);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod measure;
pub mod runner;
pub mod sink;
pub mod sweep;

pub use error::{Error, Result};
