//! External collaborators: the query engine and the versioned store
//!
//! The sweep only needs two things from the outside world:
//!
//! - a [`QueryEngine`] that executes a query string and streams results back
//!   one at a time, so the measurer can timestamp each arrival;
//! - a [`VersionedStore`] that reports how many versions exist, which bounds
//!   the VM and DM phases.
//!
//! [`CommandEngine`] and [`CommandStore`] drive real external programs.
//! [`ScriptedEngine`] and [`FixedStore`] are in-memory stand-ins for tests and
//! benches.
//!
//! # Example
//!
//! ```rust
//! use vqbench::engine::{QueryEngine, ResultStream, ScriptedEngine};
//!
//! # async fn example() -> vqbench::Result<()> {
//! let engine = ScriptedEngine::constant(3);
//! let mut stream = engine.execute("SELECT * WHERE { ?s ?p ?o }").await?;
//! let mut count = 0;
//! while let Some(result) = stream.next_result().await {
//!     result?;
//!     count += 1;
//! }
//! assert_eq!(count, 3);
//! # Ok(())
//! # }
//! ```

mod command;
mod scripted;

pub use command::{CommandEngine, CommandStore, CommandStream};
pub use scripted::{FixedStore, Replication, ScriptedEngine, ScriptedStream};

use crate::Result;
use std::future::Future;

/// Stream of query results.
pub trait ResultStream {
    /// Wait for the next result.
    ///
    /// Yields `Some(Ok(()))` per result, `Some(Err(_))` if the engine fails
    /// mid-stream, and `None` once the stream completed normally.
    fn next_result(&mut self) -> impl Future<Output = Option<Result<()>>>;
}

/// External query engine.
pub trait QueryEngine {
    /// Result stream type.
    type Stream: ResultStream;

    /// Issue `query` and return its result stream.
    fn execute(&self, query: &str) -> impl Future<Output = Result<Self::Stream>>;
}

/// External versioned store.
pub trait VersionedStore {
    /// Number of versions currently held by the store.
    fn version_count(&self) -> impl Future<Output = Result<usize>>;
}
