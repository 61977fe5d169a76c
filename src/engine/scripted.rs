//! In-memory engine and store for tests and benches.

use std::cell::RefCell;
use std::time::Duration;

use super::{QueryEngine, ResultStream, VersionedStore};
use crate::{Error, Result};

/// Scripted outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// Stream `n` results, then complete.
    Results(usize),
    /// Stream `n` results, then fail mid-stream.
    FailAfter(usize),
    /// Refuse the query outright.
    Reject,
}

/// Engine replaying a fixed script of outcomes, one per `execute` call.
///
/// The script cycles once exhausted. Every issued query is recorded.
#[derive(Debug)]
pub struct ScriptedEngine {
    script: Vec<Replication>,
    delay: Option<Duration>,
    issued: RefCell<Vec<String>>,
}

impl ScriptedEngine {
    /// Engine replaying `script` in order.
    #[must_use]
    pub fn new(script: Vec<Replication>) -> Self {
        Self {
            script,
            delay: None,
            issued: RefCell::new(Vec::new()),
        }
    }

    /// Engine that always returns `count` results.
    #[must_use]
    pub fn constant(count: usize) -> Self {
        Self::new(vec![Replication::Results(count)])
    }

    /// Sleep `delay` before each result.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries issued so far, in order.
    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        self.issued.borrow().clone()
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.issued.borrow().len()
    }
}

impl QueryEngine for ScriptedEngine {
    type Stream = ScriptedStream;

    async fn execute(&self, query: &str) -> Result<ScriptedStream> {
        let call = {
            let mut issued = self.issued.borrow_mut();
            issued.push(query.to_owned());
            issued.len() - 1
        };
        let outcome = if self.script.is_empty() {
            Replication::Results(0)
        } else {
            self.script[call % self.script.len()]
        };
        let (remaining, fails) = match outcome {
            Replication::Results(n) => (n, false),
            Replication::FailAfter(n) => (n, true),
            Replication::Reject => {
                return Err(Error::Engine(format!("scripted rejection of call {call}")))
            }
        };
        Ok(ScriptedStream {
            remaining,
            fails,
            delay: self.delay,
        })
    }
}

/// Result stream of a [`ScriptedEngine`].
#[derive(Debug)]
pub struct ScriptedStream {
    remaining: usize,
    fails: bool,
    delay: Option<Duration>,
}

impl ResultStream for ScriptedStream {
    async fn next_result(&mut self) -> Option<Result<()>> {
        if self.remaining == 0 {
            if self.fails {
                self.fails = false;
                return Some(Err(Error::Engine("scripted mid-stream failure".to_string())));
            }
            return None;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.remaining -= 1;
        Some(Ok(()))
    }
}

/// Store with a fixed version count.
#[derive(Debug, Clone, Copy)]
pub struct FixedStore(pub usize);

impl VersionedStore for FixedStore {
    async fn version_count(&self) -> Result<usize> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(engine: &ScriptedEngine) -> Result<usize> {
        let mut stream = engine.execute("q").await?;
        let mut count = 0;
        while let Some(result) = stream.next_result().await {
            result?;
            count += 1;
        }
        Ok(count)
    }

    #[tokio::test]
    async fn test_script_cycles() {
        let engine = ScriptedEngine::new(vec![
            Replication::Results(2),
            Replication::Reject,
            Replication::FailAfter(1),
        ]);

        assert_eq!(drain(&engine).await.unwrap(), 2);
        assert!(drain(&engine).await.is_err());
        assert!(drain(&engine).await.is_err());
        assert_eq!(drain(&engine).await.unwrap(), 2);
        assert_eq!(engine.calls(), 4);
    }

    #[tokio::test]
    async fn test_fixed_store() {
        assert_eq!(FixedStore(7).version_count().await.unwrap(), 7);
    }
}
