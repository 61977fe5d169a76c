//! Engine and store adapters that shell out to external programs
//!
//! The query is written to the engine's stdin; every non-empty stdout line
//! counts as one result. A non-zero exit status turns into an engine error
//! at the end of the stream. `{store}` in any argument is replaced with the
//! store location.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use super::{QueryEngine, ResultStream, VersionedStore};
use crate::{Error, Result};

const STORE_PLACEHOLDER: &str = "{store}";

fn substitute(args: &[String], store: &Path) -> Vec<String> {
    let store = store.display().to_string();
    args.iter()
        .map(|arg| arg.replace(STORE_PLACEHOLDER, &store))
        .collect()
}

/// Query engine backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// Engine running `program args..` against the store at `store`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[String], store: &Path) -> Self {
        Self {
            program: program.into(),
            args: substitute(args, store),
        }
    }
}

impl QueryEngine for CommandEngine {
    type Stream = CommandStream;

    async fn execute(&self, query: &str) -> Result<CommandStream> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Engine(format!("cannot start {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Engine("engine stdout not captured".to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            let query = query.to_owned();
            // Feed stdin concurrently so a chatty engine cannot fill stdout and stall.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(query.as_bytes()).await {
                    debug!(error = %e, "engine closed stdin early");
                }
            });
        }

        Ok(CommandStream {
            child,
            lines: BufReader::new(stdout).lines(),
            finished: false,
        })
    }
}

/// Result stream of a running engine process.
#[derive(Debug)]
pub struct CommandStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    finished: bool,
}

impl ResultStream for CommandStream {
    async fn next_result(&mut self) -> Option<Result<()>> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(_)) => return Some(Ok(())),
                Ok(None) => {
                    self.finished = true;
                    return match self.child.wait().await {
                        Ok(status) if status.success() => None,
                        Ok(status) => {
                            Some(Err(Error::Engine(format!("engine exited with {status}"))))
                        }
                        Err(e) => Some(Err(e.into())),
                    };
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Versioned store whose version count comes from an external command.
///
/// The first whitespace-separated token of the command's output that parses
/// as an integer is the count.
#[derive(Debug, Clone)]
pub struct CommandStore {
    program: String,
    args: Vec<String>,
}

impl CommandStore {
    /// Store probed by running `program args..` against `store`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[String], store: &Path) -> Self {
        Self {
            program: program.into(),
            args: substitute(args, store),
        }
    }
}

impl VersionedStore for CommandStore {
    async fn version_count(&self) -> Result<usize> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Store(format!("cannot start {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(Error::Store(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .split_whitespace()
            .find_map(|token| token.parse::<usize>().ok())
            .ok_or_else(|| {
                Error::Store(format!(
                    "{} printed no version count: {:?}",
                    self.program,
                    stdout.trim()
                ))
            })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    async fn drain(engine: &CommandEngine, query: &str) -> (usize, Option<Error>) {
        let mut stream = engine.execute(query).await.unwrap();
        let mut count = 0;
        while let Some(result) = stream.next_result().await {
            match result {
                Ok(()) => count += 1,
                Err(e) => return (count, Some(e)),
            }
        }
        (count, None)
    }

    #[test]
    fn test_store_placeholder_substitution() {
        let engine = CommandEngine::new(
            "engine",
            &["--source".to_string(), "{store}/data".to_string()],
            Path::new("/exp"),
        );
        assert_eq!(engine.args, ["--source", "/exp/data"]);
    }

    #[tokio::test]
    async fn test_command_engine_counts_lines() {
        let engine = CommandEngine::new(
            "sh",
            &sh("cat > /dev/null; printf 'a\\n\\nb\\nc\\n'"),
            Path::new("."),
        );
        let (count, error) = drain(&engine, "SELECT").await;
        assert_eq!(count, 3);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_command_engine_echoes_query_lines() {
        let engine = CommandEngine::new("sh", &sh("cat"), Path::new("."));
        let (count, error) = drain(&engine, "one\ntwo\n").await;
        assert_eq!(count, 2);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_command_engine_nonzero_exit_is_error() {
        let engine = CommandEngine::new("sh", &sh("echo partial; exit 3"), Path::new("."));
        let (count, error) = drain(&engine, "SELECT").await;
        assert_eq!(count, 1);
        assert!(matches!(error, Some(Error::Engine(_))));
    }

    #[tokio::test]
    async fn test_command_engine_missing_program() {
        let engine = CommandEngine::new("/nonexistent/engine", &[], Path::new("."));
        assert!(matches!(engine.execute("SELECT").await, Err(Error::Engine(_))));
    }

    #[tokio::test]
    async fn test_command_store_parses_count() {
        let store = CommandStore::new("sh", &sh("echo 'versions: 12'"), Path::new("."));
        assert_eq!(store.version_count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_command_store_without_number() {
        let store = CommandStore::new("sh", &sh("echo none"), Path::new("."));
        assert!(matches!(store.version_count().await, Err(Error::Store(_))));
    }
}
