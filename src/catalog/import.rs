//! Catalog import from plain query files
//!
//! Turns a directory of `q<N>.txt` query files into a [`Catalog`]. Everything
//! before the first `{` becomes the header; everything between the first `{`
//! and the last `}` becomes the core. Lines are trimmed, blank lines dropped,
//! and re-indented with tabs by brace depth.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{Catalog, QueryDefinition};
use crate::{Error, Result};

impl QueryDefinition {
    /// Split a full query text into header and core sections.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCatalog` if the text has no `{ ... }` body.
    pub fn from_query_text(text: &str) -> Result<Self> {
        let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) else {
            return Err(Error::MalformedCatalog(
                "query text has no braced body".to_string(),
            ));
        };
        if close < open {
            return Err(Error::MalformedCatalog(
                "query text closes its body before opening it".to_string(),
            ));
        }
        Ok(Self::new(
            section_lines(&text[..open]),
            section_lines(&text[open + 1..close]),
        ))
    }
}

impl Catalog {
    /// Import every `*.txt` query file in `dir`.
    ///
    /// The query number is the file stem without its first character
    /// (`q0.txt` is query 0). Numbers must run `0..n` without gaps.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCatalog` for unreadable or misnamed files and for
    /// gaps in the numbering.
    pub fn import_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut numbered = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let number = stem
                .get(1..)
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(|| {
                    Error::MalformedCatalog(format!(
                        "cannot read a query number from {}",
                        path.display()
                    ))
                })?;
            let text = fs::read_to_string(&path)?;
            let definition = QueryDefinition::from_query_text(&text).map_err(|e| {
                Error::MalformedCatalog(format!("{}: {e}", path.display()))
            })?;
            debug!(query = number, file = %path.display(), "imported query");
            numbered.push((number, definition));
        }

        numbered.sort_by_key(|(number, _)| *number);
        for (position, (number, _)) in numbered.iter().enumerate() {
            if *number != position {
                return Err(Error::MalformedCatalog(format!(
                    "query files must be numbered 0..n without gaps, found {number} at position {position}"
                )));
            }
        }
        Ok(Self::new(
            numbered.into_iter().map(|(_, definition)| definition).collect(),
        ))
    }
}

/// A line opening a brace stays at the outer depth; its body moves in one tab.
fn section_lines(section: &str) -> Vec<String> {
    let mut depth: usize = 0;
    let mut lines = Vec::new();
    for raw in section.lines() {
        let line = raw.trim();
        let opens = line.contains('{');
        if opens {
            depth += 1;
        }
        if line.contains('}') {
            depth = depth.saturating_sub(1);
        }
        if !line.is_empty() {
            let indent = depth.saturating_sub(usize::from(opens));
            lines.push(format!("{}{line}", "\t".repeat(indent)));
        }
    }
    lines
}
