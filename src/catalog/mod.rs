//! Query catalog - version-scoped query generation
//!
//! A catalog is an ordered list of query templates. Each template has a
//! `header` (prefixes and the like, emitted verbatim) and a `core` (the graph
//! pattern). The catalog wraps the core in one or two `GRAPH` blocks keyed to
//! a [`VersionContext`]:
//!
//! | Context        | Body                                                   |
//! |----------------|--------------------------------------------------------|
//! | `PointInTime`  | `GRAPH <version:v> { core }`                           |
//! | `Delta`        | `GRAPH <version:s> { core } . FILTER (NOT EXISTS { GRAPH <version:e> { core } })` |
//! | `FullHistory`  | `GRAPH ?version { core }`                              |
//!
//! ## Source format
//!
//! ```json
//! {
//!   "0": { "header": ["PREFIX ex: <http://example.org/>"], "core": ["?s ex:p ?o ."] },
//!   "1": { "header": { "0": "PREFIX ..." }, "core": { "1": "?s ?p ?o .", "3": "..." } }
//! }
//! ```
//!
//! Query keys must be exactly `0..n`. Line sequences are either arrays or
//! objects keyed by line number (sorted numerically, gaps allowed).

mod import;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sweep::VersionContext;
use crate::{Error, Result};

/// One query template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDefinition {
    header: Vec<String>,
    core: Vec<String>,
}

impl QueryDefinition {
    /// Create a template from header and core lines.
    #[must_use]
    pub fn new(header: Vec<String>, core: Vec<String>) -> Self {
        Self { header, core }
    }

    /// Header lines, emitted verbatim.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Core lines, wrapped in version-scoped blocks.
    #[must_use]
    pub fn core(&self) -> &[String] {
        &self.core
    }

    fn versioned_block(&self, out: &mut String, version_tag: &str, nested: bool) {
        let indent = if nested { "\t" } else { "" };
        let _ = write!(out, "\n\t{indent}GRAPH {version_tag} {{");
        for line in &self.core {
            let _ = write!(out, "\n\t\t{indent}{line}");
        }
        let _ = write!(out, "\n\t{indent}}}");
    }
}

/// Loaded, read-only query catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    queries: Vec<QueryDefinition>,
}

impl Catalog {
    /// Build a catalog from templates, indexed by position.
    #[must_use]
    pub fn new(queries: Vec<QueryDefinition>) -> Self {
        Self { queries }
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCatalog` if the file is not a valid catalog. Partial
    /// catalogs are never returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::MalformedCatalog(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCatalog` on any shape violation.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Ordered<RawQuery> = serde_json::from_str(text)
            .map_err(|e| Error::MalformedCatalog(format!("invalid catalog JSON: {e}")))?;

        let mut queries = Vec::new();
        for (position, (number, raw)) in raw.into_sorted("query")?.into_iter().enumerate() {
            if number != position as u64 {
                return Err(Error::MalformedCatalog(format!(
                    "query numbers must run 0..n without gaps, found {number} at position {position}"
                )));
            }
            let header = raw.header.into_lines(number, "header")?;
            let core = raw.core.into_lines(number, "core")?;
            queries.push(QueryDefinition::new(header, core));
        }
        Ok(Self { queries })
    }

    /// Serialize to catalog JSON (object keyed by query number, line arrays).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let keyed: std::collections::BTreeMap<usize, &QueryDefinition> =
            self.queries.iter().enumerate().collect();
        Ok(serde_json::to_string_pretty(&keyed)?)
    }

    /// Number of queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether the catalog holds no queries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Template at `index`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` for an unknown index.
    pub fn definition(&self, index: usize) -> Result<&QueryDefinition> {
        self.queries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            total: self.queries.len(),
        })
    }

    /// Concrete query string for `index` under `context`.
    ///
    /// `limit` appends a result cap.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` for an unknown index.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vqbench::catalog::{Catalog, QueryDefinition};
    /// use vqbench::sweep::VersionContext;
    ///
    /// let catalog = Catalog::new(vec![QueryDefinition::new(
    ///     vec![],
    ///     vec!["?s ?p ?o .".to_string()],
    /// )]);
    /// let query = catalog.query(0, VersionContext::PointInTime(2), Some(10))?;
    /// assert_eq!(query, "\nSELECT * WHERE {\n\tGRAPH <version:2> {\n\t\t?s ?p ?o .\n\t}\n} LIMIT 10");
    /// # Ok::<(), vqbench::Error>(())
    /// ```
    pub fn query(
        &self,
        index: usize,
        context: VersionContext,
        limit: Option<usize>,
    ) -> Result<String> {
        let definition = self.definition(index)?;

        let mut query = definition.header.join("\n");
        query.push_str("\nSELECT * WHERE {");
        match context {
            VersionContext::PointInTime(version) => {
                definition.versioned_block(&mut query, &version_tag(version), false);
            }
            VersionContext::Delta { start, end } => {
                definition.versioned_block(&mut query, &version_tag(start), false);
                query.push_str(" .\n\tFILTER (NOT EXISTS {");
                definition.versioned_block(&mut query, &version_tag(end), true);
                query.push_str("\n\t})");
            }
            VersionContext::FullHistory => {
                definition.versioned_block(&mut query, "?version", false);
            }
        }
        query.push_str("\n}");
        if let Some(limit) = limit {
            let _ = write!(query, " LIMIT {limit}");
        }
        Ok(query)
    }
}

fn version_tag(version: usize) -> String {
    format!("<version:{version}>")
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    header: Ordered<String>,
    core: Ordered<String>,
}

/// A sequence written either as an array or as an object keyed by position.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Ordered<T> {
    List(Vec<T>),
    Numbered(HashMap<String, T>),
}

impl<T> Ordered<T> {
    fn into_sorted(self, what: &str) -> Result<Vec<(u64, T)>> {
        match self {
            Self::List(items) => Ok((0..).zip(items).collect()),
            Self::Numbered(map) => {
                let mut items = map
                    .into_iter()
                    .map(|(key, item)| {
                        key.parse::<u64>().map(|n| (n, item)).map_err(|_| {
                            Error::MalformedCatalog(format!("{what} key {key:?} is not a number"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                items.sort_by_key(|(n, _)| *n);
                Ok(items)
            }
        }
    }
}

impl Ordered<String> {
    fn into_lines(self, query: u64, section: &str) -> Result<Vec<String>> {
        let label = format!("query {query} {section} line");
        Ok(self
            .into_sorted(&label)?
            .into_iter()
            .map(|(_, line)| line)
            .collect())
    }
}
