//! Catalog tests: import, persist, reload, generate

use std::fs;

use vqbench::catalog::Catalog;
use vqbench::sweep::{Bounds, Sweep, VersionContext};
use vqbench::Error;

const Q0: &str = "PREFIX ex: <http://example.org/>\nSELECT ?s WHERE {\n  ?s ex:p ?o .\n}\n";
const Q1: &str = "SELECT * WHERE {\n  ?s ?p ?o .\n  OPTIONAL {\n    ?o ?q ?x .\n  }\n}\n";

#[test]
fn test_import_save_and_reload() {
    let queries = tempfile::tempdir().unwrap();
    fs::write(queries.path().join("q0.txt"), Q0).unwrap();
    fs::write(queries.path().join("q1.txt"), Q1).unwrap();
    fs::write(queries.path().join("README.md"), "not a query").unwrap();

    let catalog = Catalog::import_dir(queries.path()).unwrap();
    assert_eq!(catalog.len(), 2);

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("queries.json");
    fs::write(&path, catalog.to_json().unwrap()).unwrap();
    let reloaded = Catalog::load(&path).unwrap();

    assert_eq!(reloaded, catalog);
    assert_eq!(
        reloaded.definition(1).unwrap().core(),
        ["?s ?p ?o .", "OPTIONAL {", "\t?o ?q ?x .", "}"]
    );
}

#[test]
fn test_import_rejects_gaps() {
    let queries = tempfile::tempdir().unwrap();
    fs::write(queries.path().join("q0.txt"), Q0).unwrap();
    fs::write(queries.path().join("q2.txt"), Q1).unwrap();

    assert!(matches!(
        Catalog::import_dir(queries.path()),
        Err(Error::MalformedCatalog(_))
    ));
}

#[test]
fn test_numbered_object_sections() {
    let text = r#"{
        "0": { "header": { "1": "PREFIX b: <b>", "0": "PREFIX a: <a>" },
               "core":   { "0": "?s a:p ?o ." } }
    }"#;
    let catalog = Catalog::from_json(text).unwrap();
    let definition = catalog.definition(0).unwrap();

    assert_eq!(definition.header(), ["PREFIX a: <a>", "PREFIX b: <b>"]);
    assert_eq!(definition.core(), ["?s a:p ?o ."]);
}

#[test]
fn test_every_sweep_cell_generates_a_query() {
    let catalog = Catalog::from_json(
        r#"{ "0": { "header": [], "core": ["?s ?p ?o ."] },
             "1": { "header": [], "core": [] } }"#,
    )
    .unwrap();

    for cell in Sweep::new(Bounds::new(catalog.len(), 4)) {
        let query = catalog.query(cell.query, cell.context, None).unwrap();
        match cell.context {
            VersionContext::PointInTime(v) => {
                assert!(query.contains(&format!("GRAPH <version:{v}>")));
            }
            VersionContext::Delta { start, end } => {
                assert!(query.contains(&format!("GRAPH <version:{start}>")));
                assert!(query.contains(&format!("GRAPH <version:{end}>")));
                assert!(query.contains("FILTER (NOT EXISTS {"));
            }
            VersionContext::FullHistory => assert!(query.contains("GRAPH ?version")),
        }
    }
}

#[test]
fn test_query_past_catalog_end() {
    let catalog = Catalog::from_json(r#"{ "0": { "header": [], "core": [] } }"#).unwrap();
    assert!(matches!(
        catalog.query(1, VersionContext::FullHistory, None),
        Err(Error::IndexOutOfRange { index: 1, total: 1 })
    ));
}
