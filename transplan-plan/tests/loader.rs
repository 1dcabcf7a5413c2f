//! Integration tests for the plan loader.

use camino::Utf8PathBuf;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use transplan_plan::{PlanLoadError, load_plan};
use transplan_types::file::FileId;

fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn write_plan(temp: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from_path_buf(temp.path().join(name)).expect("utf8 path");
    fs::write(&path, contents).expect("write plan");
    path
}

fn strs(ids: &[FileId]) -> Vec<&str> {
    ids.iter().map(FileId::as_str).collect()
}

#[test]
fn loads_json_plan_in_order() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "phys.plan.json",
        r#"{
            "schema": "transplan.plan.v1",
            "transform": ["src/z.F90", "src/a.F90"],
            "append": ["build/z.idem.F90", "build/a.idem.F90"],
            "remove": ["src/b\\.F90"],
            "producer": "some-tool 1.2"
        }"#,
    );

    let plan = load_plan(&path).expect("load");
    assert_eq!(strs(plan.transform()), vec!["src/z.F90", "src/a.F90"]);
    assert_eq!(
        strs(plan.append()),
        vec!["build/z.idem.F90", "build/a.idem.F90"]
    );
    assert_eq!(plan.remove(), &["src/b\\.F90".to_string()]);
}

#[test]
fn loads_cmake_plan() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "plan_phys.cmake",
        r#"# Generated by the plan phase
set( LOKI_SOURCES_TO_TRANSFORM
     /proj/src/cloudsc.F90
     /proj/src/satur.F90
   )

set( LOKI_SOURCES_TO_APPEND
     /proj/build/cloudsc.scc.F90
     /proj/build/satur.scc.F90
   )

set( LOKI_SOURCES_TO_REMOVE
     /proj/src/cloudsc.F90
   )
"#,
    );

    let plan = load_plan(&path).expect("load");
    assert_eq!(
        strs(plan.transform()),
        vec!["/proj/src/cloudsc.F90", "/proj/src/satur.F90"]
    );
    assert_eq!(plan.pairs().count(), 2);
    assert_eq!(plan.remove().len(), 1);
}

#[test]
fn empty_collections_are_valid() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "empty.json",
        r#"{ "transform": [], "append": [], "remove": [] }"#,
    );

    let plan = load_plan(&path).expect("load");
    assert!(plan.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let temp = create_temp_dir();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nope.json")).expect("utf8 path");

    let err = load_plan(&path).expect_err("missing file");
    assert!(matches!(err, PlanLoadError::Io { .. }));
}

#[test]
fn invalid_json_is_reported() {
    let temp = create_temp_dir();
    let path = write_plan(&temp, "bad.json", "{ not json");

    let err = load_plan(&path).expect_err("invalid json");
    assert!(matches!(err, PlanLoadError::Json { .. }));
}

#[test]
fn missing_collection_is_named() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "partial.json",
        r#"{ "transform": ["a.f"], "append": ["a.gen.f"] }"#,
    );

    let err = load_plan(&path).expect_err("missing remove");
    assert_eq!(err, PlanLoadError::MissingCollection { name: "remove" });
    assert_eq!(err.to_string(), "missing 'remove' collection");
}

#[test]
fn missing_cmake_collection_is_named() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "plan.cmake",
        "set(X_TO_TRANSFORM a.f)\nset(X_TO_REMOVE)\n",
    );

    let err = load_plan(&path).expect_err("missing append");
    assert_eq!(err, PlanLoadError::MissingCollection { name: "append" });
}

#[test]
fn length_mismatch_fails_fast() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "mismatch.json",
        r#"{ "transform": ["a.f", "b.f"], "append": ["a.gen.f"], "remove": [] }"#,
    );

    let err = load_plan(&path).expect_err("mismatch");
    assert_eq!(
        err,
        PlanLoadError::LengthMismatch {
            transform: 2,
            append: 1
        }
    );
}

#[test]
fn blank_entry_is_rejected() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "blank.json",
        r#"{ "transform": ["a.f", ""], "append": ["a.gen.f", "b.gen.f"], "remove": [] }"#,
    );

    let err = load_plan(&path).expect_err("blank");
    assert_eq!(
        err,
        PlanLoadError::EmptyEntry {
            collection: "transform",
            index: 1
        }
    );
}

#[test]
fn cmake_syntax_error_reports_line() {
    let temp = create_temp_dir();
    let path = write_plan(
        &temp,
        "broken.cmake",
        "set(X_TO_TRANSFORM a.f)\nset(X_TO_APPEND \"a.gen.f\n",
    );

    let err = load_plan(&path).expect_err("unterminated quote");
    assert!(matches!(err, PlanLoadError::Syntax { line: 2, .. }));
}
