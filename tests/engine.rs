//! End-to-end scenarios driven through the statement layer against a real on-disk database,
//! mirroring the engine's literal REPL transcripts rather than poking the B+-tree directly.
use cqlite::command::{execute_statement, prepare_statement};
use cqlite::errors::Error;
use cqlite::storage::{btree::LEAF_NODE_MAX_CELLS, Table};

fn run(table: &mut Table, line: &str) -> Result<Vec<String>, Error> {
    let stmt = prepare_statement(line)?;
    execute_statement(table, stmt)
}

#[test]
fn insert_and_select_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = Table::open(dir.path().join("db")).unwrap();

    run(&mut table, "insert table users users CREATE TABLE users(id int)").unwrap();
    let rows = run(&mut table, "select").unwrap();

    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("table"));
    assert!(rows[0].contains("users"));
    assert!(rows[0].contains("CREATE TABLE users(id int)"));
}

#[test]
fn duplicate_schema_object_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = Table::open(dir.path().join("db")).unwrap();

    let line = "insert index idx1 users CREATE INDEX idx1 ON users(id)";
    run(&mut table, line).unwrap();
    let err = run(&mut table, line).unwrap_err();
    assert_eq!(err.to_string(), "Error: Duplicate table or index.");
}

#[test]
fn rows_persist_across_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let mut table = Table::open(&path).unwrap();
        for i in 0..3 {
            run(&mut table, &format!("insert table t{i} t{i} CREATE TABLE t{i}(id int)")).unwrap();
        }
        table.close().unwrap();
    }

    let mut table = Table::open(&path).unwrap();
    let rows = run(&mut table, "select").unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("(0,"));
    assert!(rows[1].starts_with("(1,"));
    assert!(rows[2].starts_with("(2,"));
}

#[test]
fn oversized_name_field_is_a_prepare_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = Table::open(dir.path().join("db")).unwrap();

    let long_name = "n".repeat(100);
    let line = format!("insert table {long_name} users CREATE TABLE {long_name}(id int)");
    let err = run(&mut table, &line).unwrap_err();
    assert_eq!(err.to_string(), "String is too long.");
}

#[test]
fn bare_insert_keyword_is_a_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = Table::open(dir.path().join("db")).unwrap();

    let err = run(&mut table, "insert").unwrap_err();
    assert_eq!(err.to_string(), "Syntax error.");
}

#[test]
fn filling_the_root_leaf_splits_it_into_two_children() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = Table::open(dir.path().join("db")).unwrap();

    let n = LEAF_NODE_MAX_CELLS + 1;
    for i in 0..n {
        run(&mut table, &format!("insert table t{i} t{i} CREATE TABLE t{i}(id int)")).unwrap();
    }

    let root = table.pager.get_page(0).unwrap();
    assert_eq!(root.node_type().unwrap(), cqlite::storage::btree::NodeType::Internal);
    assert_eq!(root.internal_num_keys(), 1);

    let left = root.internal_child(0).unwrap();
    let right = root.internal_right_child();
    let left_cells = table.pager.get_page(left).unwrap().leaf_num_cells();
    let right_cells = table.pager.get_page(right).unwrap().leaf_num_cells();
    assert_eq!(left_cells + right_cells, n);

    let rows = run(&mut table, "select").unwrap();
    assert_eq!(rows.len(), n);
}
