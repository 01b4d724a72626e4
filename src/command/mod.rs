//! The statement layer: turns a line of input into a `Statement` and applies it to the
//! schema tree. Parsing is intentionally shallow - this engine has one tree, shaped like
//! `sqlite_master`, and a handful of statements that touch it. No tokenizer, no grammar;
//! just whitespace-splitting and a couple of sanity checks, as the original's own parser does.
use tracing::{info, trace};

use crate::errors::{err, Error};
use crate::storage::row::{NAME_SIZE, SQL_SIZE, TBL_NAME_SIZE, TYPE_SIZE};
use crate::storage::{self, SchemaRow, Table};

pub enum Statement {
    Select,
    Insert {
        kind: String,
        name: String,
        tbl_name: String,
        sql: String,
    },
    CreateTable {
        name: String,
        sql: String,
    },
    CreateIndex {
        name: String,
        tbl_name: String,
        sql: String,
    },
}

/// Splits up to `n` leading whitespace-delimited tokens off `s`, returning them alongside
/// whatever is left (itself trimmed of leading whitespace, but otherwise untouched - this is
/// what lets `INSERT`'s trailing SQL carry its own internal spacing to end-of-line).
fn take_tokens(s: &str, n: usize) -> (Vec<&str>, &str) {
    let mut rest = s;
    let mut tokens = Vec::with_capacity(n);
    for _ in 0..n {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = &rest[end..];
    }
    (tokens, rest.trim_start())
}

fn check_lengths(kind: &str, name: &str, tbl_name: &str, sql: &str) -> Result<(), Error> {
    if kind.len() >= TYPE_SIZE
        || name.len() >= NAME_SIZE
        || tbl_name.len() >= TBL_NAME_SIZE
        || sql.len() >= SQL_SIZE
    {
        return Err(err!(Prepare, "String is too long."));
    }
    Ok(())
}

/// `insert <type> <name> <tbl_name> <sql...>` - the first three fields are single tokens,
/// the rest of the line is the `sql` field verbatim.
fn parse_insert(trimmed: &str) -> Result<Statement, Error> {
    let (tokens, sql) = take_tokens(trimmed, 4);
    if tokens.len() < 4 || sql.is_empty() {
        return Err(err!(Prepare, "Syntax error."));
    }
    let kind = tokens[1].to_string();
    let name = tokens[2].to_string();
    let tbl_name = tokens[3].to_string();
    check_lengths(&kind, &name, &tbl_name, sql)?;
    Ok(Statement::Insert { kind, name, tbl_name, sql: sql.to_string() })
}

/// `create table <name> (...)` / `create index <name> on <tbl> (...)` - minimal validation
/// only: a table definition must carry a `(` and a `)`; an index definition must name its
/// owning table via `on <tbl>`.
fn parse_create(trimmed: &str) -> Result<Statement, Error> {
    let (head, rest) = take_tokens(trimmed, 2);
    if head.len() < 2 {
        return Err(err!(Prepare, "Syntax error."));
    }
    match head[1].to_lowercase().as_str() {
        "table" => {
            let (name_tok, _) = take_tokens(rest, 1);
            let Some(&name) = name_tok.first() else {
                return Err(err!(Prepare, "Syntax error."));
            };
            if !trimmed.contains('(') || !trimmed.contains(')') {
                return Err(err!(Prepare, "Syntax error."));
            }
            check_lengths("table", name, name, trimmed)?;
            Ok(Statement::CreateTable { name: name.to_string(), sql: trimmed.to_string() })
        }
        "index" => {
            let (idx_tokens, _) = take_tokens(rest, 3);
            if idx_tokens.len() != 3 {
                return Err(err!(Prepare, "Syntax error."));
            }
            let (name, on_kw, tbl_name) = (idx_tokens[0], idx_tokens[1], idx_tokens[2]);
            if !on_kw.eq_ignore_ascii_case("on") {
                return Err(err!(Prepare, "Syntax error."));
            }
            check_lengths("index", name, tbl_name, trimmed)?;
            Ok(Statement::CreateIndex {
                name: name.to_string(),
                tbl_name: tbl_name.to_string(),
                sql: trimmed.to_string(),
            })
        }
        _ => Err(err!(Prepare, "Syntax error.")),
    }
}

/// Parses a line of input into a `Statement`, or an `Error::Prepare` describing why it
/// wasn't recognized.
pub fn prepare_statement(input: &str) -> Result<Statement, Error> {
    let trimmed = input.trim();
    let (head, _) = take_tokens(trimmed, 1);
    let keyword = head.first().copied().unwrap_or("");

    match keyword.to_lowercase().as_str() {
        "select" => Ok(Statement::Select),
        "insert" => parse_insert(trimmed),
        "create" => parse_create(trimmed),
        "" => Err(err!(Prepare, "Syntax error.")),
        _ => Err(err!(Prepare, "Unrecognized keyword at start of '{trimmed}'.")),
    }
}

/// Applies a prepared statement to `table`, returning the lines to print.
pub fn execute_statement(table: &mut Table, statement: Statement) -> Result<Vec<String>, Error> {
    match statement {
        Statement::Select => {
            trace!("executing SELECT");
            let rows = storage::select_rows(table)?;
            Ok(rows.iter().map(format_row).collect())
        }
        Statement::Insert { kind, name, tbl_name, sql } => {
            info!(%kind, %name, "executing raw INSERT");
            storage::insert_schema_row(table, SchemaRow::new(kind, name, tbl_name, sql))?;
            Ok(vec!["Executed.".to_string()])
        }
        Statement::CreateTable { name, sql } => {
            info!(%name, "executing CREATE TABLE");
            storage::insert_schema_row(table, SchemaRow::new("table", name.clone(), name, sql))?;
            Ok(vec!["Executed.".to_string()])
        }
        Statement::CreateIndex { name, tbl_name, sql } => {
            info!(%name, %tbl_name, "executing CREATE INDEX");
            storage::insert_schema_row(table, SchemaRow::new("index", name, tbl_name, sql))?;
            Ok(vec!["Executed.".to_string()])
        }
    }
}

fn format_row(row: &SchemaRow) -> String {
    format!(
        "({}, {}, {}, {}, {}, {})",
        row.rowid, row.kind, row.name, row.tbl_name, row.root_page, row.sql
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select() {
        assert!(matches!(prepare_statement("select").unwrap(), Statement::Select));
        assert!(matches!(prepare_statement("SELECT").unwrap(), Statement::Select));
    }

    #[test]
    fn parses_insert() {
        let stmt = prepare_statement("insert table users users CREATE TABLE users(id int)").unwrap();
        match stmt {
            Statement::Insert { kind, name, tbl_name, sql } => {
                assert_eq!(kind, "table");
                assert_eq!(name, "users");
                assert_eq!(tbl_name, "users");
                assert_eq!(sql, "CREATE TABLE users(id int)");
            }
            _ => panic!("expected Insert"),
        }
    }

    #[test]
    fn parses_create_table() {
        let stmt = prepare_statement("create table users (id int, name text)").unwrap();
        match stmt {
            Statement::CreateTable { name, sql } => {
                assert_eq!(name, "users");
                assert!(sql.starts_with("create table"));
            }
            _ => panic!("expected CreateTable"),
        }
    }

    #[test]
    fn parses_create_index() {
        let stmt = prepare_statement("create index idx_users_name on users (name)").unwrap();
        match stmt {
            Statement::CreateIndex { name, tbl_name, .. } => {
                assert_eq!(name, "idx_users_name");
                assert_eq!(tbl_name, "users");
            }
            _ => panic!("expected CreateIndex"),
        }
    }

    #[test]
    fn rejects_unrecognized_keyword() {
        let err = prepare_statement("drop table users").unwrap_err();
        assert!(matches!(err, Error::Prepare(_)));
    }

    #[test]
    fn rejects_insert_with_no_arguments() {
        let err = prepare_statement("insert").unwrap_err();
        assert!(matches!(err, Error::Prepare(msg) if msg == "Syntax error."));
    }

    #[test]
    fn rejects_oversized_name_field() {
        let long_name = "x".repeat(100);
        let line = format!("insert table {long_name} users CREATE TABLE {long_name}(id int)");
        let err = prepare_statement(&line).unwrap_err();
        assert!(matches!(err, Error::Prepare(msg) if msg == "String is too long."));
    }

    #[test]
    fn end_to_end_create_and_select() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::open(dir.path().join("db")).unwrap();

        let stmt = prepare_statement("create table widgets (id int)").unwrap();
        execute_statement(&mut table, stmt).unwrap();

        let stmt = prepare_statement("select").unwrap();
        let lines = execute_statement(&mut table, stmt).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("widgets"));
    }

    #[test]
    fn end_to_end_duplicate_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::open(dir.path().join("db")).unwrap();

        let stmt = prepare_statement("insert index idx1 users CREATE INDEX idx1 ON users(id)").unwrap();
        execute_statement(&mut table, stmt).unwrap();

        let stmt = prepare_statement("insert index idx1 users CREATE INDEX idx1 ON users(id)").unwrap();
        let err = execute_statement(&mut table, stmt).unwrap_err();
        assert_eq!(err.to_string(), "Error: Duplicate table or index.");
    }
}
