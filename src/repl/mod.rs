//! A plain line-oriented REPL: read a line, dispatch it as a meta-command or a statement,
//! print the result, repeat. No raw terminal mode, no line editing - one line in, one
//! response out.
use std::io::{self, Write};

use tracing::info;

use crate::command;
use crate::errors::Error;
use crate::storage::{debug, Table};

const PROMPT: &str = "cqlite > ";

const HELP: &str = r#"Meta-commands:
  .exit          Close the database and quit.
  .btree         Print the schema tree's layout.
  .constants     Print the storage layer's compile-time size constants.
  .printstats    Print leaf/internal page counts and tree depth.
  .help          Show this text.

Statements:
  select
  create table <name> (...)
  create index <name> on <table> (...)
  insert <type> <name> <tbl_name> <sql...>
"#;

/// Runs the REPL against `table` until `.exit` or end-of-input. Returns `Err` only for a
/// fatal (`Io`/`Corrupt`) error; anything user-recoverable is printed and the loop continues.
pub fn run(table: &mut Table) -> Result<(), Error> {
    println!("cqlite - a small B+-tree backed database. Enter \".help\" for usage hints.");

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        line.clear();
        let bytes_read = stdin.read_line(&mut line)?;
        if bytes_read == 0 {
            println!();
            break;
        }
        let input = line.trim_end_matches(['\n', '\r']);
        if input.is_empty() {
            continue;
        }

        if let Some(meta) = input.strip_prefix('.') {
            if meta == "exit" {
                break;
            }
            if let Err(e) = run_meta_command(table, meta) {
                if e.is_fatal() {
                    return Err(e);
                }
                println!("{e}");
            }
            continue;
        }

        match command::prepare_statement(input) {
            Ok(statement) => match command::execute_statement(table, statement) {
                Ok(lines) => {
                    for l in lines {
                        println!("{l}");
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    println!("{e}");
                }
            },
            Err(e) => println!("{e}"),
        }
    }

    info!("closing database");
    table.close()
}

fn run_meta_command(table: &mut Table, meta: &str) -> Result<(), Error> {
    match meta {
        "btree" => {
            print!("{}", debug::print_tree(table, table.root_page_num, 0)?);
        }
        "constants" => {
            print!("{}", debug::print_constants());
        }
        "printstats" => {
            let stats = debug::print_stats(table, table.root_page_num)?;
            println!("leaf pages: {}", stats.leaf_pages);
            println!("internal pages: {}", stats.internal_pages);
            println!("max depth: {}", stats.max_depth);
        }
        "help" => print!("{HELP}"),
        other => println!("Unrecognized command '.{other}'"),
    }
    Ok(())
}
