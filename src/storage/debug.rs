//! Debug printers backing the `.btree`, `.constants`, and `.printstats` meta-commands.
use std::fmt::Write as _;

use super::btree::{
    NodeType, INTERNAL_NODE_CELL_SIZE, INTERNAL_NODE_MAX_CELLS, LEAF_NODE_CELL_SIZE,
    LEAF_NODE_HEADER_SIZE, LEAF_NODE_KEY_SIZE, LEAF_NODE_MAX_CELLS, LEAF_NODE_VALUE_SIZE,
};
use super::table::Table;
use crate::errors::Error;

/// Pre-order dump of the tree rooted at `page_num`, indented by depth.
pub fn print_tree(table: &mut Table, page_num: u32, indent: usize) -> Result<String, Error> {
    let mut out = String::new();
    print_tree_into(table, page_num, indent, &mut out)?;
    Ok(out)
}

fn print_tree_into(table: &mut Table, page_num: u32, indent: usize, out: &mut String) -> Result<(), Error> {
    let pad = "  ".repeat(indent);
    let node = table.pager.get_page(page_num)?.clone();
    match node.node_type()? {
        NodeType::Leaf => {
            let num_cells = node.leaf_num_cells();
            let _ = writeln!(out, "{pad}- leaf (size {num_cells})");
            for i in 0..num_cells {
                let _ = writeln!(out, "{pad}  - {}", node.leaf_key(i)?);
            }
        }
        NodeType::Internal => {
            let num_keys = node.internal_num_keys();
            let _ = writeln!(out, "{pad}- internal (size {num_keys})");
            for i in 0..num_keys {
                let child = node.internal_child(i)?;
                print_tree_into(table, child, indent + 1, out)?;
                let _ = writeln!(out, "{pad}- key {}", node.internal_key(i)?);
            }
            let right_child = node.internal_right_child();
            print_tree_into(table, right_child, indent + 1, out)?;
        }
    }
    Ok(())
}

/// Dumps the compile-time layout constants, in the order db_tutorial's own `.constants`
/// command does.
pub fn print_constants() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ROW_SIZE: {}", LEAF_NODE_VALUE_SIZE);
    let _ = writeln!(out, "COMMON_NODE_HEADER_SIZE: 6");
    let _ = writeln!(out, "LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}");
    let _ = writeln!(out, "LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}");
    let _ = writeln!(out, "LEAF_NODE_KEY_SIZE: {LEAF_NODE_KEY_SIZE}");
    let _ = writeln!(out, "LEAF_NODE_VALUE_SIZE: {LEAF_NODE_VALUE_SIZE}");
    let _ = writeln!(out, "LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}");
    let _ = writeln!(out, "INTERNAL_NODE_CELL_SIZE: {INTERNAL_NODE_CELL_SIZE}");
    let _ = writeln!(out, "INTERNAL_NODE_MAX_CELLS: {INTERNAL_NODE_MAX_CELLS}");
    out
}

/// Counts leaf/internal pages reachable from `page_num` and the tree's max depth.
pub struct TreeStats {
    pub leaf_pages: usize,
    pub internal_pages: usize,
    pub max_depth: usize,
}

pub fn print_stats(table: &mut Table, page_num: u32) -> Result<TreeStats, Error> {
    let mut stats = TreeStats {
        leaf_pages: 0,
        internal_pages: 0,
        max_depth: 0,
    };
    walk_stats(table, page_num, 1, &mut stats)?;
    Ok(stats)
}

fn walk_stats(table: &mut Table, page_num: u32, depth: usize, stats: &mut TreeStats) -> Result<(), Error> {
    stats.max_depth = stats.max_depth.max(depth);
    let node = table.pager.get_page(page_num)?.clone();
    match node.node_type()? {
        NodeType::Leaf => {
            stats.leaf_pages += 1;
        }
        NodeType::Internal => {
            stats.internal_pages += 1;
            for i in 0..node.internal_num_keys() {
                walk_stats(table, node.internal_child(i)?, depth + 1, stats)?;
            }
            walk_stats(table, node.internal_right_child(), depth + 1, stats)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::row::SchemaRow;
    use crate::storage::table::insert_schema_row;

    #[test]
    fn stats_count_a_single_leaf_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::open(dir.path().join("db")).unwrap();
        insert_schema_row(&mut table, SchemaRow::new("table", "t", "t", "CREATE TABLE t")).unwrap();
        let stats = print_stats(&mut table, 0).unwrap();
        assert_eq!(stats.leaf_pages, 1);
        assert_eq!(stats.internal_pages, 0);
        assert_eq!(stats.max_depth, 1);
    }

    #[test]
    fn tree_dump_lists_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::open(dir.path().join("db")).unwrap();
        for i in 0..3 {
            insert_schema_row(
                &mut table,
                SchemaRow::new("table", format!("t{i}"), format!("t{i}"), "CREATE TABLE"),
            )
            .unwrap();
        }
        let dump = print_tree(&mut table, 0, 0).unwrap();
        assert!(dump.contains("- 0"));
        assert!(dump.contains("- 1"));
        assert!(dump.contains("- 2"));
    }
}
