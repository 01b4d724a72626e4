//! B+-tree mutating operations (leaf insert/split, internal node insert/split, root split)
//! and the `Table` handle that ties a pager to the schema tree's root page.
use std::path::Path;

use tracing::{debug, warn};

use super::btree::{Node, NodeType, INTERNAL_NODE_MAX_CELLS, INVALID_PAGE_NUM, TABLE_MAX_PAGES};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::{self, SchemaRow, ROW_SIZE};
use crate::errors::{err, Error};

/// A table backed by a single B+-tree. This engine only ever manages one such tree - the
/// schema catalog rooted at page 0 - but the operations below are written generically over
/// any root page, since the schema tree's own rows each name the root page of another tree
/// a port could grow into a full multi-table catalog.
pub struct Table {
    pub pager: Pager,
    pub root_page_num: u32,
    /// Next rowid to assign. Replaces the unseeded-PRNG-with-retry scheme: deterministic,
    /// and collision-free by construction because it is always one past the highest rowid
    /// already on disk.
    next_rowid: u32,
}

impl Table {
    /// Opens (creating if absent) the database file at `path` and its schema tree at page 0.
    pub fn open(path: impl AsRef<Path>) -> Result<Table, Error> {
        let mut pager = Pager::open(path)?;
        let fresh = pager.num_pages == 0;
        if fresh {
            let root = pager.get_page_mut(0)?;
            root.initialize_leaf();
            root.set_root(true);
        }
        let mut table = Table {
            pager,
            root_page_num: 0,
            next_rowid: 0,
        };
        if !fresh {
            let existing = select_rows(&mut table)?;
            table.next_rowid = existing.iter().map(|r| r.rowid).max().map(|m| m + 1).unwrap_or(0);
        }
        Ok(table)
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()
    }
}

fn check_capacity(new_page_num: u32) -> Result<(), Error> {
    if new_page_num as usize >= TABLE_MAX_PAGES {
        return Err(err!(Execute, "Error: Table full."));
    }
    Ok(())
}

/// True subtree max key: for a leaf this is its own last key; for an internal node it
/// requires following `right_child` since the node's own stored keys only bound its
/// non-rightmost children.
fn node_max_key(table: &mut Table, page_num: u32) -> Result<u32, Error> {
    let node = table.pager.get_page(page_num)?;
    match node.node_type()? {
        NodeType::Leaf => node.local_max_key(),
        NodeType::Internal => {
            let right_child = node.internal_right_child();
            node_max_key(table, right_child)
        }
    }
}

/// Replaces `old_key` with `new_key` among `node`'s stored separator keys. A no-op if
/// `old_key` isn't found, which happens when the child whose max key changed was the
/// rightmost child - its key is never stored locally, only propagated by `node_max_key`.
fn update_separator_key(node: &mut Node, old_key: u32, new_key: u32) -> Result<(), Error> {
    for i in 0..node.internal_num_keys() {
        if node.internal_key(i)? == old_key {
            node.set_internal_key(i, new_key)?;
            break;
        }
    }
    Ok(())
}

/// Inserts a schema row into the catalog tree (page 0), assigning its rowid and, for a
/// freshly-defined object, its own empty root page.
pub fn insert_schema_row(table: &mut Table, mut new_row: SchemaRow) -> Result<(), Error> {
    if select_rows(table)?
        .iter()
        .any(|r| r.kind == new_row.kind && r.name == new_row.name)
    {
        return Err(err!(Execute, "Error: Duplicate table or index."));
    }

    new_row.rowid = table.next_rowid;
    if new_row.root_page == 0 {
        let page_num = table.pager.get_unused_page_num();
        check_capacity(page_num)?;
        let node = table.pager.get_page_mut(page_num)?;
        node.initialize_leaf();
        new_row.root_page = page_num;
    }

    let mut value = vec![0u8; ROW_SIZE];
    row::serialize(&new_row, &mut value)?;

    debug!(rowid = new_row.rowid, name = %new_row.name, "inserting schema row");
    let (page_num, cell_num) = {
        let cursor = Cursor::table_find(table, new_row.rowid)?;
        (cursor.page_num, cursor.cell_num)
    };
    leaf_insert(table, page_num, cell_num, new_row.rowid, &value)?;
    table.next_rowid += 1;
    Ok(())
}

/// Inserts `key`/`value` at `cell_num` of the leaf at `page_num`, splitting first if full.
fn leaf_insert(
    table: &mut Table,
    page_num: u32,
    cell_num: usize,
    key: u32,
    value: &[u8],
) -> Result<(), Error> {
    let num_cells = table.pager.get_page(page_num)?.leaf_num_cells();

    if num_cells >= super::btree::LEAF_NODE_MAX_CELLS {
        warn!(page_num, num_cells, "leaf full, splitting");
        return leaf_split_and_insert(table, page_num, cell_num, key, value);
    }

    let node = table.pager.get_page_mut(page_num)?;
    for i in (cell_num + 1..=num_cells).rev() {
        let prev = node.leaf_cell(i - 1)?.to_vec();
        node.leaf_cell_mut(i)?.copy_from_slice(&prev);
    }
    node.set_leaf_num_cells(num_cells + 1);
    node.set_leaf_key(cell_num, key)?;
    node.set_leaf_value(cell_num, value)?;
    Ok(())
}

/// Splits a full leaf, redistributing its cells plus the pending insert between the old
/// leaf and a freshly allocated sibling, then propagates the split into the parent (or
/// creates a new root, if the old leaf was the root).
fn leaf_split_and_insert(
    table: &mut Table,
    old_page_num: u32,
    cell_num: usize,
    key: u32,
    value: &[u8],
) -> Result<(), Error> {
    let new_page_num = table.pager.get_unused_page_num();
    check_capacity(new_page_num)?;
    {
        let new_node = table.pager.get_page_mut(new_page_num)?;
        new_node.initialize_leaf();
    }

    let old_snapshot = table.pager.get_page(old_page_num)?.clone();
    let old_parent = old_snapshot.parent();
    let is_root = old_snapshot.is_root();

    {
        let new_node = table.pager.get_page_mut(new_page_num)?;
        new_node.set_parent(old_parent);
        new_node.set_leaf_next_leaf(old_snapshot.leaf_next_leaf());
    }

    let (left_count, right_count) = Node::leaf_split_counts();
    let max_cells = super::btree::LEAF_NODE_MAX_CELLS;

    // Starting from the right, distribute every existing cell plus the pending one between
    // the two leaves. This mirrors the classic redistribution loop: destination is decided
    // by whether `i` lands in the upper or lower half, position within the destination by
    // `i % left_count`.
    for i in (0..=max_cells).rev() {
        let dest_page = if i >= left_count { new_page_num } else { old_page_num };
        let dest_cell = i % left_count;

        if i == cell_num {
            let node = table.pager.get_page_mut(dest_page)?;
            node.set_leaf_key(dest_cell, key)?;
            node.set_leaf_value(dest_cell, value)?;
        } else {
            let src_cell = if i > cell_num { i - 1 } else { i };
            let src_bytes = old_snapshot.leaf_cell(src_cell)?.to_vec();
            let node = table.pager.get_page_mut(dest_page)?;
            node.leaf_cell_mut(dest_cell)?.copy_from_slice(&src_bytes);
        }
    }

    {
        let old_node = table.pager.get_page_mut(old_page_num)?;
        old_node.set_leaf_num_cells(left_count);
        old_node.set_leaf_next_leaf(new_page_num);
    }
    {
        let new_node = table.pager.get_page_mut(new_page_num)?;
        new_node.set_leaf_num_cells(right_count);
    }

    if is_root {
        debug!(old_page_num, new_page_num, "leaf split at root, creating new root");
        create_new_root(table, new_page_num)
    } else {
        let old_max_before = old_snapshot.local_max_key()?;
        let new_max_after = table.pager.get_page(old_page_num)?.local_max_key()?;
        {
            let parent = table.pager.get_page_mut(old_parent)?;
            update_separator_key(parent, old_max_before, new_max_after)?;
        }
        internal_insert(table, old_parent, new_page_num)
    }
}

/// Adds `child_page_num` as a child of `parent_page_num`, splitting the parent first if it
/// is already full.
fn internal_insert(table: &mut Table, parent_page_num: u32, child_page_num: u32) -> Result<(), Error> {
    let child_max = node_max_key(table, child_page_num)?;
    let num_keys = table.pager.get_page(parent_page_num)?.internal_num_keys();

    if num_keys >= INTERNAL_NODE_MAX_CELLS {
        return internal_split_and_insert(table, parent_page_num, child_page_num);
    }

    let right_child_page_num = table.pager.get_page(parent_page_num)?.internal_right_child();

    let destination = if right_child_page_num == INVALID_PAGE_NUM {
        // An empty internal node (only happens transiently while building a fresh parent).
        let parent = table.pager.get_page_mut(parent_page_num)?;
        parent.set_internal_right_child(child_page_num);
        parent_page_num
    } else {
        let right_child_max = node_max_key(table, right_child_page_num)?;
        let index = table.pager.get_page(parent_page_num)?.internal_find_child_index(child_max)?;

        let parent = table.pager.get_page_mut(parent_page_num)?;
        let original_num_keys = parent.internal_num_keys();
        parent.set_internal_num_keys(original_num_keys + 1);

        if child_max > right_child_max {
            parent.set_internal_child(original_num_keys, right_child_page_num)?;
            parent.set_internal_key(original_num_keys, right_child_max)?;
            parent.set_internal_right_child(child_page_num);
        } else {
            for i in (index + 1..=original_num_keys).rev() {
                let src = parent.internal_cell(i - 1)?.to_vec();
                parent.internal_cell_mut(i)?.copy_from_slice(&src);
            }
            parent.set_internal_child(index, child_page_num)?;
            parent.set_internal_key(index, child_max)?;
        }
        parent_page_num
    };

    let child = table.pager.get_page_mut(child_page_num)?;
    child.set_parent(destination);
    Ok(())
}

/// Splits a full internal node, moving the upper half of its children to a new sibling,
/// inserting the pending child into whichever half its max key belongs in, and linking the
/// sibling into the grandparent (recursing further up, or creating a new root, as needed).
fn internal_split_and_insert(
    table: &mut Table,
    old_page_num: u32,
    child_page_num: u32,
) -> Result<(), Error> {
    let child_max = node_max_key(table, child_page_num)?;
    let old_snapshot = table.pager.get_page(old_page_num)?.clone();
    let splitting_root = old_snapshot.is_root();
    let old_parent = old_snapshot.parent();
    let old_num_keys = old_snapshot.internal_num_keys();
    let old_right_child = old_snapshot.internal_right_child();
    let old_max_before = node_max_key(table, old_page_num)?;

    let new_page_num = table.pager.get_unused_page_num();
    check_capacity(new_page_num)?;
    {
        let new_node = table.pager.get_page_mut(new_page_num)?;
        new_node.initialize_internal();
    }

    let total_children = old_num_keys + 1;
    let left_children = (total_children + 1) / 2;

    let snap_child = |c: usize| -> Result<u32, Error> {
        if c == old_num_keys {
            Ok(old_right_child)
        } else {
            old_snapshot.internal_child(c)
        }
    };

    for c in 0..left_children {
        if c == left_children - 1 {
            let child = snap_child(c)?;
            let old_node = table.pager.get_page_mut(old_page_num)?;
            old_node.set_internal_right_child(child);
        } else {
            let child = snap_child(c)?;
            let key = old_snapshot.internal_key(c)?;
            let old_node = table.pager.get_page_mut(old_page_num)?;
            old_node.set_internal_child(c, child)?;
            old_node.set_internal_key(c, key)?;
        }
    }
    {
        let old_node = table.pager.get_page_mut(old_page_num)?;
        old_node.set_internal_num_keys(left_children - 1);
    }

    for c in left_children..total_children {
        let new_idx = c - left_children;
        let child = snap_child(c)?;
        if c == total_children - 1 {
            let new_node = table.pager.get_page_mut(new_page_num)?;
            new_node.set_internal_right_child(child);
        } else {
            let key = old_snapshot.internal_key(c)?;
            let new_node = table.pager.get_page_mut(new_page_num)?;
            new_node.set_internal_child(new_idx, child)?;
            new_node.set_internal_key(new_idx, key)?;
        }
        let moved = table.pager.get_page_mut(child)?;
        moved.set_parent(new_page_num);
    }
    {
        let new_node = table.pager.get_page_mut(new_page_num)?;
        new_node.set_internal_num_keys(total_children - left_children - 1);
        new_node.set_parent(old_parent);
    }

    let old_max_after = node_max_key(table, old_page_num)?;
    let destination = if child_max < old_max_after { old_page_num } else { new_page_num };
    internal_insert(table, destination, child_page_num)?;

    if splitting_root {
        debug!(old_page_num, new_page_num, "internal split at root, creating new root");
        create_new_root(table, new_page_num)
    } else {
        let parent = table.pager.get_page_mut(old_parent)?;
        update_separator_key(parent, old_max_before, old_max_after)?;
        internal_insert(table, old_parent, new_page_num)
    }
}

/// Grows the tree by one level: the current root's contents move to a fresh left-child
/// page, and the root page is re-initialized as a one-key internal node pointing at that
/// left child and at `right_child_page_num`.
fn create_new_root(table: &mut Table, right_child_page_num: u32) -> Result<(), Error> {
    let root_page_num = table.root_page_num;
    let left_child_page_num = table.pager.get_unused_page_num();
    check_capacity(left_child_page_num)?;

    let root_snapshot = table.pager.get_page(root_page_num)?.clone();
    {
        let left_child = table.pager.get_page_mut(left_child_page_num)?;
        left_child.data = root_snapshot.data;
        left_child.set_root(false);
    }
    let left_max = node_max_key(table, left_child_page_num)?;

    {
        let root = table.pager.get_page_mut(root_page_num)?;
        root.initialize_internal();
        root.set_root(true);
        root.set_internal_num_keys(1);
        root.set_internal_child(0, left_child_page_num)?;
        root.set_internal_key(0, left_max)?;
        root.set_internal_right_child(right_child_page_num);
    }
    {
        let left = table.pager.get_page_mut(left_child_page_num)?;
        left.set_parent(root_page_num);
    }
    {
        let right = table.pager.get_page_mut(right_child_page_num)?;
        right.set_parent(root_page_num);
    }
    Ok(())
}

/// Scans the whole tree in ascending rowid order.
pub fn select_rows(table: &mut Table) -> Result<Vec<SchemaRow>, Error> {
    let mut rows = Vec::new();
    let mut cursor = Cursor::table_start(table)?;
    while !cursor.end_of_table {
        let bytes = cursor.value()?;
        rows.push(row::deserialize(&bytes)?);
        cursor.advance()?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Table) {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::open(dir.path().join("db")).unwrap();
        (dir, table)
    }

    #[test]
    fn insert_then_select_round_trips() {
        let (_dir, mut table) = open_temp();
        insert_schema_row(&mut table, SchemaRow::new("table", "users", "users", "CREATE TABLE users (id int)")).unwrap();
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "users");
        assert_eq!(rows[0].rowid, 0);
    }

    #[test]
    fn rejects_duplicate_name_and_kind() {
        let (_dir, mut table) = open_temp();
        insert_schema_row(&mut table, SchemaRow::new("index", "idx1", "users", "CREATE INDEX idx1 ON users(id)")).unwrap();
        let err = insert_schema_row(
            &mut table,
            SchemaRow::new("index", "idx1", "users", "CREATE INDEX idx1 ON users(id)"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Execute(_)));
    }

    #[test]
    fn persists_across_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let mut table = Table::open(&path).unwrap();
            for i in 0..3 {
                insert_schema_row(
                    &mut table,
                    SchemaRow::new("table", format!("t{i}"), format!("t{i}"), "CREATE TABLE"),
                )
                .unwrap();
            }
            table.close().unwrap();
        }
        let mut table = Table::open(&path).unwrap();
        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.rowid).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn filling_a_leaf_triggers_a_split() {
        let (_dir, mut table) = open_temp();
        let n = super::super::btree::LEAF_NODE_MAX_CELLS + 1;
        for i in 0..n {
            insert_schema_row(
                &mut table,
                SchemaRow::new("table", format!("t{i}"), format!("t{i}"), "CREATE TABLE"),
            )
            .unwrap();
        }
        let root = table.pager.get_page(0).unwrap();
        assert_eq!(root.node_type().unwrap(), NodeType::Internal);

        let rows = select_rows(&mut table).unwrap();
        assert_eq!(rows.len(), n);
        let rowids: Vec<u32> = rows.iter().map(|r| r.rowid).collect();
        let mut sorted = rowids.clone();
        sorted.sort_unstable();
        assert_eq!(rowids, sorted, "select must visit rows in ascending order across leaves");
    }
}
