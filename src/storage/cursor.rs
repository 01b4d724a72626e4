//! A positioned handle over a table's B+-tree: current page, current cell, and whether the
//! cursor has run off the end.
use super::btree::NodeType;
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    pub table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: usize,
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions at the leftmost leaf of the tree (descending through `child(0)` at every
    /// internal node along the way).
    pub fn table_start(table: &'a mut Table) -> Result<Self, Error> {
        let root_page_num = table.root_page_num;
        let page_num = leftmost_leaf(table, root_page_num)?;
        let num_cells = table.pager.get_page(page_num)?.leaf_num_cells();
        Ok(Cursor {
            table,
            page_num,
            cell_num: 0,
            end_of_table: num_cells == 0,
        })
    }

    /// Positions at the leaf cell where `key` exists, or where it should be inserted.
    pub fn table_find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let root_page_num = table.root_page_num;
        let (page_num, cell_num) = find_in_subtree(table, root_page_num, key)?;
        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// Copies the value bytes at the cursor's current position.
    pub fn value(&mut self) -> Result<Vec<u8>, Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        Ok(node.leaf_value(self.cell_num)?.to_vec())
    }

    /// Moves to the next cell, following the leaf's `next_leaf` pointer once the current
    /// page is exhausted. Setting `end_of_table` only when `next_leaf` is `0` is what makes
    /// `select` visit every leaf instead of stopping at the first one.
    pub fn advance(&mut self) -> Result<(), Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        self.cell_num += 1;
        if self.cell_num >= node.leaf_num_cells() {
            let next_leaf = node.leaf_next_leaf();
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

fn leftmost_leaf(table: &mut Table, mut page_num: u32) -> Result<u32, Error> {
    loop {
        let node = table.pager.get_page(page_num)?;
        match node.node_type()? {
            NodeType::Leaf => return Ok(page_num),
            NodeType::Internal => {
                page_num = node.internal_child(0)?;
            }
        }
    }
}

/// Recursive descent: at a leaf, binary search for `key`'s cell index (or insertion point);
/// at an internal node, follow the first child whose subtree could contain `key`.
fn find_in_subtree(table: &mut Table, page_num: u32, key: u32) -> Result<(u32, usize), Error> {
    let node = table.pager.get_page(page_num)?;
    match node.node_type()? {
        NodeType::Leaf => {
            let num_cells = node.leaf_num_cells();
            let mut lo = 0usize;
            let mut hi = num_cells;
            while lo != hi {
                let mid = (lo + hi) / 2;
                let key_at_mid = node.leaf_key(mid)?;
                if key == key_at_mid {
                    return Ok((page_num, mid));
                }
                if key < key_at_mid {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            Ok((page_num, lo))
        }
        NodeType::Internal => {
            let child_index = node.internal_find_child_index(key)?;
            let child_page_num = node.internal_child(child_index)?;
            find_in_subtree(table, child_page_num, key)
        }
    }
}
