//! B+-tree node layout: typed accessors over a fixed `PAGE_SIZE` byte buffer.
//!
//! A node is either a **leaf** (stores rowid/value cells) or an **internal** node (stores
//! child-pointer/key cells plus one rightmost child kept in the header). Both share a six-byte
//! common header: node type, is-root flag, parent pointer.
//!
//! | **Property**            | **Internal Node**                  | **Leaf Node**              |
//! |-------------------------|-------------------------------------|-----------------------------|
//! | Stores                  | keys and pointers to children        | keys and values             |
//! | Number of keys          | up to `INTERNAL_NODE_MAX_CELLS`      | as many as will fit         |
//! | Number of pointers      | number of keys + 1                   | none                        |
use crate::storage::row::ROW_SIZE;
use crate::errors::{err, Error};

pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: usize = 100;

/// Marks an internal node's right-child slot as not-yet-assigned. Chosen so that `0`, a
/// legitimate page number, is never mistaken for "no child".
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Internal,
}

// --- Common header ---
const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_POINTER_SIZE: usize = 4;
const COMMON_NODE_HEADER_SIZE: usize = PARENT_POINTER_OFFSET + PARENT_POINTER_SIZE;

// --- Leaf header ---
const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_HEADER_SIZE: usize = LEAF_NODE_NEXT_LEAF_OFFSET + LEAF_NODE_NEXT_LEAF_SIZE;

// --- Leaf body ---
pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// --- Internal header ---
const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_HEADER_SIZE: usize =
    INTERNAL_NODE_RIGHT_CHILD_OFFSET + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// --- Internal body ---
pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
const INTERNAL_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - INTERNAL_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_MAX_CELLS: usize = INTERNAL_NODE_SPACE_FOR_CELLS / INTERNAL_NODE_CELL_SIZE;

/// An owned page buffer with typed accessors layered over it.
///
/// `Node` owns its bytes rather than borrowing them from the pager, so a mutating operation
/// that needs to read from one node while writing another (a split moving cells between two
/// pages) can hold both at once without fighting the borrow checker; the pager is the only
/// thing that persists a `Node`'s bytes back into its page slot.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: [u8; PAGE_SIZE],
}

impl Node {
    pub fn from_bytes(buf: [u8; PAGE_SIZE]) -> Self {
        Node { data: buf }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    // --- common header ---

    pub fn node_type(&self) -> Result<NodeType, Error> {
        match self.data[NODE_TYPE_OFFSET] {
            0 => Ok(NodeType::Leaf),
            1 => Ok(NodeType::Internal),
            other => Err(err!(Corrupt, "invalid node type byte: {other}")),
        }
    }

    pub fn set_node_type(&mut self, t: NodeType) {
        self.data[NODE_TYPE_OFFSET] = match t {
            NodeType::Leaf => 0,
            NodeType::Internal => 1,
        };
    }

    pub fn is_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET] == 1
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root as u8;
    }

    pub fn parent(&self) -> u32 {
        u32::from_le_bytes(
            self.data[PARENT_POINTER_OFFSET..PARENT_POINTER_OFFSET + PARENT_POINTER_SIZE]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_parent(&mut self, page_num: u32) {
        self.data[PARENT_POINTER_OFFSET..PARENT_POINTER_OFFSET + PARENT_POINTER_SIZE]
            .copy_from_slice(&page_num.to_le_bytes());
    }

    /// For a leaf, its own max key. For an internal node, the max key of its rightmost
    /// subtree requires following `right_child`, so this only returns the node's *local*
    /// notion — callers that need the true subtree max must recurse through the pager.
    pub fn local_max_key(&self) -> Result<u32, Error> {
        match self.node_type()? {
            NodeType::Leaf => {
                let n = self.leaf_num_cells();
                if n == 0 {
                    return Err(err!(Corrupt, "max key of empty leaf"));
                }
                self.leaf_key(n - 1)
            }
            NodeType::Internal => {
                let n = self.internal_num_keys();
                if n == 0 {
                    return Err(err!(Corrupt, "max key of empty internal node"));
                }
                self.internal_key(n - 1)
            }
        }
    }

    // --- leaf header ---

    pub fn initialize_leaf(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_root(false);
        self.set_leaf_num_cells(0);
        self.set_leaf_next_leaf(0);
    }

    pub fn leaf_num_cells(&self) -> usize {
        u32::from_le_bytes(
            self.data[LEAF_NODE_NUM_CELLS_OFFSET..LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE]
                .try_into()
                .unwrap(),
        ) as usize
    }

    pub fn set_leaf_num_cells(&mut self, n: usize) {
        self.data[LEAF_NODE_NUM_CELLS_OFFSET..LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE]
            .copy_from_slice(&(n as u32).to_le_bytes());
    }

    pub fn leaf_next_leaf(&self) -> u32 {
        u32::from_le_bytes(
            self.data[LEAF_NODE_NEXT_LEAF_OFFSET..LEAF_NODE_NEXT_LEAF_OFFSET + LEAF_NODE_NEXT_LEAF_SIZE]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_leaf_next_leaf(&mut self, page_num: u32) {
        self.data[LEAF_NODE_NEXT_LEAF_OFFSET..LEAF_NODE_NEXT_LEAF_OFFSET + LEAF_NODE_NEXT_LEAF_SIZE]
            .copy_from_slice(&page_num.to_le_bytes());
    }

    fn leaf_cell_offset(&self, cell_num: usize) -> Result<usize, Error> {
        if cell_num >= LEAF_NODE_MAX_CELLS {
            return Err(err!(Corrupt, "leaf cell {cell_num} out of bounds"));
        }
        Ok(LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE)
    }

    pub fn leaf_cell(&self, cell_num: usize) -> Result<&[u8], Error> {
        let off = self.leaf_cell_offset(cell_num)?;
        Ok(&self.data[off..off + LEAF_NODE_CELL_SIZE])
    }

    pub fn leaf_cell_mut(&mut self, cell_num: usize) -> Result<&mut [u8], Error> {
        let off = self.leaf_cell_offset(cell_num)?;
        Ok(&mut self.data[off..off + LEAF_NODE_CELL_SIZE])
    }

    pub fn leaf_key(&self, cell_num: usize) -> Result<u32, Error> {
        let cell = self.leaf_cell(cell_num)?;
        Ok(u32::from_le_bytes(cell[..LEAF_NODE_KEY_SIZE].try_into().unwrap()))
    }

    pub fn set_leaf_key(&mut self, cell_num: usize, key: u32) -> Result<(), Error> {
        let cell = self.leaf_cell_mut(cell_num)?;
        cell[..LEAF_NODE_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    pub fn leaf_value(&self, cell_num: usize) -> Result<&[u8], Error> {
        let cell = self.leaf_cell(cell_num)?;
        Ok(&cell[LEAF_NODE_KEY_SIZE..])
    }

    pub fn set_leaf_value(&mut self, cell_num: usize, value: &[u8]) -> Result<(), Error> {
        if value.len() != LEAF_NODE_VALUE_SIZE {
            return Err(err!(
                Corrupt,
                "value size mismatch: expected {LEAF_NODE_VALUE_SIZE}, got {}",
                value.len()
            ));
        }
        let cell = self.leaf_cell_mut(cell_num)?;
        cell[LEAF_NODE_KEY_SIZE..].copy_from_slice(value);
        Ok(())
    }

    // --- internal header ---

    pub fn initialize_internal(&mut self) {
        self.set_node_type(NodeType::Internal);
        self.set_root(false);
        self.set_internal_num_keys(0);
        // The root page is page 0; leaving right_child defaulted to 0 would make an empty
        // internal node look like a parent of the root. INVALID_PAGE_NUM avoids that.
        self.set_internal_right_child(INVALID_PAGE_NUM);
    }

    pub fn internal_num_keys(&self) -> usize {
        u32::from_le_bytes(
            self.data[INTERNAL_NODE_NUM_KEYS_OFFSET..INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE]
                .try_into()
                .unwrap(),
        ) as usize
    }

    pub fn set_internal_num_keys(&mut self, n: usize) {
        self.data[INTERNAL_NODE_NUM_KEYS_OFFSET..INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE]
            .copy_from_slice(&(n as u32).to_le_bytes());
    }

    pub fn internal_right_child(&self) -> u32 {
        u32::from_le_bytes(
            self.data[INTERNAL_NODE_RIGHT_CHILD_OFFSET
                ..INTERNAL_NODE_RIGHT_CHILD_OFFSET + INTERNAL_NODE_RIGHT_CHILD_SIZE]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_internal_right_child(&mut self, page_num: u32) {
        self.data[INTERNAL_NODE_RIGHT_CHILD_OFFSET
            ..INTERNAL_NODE_RIGHT_CHILD_OFFSET + INTERNAL_NODE_RIGHT_CHILD_SIZE]
            .copy_from_slice(&page_num.to_le_bytes());
    }

    fn internal_cell_offset(&self, cell_num: usize) -> Result<usize, Error> {
        if cell_num >= INTERNAL_NODE_MAX_CELLS {
            return Err(err!(Corrupt, "internal cell {cell_num} out of bounds"));
        }
        Ok(INTERNAL_NODE_HEADER_SIZE + cell_num * INTERNAL_NODE_CELL_SIZE)
    }

    pub fn internal_cell(&self, cell_num: usize) -> Result<&[u8], Error> {
        let off = self.internal_cell_offset(cell_num)?;
        Ok(&self.data[off..off + INTERNAL_NODE_CELL_SIZE])
    }

    pub fn internal_cell_mut(&mut self, cell_num: usize) -> Result<&mut [u8], Error> {
        let off = self.internal_cell_offset(cell_num)?;
        Ok(&mut self.data[off..off + INTERNAL_NODE_CELL_SIZE])
    }

    /// Child at `child_num`; the rightmost child (`child_num == num_keys`) lives in the header.
    pub fn internal_child(&self, child_num: usize) -> Result<u32, Error> {
        let num_keys = self.internal_num_keys();
        if child_num > num_keys {
            return Err(err!(Corrupt, "child {child_num} exceeds num_keys {num_keys}"));
        }
        if child_num == num_keys {
            Ok(self.internal_right_child())
        } else {
            let cell = self.internal_cell(child_num)?;
            Ok(u32::from_le_bytes(cell[..INTERNAL_NODE_CHILD_SIZE].try_into().unwrap()))
        }
    }

    pub fn set_internal_child(&mut self, child_num: usize, page_num: u32) -> Result<(), Error> {
        let num_keys = self.internal_num_keys();
        if child_num == num_keys {
            self.set_internal_right_child(page_num);
            return Ok(());
        }
        let cell = self.internal_cell_mut(child_num)?;
        cell[..INTERNAL_NODE_CHILD_SIZE].copy_from_slice(&page_num.to_le_bytes());
        Ok(())
    }

    pub fn internal_key(&self, key_num: usize) -> Result<u32, Error> {
        let cell = self.internal_cell(key_num)?;
        Ok(u32::from_le_bytes(
            cell[INTERNAL_NODE_CHILD_SIZE..INTERNAL_NODE_CELL_SIZE].try_into().unwrap(),
        ))
    }

    pub fn set_internal_key(&mut self, key_num: usize, key: u32) -> Result<(), Error> {
        let cell = self.internal_cell_mut(key_num)?;
        cell[INTERNAL_NODE_CHILD_SIZE..INTERNAL_NODE_CELL_SIZE].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// First child index whose subtree may contain `key` (the usual "first key >= target"
    /// binary search over the separator keys).
    pub fn internal_find_child_index(&self, key: u32) -> Result<usize, Error> {
        let num_keys = self.internal_num_keys();
        let mut lo = 0usize;
        let mut hi = num_keys;
        while lo != hi {
            let mid = (lo + hi) / 2;
            let key_at_mid = self.internal_key(mid)?;
            if key_at_mid >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// Number of cells assigned to the left/right halves of a full leaf split.
    pub fn leaf_split_counts() -> (usize, usize) {
        (LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_RIGHT_SPLIT_COUNT)
    }
}
