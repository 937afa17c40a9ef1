//! Byte-level node accessors over raw page buffers.
//!
//! Every page starts with a common header:
//! ```text
//! [node_type: u8]      // 0 = internal, 1 = leaf
//! [is_root: u8]
//! [parent: u32]
//! ```
//!
//! Leaf nodes continue with:
//! ```text
//! [num_cells: u32]
//! [next_leaf: u32]     // 0 = rightmost leaf
//! [cell 0: key u32 | row 293 bytes]
//! ...
//! ```
//!
//! Internal nodes continue with:
//! ```text
//! [num_keys: u32]
//! [right_child: u32]
//! [cell 0: child u32 | key u32]
//! ...
//! ```
//!
//! These views never perform I/O. Callers fetch the buffer from the pager
//! first and hold it only for the current operation.

use crate::btree::layout::*;
use crate::error::{Error, Result};
use crate::row::{Row, ROW_SIZE};

/// Node kind stored in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    /// Routing node holding keys and child page numbers.
    Internal = 0,
    /// Node holding rows.
    Leaf = 1,
}

impl NodeType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeType::Internal),
            1 => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Reads the node type tag of a page.
pub fn node_type(page: &[u8]) -> Result<NodeType> {
    let tag = page[NODE_TYPE_OFFSET];
    NodeType::from_u8(tag).ok_or_else(|| Error::corruption(format!("Unknown node type {}", tag)))
}

/// Reads the node type and checks the cell count fits in the page.
///
/// Call this before touching cells of a page read from disk.
pub fn validate(page: &[u8]) -> Result<NodeType> {
    let node_type = node_type(page)?;
    let (count, max) = match node_type {
        NodeType::Leaf => (LeafNode::new(page).num_cells(), LEAF_NODE_MAX_CELLS),
        NodeType::Internal => (InternalNode::new(page).num_keys(), INTERNAL_NODE_MAX_CELLS),
    };
    if count > max {
        return Err(Error::corruption(format!(
            "{:?} node claims {} cells, at most {} fit",
            node_type, count, max
        )));
    }
    Ok(node_type)
}

/// Checks that a pointer stored in page `from` names a page other than the
/// root that exists in a file of `num_pages` pages.
pub fn check_link(from: u32, to: u32, num_pages: u32) -> Result<u32> {
    if to == ROOT_PAGE_NUM || to >= num_pages {
        return Err(Error::corruption(format!(
            "Page {} points at page {} ({} pages in file)",
            from, to, num_pages
        )));
    }
    Ok(to)
}

/// Writes the node type tag of a page.
pub fn set_node_type(page: &mut [u8], node_type: NodeType) {
    page[NODE_TYPE_OFFSET] = node_type as u8;
}

/// Whether the page holds the root node.
pub fn is_root(page: &[u8]) -> bool {
    page[IS_ROOT_OFFSET] != 0
}

/// Sets the is-root flag.
pub fn set_root(page: &mut [u8], is_root: bool) {
    page[IS_ROOT_OFFSET] = is_root as u8;
}

/// Page number of the parent node.
pub fn parent(page: &[u8]) -> u32 {
    read_u32(page, PARENT_POINTER_OFFSET)
}

/// Sets the parent page number.
pub fn set_parent(page: &mut [u8], parent: u32) {
    write_u32(page, PARENT_POINTER_OFFSET, parent);
}

/// A leaf node view over a page buffer.
pub struct LeafNode<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    /// Wraps a page buffer.
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Number of occupied cells.
    pub fn num_cells(&self) -> usize {
        read_u32(self.bytes(), LEAF_NODE_NUM_CELLS_OFFSET) as usize
    }

    /// Page number of the next leaf, or `None` on the rightmost leaf.
    pub fn next_leaf(&self) -> Option<u32> {
        match read_u32(self.bytes(), LEAF_NODE_NEXT_LEAF_OFFSET) {
            NO_PAGE => None,
            page_num => Some(page_num),
        }
    }

    /// Whether this leaf is the root.
    pub fn is_root(&self) -> bool {
        is_root(self.bytes())
    }

    /// Parent page number.
    pub fn parent(&self) -> u32 {
        parent(self.bytes())
    }

    fn cell_offset(cell_num: usize) -> usize {
        LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
    }

    /// Raw bytes of a cell (key followed by row).
    pub fn cell(&self, cell_num: usize) -> &[u8] {
        let offset = Self::cell_offset(cell_num);
        &self.bytes()[offset..offset + LEAF_NODE_CELL_SIZE]
    }

    /// Key stored in a cell.
    pub fn key(&self, cell_num: usize) -> u32 {
        read_u32(self.bytes(), Self::cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET)
    }

    /// Encoded row stored in a cell.
    pub fn value(&self, cell_num: usize) -> &[u8] {
        let offset = Self::cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        &self.bytes()[offset..offset + ROW_SIZE]
    }

    /// Decodes the row stored in a cell.
    pub fn row(&self, cell_num: usize) -> Result<Row> {
        Row::decode(self.value(cell_num))
    }

    /// Largest key in the leaf.
    pub fn max_key(&self) -> Option<u32> {
        self.num_cells().checked_sub(1).map(|last| self.key(last))
    }

    /// Binary search for `key`.
    ///
    /// Returns `Ok(index)` on an exact match, or `Err(index)` with the
    /// position where the key would be inserted.
    pub fn search(&self, key: u32) -> std::result::Result<usize, usize> {
        let mut low = 0;
        let mut high = self.num_cells();

        while low < high {
            let mid = low + (high - low) / 2;
            let key_at_mid = self.key(mid);
            if key == key_at_mid {
                return Ok(mid);
            }
            if key < key_at_mid {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        Err(low)
    }

    /// Keys of all occupied cells in order.
    pub fn keys(&self) -> Vec<u32> {
        (0..self.num_cells()).map(|i| self.key(i)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafNode<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    /// Formats the page as an empty, non-root leaf.
    pub fn initialize(&mut self) {
        let page = self.bytes_mut();
        set_node_type(page, NodeType::Leaf);
        set_root(page, false);
        set_parent(page, NO_PAGE);
        self.set_num_cells(0);
        self.set_next_leaf(None);
    }

    /// Sets the number of occupied cells.
    pub fn set_num_cells(&mut self, num_cells: usize) {
        write_u32(self.bytes_mut(), LEAF_NODE_NUM_CELLS_OFFSET, num_cells as u32);
    }

    /// Sets the next-leaf pointer.
    pub fn set_next_leaf(&mut self, next: Option<u32>) {
        write_u32(self.bytes_mut(), LEAF_NODE_NEXT_LEAF_OFFSET, next.unwrap_or(NO_PAGE));
    }

    /// Sets the is-root flag.
    pub fn set_root(&mut self, value: bool) {
        set_root(self.bytes_mut(), value);
    }

    /// Sets the parent page number.
    pub fn set_parent(&mut self, parent: u32) {
        set_parent(self.bytes_mut(), parent);
    }

    /// Overwrites a cell with raw key and row bytes.
    pub fn set_cell(&mut self, cell_num: usize, cell: &[u8]) {
        let offset = Self::cell_offset(cell_num);
        self.bytes_mut()[offset..offset + LEAF_NODE_CELL_SIZE].copy_from_slice(cell);
    }

    /// Writes a key and encoded row into a cell.
    pub fn write_cell(&mut self, cell_num: usize, key: u32, row: &Row) {
        let offset = Self::cell_offset(cell_num);
        let page = self.bytes_mut();
        write_u32(page, offset + LEAF_NODE_KEY_OFFSET, key);
        let value = offset + LEAF_NODE_VALUE_OFFSET;
        page[value..value + ROW_SIZE].copy_from_slice(&row.encode());
    }

    /// Inserts a cell at `cell_num`, shifting later cells right by one slot.
    ///
    /// The caller must have checked that the leaf has spare capacity.
    pub fn insert_cell(&mut self, cell_num: usize, key: u32, row: &Row) {
        let num_cells = self.num_cells();
        debug_assert!(num_cells < LEAF_NODE_MAX_CELLS);

        if cell_num < num_cells {
            let start = Self::cell_offset(cell_num);
            let end = Self::cell_offset(num_cells);
            self.bytes_mut().copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
        }

        self.write_cell(cell_num, key, row);
        self.set_num_cells(num_cells + 1);
    }
}

/// An internal node view over a page buffer.
pub struct InternalNode<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> InternalNode<B> {
    /// Wraps a page buffer.
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    fn bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    fn cell_offset(cell_num: usize) -> usize {
        INTERNAL_NODE_HEADER_SIZE + cell_num * INTERNAL_NODE_CELL_SIZE
    }

    /// Number of keys (one less than the number of children).
    pub fn num_keys(&self) -> usize {
        read_u32(self.bytes(), INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
    }

    /// Page number of the rightmost child.
    pub fn right_child(&self) -> u32 {
        read_u32(self.bytes(), INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    /// Whether this node is the root.
    pub fn is_root(&self) -> bool {
        is_root(self.bytes())
    }

    /// Parent page number.
    pub fn parent(&self) -> u32 {
        parent(self.bytes())
    }

    /// Child page number at `child_num`; `num_keys` names the right child.
    pub fn child(&self, child_num: usize) -> Result<u32> {
        let num_keys = self.num_keys();
        if child_num > num_keys {
            return Err(Error::corruption(format!(
                "Tried to access child {} of internal node with {} keys",
                child_num, num_keys
            )));
        }
        if child_num == num_keys {
            Ok(self.right_child())
        } else {
            Ok(read_u32(self.bytes(), Self::cell_offset(child_num)))
        }
    }

    /// Key stored in cell `key_num`.
    pub fn key(&self, key_num: usize) -> u32 {
        read_u32(self.bytes(), Self::cell_offset(key_num) + INTERNAL_NODE_CHILD_SIZE)
    }

    /// Index of the child that should contain `key`.
    ///
    /// Picks the smallest stored key >= `key`, so ties route left. Returns
    /// `num_keys` when `key` is greater than every stored key.
    pub fn find_child(&self, key: u32) -> usize {
        let mut low = 0;
        let mut high = self.num_keys();

        while low < high {
            let mid = low + (high - low) / 2;
            if self.key(mid) >= key {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        low
    }

    /// Whether the node has no room for another key.
    pub fn is_full(&self) -> bool {
        self.num_keys() >= INTERNAL_NODE_MAX_CELLS
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalNode<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    /// Formats the page as an empty, non-root internal node.
    pub fn initialize(&mut self) {
        let page = self.bytes_mut();
        set_node_type(page, NodeType::Internal);
        set_root(page, false);
        set_parent(page, NO_PAGE);
        self.set_num_keys(0);
        self.set_right_child(NO_PAGE);
    }

    /// Sets the number of keys.
    pub fn set_num_keys(&mut self, num_keys: usize) {
        write_u32(self.bytes_mut(), INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys as u32);
    }

    /// Sets the rightmost child.
    pub fn set_right_child(&mut self, page_num: u32) {
        write_u32(self.bytes_mut(), INTERNAL_NODE_RIGHT_CHILD_OFFSET, page_num);
    }

    /// Sets the is-root flag.
    pub fn set_root(&mut self, value: bool) {
        set_root(self.bytes_mut(), value);
    }

    /// Sets the parent page number.
    pub fn set_parent(&mut self, parent: u32) {
        set_parent(self.bytes_mut(), parent);
    }

    /// Sets the child page number in cell `cell_num`.
    pub fn set_child(&mut self, cell_num: usize, page_num: u32) {
        write_u32(self.bytes_mut(), Self::cell_offset(cell_num), page_num);
    }

    /// Sets the key in cell `cell_num`.
    pub fn set_key(&mut self, cell_num: usize, key: u32) {
        write_u32(self.bytes_mut(), Self::cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE, key);
    }

    /// Inserts a (child, key) cell at `cell_num`, shifting later cells right.
    pub fn insert_cell(&mut self, cell_num: usize, page_num: u32, key: u32) {
        let num_keys = self.num_keys();
        debug_assert!(num_keys < INTERNAL_NODE_MAX_CELLS);

        if cell_num < num_keys {
            let start = Self::cell_offset(cell_num);
            let end = Self::cell_offset(num_keys);
            self.bytes_mut().copy_within(start..end, start + INTERNAL_NODE_CELL_SIZE);
        }

        self.set_child(cell_num, page_num);
        self.set_key(cell_num, key);
        self.set_num_keys(num_keys + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{}", id), format!("person{}@example.com", id)).unwrap()
    }

    #[test]
    fn test_common_header() {
        let mut buf = page();
        set_node_type(&mut buf, NodeType::Internal);
        set_root(&mut buf, true);
        set_parent(&mut buf, 9);

        assert_eq!(node_type(&buf).unwrap(), NodeType::Internal);
        assert!(is_root(&buf));
        assert_eq!(parent(&buf), 9);

        buf[NODE_TYPE_OFFSET] = 7;
        assert!(matches!(node_type(&buf), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_leaf_initialize() {
        let mut buf = vec![0xFFu8; PAGE_SIZE];
        let mut leaf = LeafNode::new(&mut buf[..]);
        leaf.initialize();

        assert_eq!(leaf.num_cells(), 0);
        assert_eq!(leaf.next_leaf(), None);
        assert!(!leaf.is_root());
        assert_eq!(leaf.max_key(), None);
        assert_eq!(node_type(&buf).unwrap(), NodeType::Leaf);
    }

    #[test]
    fn test_leaf_insert_keeps_order() {
        let mut buf = page();
        let mut leaf = LeafNode::new(&mut buf[..]);
        leaf.initialize();

        for id in [5u32, 1, 3] {
            let index = leaf.search(id).unwrap_err();
            leaf.insert_cell(index, id, &row(id));
        }

        assert_eq!(leaf.keys(), vec![1, 3, 5]);
        assert_eq!(leaf.max_key(), Some(5));
        assert_eq!(leaf.search(3), Ok(1));
        assert_eq!(leaf.search(4), Err(2));
        assert_eq!(leaf.row(2).unwrap(), row(5));
    }

    #[test]
    fn test_leaf_next_leaf() {
        let mut buf = page();
        let mut leaf = LeafNode::new(&mut buf[..]);
        leaf.initialize();
        leaf.set_next_leaf(Some(4));
        assert_eq!(leaf.next_leaf(), Some(4));
        leaf.set_next_leaf(None);
        assert_eq!(leaf.next_leaf(), None);
    }

    #[test]
    fn test_leaf_offsets() {
        let mut buf = page();
        let mut leaf = LeafNode::new(&mut buf[..]);
        leaf.initialize();
        leaf.insert_cell(0, 0x01020304, &row(1));

        assert_eq!(&buf[LEAF_NODE_HEADER_SIZE..LEAF_NODE_HEADER_SIZE + 4], &[4, 3, 2, 1]);
        assert_eq!(buf[LEAF_NODE_NUM_CELLS_OFFSET], 1);
    }

    #[test]
    fn test_internal_find_child() {
        let mut buf = page();
        let mut node = InternalNode::new(&mut buf[..]);
        node.initialize();
        node.insert_cell(0, 2, 10);
        node.insert_cell(1, 3, 20);
        node.set_right_child(4);

        assert_eq!(node.find_child(5), 0);
        assert_eq!(node.find_child(10), 0);
        assert_eq!(node.find_child(11), 1);
        assert_eq!(node.find_child(20), 1);
        assert_eq!(node.find_child(21), 2);

        assert_eq!(node.child(0).unwrap(), 2);
        assert_eq!(node.child(2).unwrap(), 4);
        assert!(node.child(3).is_err());
    }

    #[test]
    fn test_validate_cell_counts() {
        let mut buf = page();
        let mut leaf = LeafNode::new(&mut buf[..]);
        leaf.initialize();
        leaf.set_num_cells(LEAF_NODE_MAX_CELLS);
        assert_eq!(validate(&buf).unwrap(), NodeType::Leaf);

        LeafNode::new(&mut buf[..]).set_num_cells(100);
        assert!(matches!(validate(&buf), Err(Error::Corruption(_))));

        let mut buf = page();
        let mut node = InternalNode::new(&mut buf[..]);
        node.initialize();
        node.set_num_keys(INTERNAL_NODE_MAX_CELLS);
        assert_eq!(validate(&buf).unwrap(), NodeType::Internal);

        InternalNode::new(&mut buf[..]).set_num_keys(INTERNAL_NODE_MAX_CELLS + 1);
        assert!(matches!(validate(&buf), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_check_link() {
        assert_eq!(check_link(0, 2, 3).unwrap(), 2);
        assert!(matches!(check_link(0, ROOT_PAGE_NUM, 3), Err(Error::Corruption(_))));
        assert!(matches!(check_link(0, 3, 3), Err(Error::Corruption(_))));
        assert!(matches!(check_link(1, 9, 3), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_internal_insert_shifts() {
        let mut buf = page();
        let mut node = InternalNode::new(&mut buf[..]);
        node.initialize();
        node.insert_cell(0, 2, 30);
        node.insert_cell(0, 5, 10);

        assert_eq!(node.num_keys(), 2);
        assert_eq!((node.child(0).unwrap(), node.key(0)), (5, 10));
        assert_eq!((node.child(1).unwrap(), node.key(1)), (2, 30));
        assert!(!node.is_full());
    }
}
