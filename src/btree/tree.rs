//! B+tree search, insertion and traversal.
//!
//! The root always lives on page 0. When the root leaf splits, its contents
//! move to a fresh left child and page 0 is reformatted as an internal node,
//! so nothing outside the tree ever needs to learn a new root page number.
//!
//! Internal nodes never split, so the tree is at most two levels deep and
//! only a leaf root is ever moved down. A leaf split whose parent has no room
//! for another key is rejected with [`Error::InternalSplitNotImplemented`]
//! before any page is modified.
//!
//! Pages read from disk are checked before use: cell counts must fit the
//! page and child pointers must name existing non-root pages. Violations come
//! back as [`Error::Corruption`].

use crate::btree::cursor::{Cursor, Scan};
use crate::btree::layout::{
    LEAF_NODE_CELL_SIZE, LEAF_NODE_KEY_OFFSET, LEAF_NODE_KEY_SIZE, LEAF_NODE_LEFT_SPLIT_COUNT,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT, LEAF_NODE_VALUE_OFFSET, NO_PAGE,
    ROOT_PAGE_NUM,
};
use crate::btree::node::{self, InternalNode, LeafNode, NodeType};
use crate::error::{Error, Result};
use crate::pager::{Page, Pager};
use crate::row::Row;

/// A B+tree rooted at page 0 of a pager.
pub struct BTree<'a> {
    pager: &'a mut Pager,
}

impl<'a> BTree<'a> {
    /// Creates a tree handle over `pager`.
    pub fn new(pager: &'a mut Pager) -> Self {
        Self { pager }
    }

    /// Formats page 0 as an empty root leaf.
    pub fn initialize_root(&mut self) -> Result<()> {
        let page = self.pager.get_page(ROOT_PAGE_NUM)?;
        let mut root = LeafNode::new(&mut page[..]);
        root.initialize();
        root.set_root(true);
        Ok(())
    }

    /// Walks from the root to the leaf that should hold `key`, or to the
    /// leftmost leaf when `key` is `None`.
    fn leaf_page_num(&mut self, key: Option<u32>) -> Result<u32> {
        let num_pages = self.pager.num_pages();
        let mut page_num = ROOT_PAGE_NUM;

        // Every step lands on a different page unless the pointers form a cycle.
        for _ in 0..num_pages {
            let page = self.pager.get_page(page_num)?;
            if node::validate(&page[..])? == NodeType::Leaf {
                return Ok(page_num);
            }
            let internal = InternalNode::new(&page[..]);
            let index = key.map_or(0, |key| internal.find_child(key));
            page_num = node::check_link(page_num, internal.child(index)?, num_pages)?;
        }

        Err(Error::corruption(format!("No leaf reached within {} pages", num_pages)))
    }

    /// Finds the position of `key`.
    ///
    /// The cursor points at the matching cell when the key exists, otherwise
    /// at the cell where it would be inserted.
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let page_num = self.leaf_page_num(Some(key))?;
        let page = self.pager.get_page(page_num)?;
        let leaf = LeafNode::new(&page[..]);

        let (cell_num, found) = match leaf.search(key) {
            Ok(index) => (index, true),
            Err(index) => (index, false),
        };
        let end_of_table = cell_num >= leaf.num_cells() && leaf.next_leaf().is_none();
        Ok(Cursor::new(page_num, cell_num, end_of_table, found))
    }

    /// Positions a cursor on the smallest key in the tree.
    pub fn start(&mut self) -> Result<Cursor> {
        let page_num = self.leaf_page_num(None)?;
        let page = self.pager.get_page(page_num)?;
        let num_cells = LeafNode::new(&page[..]).num_cells();
        Ok(Cursor::new(page_num, 0, num_cells == 0, false))
    }

    /// Returns a lazy scan over every row in ascending key order.
    pub fn scan(mut self) -> Result<Scan<'a>> {
        let cursor = self.start()?;
        Ok(Scan::new(self.pager, cursor))
    }

    /// Looks up a single row by key.
    pub fn get(&mut self, key: u32) -> Result<Option<Row>> {
        let cursor = self.find(key)?;
        if !cursor.found() {
            return Ok(None);
        }
        cursor.row(self.pager).map(Some)
    }

    /// Inserts `row` keyed by its id.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKey`] if the key already exists
    /// - [`Error::InternalSplitNotImplemented`] if the target leaf is full and
    ///   its parent cannot take another key
    /// - [`Error::TableFull`] if the split needs pages beyond the page limit
    ///
    /// On any of these the tree is left unchanged.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let key = row.id();
        let cursor = self.find(key)?;
        if cursor.found() {
            return Err(Error::DuplicateKey(key));
        }

        let page = self.pager.get_page(cursor.page_num())?;
        let num_cells = LeafNode::new(&page[..]).num_cells();
        if num_cells >= LEAF_NODE_MAX_CELLS {
            return self.split_and_insert(&cursor, key, row);
        }

        LeafNode::new(&mut page[..]).insert_cell(cursor.cell_num(), key, row);
        Ok(())
    }

    fn split_and_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let old_page_num = cursor.page_num();

        let (old_is_root, parent_page_num, old_next, mut cells) = {
            let page = self.pager.get_page(old_page_num)?;
            let leaf = LeafNode::new(&page[..]);
            let cells: Vec<Vec<u8>> = (0..leaf.num_cells()).map(|i| leaf.cell(i).to_vec()).collect();
            (leaf.is_root(), leaf.parent(), leaf.next_leaf(), cells)
        };

        // Reject before touching anything so a failed insert leaves the tree intact.
        let pages_needed = if old_is_root { 2 } else { 1 };
        if self.pager.unused_page_num() as usize + pages_needed > self.pager.max_pages() {
            return Err(Error::TableFull { max_pages: self.pager.max_pages() });
        }
        if !old_is_root {
            if parent_page_num != ROOT_PAGE_NUM {
                return Err(Error::corruption(format!(
                    "Leaf {} has non-root parent {}",
                    old_page_num, parent_page_num
                )));
            }
            let page = self.pager.get_page(parent_page_num)?;
            if node::validate(&page[..])? != NodeType::Internal {
                return Err(Error::corruption(format!("Parent of leaf {} is not internal", old_page_num)));
            }
            if InternalNode::new(&page[..]).is_full() {
                return Err(Error::InternalSplitNotImplemented);
            }
        }

        let mut new_cell = vec![0u8; LEAF_NODE_CELL_SIZE];
        new_cell[LEAF_NODE_KEY_OFFSET..LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE]
            .copy_from_slice(&key.to_le_bytes());
        new_cell[LEAF_NODE_VALUE_OFFSET..].copy_from_slice(&row.encode());
        cells.insert(cursor.cell_num(), new_cell);

        let (left, right) = cells.split_at(LEAF_NODE_LEFT_SPLIT_COUNT);
        debug_assert_eq!(right.len(), LEAF_NODE_RIGHT_SPLIT_COUNT);
        let new_page_num = self.pager.unused_page_num();

        {
            let page = self.pager.get_page(new_page_num)?;
            let mut new_leaf = LeafNode::new(&mut page[..]);
            new_leaf.initialize();
            new_leaf.set_parent(parent_page_num);
            new_leaf.set_next_leaf(old_next);
            for (i, cell) in right.iter().enumerate() {
                new_leaf.set_cell(i, cell);
            }
            new_leaf.set_num_cells(right.len());
        }

        let left_max = {
            let page = self.pager.get_page(old_page_num)?;
            let mut old_leaf = LeafNode::new(&mut page[..]);
            for (i, cell) in left.iter().enumerate() {
                old_leaf.set_cell(i, cell);
            }
            old_leaf.set_num_cells(left.len());
            old_leaf.set_next_leaf(Some(new_page_num));
            old_leaf.key(left.len() - 1)
        };

        log::debug!(
            "Split leaf {} into {} + {} (new page {})",
            old_page_num,
            left.len(),
            right.len(),
            new_page_num
        );

        if old_is_root {
            self.create_new_root(new_page_num)
        } else {
            self.update_separator(parent_page_num, old_page_num, left_max)?;
            self.insert_into_parent(parent_page_num, new_page_num)
        }
    }

    /// Moves the root leaf into a fresh left child and makes page 0 an
    /// internal node over that child and `right_child_page_num`.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<()> {
        let left_child_page_num = self.pager.unused_page_num();
        let root_copy: Box<Page> = Box::new(*self.pager.get_page(ROOT_PAGE_NUM)?);

        let left_max = {
            let page = self.pager.get_page(left_child_page_num)?;
            page.copy_from_slice(&root_copy[..]);
            let mut left = LeafNode::new(&mut page[..]);
            left.set_root(false);
            left.set_parent(ROOT_PAGE_NUM);
            left.max_key().ok_or_else(|| Error::invalid_state("Split left the root leaf empty"))?
        };

        {
            let page = self.pager.get_page(ROOT_PAGE_NUM)?;
            let mut root = InternalNode::new(&mut page[..]);
            root.initialize();
            root.set_root(true);
            root.set_parent(NO_PAGE);
            root.insert_cell(0, left_child_page_num, left_max);
            root.set_right_child(right_child_page_num);
        }

        let page = self.pager.get_page(right_child_page_num)?;
        node::set_parent(&mut page[..], ROOT_PAGE_NUM);

        log::debug!(
            "Created new root over pages {} and {}",
            left_child_page_num,
            right_child_page_num
        );
        Ok(())
    }

    /// Rewrites the parent's separator for `child_page_num` to `new_key`.
    ///
    /// The right child has no separator, so nothing changes for it.
    fn update_separator(&mut self, parent_page_num: u32, child_page_num: u32, new_key: u32) -> Result<()> {
        let page = self.pager.get_page(parent_page_num)?;
        let mut parent = InternalNode::new(&mut page[..]);
        for i in 0..parent.num_keys() {
            if parent.child(i)? == child_page_num {
                parent.set_key(i, new_key);
                break;
            }
        }
        Ok(())
    }

    /// Adds `child_page_num` to the parent at its sorted position.
    ///
    /// The caller has already checked that the parent has room.
    fn insert_into_parent(&mut self, parent_page_num: u32, child_page_num: u32) -> Result<()> {
        let child_max = self.max_key(child_page_num)?;
        let right_child_page_num = {
            let page = self.pager.get_page(parent_page_num)?;
            let parent = InternalNode::new(&page[..]);
            debug_assert!(!parent.is_full());
            parent.right_child()
        };
        let right_max = self.max_key(right_child_page_num)?;

        let page = self.pager.get_page(parent_page_num)?;
        let mut parent = InternalNode::new(&mut page[..]);
        if child_max > right_max {
            let num_keys = parent.num_keys();
            parent.insert_cell(num_keys, right_child_page_num, right_max);
            parent.set_right_child(child_page_num);
        } else {
            let index = parent.find_child(child_max);
            parent.insert_cell(index, child_page_num, child_max);
        }
        Ok(())
    }

    /// Largest key stored under `page_num`.
    pub fn max_key(&mut self, page_num: u32) -> Result<u32> {
        let num_pages = self.pager.num_pages();
        let mut page_num = page_num;

        for _ in 0..num_pages {
            let page = self.pager.get_page(page_num)?;
            match node::validate(&page[..])? {
                NodeType::Leaf => {
                    return LeafNode::new(&page[..])
                        .max_key()
                        .ok_or_else(|| Error::corruption(format!("Leaf {} is empty", page_num)));
                }
                NodeType::Internal => {
                    let right_child = InternalNode::new(&page[..]).right_child();
                    page_num = node::check_link(page_num, right_child, num_pages)?;
                }
            }
        }

        Err(Error::corruption(format!("No leaf reached within {} pages", num_pages)))
    }

    fn children(&mut self, page_num: u32) -> Result<Vec<u32>> {
        let num_pages = self.pager.num_pages();
        let page = self.pager.get_page(page_num)?;
        let internal = InternalNode::new(&page[..]);
        (0..=internal.num_keys())
            .map(|i| node::check_link(page_num, internal.child(i)?, num_pages))
            .collect()
    }

    /// Renders the tree structure, one line per node or key.
    ///
    /// ```text
    /// - internal (size 1)
    ///   - leaf (size 7)
    ///     - 1
    ///     ...
    ///   - key 7
    ///   - leaf (size 7)
    ///     - 8
    ///     ...
    /// ```
    pub fn print(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        self.print_node(ROOT_PAGE_NUM, 0, &mut lines)?;
        Ok(lines)
    }

    fn print_node(&mut self, page_num: u32, level: usize, lines: &mut Vec<String>) -> Result<()> {
        if level >= self.pager.num_pages() as usize {
            return Err(Error::corruption(format!("Tree deeper than its {} pages", self.pager.num_pages())));
        }

        let page = self.pager.get_page(page_num)?;
        match node::validate(&page[..])? {
            NodeType::Leaf => {
                let leaf = LeafNode::new(&page[..]);
                lines.push(format!("{}- leaf (size {})", indent(level), leaf.num_cells()));
                for key in leaf.keys() {
                    lines.push(format!("{}- {}", indent(level + 1), key));
                }
            }
            NodeType::Internal => {
                let internal = InternalNode::new(&page[..]);
                let num_keys = internal.num_keys();
                let keys: Vec<u32> = (0..num_keys).map(|i| internal.key(i)).collect();
                lines.push(format!("{}- internal (size {})", indent(level), num_keys));

                let children = self.children(page_num)?;
                for (i, child) in children.into_iter().enumerate() {
                    self.print_node(child, level + 1, lines)?;
                    if let Some(key) = keys.get(i) {
                        lines.push(format!("{}- key {}", indent(level + 1), key));
                    }
                }
            }
        }
        Ok(())
    }
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::layout::INTERNAL_NODE_MAX_CELLS;
    use crate::config::Options;
    use tempfile::TempDir;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{}", id), format!("person{}@example.com", id)).unwrap()
    }

    fn new_pager(dir: &TempDir, options: &Options) -> Pager {
        let mut pager = Pager::open(dir.path().join("tree.db"), options).unwrap();
        BTree::new(&mut pager).initialize_root().unwrap();
        pager
    }

    fn scan_ids(pager: &mut Pager) -> Vec<u32> {
        BTree::new(pager).scan().unwrap().map(|r| r.unwrap().id()).collect()
    }

    #[test]
    fn test_insert_and_find() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        for id in [3, 1, 2] {
            tree.insert(&row(id)).unwrap();
        }

        let cursor = tree.find(2).unwrap();
        assert!(cursor.found());
        assert_eq!(cursor.cell_num(), 1);

        let cursor = tree.find(10).unwrap();
        assert!(!cursor.found());
        assert_eq!(cursor.cell_num(), 3);
        assert!(cursor.is_end());

        assert_eq!(tree.get(1).unwrap(), Some(row(1)));
        assert_eq!(tree.get(4).unwrap(), None);
    }

    #[test]
    fn test_duplicate_key() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        tree.insert(&row(1)).unwrap();
        let dup = Row::new(1, "other", "other@example.com").unwrap();
        assert!(matches!(tree.insert(&dup), Err(Error::DuplicateKey(1))));
        assert_eq!(tree.get(1).unwrap(), Some(row(1)));
    }

    #[test]
    fn test_root_split_shape() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        for id in 1..=14 {
            tree.insert(&row(id)).unwrap();
        }

        let mut expected = vec!["- internal (size 1)".to_string(), "  - leaf (size 7)".to_string()];
        expected.extend((1..=7).map(|k| format!("    - {}", k)));
        expected.push("  - key 7".to_string());
        expected.push("  - leaf (size 7)".to_string());
        expected.extend((8..=14).map(|k| format!("    - {}", k)));
        assert_eq!(tree.print().unwrap(), expected);

        // Right leaf was allocated first, the relocated left leaf second.
        let root = pager.get_page(ROOT_PAGE_NUM).unwrap();
        let internal = InternalNode::new(&root[..]);
        assert!(internal.is_root());
        assert_eq!(internal.child(0).unwrap(), 2);
        assert_eq!(internal.right_child(), 1);

        let left = pager.get_page(2).unwrap();
        let left = LeafNode::new(&left[..]);
        assert!(!left.is_root());
        assert_eq!(left.parent(), ROOT_PAGE_NUM);
        assert_eq!(left.next_leaf(), Some(1));

        assert_eq!(scan_ids(&mut pager), (1..=14).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_with_middle_insert() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        for id in (0..26).step_by(2) {
            tree.insert(&row(id)).unwrap();
        }
        tree.insert(&row(5)).unwrap();

        let mut expected: Vec<u32> = (0..26).step_by(2).collect();
        expected.push(5);
        expected.sort_unstable();
        assert_eq!(scan_ids(&mut pager), expected);
    }

    #[test]
    fn test_non_root_splits() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        // Descending inserts split the leftmost leaf repeatedly.
        for id in (1..=100).rev() {
            tree.insert(&row(id)).unwrap();
        }
        for id in 1..=100 {
            assert_eq!(tree.get(id).unwrap(), Some(row(id)));
        }
        assert_eq!(scan_ids(&mut pager), (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_internal_split_rejected() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        let mut inserted = Vec::new();
        let mut id = 0;
        let err = loop {
            match tree.insert(&row(id)) {
                Ok(()) => inserted.push(id),
                Err(e) => break e,
            }
            id += 1;
        };
        assert!(matches!(err, Error::InternalSplitNotImplemented));

        let root = pager.get_page(ROOT_PAGE_NUM).unwrap();
        assert_eq!(InternalNode::new(&root[..]).num_keys(), INTERNAL_NODE_MAX_CELLS);
        assert_eq!(scan_ids(&mut pager), inserted);
    }

    #[test]
    fn test_table_full_leaves_tree_intact() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default().max_pages(2));
        let mut tree = BTree::new(&mut pager);

        for id in 1..=13 {
            tree.insert(&row(id)).unwrap();
        }
        assert!(matches!(tree.insert(&row(14)), Err(Error::TableFull { max_pages: 2 })));
        assert_eq!(pager.num_pages(), 1);
        assert_eq!(scan_ids(&mut pager), (1..=13).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_tree() {
        let dir = TempDir::new().unwrap();
        let mut pager = new_pager(&dir, &Options::default());
        let mut tree = BTree::new(&mut pager);

        assert!(tree.start().unwrap().is_end());
        assert_eq!(tree.print().unwrap(), vec!["- leaf (size 0)".to_string()]);
        assert!(scan_ids(&mut pager).is_empty());
    }

    #[test]
    fn test_zeroed_root_is_corruption() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(dir.path().join("tree.db"), &Options::default()).unwrap();
        pager.get_page(ROOT_PAGE_NUM).unwrap();
        let mut tree = BTree::new(&mut pager);

        // An all-zero page reads as an internal node whose right child is page 0.
        assert!(matches!(tree.start(), Err(Error::Corruption(_))));
        assert!(matches!(tree.find(1), Err(Error::Corruption(_))));
        assert!(matches!(tree.print(), Err(Error::Corruption(_))));
        assert!(matches!(tree.insert(&row(1)), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_internal_cycle_is_corruption() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(dir.path().join("tree.db"), &Options::default()).unwrap();
        for page_num in [ROOT_PAGE_NUM, 1] {
            let page = pager.get_page(page_num).unwrap();
            let mut internal = InternalNode::new(&mut page[..]);
            internal.initialize();
            internal.set_right_child(1);
        }
        let mut tree = BTree::new(&mut pager);

        assert!(matches!(tree.start(), Err(Error::Corruption(_))));
        assert!(matches!(tree.max_key(ROOT_PAGE_NUM), Err(Error::Corruption(_))));
        assert!(matches!(tree.print(), Err(Error::Corruption(_))));
    }
}
