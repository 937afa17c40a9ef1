//! Cursor positions and ordered scans.

use crate::btree::node::{self, LeafNode, NodeType};
use crate::error::{Error, Result};
use crate::pager::Pager;
use crate::row::Row;

/// A position within a leaf node.
///
/// A cursor holds only page and cell numbers. It never keeps a page
/// reference between calls, since a split may rewrite the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    page_num: u32,
    cell_num: usize,
    end_of_table: bool,
    found: bool,
}

impl Cursor {
    pub(crate) fn new(page_num: u32, cell_num: usize, end_of_table: bool, found: bool) -> Self {
        Self { page_num, cell_num, end_of_table, found }
    }

    /// Page holding the current cell.
    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Index of the current cell within its leaf.
    pub fn cell_num(&self) -> usize {
        self.cell_num
    }

    /// Whether the cursor has moved past the last row.
    pub fn is_end(&self) -> bool {
        self.end_of_table
    }

    /// Whether a key search landed on an exact match.
    pub fn found(&self) -> bool {
        self.found
    }

    /// Key stored at the cursor.
    pub fn key(&self, pager: &mut Pager) -> Result<u32> {
        let leaf = load_leaf(pager, self.page_num)?;
        self.check_occupied(&leaf)?;
        Ok(leaf.key(self.cell_num))
    }

    /// Row stored at the cursor.
    pub fn row(&self, pager: &mut Pager) -> Result<Row> {
        let leaf = load_leaf(pager, self.page_num)?;
        self.check_occupied(&leaf)?;
        leaf.row(self.cell_num)
    }

    fn check_occupied(&self, leaf: &LeafNode<&[u8]>) -> Result<()> {
        if self.end_of_table || self.cell_num >= leaf.num_cells() {
            return Err(Error::invalid_state(format!(
                "Cursor at page {} cell {} does not point at a row",
                self.page_num, self.cell_num
            )));
        }
        Ok(())
    }

    /// Moves to the next cell, following the leaf chain.
    pub fn advance(&mut self, pager: &mut Pager) -> Result<()> {
        let num_pages = pager.num_pages();
        let leaf = load_leaf(pager, self.page_num)?;

        if self.cell_num + 1 < leaf.num_cells() {
            self.cell_num += 1;
            return Ok(());
        }
        match leaf.next_leaf() {
            Some(next) => {
                self.page_num = node::check_link(self.page_num, next, num_pages)?;
                self.cell_num = 0;
            }
            None => {
                self.cell_num += 1;
                self.end_of_table = true;
            }
        }
        Ok(())
    }
}

/// Borrows `page_num` as a leaf, rejecting pages that are not valid leaves.
fn load_leaf(pager: &mut Pager, page_num: u32) -> Result<LeafNode<&[u8]>> {
    let page = pager.get_page(page_num)?;
    let page: &[u8] = &page[..];
    match node::validate(page)? {
        NodeType::Leaf => Ok(LeafNode::new(page)),
        NodeType::Internal => {
            Err(Error::corruption(format!("Expected leaf at page {}, found internal node", page_num)))
        }
    }
}

/// A lazy, single-pass iterator over every row in ascending key order.
pub struct Scan<'a> {
    pager: &'a mut Pager,
    cursor: Cursor,
    pending: Option<Error>,
    /// Leaf-to-leaf moves so far
    hops: u32,
}

impl<'a> Scan<'a> {
    pub(crate) fn new(pager: &'a mut Pager, cursor: Cursor) -> Self {
        Self { pager, cursor, pending: None, hops: 0 }
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.cursor.end_of_table = true;
            return Some(Err(err));
        }
        if self.cursor.end_of_table {
            return None;
        }

        let row = match self.cursor.row(self.pager) {
            Ok(row) => row,
            Err(e) => {
                self.cursor.end_of_table = true;
                return Some(Err(e));
            }
        };

        let page_num = self.cursor.page_num;
        if let Err(e) = self.cursor.advance(self.pager) {
            self.pending = Some(e);
        } else if self.cursor.page_num != page_num {
            // A file holds fewer leaves than pages, so more moves mean a cycle.
            self.hops += 1;
            if self.hops >= self.pager.num_pages() {
                self.pending = Some(Error::corruption(format!(
                    "Leaf chain does not end within {} pages",
                    self.pager.num_pages()
                )));
            }
        }
        Some(Ok(row))
    }
}
