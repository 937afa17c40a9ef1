//! # SimpleDB - A Single-Table B+tree Store
//!
//! SimpleDB keeps one table of `(id, username, email)` rows in a single file
//! made of fixed 4096-byte pages. Rows are indexed by id with a B+tree, so
//! point lookups, inserts and ordered scans stay efficient as the table grows.
//!
//! ## Architecture
//!
//! - **Row**: fixed-width 293-byte row encoding
//! - **Pager**: maps page numbers to cached page buffers backed by the file
//! - **B+tree**: node layout, search, insert-with-split and ordered scans
//! - **Table**: opens a file into a live tree and exposes the operations
//! - **Repl**: the line-oriented shell driven by the `simpledb` binary
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use simpledb::{Row, Table};
//!
//! # fn main() -> Result<(), simpledb::Error> {
//! let mut table = Table::open("./users.db")?;
//!
//! table.insert(&Row::new(1, "alice", "alice@example.com")?)?;
//! table.insert(&Row::new(2, "bob", "bob@example.com")?)?;
//!
//! for row in table.scan()? {
//!     println!("{}", row?);
//! }
//!
//! table.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod btree;
pub mod config;
pub mod error;
pub mod pager;
pub mod repl;
pub mod row;
pub mod statement;

// Re-exports
pub use btree::{Cursor, Scan};
pub use config::Options;
pub use error::{Error, Result};
pub use repl::Repl;
pub use row::Row;
pub use statement::{PrepareError, Statement};

use btree::layout::REPORTED_CONSTANTS;
use btree::BTree;
use pager::Pager;
use std::path::Path;

/// An open table.
///
/// All pages stay cached in memory until the table is closed. Changes reach
/// the file on [`Table::flush`], [`Table::close`], or, as a best effort,
/// when the table is dropped.
///
/// # Thread Safety
///
/// `Table` is single-threaded: every operation takes `&mut self` and runs to
/// completion. Only one process may have the file open at a time.
pub struct Table {
    /// Page cache over the database file
    pager: Pager,

    /// Set once `close` has flushed everything
    closed: bool,
}

impl Table {
    /// Opens the table stored at `path` with default options.
    ///
    /// The file is created if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Options::default())
    }

    /// Opens the table stored at `path`.
    ///
    /// An empty file gets an empty root leaf on page 0.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or created
    /// - `options` are invalid or forbid opening the file
    /// - The file is not a whole number of pages
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use simpledb::{Options, Table};
    ///
    /// # fn main() -> Result<(), simpledb::Error> {
    /// let options = Options::default().max_pages(256);
    /// let table = Table::open_with("./users.db", options)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let mut pager = Pager::open(path, &options)?;

        if pager.num_pages() == 0 {
            BTree::new(&mut pager).initialize_root()?;
            log::info!("Initialized empty table in {:?}", pager.path());
        } else {
            log::info!("Opened table {:?} with {} pages", pager.path(), pager.num_pages());
        }

        Ok(Self { pager, closed: false })
    }

    fn tree(&mut self) -> BTree<'_> {
        BTree::new(&mut self.pager)
    }

    /// Inserts a row keyed by its id.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKey`] if a row with the same id exists
    /// - [`Error::InternalSplitNotImplemented`] if the row would need an
    ///   internal node to split
    /// - [`Error::TableFull`] if the page limit is reached
    ///
    /// The table is unchanged when any of these is returned.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        self.tree().insert(row)
    }

    /// Looks up a row by id.
    pub fn get(&mut self, id: u32) -> Result<Option<Row>> {
        self.tree().get(id)
    }

    /// Returns a lazy iterator over every row in ascending id order.
    pub fn scan(&mut self) -> Result<Scan<'_>> {
        self.tree().scan()
    }

    /// Collects every row in ascending id order.
    pub fn select(&mut self) -> Result<Vec<Row>> {
        self.scan()?.collect()
    }

    /// Finds the cursor position for `id`.
    pub fn find(&mut self, id: u32) -> Result<Cursor> {
        self.tree().find(id)
    }

    /// Renders the tree structure, one line per node or key.
    pub fn print_tree(&mut self) -> Result<Vec<String>> {
        self.tree().print()
    }

    /// The fixed layout constants reported by `.constants`.
    pub fn constants() -> &'static [(&'static str, usize)] {
        &REPORTED_CONSTANTS
    }

    /// Number of pages on disk or allocated in memory.
    pub fn num_pages(&self) -> u32 {
        self.pager.num_pages()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        self.pager.path()
    }

    /// Writes every cached page to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush_all()?;
        Ok(())
    }

    /// Flushes all pages and closes the table.
    pub fn close(mut self) -> Result<()> {
        let flushed = self.pager.flush_all()?;
        self.closed = true;
        log::info!("Closed table {:?}: flushed {} pages", self.pager.path(), flushed);
        Ok(())
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Best effort flush on drop
        if let Err(e) = self.pager.flush_all() {
            log::warn!("Failed to flush table {:?} on drop: {}", self.pager.path(), e);
        }
    }
}
