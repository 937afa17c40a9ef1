//! Configuration options for opening a SimpleDB table.

/// Default upper bound on the number of pages a table may allocate.
pub const DEFAULT_MAX_PAGES: usize = 4096;

/// Configuration options for opening a table.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the database file if it doesn't exist.
    /// Default: true
    pub create_if_missing: bool,

    /// Error if the database file already exists.
    /// Default: false
    pub error_if_exists: bool,

    /// Maximum number of pages the pager will hand out.
    /// Pages are never evicted, so this also bounds the page cache.
    /// Default: 4096 (16MB)
    pub max_pages: usize,

    /// Call `fsync` on the file after flushing pages on close.
    /// Default: true
    pub sync_on_close: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            max_pages: DEFAULT_MAX_PAGES,
            sync_on_close: true,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database file if it doesn't exist.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether opening an existing file is an error.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the page limit.
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    /// Enables or disables `fsync` on close.
    pub fn sync_on_close(mut self, value: bool) -> Self {
        self.sync_on_close = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_pages == 0 {
            return Err(crate::Error::invalid_argument("max_pages must be > 0"));
        }
        if self.max_pages > u32::MAX as usize {
            return Err(crate::Error::invalid_argument("max_pages must fit in a page number"));
        }
        Ok(())
    }
}
