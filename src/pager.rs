//! Page cache over the single database file.
//!
//! The pager is the sole owner of page buffers. Callers borrow one page at a
//! time for the duration of a single operation and address everything else
//! by page number. Pages are loaded lazily and stay resident until the pager
//! is dropped; there is no eviction.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::btree::layout::PAGE_SIZE;
use crate::config::Options;
use crate::error::{Error, Result};

/// A raw page buffer.
pub type Page = [u8; PAGE_SIZE];

/// Maps page numbers to cached page buffers backed by a file.
pub struct Pager {
    /// Path to the database file
    path: PathBuf,
    /// Open file handle
    file: File,
    /// Current file length in bytes
    file_length: u64,
    /// Pages on disk plus pages allocated in memory since open
    num_pages: u32,
    /// Resident pages
    pages: HashMap<u32, Box<Page>>,
    /// Page allocation limit
    max_pages: usize,
    /// Whether to fsync on close
    sync_on_close: bool,
}

impl Pager {
    /// Opens or creates the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, if `options` forbid
    /// opening it, or if its length is not a whole number of pages.
    pub fn open<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        options.validate()?;

        if path.exists() {
            if options.error_if_exists {
                return Err(Error::AlreadyExists(format!(
                    "Database file already exists: {:?}",
                    path
                )));
            }
        } else if !options.create_if_missing {
            return Err(Error::NotFound(format!("Database file does not exist: {:?}", path)));
        }

        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        let file_length = file.metadata()?.len();

        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(Error::corruption(format!(
                "Database file is not a whole number of pages: {} bytes",
                file_length
            )));
        }

        let num_pages = u32::try_from(file_length / PAGE_SIZE as u64)
            .map_err(|_| Error::corruption("Database file has too many pages"))?;

        log::debug!("Opened {:?}: {} bytes, {} pages", path, file_length, num_pages);

        Ok(Self {
            path,
            file,
            file_length,
            num_pages,
            pages: HashMap::new(),
            max_pages: options.max_pages,
            sync_on_close: options.sync_on_close,
        })
    }

    /// Number of pages on disk or allocated since open.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// The next page number to allocate.
    ///
    /// Pages are never recycled, so new pages always go at the end of the file.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Maximum number of pages this pager will hand out.
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page buffer for `page_num`, loading it on first access.
    ///
    /// A page beyond the on-disk extent comes back zero-filled; the file is
    /// only extended when the page is flushed.
    pub fn get_page(&mut self, page_num: u32) -> Result<&mut Page> {
        if page_num as usize >= self.max_pages {
            return Err(Error::TableFull { max_pages: self.max_pages });
        }

        if !self.pages.contains_key(&page_num) {
            let mut page: Box<Page> = Box::new([0u8; PAGE_SIZE]);
            let pages_on_disk = self.file_length / PAGE_SIZE as u64;

            if (page_num as u64) < pages_on_disk {
                self.file.seek(SeekFrom::Start(page_offset(page_num)))?;
                self.file.read_exact(&mut page[..])?;
                log::debug!("Loaded page {} from disk", page_num);
            }

            self.pages.insert(page_num, page);

            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        self.pages
            .get_mut(&page_num)
            .map(|page| &mut **page)
            .ok_or_else(|| Error::invalid_state(format!("Page {} missing from cache", page_num)))
    }

    /// Writes the full page `page_num` to its file offset.
    pub fn flush(&mut self, page_num: u32) -> Result<()> {
        let page = self.pages.get(&page_num).ok_or_else(|| {
            Error::invalid_state(format!("Tried to flush page {} which is not cached", page_num))
        })?;

        self.file.seek(SeekFrom::Start(page_offset(page_num)))?;
        self.file.write_all(&page[..])?;

        let end = page_offset(page_num) + PAGE_SIZE as u64;
        if end > self.file_length {
            self.file_length = end;
        }
        Ok(())
    }

    /// Flushes every resident page to disk.
    ///
    /// Returns the number of pages written. The cache stays resident, so the
    /// pager remains usable afterwards.
    pub fn flush_all(&mut self) -> Result<usize> {
        let mut page_nums: Vec<u32> =
            self.pages.keys().copied().filter(|&n| n < self.num_pages).collect();
        page_nums.sort_unstable();

        for &page_num in &page_nums {
            self.flush(page_num)?;
        }

        self.file.flush()?;
        if self.sync_on_close {
            self.file.sync_all()?;
        }

        log::debug!("Flushed {} of {} pages to {:?}", page_nums.len(), self.num_pages, self.path);
        Ok(page_nums.len())
    }
}

fn page_offset(page_num: u32) -> u64 {
    page_num as u64 * PAGE_SIZE as u64
}
