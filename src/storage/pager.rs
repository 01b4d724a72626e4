//! The buffer manager: owns the file descriptor, demand-loads pages, and flushes them back.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use super::btree::{Node, PAGE_SIZE, TABLE_MAX_PAGES};
use crate::errors::{err, Error};

pub struct Pager {
    file: File,
    /// Number of pages the on-disk file is known to span. Grows as fresh pages are
    /// materialized; never shrinks (no page recycling - deletion is out of scope).
    pub num_pages: u32,
    /// Capacity-bounded at `TABLE_MAX_PAGES` - the page cache can never grow past the
    /// engine's own safety cap, so the type itself enforces invariant 5 rather than a
    /// runtime-only check.
    pages: heapless::Vec<Option<Node>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens (creating if absent) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "database file length {file_length} is not a multiple of the page size"
            ));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(num_pages, "opened database file");

        let mut pages = heapless::Vec::new();
        for _ in 0..num_pages {
            pages
                .push(None)
                .map_err(|_| err!(Corrupt, "on-disk file spans more than TABLE_MAX_PAGES pages"))?;
        }

        Ok(Pager { file, num_pages, pages })
    }

    /// Returns the (possibly freshly loaded) node at `page_num`. A page beyond the on-disk
    /// range is zero-initialized; the caller is responsible for calling `initialize_leaf`/
    /// `initialize_internal` on it before treating it as real.
    pub fn get_page(&mut self, page_num: u32) -> Result<&Node, Error> {
        self.materialize(page_num)?;
        Ok(self.pages[page_num as usize].as_ref().unwrap())
    }

    pub fn get_page_mut(&mut self, page_num: u32) -> Result<&mut Node, Error> {
        self.materialize(page_num)?;
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    fn materialize(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                Corrupt,
                "page number {page_num} exceeds TABLE_MAX_PAGES ({TABLE_MAX_PAGES})"
            ));
        }
        while (page_num as usize) >= self.pages.len() {
            self.pages
                .push(None)
                .map_err(|_| err!(Corrupt, "page number {page_num} exceeds TABLE_MAX_PAGES ({TABLE_MAX_PAGES})"))?;
        }
        if self.pages[page_num as usize].is_none() {
            let node = if page_num < self.num_pages {
                trace!(page_num, "cache miss, reading page from disk");
                let mut buf = [0u8; PAGE_SIZE];
                self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut buf)?;
                Node::from_bytes(buf)
            } else {
                trace!(page_num, "cache miss, fresh page");
                Node::from_bytes([0u8; PAGE_SIZE])
            };
            self.pages[page_num as usize] = Some(node);
        }
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(())
    }

    /// Allocates a fresh page number without materializing it. Page recycling after
    /// deletion is not implemented (deletion itself is out of scope), so allocation is
    /// always monotonic.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }

    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let node = self.pages[page_num as usize]
            .as_ref()
            .ok_or_else(|| err!(Corrupt, "attempted to flush unmaterialized page {page_num}"))?;
        self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(node.as_slice())?;
        Ok(())
    }

    /// Flushes every materialized page and drops the pager's buffers.
    pub fn close(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            if self.pages[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        self.file.sync_all()?;
        self.pages.clear();
        debug!(num_pages = self.num_pages, "flushed and closed database file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_numbers_start_at_one_and_increase() {
        let dir = tempfile::tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("db")).unwrap();
        pager.get_page_mut(0).unwrap().initialize_leaf();
        assert_eq!(pager.get_unused_page_num(), 1);
        pager.get_page_mut(1).unwrap().initialize_leaf();
        assert_eq!(pager.get_unused_page_num(), 2);
    }

    #[test]
    fn flush_evict_reload_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let mut pager = Pager::open(&path).unwrap();
            let node = pager.get_page_mut(0).unwrap();
            node.initialize_leaf();
            node.set_leaf_num_cells(42);
            pager.flush(0).unwrap();
            pager.close().unwrap();
        }
        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.get_page(0).unwrap().leaf_num_cells(), 42);
    }
}
