use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use super::bitmap_page::BitmapPage;
use super::error::{DiskError, DiskResult};
use super::meta_page::MetaPage;
use super::{META_PHYSICAL_ID, PAGE_SIZE, PageId};

/// Owns the single database file and the logical page-id space over it.
///
/// The file is a sequence of extents behind the meta page: extent `e` holds
/// one bitmap page followed by `BitmapPage::CAPACITY` data pages. Logical ids
/// are dense; the mapping to physical pages skips the interleaved bitmap
/// pages. Durability is best-effort between `close` calls: write failures are
/// logged and swallowed, reads past EOF come back zeroed.
pub struct DiskManager {
    file: File,
    path: PathBuf,
    meta: MetaPage,
    closed: bool,
}

impl DiskManager {
    /// Open the database file, creating it (and its parent directories) when
    /// missing, and load the meta page. A file that cannot be opened or whose
    /// meta page is corrupt is fatal.
    pub fn open<P: AsRef<Path>>(path: P) -> DiskResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| DiskError::Open {
                path: path.display().to_string(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|source| DiskError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let mut manager = Self {
            file,
            path: path.to_path_buf(),
            meta: MetaPage::new(),
            closed: false,
        };

        let mut buffer = [0u8; PAGE_SIZE];
        manager.read_physical(META_PHYSICAL_ID, &mut buffer)?;
        manager.meta = MetaPage::deserialize(&buffer)?;

        Ok(manager)
    }

    /// Write the meta page back and sync the file. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.write_meta();
        if let Err(err) = self.file.sync_all() {
            warn!(path = %self.path.display(), %err, "sync failed on close");
        }
        self.closed = true;
    }

    /// Read a logical page into `buffer`. Bytes past EOF read as zero; an
    /// I/O failure is logged and leaves the buffer zeroed.
    pub fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) {
        assert_eq!(buffer.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");

        let physical_id = Self::physical_page_id(page_id);
        if let Err(err) = self.read_physical(physical_id, buffer) {
            error!(page_id, %err, "I/O error while reading page");
            buffer.fill(0);
        }
    }

    /// Write a logical page, extending the file as needed. Write failures
    /// are logged, not propagated.
    pub fn write_page(&mut self, page_id: PageId, buffer: &[u8]) {
        assert_eq!(buffer.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");

        self.store_physical(Self::physical_page_id(page_id), buffer);
    }

    /// Claim a fresh logical page id.
    ///
    /// Scans existing extents first-fit, opening a new extent when every
    /// tracked one is full. Returns `DiskError::Full` once the meta page
    /// cannot track another extent.
    pub fn allocate_page(&mut self) -> DiskResult<PageId> {
        let capacity = BitmapPage::CAPACITY as u32;

        for extent in 0..self.meta.num_extents() {
            if self.meta.extent_used(extent) >= capacity {
                continue;
            }

            let mut bitmap = self.load_bitmap(extent)?;
            if let Some(offset) = bitmap.allocate() {
                self.meta.note_allocated(extent);
                self.store_bitmap(extent, &bitmap);
                self.write_meta();
                return Ok(extent * capacity + offset);
            }
        }

        if self.meta.num_extents() as usize >= MetaPage::MAX_EXTENTS {
            return Err(DiskError::Full);
        }

        let extent = self.meta.push_extent();
        let mut bitmap = BitmapPage::new();
        let offset = bitmap.allocate().expect("fresh bitmap has free slots");
        self.meta.note_allocated(extent);
        self.store_bitmap(extent, &bitmap);
        self.write_meta();

        Ok(extent * capacity + offset)
    }

    /// Return a logical page id to the free pool. A no-op for ids past the
    /// last extent or slots that are already free.
    pub fn deallocate_page(&mut self, page_id: PageId) {
        let capacity = BitmapPage::CAPACITY as u32;
        let extent = page_id / capacity;
        if extent >= self.meta.num_extents() {
            return;
        }

        let mut bitmap = match self.load_bitmap(extent) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                error!(page_id, %err, "I/O error while reading bitmap page");
                return;
            }
        };

        if !bitmap.deallocate(page_id % capacity) {
            return;
        }

        self.meta.note_deallocated(extent);
        self.store_bitmap(extent, &bitmap);
        self.write_meta();
    }

    /// Check whether a logical page id is unallocated. Ids in extents the
    /// file has never grown are free by definition.
    pub fn is_page_free(&mut self, page_id: PageId) -> bool {
        let capacity = BitmapPage::CAPACITY as u32;
        let extent = page_id / capacity;
        if extent >= self.meta.num_extents() {
            return true;
        }

        match self.load_bitmap(extent) {
            Ok(bitmap) => bitmap.is_free(page_id % capacity),
            Err(err) => {
                error!(page_id, %err, "I/O error while reading bitmap page");
                true
            }
        }
    }

    /// Allocation counters, as last loaded or updated
    pub fn meta(&self) -> &MetaPage {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical page holding logical `page_id`, skipping the meta page and
    /// the bitmap page interleaved at the head of each extent.
    pub(crate) fn physical_page_id(page_id: PageId) -> u64 {
        let capacity = BitmapPage::CAPACITY as u64;
        let group = page_id as u64 / capacity;
        let offset = page_id as u64 % capacity;
        group * (capacity + 1) + offset + 2
    }

    /// Physical page holding extent `e`'s bitmap
    pub(crate) fn bitmap_physical_id(extent: u32) -> u64 {
        1 + extent as u64 * (BitmapPage::CAPACITY as u64 + 1)
    }

    fn load_bitmap(&mut self, extent: u32) -> io::Result<BitmapPage> {
        let mut buffer = [0u8; PAGE_SIZE];
        self.read_physical(Self::bitmap_physical_id(extent), &mut buffer)?;
        Ok(BitmapPage::deserialize(&buffer))
    }

    fn store_bitmap(&mut self, extent: u32, bitmap: &BitmapPage) {
        let mut buffer = [0u8; PAGE_SIZE];
        bitmap.serialize(&mut buffer);
        self.store_physical(Self::bitmap_physical_id(extent), &buffer);
    }

    fn write_meta(&mut self) {
        let mut buffer = [0u8; PAGE_SIZE];
        self.meta.serialize(&mut buffer);
        self.store_physical(META_PHYSICAL_ID, &buffer);
    }

    fn read_physical(&mut self, physical_id: u64, buffer: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(physical_id * PAGE_SIZE as u64))?;

        let bytes_read = self.file.read(buffer)?;
        // If the file ends before a full page, the rest reads as zero
        if bytes_read < PAGE_SIZE {
            buffer[bytes_read..].fill(0);
        }

        Ok(())
    }

    fn write_physical(&mut self, physical_id: u64, buffer: &[u8]) -> io::Result<()> {
        let offset = physical_id * PAGE_SIZE as u64;
        let required_size = offset + PAGE_SIZE as u64;

        // Extend the file if necessary to ensure we can write at this offset
        let current_size = self.file.metadata()?.len();
        if current_size < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;

        Ok(())
    }

    fn store_physical(&mut self, physical_id: u64, buffer: &[u8]) {
        if let Err(err) = self.write_physical(physical_id, buffer) {
            error!(physical_id, %err, "I/O error while writing page");
        }
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        self.close();
    }
}
