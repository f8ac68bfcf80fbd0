use std::collections::{HashMap, VecDeque};

use tracing::{error, warn};

use crate::disk::{DiskManager, PageId};

use super::frame::Frame;
use super::lru_replacer::LruReplacer;
use super::{BUFFER_POOL_SIZE, FrameId};

/// A bounded cache of page frames over the disk manager.
///
/// Every frame starts on the free list. Fetching or creating a page claims a
/// frame (free list first, then an eviction victim), pins it, and hands out
/// an exclusive reference; the caller releases it with `unpin_page`, at which
/// point the frame becomes an eviction candidate again. Dirty frames are
/// written back before their frame is reused, and all resident pages are
/// flushed on drop.
///
/// Methods take `&mut self`; multi-threaded callers share the pool behind
/// `Arc<Mutex<...>>`, which serializes operations the way the on-disk write
/// ordering requires.
pub struct BufferPoolManager {
    disk: DiskManager,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruReplacer,
}

impl BufferPoolManager {
    /// Create a pool with the default number of frames
    pub fn new(disk: DiskManager) -> Self {
        Self::with_capacity(disk, BUFFER_POOL_SIZE)
    }

    /// Create a pool with the given number of frames
    pub fn with_capacity(disk: DiskManager, capacity: usize) -> Self {
        let frames = (0..capacity).map(|_| Frame::new()).collect();
        let free_list = (0..capacity).collect();

        Self {
            disk,
            frames,
            page_table: HashMap::new(),
            free_list,
            replacer: LruReplacer::new(capacity),
        }
    }

    /// Pin the frame holding `page_id`, loading it from disk if it is not
    /// resident. Returns `None` when every frame is pinned.
    pub fn fetch_page(&mut self, page_id: PageId) -> Option<&mut Frame> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin();
            self.replacer.pin(frame_id);
            return Some(&mut self.frames[frame_id]);
        }

        let frame_id = self.try_find_free_frame()?;
        self.evict_resident(frame_id);

        self.page_table.insert(page_id, frame_id);
        self.frames[frame_id].install(page_id);
        self.disk.read_page(page_id, self.frames[frame_id].data_mut());
        self.replacer.pin(frame_id);

        Some(&mut self.frames[frame_id])
    }

    /// Allocate a fresh page on disk and pin it in a zeroed frame. When no
    /// frame is available the allocation is rolled back and `None` returned.
    pub fn new_page(&mut self) -> Option<(PageId, &mut Frame)> {
        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(err) => {
                warn!(%err, "page allocation failed");
                return None;
            }
        };

        let Some(frame_id) = self.try_find_free_frame() else {
            // Every frame is pinned; give the id back
            self.disk.deallocate_page(page_id);
            return None;
        };
        self.evict_resident(frame_id);

        self.page_table.insert(page_id, frame_id);
        self.frames[frame_id].install(page_id);
        self.frames[frame_id].data_mut().fill(0);
        self.replacer.pin(frame_id);

        Some((page_id, &mut self.frames[frame_id]))
    }

    /// Release one pin on a resident page. The dirty flag is sticky: once a
    /// caller reports modifications, only a flush clears it. Returns `false`
    /// when the page is not resident or not pinned.
    pub fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> bool {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return false;
        };

        let frame = &mut self.frames[frame_id];
        if frame.pin_count() == 0 {
            return false;
        }

        frame.unpin();
        if is_dirty {
            frame.set_dirty(true);
        }
        let evictable = frame.pin_count() == 0;
        if evictable {
            self.replacer.unpin(frame_id);
        }

        true
    }

    /// Write a resident page to disk and mark it clean. Returns `false` when
    /// the page is not resident.
    pub fn flush_page(&mut self, page_id: PageId) -> bool {
        let Some(&frame_id) = self.page_table.get(&page_id) else {
            return false;
        };

        self.disk.write_page(page_id, self.frames[frame_id].data());
        self.frames[frame_id].set_dirty(false);
        true
    }

    /// Flush every resident page
    pub fn flush_all(&mut self) {
        let resident: Vec<PageId> = self.page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id);
        }
    }

    /// Drop a page from the pool and the disk. A pinned page is refused and
    /// nothing changes, on disk or in memory. Deleting a page that is not
    /// resident only deallocates the disk side.
    pub fn delete_page(&mut self, page_id: PageId) -> bool {
        match self.page_table.get(&page_id) {
            None => {
                self.disk.deallocate_page(page_id);
                true
            }
            Some(&frame_id) => {
                if self.frames[frame_id].pin_count() > 0 {
                    return false;
                }

                // Recent modifications reach disk before the id is recycled
                if self.frames[frame_id].is_dirty() {
                    self.disk.write_page(page_id, self.frames[frame_id].data());
                }
                self.disk.deallocate_page(page_id);

                self.page_table.remove(&page_id);
                self.frames[frame_id].reset();
                self.replacer.pin(frame_id);
                self.free_list.push_back(frame_id);
                true
            }
        }
    }

    /// Diagnostic: report (and log) any frame still pinned
    pub fn check_all_unpinned(&self) -> bool {
        let mut all_unpinned = true;
        for frame in &self.frames {
            if frame.pin_count() != 0 {
                error!(
                    page_id = ?frame.page_id(),
                    pin_count = frame.pin_count(),
                    "frame still pinned"
                );
                all_unpinned = false;
            }
        }
        all_unpinned
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Check whether a page currently occupies a frame
    pub fn is_page_resident(&self, page_id: PageId) -> bool {
        self.page_table.contains_key(&page_id)
    }

    pub fn resident_page_count(&self) -> usize {
        self.page_table.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn evictable_frame_count(&self) -> usize {
        self.replacer.len()
    }

    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_dirty()).count()
    }

    pub fn disk_manager(&self) -> &DiskManager {
        &self.disk
    }

    pub fn disk_manager_mut(&mut self) -> &mut DiskManager {
        &mut self.disk
    }

    /// Claim a frame for a new occupant: the free list always wins over the
    /// replacer. `None` when the free list is empty and every resident frame
    /// is pinned.
    fn try_find_free_frame(&mut self) -> Option<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Some(frame_id);
        }
        self.replacer.victim()
    }

    /// Push out whatever page occupies `frame_id`, writing it back first
    /// when dirty. No-op for a frame fresh off the free list.
    fn evict_resident(&mut self, frame_id: FrameId) {
        let Some(old_page_id) = self.frames[frame_id].page_id() else {
            return;
        };

        if self.frames[frame_id].is_dirty() {
            self.disk.write_page(old_page_id, self.frames[frame_id].data());
        }
        self.page_table.remove(&old_page_id);
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        // Resident dirty pages must survive the pool
        self.flush_all();
    }
}
