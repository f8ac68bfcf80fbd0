use crate::disk::{PAGE_SIZE, PageId};

/// One slot of the buffer pool: a page-sized buffer plus bookkeeping.
///
/// `page_id` is `None` while the frame is on the free list. A non-zero
/// `pin_count` shields the frame from eviction; `is_dirty` means the buffer
/// holds bytes newer than the on-disk copy.
pub struct Frame {
    page_id: Option<PageId>,
    pin_count: usize,
    is_dirty: bool,
    data: Vec<u8>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
            data: vec![0u8; PAGE_SIZE],
        }
    }

    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn pin_count(&self) -> usize {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable page contents. Writing through this does not mark the frame
    /// dirty; callers report modifications when they unpin.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_dirty(&mut self, is_dirty: bool) {
        self.is_dirty = is_dirty;
    }

    pub(crate) fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub(crate) fn unpin(&mut self) {
        self.pin_count -= 1;
    }

    /// Rebind the frame to a page about to be loaded, pinned once and clean
    pub(crate) fn install(&mut self, page_id: PageId) {
        self.page_id = Some(page_id);
        self.pin_count = 1;
        self.is_dirty = false;
    }

    /// Return the frame to its free-list state
    pub(crate) fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.is_dirty = false;
        self.data.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_free() {
        let frame = Frame::new();
        assert_eq!(frame.page_id(), None);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.data().iter().all(|&b| b == 0));
        assert_eq!(frame.data().len(), PAGE_SIZE);
    }

    #[test]
    fn test_install_and_reset() {
        let mut frame = Frame::new();

        frame.install(42);
        frame.data_mut()[0] = 7;
        frame.set_dirty(true);
        assert_eq!(frame.page_id(), Some(42));
        assert_eq!(frame.pin_count(), 1);

        frame.reset();
        assert_eq!(frame.page_id(), None);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pin_counting() {
        let mut frame = Frame::new();
        frame.install(3);
        frame.pin();
        assert_eq!(frame.pin_count(), 2);
        frame.unpin();
        frame.unpin();
        assert_eq!(frame.pin_count(), 0);
    }
}
