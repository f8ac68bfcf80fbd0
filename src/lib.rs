pub mod buffer;
pub mod disk;

pub use buffer::{BUFFER_POOL_SIZE, BufferPoolManager, Frame, FrameId, LruReplacer};
pub use disk::{DiskError, DiskManager, DiskResult, PAGE_SIZE, PageId};
