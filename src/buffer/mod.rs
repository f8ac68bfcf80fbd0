mod buffer_pool;
mod frame;
mod lru_replacer;

pub use buffer_pool::BufferPoolManager;
pub use frame::Frame;
pub use lru_replacer::LruReplacer;

/// Number of frames in the buffer pool
/// With 4096 frames × 4KB = 16MB of cached pages by default
pub const BUFFER_POOL_SIZE: usize = 4096;

/// Frame index type
pub type FrameId = usize;
