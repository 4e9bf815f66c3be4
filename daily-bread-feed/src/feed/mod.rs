//! Feed generation: the chapter cache, the prefetch strategy, the sampling
//! engine, and the batch orchestrator.

pub mod chapter_cache;
pub mod engine;
pub mod prefetch;
pub mod sampler;

pub use chapter_cache::ChapterCache;
pub use engine::{FeedEngine, FeedEngineConfig, FeedEntry};
