//! Decoded point pages and the LRU cache that owns them.

mod page;
mod page_cache;

pub use page::{Page, PageKey, PageState};
pub use page_cache::PageCache;
