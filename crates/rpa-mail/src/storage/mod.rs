pub mod attachments;

pub use attachments::{
    clean_default_cache, default_cache_root, save_all_attachments, save_attachments,
    AttachmentStore, CacheCleanup, SaveReport, CACHE_ROOT_ENV,
};
