/// Business logic layer for media-service
pub mod media;

pub use media::{MediaService, MAX_FILES, MAX_FILE_BYTES};
