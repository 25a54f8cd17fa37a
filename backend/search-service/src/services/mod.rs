pub mod search;

pub use search::{SearchService, DEFAULT_LIMIT, MAX_LIMIT};
