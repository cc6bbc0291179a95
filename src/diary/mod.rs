pub mod storage;
pub mod types;

pub use storage::DiaryStore;
pub use types::{DiaryEntry, DiaryKind};
