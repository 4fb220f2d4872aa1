pub mod draft_storage;
pub mod http_executor;

pub use draft_storage::{draft_key, DraftRepository, FileDraftRepository, InMemoryDraftRepository};
pub use http_executor::HttpExecutor;
