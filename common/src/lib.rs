// Re-export commonly used items
pub mod types;

// Convenience re-exports
pub use types::{
    CompletionChoice, CompletionRequest, CompletionResponse, ModelEntry, ModelList, Usage,
};
