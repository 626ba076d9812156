pub mod config;
pub mod core;
pub mod infrastructure;

pub use crate::core::errors::ChiaTienError;
pub use crate::core::services::{ExpenseDraft, ExpenseService};
pub use crate::core::session::AuthSession;
pub use crate::core::split::{SplitAllocation, SplitAllocator, SplitMode};
pub use crate::infrastructure::api::{RequestContext, http_client::HttpBackend, in_memory::InMemoryBackend};
pub use crate::infrastructure::token_store::{file::FileTokenStore, in_memory::InMemoryTokenStore};

#[cfg(test)]
mod tests;
