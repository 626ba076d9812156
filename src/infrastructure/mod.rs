pub mod api;
pub mod token_store;
