pub mod amount;
pub mod errors;
pub mod models;
pub mod receipt;
pub mod services;
pub mod session;
pub mod split;
