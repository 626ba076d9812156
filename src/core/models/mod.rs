pub mod expense;
pub mod group;
pub mod participant;
pub mod receipt;
pub mod user;
