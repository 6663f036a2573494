pub mod auth;
pub mod entry;
