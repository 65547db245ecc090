pub mod error;
pub mod provider;
pub mod types;
pub mod validate;
