pub mod commands;
pub mod error;
pub mod http;
pub mod index;
pub mod package;
pub mod query;
pub mod repo;
pub mod runtime;

pub use error::Error;
