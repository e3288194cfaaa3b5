pub mod config;
pub mod coverage;
pub mod error;
pub mod formats;
pub mod handlers;
pub mod index;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
