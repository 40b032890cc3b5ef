pub mod config;
pub mod error;
pub mod input;
pub mod process;

pub use error::{Error, Result};
