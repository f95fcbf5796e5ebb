pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod records;
pub mod report;
pub mod scheduler;
pub mod ui;
pub mod utils;

pub use error::{AppError, Result};
