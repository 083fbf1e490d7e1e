pub mod classify;
pub mod config;
pub mod download;
mod error;
pub mod extract;
pub mod harvest;
pub mod models;
pub mod normalize;
pub mod organize;
pub mod pacing;
pub mod paths;
pub mod report;
pub mod runlog;
pub mod session;

pub use error::{HarvestError, Result};
