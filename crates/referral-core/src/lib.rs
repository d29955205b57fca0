pub mod cache;
pub mod config;
pub mod error;
pub mod grouper;
pub mod io;
pub mod matcher;
pub mod names;
pub mod paths;
pub mod pipeline;
pub mod records;
pub mod render;
pub mod tables;
pub mod timestamp;

pub use error::{ReferralError, Result};
