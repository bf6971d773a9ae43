#![forbid(unsafe_code)]

pub use error::Error;

pub mod error;
pub mod resolve;
