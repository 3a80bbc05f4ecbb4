pub mod error;
pub mod misc;
pub mod processor;
