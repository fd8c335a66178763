//! Shared utility functions

pub mod crypto;
pub mod file;
pub mod time;
