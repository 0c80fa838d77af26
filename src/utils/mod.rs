//! Small shared helpers.

pub mod exec;
pub mod hash;
pub mod mime;
