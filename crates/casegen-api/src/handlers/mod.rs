//! HTTP handlers for casegen-api.

pub mod media;
pub mod system;
