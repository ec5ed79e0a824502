//! Core engine services
//!
//! Hosts the unified configuration system. Rendering itself lives under
//! [`crate::render`].

pub mod config;
