//! Foundation utilities shared across the engine
//!
//! Provides math type aliases and logging setup. These are deliberately thin:
//! the heavy lifting lives in `nalgebra` and `log`/`env_logger`.

pub mod logging;
pub mod math;
