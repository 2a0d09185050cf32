//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod retry;
pub(crate) mod runner;

// Selective exports - only public utilities
pub use logger::{setup_logger, BATCH_RESULT_TARGET};
pub use runner::cancel_on_ctrl_c;
