//! Foundation module - process-wide utilities
//!
//! Currently only the logging bootstrap lives here.

pub mod logging;
