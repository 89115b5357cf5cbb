//! Live Studio Service Library Crate
//!
//! Environment configuration and the file-backed audio/video I/O used by the `studio`
//! binary. The binary itself is a thin wrapper that wires these into a live session.

pub mod capture;
pub mod config;
pub mod recorder;
