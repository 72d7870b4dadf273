//! Shared helpers.

pub mod fs;

pub use fs::{atomic_write, ensure_dir, make_owner_writable, probe_writable, write_if_changed};
