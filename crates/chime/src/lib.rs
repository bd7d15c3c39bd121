//! Host-side pieces of the `chime` binary that are useful to tests:
//! currently just the file-backed notifier.

pub mod file_notifier;

pub use file_notifier::FileNotifier;
