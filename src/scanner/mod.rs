//! Scan de-duplication
//!
//! A card held in front of the camera is decoded on many consecutive frames.
//! The [`ScanDebouncer`] lets the first read through and drops repeats of the
//! same payload until the suppression window has elapsed.

pub mod debounce;

pub use debounce::ScanDebouncer;
