//! Integration test crate for Cutline.
//!
//! Holds cross-crate tests: timeline files through export, and the full
//! preview loop from transport ticks to output batches.

#[cfg(test)]
mod files;

#[cfg(test)]
mod preview;
