//! Content hashing for Relaxo.
//!
//! Every object digest is a BLAKE3 hash prefixed with a per-kind domain tag,
//! so a blob and a tree that happen to share bytes never share an address.
//! Collision resistance is load-bearing here: deduplication and integrity
//! checks both trust that equal digests mean equal content.

pub mod hasher;

pub use hasher::ContentHasher;
