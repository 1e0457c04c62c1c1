//! The keel library.
//!
//! Keel collects two foundation primitives that most of our higher-level code stands on:
//!
//! - [`set`]: a separately-chained hash set whose hashing, element-reaping and node-allocation
//!   behavior are all pluggable policies, with cheap epoch-validated cursors.
//! - [`buffer`]: a bounded byte window which mediates between in-memory byte sequences and an
//!   external byte source/sink (a "conduit"), with zero-copy reads and scanner-driven
//!   tokenization.
//!
//! The two components are independent: neither knows about the other, and both are leaves in the
//! dependency graph of whatever is built on top.
//!
//! [`set`]: set/index.html
//! [`buffer`]: buffer/index.html

#![warn(missing_docs)]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate slog;
extern crate seahash;

pub mod buffer;
pub mod set;
