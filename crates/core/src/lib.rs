//! Domain logic for the powerbench measurement queue.
//!
//! Nothing in this crate knows about HTTP. The API crate wires these pieces
//! into request handlers and the execution queue.

pub mod error;
pub mod job;
pub mod measurement;
pub mod types;
pub mod validation;
