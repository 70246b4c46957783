//! Measurement execution engine.
//!
//! Contains the single-slot execution queue that serialises access to the
//! measurement tool, plus the task that runs one job through the tool and
//! records the outcome in the job store.

pub mod queue;
pub mod task;

pub use queue::{ExecutionQueue, QueueClosed, QueueTask, Reservation};
pub use task::{measurement_task, run_measurement};
