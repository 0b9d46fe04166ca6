//! Concurrency utilities of the bulk engine.
//!
//! Operations run sequentially, the only coordination needed is the cancellation of an
//! operation from another task.

pub mod cancel;
