//! # presspool - parallel document compression on a worker pool
//!
//! A fixed-size pool of isolated execution units, each owning its own
//! compression engine. Tasks are queued in FIFO order, dispatched to the
//! lowest-numbered idle unit, and settled through a pending-task table keyed
//! by correlation id, so results may complete in any order.
//!
//! ## Quick Start
//!
//! ```bash
//! # Compress a batch of PDFs next to their inputs
//! presspool compress reports/*.pdf
//!
//! # Four units, maximum level, outputs into ./out
//! presspool compress -w 4 -l 9 -o out reports/*.pdf
//! ```
//!
//! The pool itself is usable as a library, see [`pool::WorkerPool`].

pub mod cli;
pub mod config;
pub mod pool;
pub mod shared;

pub use cli::{Cli, Output};
pub use config::PressConfig;
pub use pool::{PoolError, WorkerPool};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
