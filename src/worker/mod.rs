//! Claim-and-execute worker pool.
//!
//! The pool polls the shared store on a fixed interval. Each cycle it:
//!
//! 1. Lists up to N queued, unlocked jobs (N = max concurrency)
//! 2. Claims each candidate with an atomic compare-and-swap
//! 3. Dispatches claimed jobs to concurrent executor tasks
//! 4. Waits for every task in the cycle before polling again
//!
//! Executor tasks re-verify ownership before running, contain handler
//! failures at the job level, and drive the retry/terminal transitions.

pub mod pool;

pub use pool::WorkerPool;
