//! Scheduling — jobs, the executor, and batching.
//!
//! The executor maps every planned call to exactly one [`Job`], starts jobs
//! as their prerequisites and ordering constraints allow, and propagates the
//! first failure by cancelling everything else. The [`Batcher`] sits in
//! front of planning and fans a single entry out across packages.

mod batch;
mod executor;
mod job;

pub use batch::{Batcher, SingleBatcher, TargetBatcher};
pub use executor::Executor;
pub use job::Job;
