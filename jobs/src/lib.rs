pub mod queue;
pub mod worker;

pub use queue::{ChannelJobQueue, Job, JobQueue};
pub use worker::{JobError, RetryPolicy, Worker};
