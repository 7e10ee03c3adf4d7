pub mod jobs;

pub use jobs::{
    JobPhase, JobTracker, RequestContext, Scheduler, SubscriptionTier, TrackedJob,
};
