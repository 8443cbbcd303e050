pub mod engine;
pub mod subscription;
pub mod topic;

pub use engine::{Dispatcher, PublishReport};
pub use subscription::{Subscription, SubscriptionGuard, SubscriptionId};
pub use topic::Handler;
