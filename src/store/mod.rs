mod memory;
pub mod pubsub;
mod state;

pub use memory::{CoalescingStore, InflightGuard, Lookup, Waiter};
pub use pubsub::{PubSub, Subscription};
pub use state::{Outcome, RequestState, StoreEvent};
