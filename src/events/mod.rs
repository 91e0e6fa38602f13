//! Event layer for Parley.
//!
//! Two producers feed the engine:
//!
//! - the **push transport** delivers [`StreamEvent`]s as they happen, in
//!   arbitrary order and possibly duplicated;
//! - the **task poller** periodically re-fetches scheduled task results and
//!   replays them as events.
//!
//! Both publish to the same [`EventBus`]; the store's dispatch loop is the
//! only consumer that mutates state, which keeps merging sequential even
//! though the producers are concurrent.

mod bus;
mod types;

pub use bus::{BusError, EventBus, EventReceiver, EventSender};
pub use types::{ComponentKind, EventOp, StreamEvent};
