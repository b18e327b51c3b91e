//! Ledger events and the pub/sub mechanics used to distribute them.
//!
//! The ledger publishes facts here after they are committed; consumers
//! (metrics sinks, reorder notifiers, cache warmers) subscribe.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
