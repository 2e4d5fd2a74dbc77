//! Process-to-process channel fan-out over Redis pub/sub.
//!
//! The primitive every higher layer builds on: small JSON messages
//! published to string-named channels, fanned out to all subscribed
//! connections on any server process.
//!
//! # Core Invariants
//!
//! 1. **Two connections**: one issues commands, a second is kept
//!    exclusively in subscribe mode (the protocol disallows mixing)
//! 2. **Atomic fan-out**: a multi-channel publish runs as one server-side
//!    script, so partial fan-out cannot occur
//! 3. **Fail fast**: a lost connection surfaces to publishers as errors and
//!    to subscribers as closed receivers, never as silent drops
//! 4. **Ordered drain**: `close()` stops the listener and drops
//!    subscriptions before either connection goes away

pub mod bus;
mod any;
mod error;
mod memory;
mod redis_bus;

#[cfg(test)]
mod tests;

pub use any::AnyBus;
pub use bus::{Bus, BusMessage, SUBSCRIBER_BUFFER};
pub use error::{TransportError, TransportResult};
pub use memory::MemoryBus;
pub use redis_bus::RedisBus;
