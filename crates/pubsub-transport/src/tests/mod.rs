//! Integration tests for the transport.
//!
//! These run against [`MemoryBus`], which carries the same contract as the
//! Redis adapter: atomic multi-channel fan-out, per-channel publish order,
//! closed receivers on teardown.

mod ordering;
