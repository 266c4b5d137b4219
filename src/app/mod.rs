//! Application core: bootstrap sequencing and the runtime loop. No direct I/O.
//!
//! Everything here talks to the outside world through the **port traits**
//! in [`ports`], so the whole boot path and every loop iteration can be
//! exercised with mock adapters on the host.

pub mod bootstrap;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod store;
pub mod web;

pub use bootstrap::{BootError, BootStage, bootstrap};
pub use runtime::{Device, LoopControl, RestartReason, run};
