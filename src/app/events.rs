//! Provisioning events.
//!
//! The WiFi portal runs deep inside
//! [`ProvisioningPort::auto_connect`](super::ports::ProvisioningPort::auto_connect).
//! Instead of capturing the configuration store in a callback, the adapter
//! is handed the sending half of a bounded channel; bootstrap owns the
//! channel and drains it once the portal returns.
//!
//! ```text
//! ┌──────────────┐ ProvisioningEvent ┌──────────────┐
//! │  WiFi portal │──────────────────▶│  bootstrap   │──▶ set_save_flag()
//! └──────────────┘                   └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Sender};

/// Events the provisioning collaborator reports to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningEvent {
    /// The user saved new settings on the portal; the configuration record
    /// must be persisted on the next flush.
    SaveRequested,
}

/// Channel depth. Repeated save requests collapse into one pending flag, so
/// a full channel loses nothing.
pub const PROVISIONING_EVENT_DEPTH: usize = 4;

/// Single-threaded channel: the portal and bootstrap share one thread.
pub type ProvisioningChannel =
    Channel<NoopRawMutex, ProvisioningEvent, PROVISIONING_EVENT_DEPTH>;

/// Sending half handed to the provisioning adapter.
pub type ProvisioningSender<'a> =
    Sender<'a, NoopRawMutex, ProvisioningEvent, PROVISIONING_EVENT_DEPTH>;

/// Post an event, dropping it when the channel is full.
pub fn notify(sender: &ProvisioningSender<'_>, event: ProvisioningEvent) {
    if sender.try_send(event).is_err() {
        log::debug!("provisioning: event channel full, {:?} coalesced", event);
    }
}
