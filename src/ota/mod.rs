//! Over-The-Air firmware updates.
//!
//! | Module    | Role                                                  |
//! |-----------|-------------------------------------------------------|
//! | `manager` | Partition writes, SHA-256 verification, boot switch   |
//! | `auth`    | HMAC-SHA256 challenge keyed by the OTA password       |
//! | `service` | TCP listener implementing [`OtaPort`]                 |
//! | `client`  | Uploader side of the session (`ota-upload` tool)      |
//!
//! [`OtaPort`]: crate::app::ports::OtaPort

pub mod auth;
pub mod client;
pub mod manager;
pub mod service;

pub use manager::{OtaError, OtaManager, OtaState, check_rollback};
pub use service::OtaService;

/// What one [`OtaPort::handle`](crate::app::ports::OtaPort::handle) call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaPoll {
    /// No session was pending.
    Idle,
    /// A client connected but failed authorisation.
    Rejected,
    /// A verified image was written and marked bootable; restart to run it.
    Applied,
}
