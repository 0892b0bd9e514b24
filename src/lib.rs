//! Internet connectivity monitoring.
//!
//! `netwatch` answers one question — "does this host have live internet
//! connectivity right now?" — by periodically fetching a rotating set of
//! cheap public URLs and combining the result with the platform's own
//! link-layer up/down signal. Status changes are published on a broadcast
//! stream that only carries transitions, never heartbeats.
//!
//! The entry point is [`InternetMonitor`]:
//!
//! ```rust,ignore
//! let monitor = InternetMonitor::new();
//! let mut status = monitor.start().await;
//! while let Ok(online) = status.recv().await {
//!     println!("online: {online}");
//! }
//! ```

pub mod config;
pub mod link;
pub mod monitor;
pub mod probe;
pub mod status;

pub use config::{ConfigError, ConfigPatch, MonitorConfig};
pub use link::{AssumedUp, LinkSignal, ManualLink};
pub use monitor::InternetMonitor;
pub use status::ConnectionStatus;
