// SPDX-License-Identifier: MIT
//! Tri-state connectivity status and the transition rule.

/// Last known connectivity status.
///
/// `Unknown` only ever occurs before the first probe result (or link-layer
/// verdict) of a start/stop cycle has been determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Unknown,
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Nullable-boolean view: `None` while the status is still `Unknown`.
    pub fn as_online(&self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Online => Some(true),
            Self::Offline => Some(false),
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// The stream carries transitions only: a probe result is published iff no
/// status was ever published this cycle, or it differs from the last one.
///
/// Returns the new status to record and publish, or `None` when the result
/// is a duplicate of `last` and nothing should be emitted.
pub(crate) fn next_emission(last: ConnectionStatus, online: bool) -> Option<ConnectionStatus> {
    let next = ConnectionStatus::from_online(online);
    if last == next {
        None
    } else {
        Some(next)
    }
}
