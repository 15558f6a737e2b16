//! Per-peer bookkeeping and discovery classification.
//!
//! [`classify_discovery`] extracts the decision chain of the discovery
//! handler into a stateless classifier; the scheduler applies the resulting
//! [`DiscoveryOutcome`] against its own state and the transport.

use tcn_core::advertisement::ServiceData;
use tcn_core::types::{ShortIdentifier, TemporaryContactNumber};

use crate::dedup::ShortIdCache;
use crate::transport::PeerId;

/// Link-level state of a tracked peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Discovered,
    Connecting,
    DiscoveringServices,
    Transferring,
    Idle,
}

/// Which transfer the peer is queued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRole {
    /// Read the peer's token over a connection.
    ReadToken,
    /// Write our token to the peer (it relays for devices it bridges).
    WriteToken,
    None,
}

/// A peer tracked by the scheduler.
///
/// Created on first discovery, reset to `Idle` on disconnect (the captured
/// token survives so rediscovery re-reports it), destroyed on flush.
#[derive(Debug, Clone)]
pub struct Peer {
    pub identity: PeerId,
    pub link_state: LinkState,
    pub role: TransferRole,
    pub last_observed_token: Option<TemporaryContactNumber>,
    pub estimated_distance_meters: Option<f64>,
}

impl Peer {
    pub fn new(identity: PeerId) -> Self {
        Self {
            identity,
            link_state: LinkState::Discovered,
            role: TransferRole::None,
            last_observed_token: None,
            estimated_distance_meters: None,
        }
    }
}

/// What to do with a discovery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A token for this identity was captured earlier; re-report it.
    ReportCached,
    /// The advertisement carries a token; report it, no connection.
    ReportOnly { token: TemporaryContactNumber },
    /// Bridged advertisement from a connectable relay we have not served
    /// yet; report the token and queue a write transfer.
    ReportAndQueueWrite {
        token: TemporaryContactNumber,
        short_id: ShortIdentifier,
    },
    /// No usable service data; queue a read transfer.
    QueueRead,
    /// Service data of invalid length; ignore the advertisement.
    Malformed { len: usize },
    /// Nothing to do (no token, not connectable).
    Skip,
}

/// Classify a discovery event.
///
/// `already_captured` is whether a token for this identity is on record;
/// `served_short_ids` holds the relays we already wrote a token to.
pub fn classify_discovery(
    service_data: Option<&[u8]>,
    connectable: bool,
    already_captured: bool,
    served_short_ids: &ShortIdCache,
) -> DiscoveryOutcome {
    if already_captured {
        return DiscoveryOutcome::ReportCached;
    }
    match service_data {
        Some(raw) => match ServiceData::parse(raw) {
            Ok(ServiceData::Token(token)) => DiscoveryOutcome::ReportOnly { token },
            Ok(ServiceData::Bridged { token, short_id }) => {
                if connectable && !served_short_ids.contains(&short_id) {
                    DiscoveryOutcome::ReportAndQueueWrite { token, short_id }
                } else {
                    DiscoveryOutcome::ReportOnly { token }
                }
            }
            Err(_) => DiscoveryOutcome::Malformed { len: raw.len() },
        },
        None => {
            if connectable {
                DiscoveryOutcome::QueueRead
            } else {
                DiscoveryOutcome::Skip
            }
        }
    }
}
