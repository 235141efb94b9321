//! Client session assembly.
//!
//! Pings from every partition are grouped by client id, then each client's
//! pings are ordered by creation time. Pings without a client id are
//! dropped silently. A client whose pings cannot all be ordered (a missing
//! or non-numeric timestamp) is discarded as a whole.

use lv_common::{ClientId, Ping};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// One client's chronologically ordered pings. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub pings: Vec<Ping>,
}

impl ClientSession {
    /// Order `pings` by creation timestamp.
    ///
    /// Returns `None` if `pings` is empty or any ping lacks a usable
    /// timestamp. The sort is stable: pings with equal timestamps keep
    /// their arrival order.
    pub fn from_pings(client_id: ClientId, pings: Vec<Ping>) -> Option<Self> {
        if pings.is_empty() {
            return None;
        }
        let mut keyed = Vec::with_capacity(pings.len());
        for ping in pings {
            let ts = ping.creation_timestamp()?;
            keyed.push((ts, ping));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self {
            client_id,
            pings: keyed.into_iter().map(|(_, ping)| ping).collect(),
        })
    }

    pub fn first(&self) -> &Ping {
        &self.pings[0]
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }
}

/// Counters from one assembly pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub pings: usize,
    pub pings_without_client: usize,
    pub sessions: usize,
    pub unsortable_sessions: usize,
}

/// Group pings by client and order each client's history.
///
/// Sessions come back ordered by client id.
pub fn assemble_sessions(
    pings: impl IntoIterator<Item = Ping>,
) -> (Vec<ClientSession>, AssemblyStats) {
    let mut stats = AssemblyStats::default();
    let mut by_client: BTreeMap<ClientId, Vec<Ping>> = BTreeMap::new();

    for ping in pings {
        stats.pings += 1;
        match ping.client_id() {
            Some(client_id) => by_client.entry(client_id).or_default().push(ping),
            None => stats.pings_without_client += 1,
        }
    }

    let mut sessions = Vec::with_capacity(by_client.len());
    for (client_id, pings) in by_client {
        let count = pings.len();
        match ClientSession::from_pings(client_id.clone(), pings) {
            Some(session) => sessions.push(session),
            None => {
                stats.unsortable_sessions += 1;
                warn!(
                    client_id = %client_id,
                    pings = count,
                    "discarding session with unsortable timestamps"
                );
            }
        }
    }
    stats.sessions = sessions.len();
    (sessions, stats)
}
