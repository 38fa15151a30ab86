use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};

use super::conn_act::ActSession;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    address: String,
    port: u16,
    protocol: PrinterProtocol,
}

impl CacheKey {
    pub(crate) fn for_target(target: &PrinterTarget) -> Self {
        Self {
            address: target.address.clone(),
            port: target.port,
            protocol: target.protocol,
        }
    }
}

/// Idle ACT sessions kept for reuse between commands.
///
/// Checkout removes the entry, so a session is never shared between two
/// in-flight commands; it is re-inserted only after a clean completion. A
/// session that errored is simply dropped, which closes its socket.
pub(crate) struct ConnCache {
    entries: DashMap<CacheKey, CacheEntry>,
    idle_ttl: Duration,
}

struct CacheEntry {
    session: ActSession,
    last_used: Instant,
}

impl ConnCache {
    pub(crate) fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    pub(crate) fn take(&self, key: &CacheKey) -> Option<ActSession> {
        let (_, entry) = self.entries.remove(key)?;
        if entry.last_used.elapsed() > self.idle_ttl {
            trace!("dropping idle connection to {}:{}", key.address, key.port);
            return None;
        }
        Some(entry.session)
    }

    pub(crate) fn put(&self, key: CacheKey, session: ActSession) {
        self.entries.insert(
            key,
            CacheEntry {
                session,
                last_used: Instant::now(),
            },
        );
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
