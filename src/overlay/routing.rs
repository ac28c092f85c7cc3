use super::types::{Contact, NodeId};

use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Upper bound on contacts kept; the farthest are evicted first.
const MAX_CONTACTS: usize = 512;

#[derive(Debug, Clone)]
struct Entry {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Flat XOR-metric contact table.
pub struct RoutingTable {
    local_id: NodeId,
    contacts: DashMap<NodeId, Entry>,
}

impl RoutingTable {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            contacts: DashMap::new(),
        }
    }

    /// Inserts or refreshes a contact. The local node is never stored.
    pub fn insert(&self, contact: Contact) {
        if contact.id == self.local_id {
            return;
        }

        if let Some(mut existing) = self.contacts.get_mut(&contact.id) {
            existing.addr = contact.addr;
            existing.last_seen = Instant::now();
            return;
        }

        if self.contacts.len() >= MAX_CONTACTS {
            let farthest = self
                .contacts
                .iter()
                .map(|entry| *entry.key())
                .max_by_key(|id| id.distance(&self.local_id));
            if let Some(farthest) = farthest {
                if farthest.distance(&self.local_id) <= contact.id.distance(&self.local_id) {
                    return;
                }
                self.contacts.remove(&farthest);
            }
        }

        tracing::debug!("Added contact {:?} at {}", contact.id, contact.addr);
        self.contacts.insert(
            contact.id,
            Entry {
                addr: contact.addr,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &NodeId) {
        self.contacts.remove(id);
    }

    /// Up to `count` contacts ordered by distance to `target`.
    pub fn closest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        let mut all = self.all();
        all.sort_by_key(|contact| contact.id.distance(target));
        all.truncate(count);
        all
    }

    pub fn all(&self) -> Vec<Contact> {
        self.contacts
            .iter()
            .map(|entry| Contact {
                id: *entry.key(),
                addr: entry.value().addr,
            })
            .collect()
    }

    /// Seconds since each contact was last heard from.
    pub fn ages(&self) -> Vec<(Contact, u64)> {
        self.contacts
            .iter()
            .map(|entry| {
                (
                    Contact {
                        id: *entry.key(),
                        addr: entry.value().addr,
                    },
                    entry.value().last_seen.elapsed().as_secs(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
