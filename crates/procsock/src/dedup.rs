//! Collapsing shared descriptors.
//!
//! A socket inherited across `fork` or passed over a Unix socket shows up
//! once per descriptor that refers to it. [`SocketSet`] keeps the first
//! observation of each socket and drops the rest.
//!
//! Records are reported newest first: the last process scanned leads the
//! listing, as `ss` on Darwin has always printed it. Ownership still goes
//! to the earliest observation.

use crate::record::SocketRecord;
use crate::types::{AddressFamily, Protocol};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::iter::Rev;

/// What makes two records the same socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    /// Protocol.
    pub protocol: Protocol,
    /// Address family.
    pub family: AddressFamily,
    /// Local port.
    pub local_port: u16,
    /// Remote port.
    pub remote_port: u16,
    /// Rendered local endpoint.
    pub local_address: String,
    /// Rendered remote endpoint.
    pub remote_address: String,
}

impl SocketRecord {
    /// Get the deduplication key of this record.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            protocol: self.protocol,
            family: self.family,
            local_port: self.local_port,
            remote_port: self.remote_port,
            local_address: self.local_address.clone(),
            remote_address: self.remote_address.clone(),
        }
    }
}

/// Set of records keyed by [`IdentityKey`], iterated newest first.
#[derive(Debug, Clone, Default)]
pub struct SocketSet {
    records: Vec<SocketRecord>,
    index: HashMap<IdentityKey, usize>,
}

impl SocketSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless one with the same identity is already present.
    ///
    /// Returns `true` if the record was added. The earlier record, and
    /// with it its owner, is kept on a collision.
    pub fn insert(&mut self, record: SocketRecord) -> bool {
        match self.index.entry(record.identity_key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    /// Check if a socket with this identity is present.
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Get the record for an identity.
    pub fn get(&self, key: &IdentityKey) -> Option<&SocketRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Iterate from the most recently inserted record to the first.
    pub fn iter(&self) -> Rev<std::slice::Iter<'_, SocketRecord>> {
        self.records.iter().rev()
    }

    /// Number of distinct sockets.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take the records, most recently inserted first.
    pub fn into_records(self) -> Vec<SocketRecord> {
        let mut records = self.records;
        records.reverse();
        records
    }
}

impl Extend<SocketRecord> for SocketSet {
    fn extend<I: IntoIterator<Item = SocketRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<SocketRecord> for SocketSet {
    fn from_iter<I: IntoIterator<Item = SocketRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for SocketSet {
    type Item = SocketRecord;
    type IntoIter = Rev<std::vec::IntoIter<SocketRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter().rev()
    }
}

impl<'a> IntoIterator for &'a SocketSet {
    type Item = &'a SocketRecord;
    type IntoIter = Rev<std::slice::Iter<'a, SocketRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
