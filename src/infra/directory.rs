//! In-memory identity, domain and zone directory.
//!
//! Hosts that embed the check subsystem wire their own stores; this one backs
//! tests, benches and standalone deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::{
    CheckError, DomainInfo, DomainStore, Identifier, IdentityStore, UserInfo, ZoneInfo, ZoneStore,
};

#[derive(Debug, Default)]
struct Records {
    users: HashMap<Identifier, UserInfo>,
    domains: HashMap<Identifier, DomainInfo>,
    zones: HashMap<Identifier, ZoneInfo>,
}

/// Directory holding users, domains and zones in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<Records>,
}

impl InMemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn insert_user(&self, user: UserInfo) {
        self.records.write().users.insert(user.id, user);
    }

    /// Insert or replace a domain.
    pub fn insert_domain(&self, domain: DomainInfo) {
        self.records.write().domains.insert(domain.id, domain);
    }

    /// Insert or replace a zone.
    pub fn insert_zone(&self, zone: ZoneInfo) {
        self.records.write().zones.insert(zone.id, zone);
    }

    /// Remove a user; returns whether it existed.
    pub fn remove_user(&self, id: &Identifier) -> bool {
        self.records.write().users.remove(id).is_some()
    }

    /// Remove a domain; returns whether it existed.
    pub fn remove_domain(&self, id: &Identifier) -> bool {
        self.records.write().domains.remove(id).is_some()
    }
}

#[async_trait]
impl IdentityStore for InMemoryDirectory {
    async fn get_user(&self, id: &Identifier) -> Result<UserInfo, CheckError> {
        self.records
            .read()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| CheckError::NotFound(format!("user {id}")))
    }
}

#[async_trait]
impl DomainStore for InMemoryDirectory {
    async fn get_domain(&self, id: &Identifier) -> Result<DomainInfo, CheckError> {
        self.records
            .read()
            .domains
            .get(id)
            .cloned()
            .ok_or_else(|| CheckError::NotFound(format!("domain {id}")))
    }

    async fn list_user_domains(&self, user_id: &Identifier) -> Result<Vec<DomainInfo>, CheckError> {
        let mut domains: Vec<_> = self
            .records
            .read()
            .domains
            .values()
            .filter(|d| &d.owner_id == user_id)
            .cloned()
            .collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(domains)
    }
}

#[async_trait]
impl ZoneStore for InMemoryDirectory {
    async fn get_zone(&self, id: &Identifier) -> Result<ZoneInfo, CheckError> {
        self.records
            .read()
            .zones
            .get(id)
            .cloned()
            .ok_or_else(|| CheckError::NotFound(format!("zone {id}")))
    }
}
