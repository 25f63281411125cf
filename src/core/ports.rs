//! Collaborator ports consumed by the check subsystem.
//!
//! Lookups for missing entities return [`CheckError::NotFound`]; any other
//! error is treated as data-tier breakage and surfaced to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CheckError, Identifier};

/// Identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User id.
    pub id: Identifier,
    /// Contact address.
    pub email: String,
}

/// Domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Domain id.
    pub id: Identifier,
    /// Fully qualified name, e.g. `example.com.`.
    pub name: String,
    /// Owning user.
    pub owner_id: Identifier,
    /// Zone currently published for the domain.
    #[serde(default)]
    pub current_zone_id: Option<Identifier>,
}

/// Service inside a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service id.
    pub id: Identifier,
    /// Subdomain relative to the zone origin (empty for the apex).
    pub subdomain: String,
    /// Service type tag, e.g. `abstract.MXs`.
    pub service_type: String,
}

/// Zone record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    /// Zone id.
    pub id: Identifier,
    /// Services in the zone.
    pub services: Vec<ServiceInfo>,
}

/// Identity lookups.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a user.
    async fn get_user(&self, id: &Identifier) -> Result<UserInfo, CheckError>;
}

/// Domain lookups.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Fetch a domain.
    async fn get_domain(&self, id: &Identifier) -> Result<DomainInfo, CheckError>;
    /// Domains owned by a user.
    async fn list_user_domains(&self, user_id: &Identifier) -> Result<Vec<DomainInfo>, CheckError>;
}

/// Zone lookups.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Fetch a zone.
    async fn get_zone(&self, id: &Identifier) -> Result<ZoneInfo, CheckError>;
}
