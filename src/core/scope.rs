//! Check scopes: the granularity at which options, schedules and results attach.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CheckError, Identifier};

/// Scope kind without its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Global, administrator-managed.
    Admin,
    /// A user account.
    User,
    /// A domain.
    Domain,
    /// A service inside a domain's zone.
    Service,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Domain => "domain",
            Self::Service => "service",
        };
        f.write_str(s)
    }
}

/// A scope together with its target.
///
/// Every scope except [`CheckScope::Admin`] carries a target identifier. A
/// service scope also names its domain so option layers and auto-fill can walk
/// up to the domain level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckScope {
    /// Global scope.
    Admin,
    /// User scope.
    User {
        /// Target user.
        user_id: Identifier,
    },
    /// Domain scope.
    Domain {
        /// Target domain.
        domain_id: Identifier,
    },
    /// Service scope.
    Service {
        /// Domain owning the service.
        domain_id: Identifier,
        /// Target service.
        service_id: Identifier,
    },
}

impl CheckScope {
    /// Build a scope from the nullable id triple used at API boundaries.
    ///
    /// A service id requires its domain id; a domain or service scope may carry
    /// the owner in `user_id`, which does not change the scope itself.
    pub fn from_ids(
        user_id: Option<Identifier>,
        domain_id: Option<Identifier>,
        service_id: Option<Identifier>,
    ) -> Result<Self, CheckError> {
        match (user_id, domain_id, service_id) {
            (None, None, None) => Ok(Self::Admin),
            (Some(user_id), None, None) => Ok(Self::User { user_id }),
            (_, Some(domain_id), None) => Ok(Self::Domain { domain_id }),
            (_, Some(domain_id), Some(service_id)) => Ok(Self::Service {
                domain_id,
                service_id,
            }),
            (_, None, Some(_)) => Err(CheckError::Validation(
                "service scope requires its domain id".into(),
            )),
        }
    }

    /// Kind of this scope.
    pub const fn kind(&self) -> ScopeKind {
        match self {
            Self::Admin => ScopeKind::Admin,
            Self::User { .. } => ScopeKind::User,
            Self::Domain { .. } => ScopeKind::Domain,
            Self::Service { .. } => ScopeKind::Service,
        }
    }

    /// Target identifier, `None` for the admin scope.
    pub const fn target_id(&self) -> Option<&Identifier> {
        match self {
            Self::Admin => None,
            Self::User { user_id } => Some(user_id),
            Self::Domain { domain_id } => Some(domain_id),
            Self::Service { service_id, .. } => Some(service_id),
        }
    }

    /// Domain this scope belongs to, if any.
    pub const fn domain_id(&self) -> Option<&Identifier> {
        match self {
            Self::Domain { domain_id } | Self::Service { domain_id, .. } => Some(domain_id),
            Self::Admin | Self::User { .. } => None,
        }
    }

    /// Service targeted by this scope, if any.
    pub const fn service_id(&self) -> Option<&Identifier> {
        match self {
            Self::Service { service_id, .. } => Some(service_id),
            _ => None,
        }
    }

    /// Ordered option layers that apply to this scope, least specific first.
    ///
    /// `owner` supplies the user layer for domain and service scopes.
    pub fn layer_chain(&self, owner: Option<&Identifier>) -> Vec<Self> {
        let mut chain = vec![Self::Admin];
        match self {
            Self::Admin => {}
            Self::User { .. } => chain.push(*self),
            Self::Domain { domain_id } | Self::Service { domain_id, .. } => {
                if let Some(user_id) = owner {
                    chain.push(Self::User { user_id: *user_id });
                }
                chain.push(Self::Domain {
                    domain_id: *domain_id,
                });
                if matches!(self, Self::Service { .. }) {
                    chain.push(*self);
                }
            }
        }
        chain
    }
}

impl fmt::Display for CheckScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_id() {
            Some(target) => write!(f, "{}:{target}", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}
