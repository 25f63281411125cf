//! Scoped option resolution.
//!
//! Effective options for a run are built in ascending precedence:
//!
//! 1. defaults documented by the checker,
//! 2. stored admin layer,
//! 3. stored user layer,
//! 4. stored domain layer,
//! 5. stored service layer,
//! 6. runtime options from the trigger (or the schedule),
//! 7. auto-fill values from collaborator lookups.
//!
//! Auto-fill always wins. When a lookup is unavailable (no port, missing
//! entity) the auto-filled key is removed rather than left to lower layers.

use std::sync::Arc;

use crate::config::ResolverConfig;

use super::{
    merge_options, AutoFill, CheckError, CheckScope, CheckerOptions, CheckerRegistry,
    DomainInfo, DomainStore, Identifier, IdentityStore, OptionLayer, OptionStore, OptionsDoc,
    ZoneStore,
};

/// Values computed for auto-filled options.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct AutoFillValues {
    domain_name: Option<String>,
    owner_email: Option<String>,
    subdomain: Option<String>,
    service_type: Option<String>,
}

impl AutoFillValues {
    fn get(&self, source: AutoFill) -> Option<&String> {
        match source {
            AutoFill::None => None,
            AutoFill::DomainName => self.domain_name.as_ref(),
            AutoFill::OwnerEmail => self.owner_email.as_ref(),
            AutoFill::Subdomain => self.subdomain.as_ref(),
            AutoFill::ServiceType => self.service_type.as_ref(),
        }
    }
}

/// Turn a `NotFound` lookup into `None`, surface everything else.
fn optional<T>(lookup: Result<T, CheckError>) -> Result<Option<T>, CheckError> {
    match lookup {
        Ok(value) => Ok(Some(value)),
        Err(CheckError::NotFound(what)) => {
            tracing::debug!(%what, "auto-fill lookup found nothing");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Resolves stored and effective checker options.
pub struct OptionResolver {
    registry: Arc<CheckerRegistry>,
    store: Arc<dyn OptionStore>,
    identities: Option<Arc<dyn IdentityStore>>,
    domains: Option<Arc<dyn DomainStore>>,
    zones: Option<Arc<dyn ZoneStore>>,
    config: ResolverConfig,
}

impl OptionResolver {
    /// Resolver without collaborator ports; auto-filled keys are left out.
    pub fn new(registry: Arc<CheckerRegistry>, store: Arc<dyn OptionStore>) -> Self {
        Self {
            registry,
            store,
            identities: None,
            domains: None,
            zones: None,
            config: ResolverConfig::default(),
        }
    }

    /// Attach the identity port used for `owner_email`.
    #[must_use]
    pub fn with_identities(mut self, identities: Arc<dyn IdentityStore>) -> Self {
        self.identities = Some(identities);
        self
    }

    /// Attach the domain port used for `domain_name`.
    #[must_use]
    pub fn with_domains(mut self, domains: Arc<dyn DomainStore>) -> Self {
        self.domains = Some(domains);
        self
    }

    /// Attach the zone port used for service auto-fill.
    #[must_use]
    pub fn with_zones(mut self, zones: Arc<dyn ZoneStore>) -> Self {
        self.zones = Some(zones);
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Registry used for descriptor lookups.
    pub fn registry(&self) -> &Arc<CheckerRegistry> {
        &self.registry
    }

    /// Merge of the stored layers applying to `scope`, without defaults.
    ///
    /// Unknown checkers still get their stored layers.
    pub async fn get_stored_no_default(
        &self,
        checker_name: &str,
        owner_id: Option<&Identifier>,
        scope: &CheckScope,
    ) -> Result<CheckerOptions, CheckError> {
        let mut merged = CheckerOptions::new();
        for layer_scope in scope.layer_chain(owner_id) {
            if let Some(layer) = self.store.get_layer(checker_name, &layer_scope).await? {
                merge_options(&mut merged, &layer.options);
            }
        }
        Ok(merged)
    }

    /// Options stored on exactly this scope's layer.
    pub async fn get_layer_options(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<Option<CheckerOptions>, CheckError> {
        Ok(self
            .store
            .get_layer(checker_name, scope)
            .await?
            .map(|layer| layer.options))
    }

    /// Effective options for a run.
    pub async fn build_merged(
        &self,
        checker_name: &str,
        owner_id: Option<&Identifier>,
        scope: &CheckScope,
        runtime: &CheckerOptions,
    ) -> Result<CheckerOptions, CheckError> {
        let doc = self.registry.get(checker_name).ok().map(|c| c.options_doc());

        let mut merged = doc.as_ref().map(OptionsDoc::defaults).unwrap_or_default();
        let stored = self.get_stored_no_default(checker_name, owner_id, scope).await?;
        merge_options(&mut merged, &stored);
        merge_options(&mut merged, runtime);

        if let Some(doc) = doc {
            let fills = doc.auto_fills();
            if !fills.is_empty() {
                let owner_id = owner_id.copied().or(match scope {
                    CheckScope::User { user_id } => Some(*user_id),
                    _ => None,
                });
                let values = self
                    .auto_fill_values(owner_id.as_ref(), scope, &fills)
                    .await?;
                for (id, source) in fills {
                    match values.get(source) {
                        Some(value) => {
                            merged.insert(id.to_string(), serde_json::Value::String(value.clone()));
                        }
                        None => {
                            merged.remove(id);
                        }
                    }
                }
            }
        }
        Ok(merged)
    }

    async fn auto_fill_values(
        &self,
        owner_id: Option<&Identifier>,
        scope: &CheckScope,
        fills: &[(&str, AutoFill)],
    ) -> Result<AutoFillValues, CheckError> {
        let wants = |source: AutoFill| fills.iter().any(|(_, s)| *s == source);
        let mut values = AutoFillValues::default();

        if wants(AutoFill::OwnerEmail) {
            if let (Some(identities), Some(owner_id)) = (&self.identities, owner_id) {
                values.owner_email = optional(identities.get_user(owner_id).await)?.map(|u| u.email);
            }
        }

        let needs_domain =
            wants(AutoFill::DomainName) || wants(AutoFill::Subdomain) || wants(AutoFill::ServiceType);
        let domain: Option<DomainInfo> = match (&self.domains, scope.domain_id()) {
            (Some(domains), Some(domain_id)) if needs_domain => {
                optional(domains.get_domain(domain_id).await)?
            }
            _ => None,
        };

        if let Some(domain) = &domain {
            values.domain_name = Some(domain.name.clone());
        }

        let needs_service = wants(AutoFill::Subdomain) || wants(AutoFill::ServiceType);
        if let (true, Some(zones), Some(service_id), Some(zone_id)) = (
            needs_service,
            &self.zones,
            scope.service_id(),
            domain.as_ref().and_then(|d| d.current_zone_id),
        ) {
            if let Some(zone) = optional(zones.get_zone(&zone_id).await)? {
                if let Some(service) = zone.services.into_iter().find(|s| &s.id == service_id) {
                    values.subdomain = Some(service.subdomain);
                    values.service_type = Some(service.service_type);
                }
            }
        }

        Ok(values)
    }

    /// Replace the layer at `scope` wholesale.
    pub async fn set_options(
        &self,
        checker_name: &str,
        owner_id: Option<Identifier>,
        scope: &CheckScope,
        options: CheckerOptions,
    ) -> Result<(), CheckError> {
        self.validate_layer(checker_name, scope, &options)?;
        let layer = OptionLayer {
            checker_name: checker_name.to_string(),
            owner_id: layer_owner(owner_id, scope),
            scope: *scope,
            options,
        };
        self.store.put_layer(layer).await
    }

    /// Merge `options` key by key into the layer at `scope`; nothing is removed.
    pub async fn overwrite_some(
        &self,
        checker_name: &str,
        owner_id: Option<Identifier>,
        scope: &CheckScope,
        options: CheckerOptions,
    ) -> Result<CheckerOptions, CheckError> {
        self.validate_layer(checker_name, scope, &options)?;
        let layer = self
            .store
            .merge_layer(checker_name, scope, layer_owner(owner_id, scope), options)
            .await?;
        Ok(layer.options)
    }

    /// Remove the layer at `scope`.
    pub async fn delete_options(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<bool, CheckError> {
        self.store.delete_layer(checker_name, scope).await
    }

    /// Check runtime options against the checker's documentation when strict.
    pub fn validate_runtime(
        &self,
        checker_name: &str,
        options: &CheckerOptions,
    ) -> Result<(), CheckError> {
        if !self.config.strict_options {
            return Ok(());
        }
        let doc = self.registry.get(checker_name)?.options_doc();
        if let Some(unknown) = options.keys().find(|k| !doc.accepts_runtime(k)) {
            return Err(CheckError::Validation(format!(
                "option `{unknown}` is not a run option of checker `{checker_name}`"
            )));
        }
        Ok(())
    }

    fn validate_layer(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        options: &CheckerOptions,
    ) -> Result<(), CheckError> {
        if !self.config.strict_options {
            return Ok(());
        }
        let doc = self.registry.get(checker_name)?.options_doc();
        if let Some(unknown) = options.keys().find(|k| !doc.accepts(scope.kind(), k)) {
            return Err(CheckError::Validation(format!(
                "option `{unknown}` is not documented for {} layers of checker `{checker_name}`",
                scope.kind()
            )));
        }
        Ok(())
    }
}

/// Admin layers have no owner; user layers are owned by their user.
const fn layer_owner(owner_id: Option<Identifier>, scope: &CheckScope) -> Option<Identifier> {
    match scope {
        CheckScope::Admin => None,
        CheckScope::User { user_id } => Some(*user_id),
        CheckScope::Domain { .. } | CheckScope::Service { .. } => owner_id,
    }
}
