//! Checker options, option documentation and stored option layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CheckScope, Identifier, ScopeKind};

/// Option id to JSON value.
pub type CheckerOptions = BTreeMap<String, serde_json::Value>;

/// Copy every key of `layer` over `base`.
pub fn merge_options(base: &mut CheckerOptions, layer: &CheckerOptions) {
    for (key, value) in layer {
        base.insert(key.clone(), value.clone());
    }
}

/// Source of a value computed from a collaborator lookup instead of storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFill {
    /// Plain option.
    #[default]
    None,
    /// Name of the target domain.
    DomainName,
    /// E-mail address of the owning user.
    OwnerEmail,
    /// Subdomain the target service lives on.
    Subdomain,
    /// Type tag of the target service.
    ServiceType,
}

/// Documentation of a single option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDoc {
    /// Option id (map key).
    pub id: String,
    /// Human label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Value used when no layer provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Auto-fill source, if any.
    #[serde(default)]
    pub auto_fill: AutoFill,
}

impl OptionDoc {
    /// Plain option without default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            default: None,
            auto_fill: AutoFill::None,
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a default value.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark as auto-filled.
    #[must_use]
    pub const fn with_auto_fill(mut self, auto_fill: AutoFill) -> Self {
        self.auto_fill = auto_fill;
        self
    }
}

/// Options documented by a checker, grouped by the level that sets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsDoc {
    /// Options supplied per run.
    #[serde(default)]
    pub run_opts: Vec<OptionDoc>,
    /// Options stored on the domain layer.
    #[serde(default)]
    pub domain_opts: Vec<OptionDoc>,
    /// Options stored on the user layer.
    #[serde(default)]
    pub user_opts: Vec<OptionDoc>,
    /// Options stored on the service layer.
    #[serde(default)]
    pub service_opts: Vec<OptionDoc>,
}

impl OptionsDoc {
    /// Every documented option in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &OptionDoc> {
        self.run_opts
            .iter()
            .chain(&self.domain_opts)
            .chain(&self.user_opts)
            .chain(&self.service_opts)
    }

    /// Defaults of every documented option that declares one.
    pub fn defaults(&self) -> CheckerOptions {
        self.all()
            .filter_map(|doc| doc.default.clone().map(|v| (doc.id.clone(), v)))
            .collect()
    }

    /// Auto-filled option ids and their sources.
    pub fn auto_fills(&self) -> Vec<(&str, AutoFill)> {
        self.all()
            .filter(|doc| doc.auto_fill != AutoFill::None)
            .map(|doc| (doc.id.as_str(), doc.auto_fill))
            .collect()
    }

    /// Whether `id` may be stored on a layer of `kind`. The admin layer accepts
    /// any documented option.
    pub fn accepts(&self, kind: ScopeKind, id: &str) -> bool {
        let docs: &[OptionDoc] = match kind {
            ScopeKind::Admin => return self.all().any(|doc| doc.id == id),
            ScopeKind::User => &self.user_opts,
            ScopeKind::Domain => &self.domain_opts,
            ScopeKind::Service => &self.service_opts,
        };
        docs.iter().any(|doc| doc.id == id)
    }

    /// Whether `id` may be supplied at run time.
    pub fn accepts_runtime(&self, id: &str) -> bool {
        self.run_opts.iter().any(|doc| doc.id == id)
    }
}

/// Persisted option layer for one checker at one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLayer {
    /// Checker the options belong to.
    pub checker_name: String,
    /// Owning user; `None` for the admin layer.
    pub owner_id: Option<Identifier>,
    /// Scope of the layer.
    pub scope: CheckScope,
    /// Stored values.
    pub options: CheckerOptions,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc() -> OptionsDoc {
        OptionsDoc {
            run_opts: vec![OptionDoc::new("verbose").with_default(json!(false))],
            domain_opts: vec![
                OptionDoc::new("domain").with_auto_fill(AutoFill::DomainName),
                OptionDoc::new("nameservers"),
            ],
            user_opts: vec![OptionDoc::new("contact").with_auto_fill(AutoFill::OwnerEmail)],
            service_opts: vec![OptionDoc::new("port").with_default(json!(53))],
        }
    }

    #[test]
    fn defaults_collects_declared_values() {
        let defaults = doc().defaults();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults["verbose"], json!(false));
        assert_eq!(defaults["port"], json!(53));
    }

    #[test]
    fn auto_fills_lists_sources() {
        let doc = doc();
        let fills = doc.auto_fills();
        assert_eq!(
            fills,
            vec![("domain", AutoFill::DomainName), ("contact", AutoFill::OwnerEmail)]
        );
    }

    #[test]
    fn accepts_by_level() {
        let doc = doc();
        assert!(doc.accepts(ScopeKind::Domain, "nameservers"));
        assert!(!doc.accepts(ScopeKind::User, "nameservers"));
        assert!(doc.accepts(ScopeKind::Admin, "port"));
        assert!(!doc.accepts(ScopeKind::Admin, "unknown"));
        assert!(doc.accepts_runtime("verbose"));
    }

    #[test]
    fn merge_overrides_keys() {
        let mut base = CheckerOptions::new();
        base.insert("a".into(), json!(1));
        base.insert("b".into(), json!(2));
        let mut layer = CheckerOptions::new();
        layer.insert("b".into(), json!(3));
        merge_options(&mut base, &layer);
        assert_eq!(base["a"], json!(1));
        assert_eq!(base["b"], json!(3));
    }
}
