//! Integration tests for scoped option resolution
//!
//! Covers:
//! - Stored layer merging (admin, user, domain, service)
//! - Effective option precedence including defaults and runtime options
//! - Auto-fill from the identity, domain and zone ports
//! - Wholesale replace vs key-by-key overwrite
//! - Strict option validation

use async_trait::async_trait;
use happydomain_checks::config::ResolverConfig;
use happydomain_checks::core::{
    AppResult, AutoFill, Availability, CheckError, CheckOutcome, CheckScope, Checker,
    CheckerOptions, CheckerRegistry, DomainInfo, Identifier, OptionDoc, OptionResolver,
    OptionStore, OptionsDoc, RunContext, ServiceInfo, UserInfo, ZoneInfo,
};
use happydomain_checks::core::{DomainStore, IdentityStore, ZoneStore};
use happydomain_checks::infra::{InMemoryDirectory, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// FIXTURES
// ============================================================================

struct MailChecker;

#[async_trait]
impl Checker for MailChecker {
    fn name(&self) -> &str {
        "mail"
    }

    fn display_name(&self) -> &str {
        "Mail delivery"
    }

    fn availability(&self) -> Availability {
        Availability {
            applies_to_domain: true,
            applies_to_service: true,
        }
    }

    fn options_doc(&self) -> OptionsDoc {
        OptionsDoc {
            run_opts: vec![
                OptionDoc::new("verbose").with_default(json!(false)),
                OptionDoc::new("domain").with_auto_fill(AutoFill::DomainName),
            ],
            user_opts: vec![
                OptionDoc::new("contact").with_auto_fill(AutoFill::OwnerEmail),
                OptionDoc::new("lang").with_default(json!("en")),
            ],
            domain_opts: vec![OptionDoc::new("timeout").with_default(json!(30))],
            service_opts: vec![
                OptionDoc::new("port").with_default(json!(25)),
                OptionDoc::new("subdomain").with_auto_fill(AutoFill::Subdomain),
                OptionDoc::new("service-type").with_auto_fill(AutoFill::ServiceType),
            ],
        }
    }

    async fn run(&self, _options: CheckerOptions, _ctx: RunContext) -> AppResult<CheckOutcome> {
        Ok(CheckOutcome::pass(json!({})))
    }
}

struct Fixture {
    resolver: OptionResolver,
    store: Arc<MemoryStore>,
    directory: Arc<InMemoryDirectory>,
    user_id: Identifier,
    domain_id: Identifier,
    service_id: Identifier,
}

fn fixture(config: ResolverConfig) -> Fixture {
    let registry = Arc::new(CheckerRegistry::new());
    registry
        .register(Arc::new(MailChecker))
        .expect("Failed to register checker");
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(InMemoryDirectory::new());

    let user_id = Identifier::new();
    let domain_id = Identifier::new();
    let service_id = Identifier::new();
    let zone_id = Identifier::new();
    directory.insert_user(UserInfo {
        id: user_id,
        email: "owner@example.com".to_string(),
    });
    directory.insert_domain(DomainInfo {
        id: domain_id,
        name: "example.com.".to_string(),
        owner_id: user_id,
        current_zone_id: Some(zone_id),
    });
    directory.insert_zone(ZoneInfo {
        id: zone_id,
        services: vec![ServiceInfo {
            id: service_id,
            subdomain: "mail".to_string(),
            service_type: "abstract.MXs".to_string(),
        }],
    });

    let resolver = OptionResolver::new(registry, Arc::clone(&store) as Arc<dyn OptionStore>)
        .with_identities(Arc::clone(&directory) as Arc<dyn IdentityStore>)
        .with_domains(Arc::clone(&directory) as Arc<dyn DomainStore>)
        .with_zones(Arc::clone(&directory) as Arc<dyn ZoneStore>)
        .with_config(config);

    Fixture {
        resolver,
        store,
        directory,
        user_id,
        domain_id,
        service_id,
    }
}

fn opts(pairs: &[(&str, Value)]) -> CheckerOptions {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// ============================================================================
// STORED LAYERS
// ============================================================================

#[tokio::test]
async fn test_stored_layers_merge_admin_to_service() {
    let f = fixture(ResolverConfig::default());
    let user = CheckScope::User { user_id: f.user_id };
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };
    let service = CheckScope::Service {
        domain_id: f.domain_id,
        service_id: f.service_id,
    };

    f.resolver
        .set_options("mail", None, &CheckScope::Admin, opts(&[("timeout", json!(1)), ("lang", json!("fr"))]))
        .await
        .expect("Failed to set admin layer");
    f.resolver
        .set_options("mail", None, &user, opts(&[("timeout", json!(2))]))
        .await
        .expect("Failed to set user layer");
    f.resolver
        .set_options("mail", Some(f.user_id), &domain, opts(&[("timeout", json!(3)), ("port", json!(587))]))
        .await
        .expect("Failed to set domain layer");
    f.resolver
        .set_options("mail", Some(f.user_id), &service, opts(&[("port", json!(465))]))
        .await
        .expect("Failed to set service layer");

    let admin_only = f
        .resolver
        .get_stored_no_default("mail", None, &CheckScope::Admin)
        .await
        .expect("Failed to read options");
    assert_eq!(admin_only, opts(&[("timeout", json!(1)), ("lang", json!("fr"))]));

    let for_service = f
        .resolver
        .get_stored_no_default("mail", Some(&f.user_id), &service)
        .await
        .expect("Failed to read options");
    assert_eq!(
        for_service,
        opts(&[("timeout", json!(3)), ("lang", json!("fr")), ("port", json!(465))])
    );

    // Without an owner the user layer is skipped
    let anonymous = f
        .resolver
        .get_stored_no_default("mail", None, &domain)
        .await
        .expect("Failed to read options");
    assert_eq!(anonymous["timeout"], json!(3));

    let user_layer = f
        .store
        .get_layer("mail", &user)
        .await
        .expect("Failed to read layer")
        .expect("user layer missing");
    assert_eq!(user_layer.owner_id, Some(f.user_id));
}

#[tokio::test]
async fn test_set_then_get_round_trips() {
    let f = fixture(ResolverConfig::default());
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };
    let written = opts(&[("timeout", json!(12)), ("extra", json!({"nested": [1, 2]}))]);

    f.resolver
        .set_options("mail", Some(f.user_id), &domain, written.clone())
        .await
        .expect("Failed to set options");
    let read = f
        .resolver
        .get_stored_no_default("mail", None, &domain)
        .await
        .expect("Failed to read options");
    assert_eq!(read, written);
}

#[tokio::test]
async fn test_unknown_checker_returns_stored_layers() {
    let f = fixture(ResolverConfig::default());
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };
    f.resolver
        .set_options("retired", None, &domain, opts(&[("x", json!(1))]))
        .await
        .expect("Failed to set options");

    let stored = f
        .resolver
        .get_stored_no_default("retired", None, &domain)
        .await
        .expect("Failed to read options");
    assert_eq!(stored, opts(&[("x", json!(1))]));

    let merged = f
        .resolver
        .build_merged("retired", None, &domain, &CheckerOptions::new())
        .await
        .expect("Failed to merge options");
    assert_eq!(merged, stored);
}

#[tokio::test]
async fn test_set_replaces_and_overwrite_merges() {
    let f = fixture(ResolverConfig::default());
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };

    f.resolver
        .set_options("mail", Some(f.user_id), &domain, opts(&[("a", json!(1)), ("b", json!(2))]))
        .await
        .expect("Failed to set options");
    let merged = f
        .resolver
        .overwrite_some("mail", Some(f.user_id), &domain, opts(&[("b", json!(3)), ("c", json!(4))]))
        .await
        .expect("Failed to overwrite options");
    assert_eq!(merged, opts(&[("a", json!(1)), ("b", json!(3)), ("c", json!(4))]));

    f.resolver
        .set_options("mail", Some(f.user_id), &domain, opts(&[("z", json!(0))]))
        .await
        .expect("Failed to set options");
    let stored = f
        .resolver
        .get_layer_options("mail", &domain)
        .await
        .expect("Failed to read layer");
    assert_eq!(stored, Some(opts(&[("z", json!(0))])));

    assert!(f
        .resolver
        .delete_options("mail", &domain)
        .await
        .expect("Failed to delete layer"));
    assert_eq!(
        f.resolver
            .get_layer_options("mail", &domain)
            .await
            .expect("Failed to read layer"),
        None
    );
}

// ============================================================================
// EFFECTIVE OPTIONS
// ============================================================================

#[tokio::test]
async fn test_build_merged_precedence() {
    let f = fixture(ResolverConfig::default());
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };
    f.resolver
        .set_options("mail", None, &CheckScope::Admin, opts(&[("verbose", json!(true))]))
        .await
        .expect("Failed to set admin layer");
    f.resolver
        .set_options("mail", Some(f.user_id), &domain, opts(&[("timeout", json!(60))]))
        .await
        .expect("Failed to set domain layer");

    let runtime = opts(&[("timeout", json!(5)), ("domain", json!("evil.example."))]);
    let merged = f
        .resolver
        .build_merged("mail", Some(&f.user_id), &domain, &runtime)
        .await
        .expect("Failed to merge options");

    assert_eq!(merged["verbose"], json!(true), "admin layer overrides default");
    assert_eq!(merged["lang"], json!("en"), "default applies when nothing is stored");
    assert_eq!(merged["port"], json!(25));
    assert_eq!(merged["timeout"], json!(5), "runtime overrides stored layers");
    assert_eq!(merged["domain"], json!("example.com."), "auto-fill overrides runtime");
    assert_eq!(merged["contact"], json!("owner@example.com"));
    assert!(!merged.contains_key("subdomain"), "no service on a domain scope");
}

#[tokio::test]
async fn test_service_scope_auto_fill() {
    let f = fixture(ResolverConfig::default());
    let service = CheckScope::Service {
        domain_id: f.domain_id,
        service_id: f.service_id,
    };
    let merged = f
        .resolver
        .build_merged("mail", None, &service, &opts(&[("subdomain", json!("www"))]))
        .await
        .expect("Failed to merge options");
    assert_eq!(merged["subdomain"], json!("mail"));
    assert_eq!(merged["service-type"], json!("abstract.MXs"));
    assert_eq!(merged["domain"], json!("example.com."));
    assert!(!merged.contains_key("contact"), "no owner, no email");
}

#[tokio::test]
async fn test_missing_domain_omits_auto_fill() {
    let f = fixture(ResolverConfig::default());
    f.directory.remove_domain(&f.domain_id);
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };
    f.resolver
        .set_options("mail", None, &CheckScope::Admin, opts(&[("domain", json!("stale.example."))]))
        .await
        .expect("Failed to set admin layer");

    let merged = f
        .resolver
        .build_merged("mail", None, &domain, &CheckerOptions::new())
        .await
        .expect("missing domain must not fail resolution");
    assert!(!merged.contains_key("domain"));
    assert_eq!(merged["timeout"], json!(30));
}

#[tokio::test]
async fn test_user_scope_uses_its_user_for_email() {
    let f = fixture(ResolverConfig::default());
    let merged = f
        .resolver
        .build_merged(
            "mail",
            None,
            &CheckScope::User { user_id: f.user_id },
            &CheckerOptions::new(),
        )
        .await
        .expect("Failed to merge options");
    assert_eq!(merged["contact"], json!("owner@example.com"));
}

#[tokio::test]
async fn test_resolver_without_ports() {
    let registry = Arc::new(CheckerRegistry::new());
    registry
        .register(Arc::new(MailChecker))
        .expect("Failed to register checker");
    let resolver = OptionResolver::new(registry, Arc::new(MemoryStore::new()));

    let merged = resolver
        .build_merged(
            "mail",
            Some(&Identifier::new()),
            &CheckScope::Domain {
                domain_id: Identifier::new(),
            },
            &opts(&[("domain", json!("x.example."))]),
        )
        .await
        .expect("Failed to merge options");
    assert!(!merged.contains_key("domain"));
    assert!(!merged.contains_key("contact"));
    assert_eq!(merged["verbose"], json!(false));
}

// ============================================================================
// STRICT MODE
// ============================================================================

#[tokio::test]
async fn test_strict_mode_rejects_undocumented_ids() {
    let f = fixture(ResolverConfig {
        strict_options: true,
    });
    let domain = CheckScope::Domain {
        domain_id: f.domain_id,
    };

    f.resolver
        .set_options("mail", Some(f.user_id), &domain, opts(&[("timeout", json!(3))]))
        .await
        .expect("documented domain option rejected");

    let err = f
        .resolver
        .overwrite_some("mail", Some(f.user_id), &domain, opts(&[("port", json!(1))]))
        .await
        .expect_err("service option accepted on a domain layer");
    assert!(matches!(err, CheckError::Validation(_)));

    f.resolver
        .set_options("mail", None, &CheckScope::Admin, opts(&[("port", json!(1))]))
        .await
        .expect("admin layer accepts any documented option");

    assert!(f
        .resolver
        .validate_runtime("mail", &opts(&[("verbose", json!(true))]))
        .is_ok());
    assert!(matches!(
        f.resolver
            .validate_runtime("mail", &opts(&[("timeout", json!(1))])),
        Err(CheckError::Validation(_))
    ));
}
