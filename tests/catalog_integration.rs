//! Integration tests for catalog reconciliation.
//!
//! Runs template setup, reference resolution and part lookup against an
//! in-memory catalog and checks both results and the calls that were made.

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use assembly_catalog_link::assembly::{Body, Component, Design, Occurrence, SnapshotHost};
use assembly_catalog_link::bom;
use assembly_catalog_link::catalog::references::resolve_reference;
use assembly_catalog_link::catalog::resolver::find_parts;
use assembly_catalog_link::catalog::templates::ensure_templates;
use assembly_catalog_link::catalog::{
    Catalog, CatalogError, CatalogResult, FieldTemplate, InMemoryCatalog, NewParameter,
    NewTemplate, Parameter, ParameterTemplate, Part, PartCategory, PartLookup, Pk, Reference,
    ReferenceCache, ReferenceKind, ReferenceNames, TemplateCache,
};
use assembly_catalog_link::config::ServerProfile;
use assembly_catalog_link::report::ErrorSink;
use assembly_catalog_link::session::{ClientFactory, Session};

#[derive(Clone, Default)]
struct RecordingSink(Rc<RefCell<Vec<String>>>);

impl ErrorSink for RecordingSink {
    fn capture(&self, error: &(dyn Error + 'static)) {
        self.0.borrow_mut().push(error.to_string());
    }
}

fn names() -> ReferenceNames {
    ReferenceNames {
        part_category: "Mechanical".to_string(),
        template_parameter: "Fusion360:Id".to_string(),
    }
}

fn profile() -> ServerProfile {
    serde_json::from_value(serde_json::json!({
        "address": "https://parts.example.com",
        "part_category": "Mechanical",
        "template_parameter": "Fusion360:Id"
    }))
    .unwrap()
}

/// A session whose client is a shared in-memory catalog, so the test can
/// inspect it after the session used it.
fn session_over(catalog: Rc<InMemoryCatalog>) -> Session {
    struct Shared(Rc<InMemoryCatalog>);

    impl Catalog for Shared {
        fn list_templates(&self) -> CatalogResult<Vec<ParameterTemplate>> {
            self.0.list_templates()
        }
        fn create_template(&self, template: &NewTemplate) -> CatalogResult<ParameterTemplate> {
            self.0.create_template(template)
        }
        fn list_parameters(&self) -> CatalogResult<Vec<Parameter>> {
            self.0.list_parameters()
        }
        fn create_parameter(&self, parameter: &NewParameter) -> CatalogResult<Parameter> {
            self.0.create_parameter(parameter)
        }
        fn update_parameter(&self, pk: Pk, data: &str) -> CatalogResult<Parameter> {
            self.0.update_parameter(pk, data)
        }
        fn list_categories(&self) -> CatalogResult<Vec<PartCategory>> {
            self.0.list_categories()
        }
    }

    let factory: ClientFactory =
        Box::new(move |_: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
            Ok(Box::new(Shared(Rc::clone(&catalog))))
        });
    Session::new(profile(), factory)
}

// =============================================================================
// Metadata Templates
// =============================================================================

#[test]
fn test_ensure_templates_creates_missing_only() {
    let catalog = InMemoryCatalog::new();
    let existing = catalog.add_template(FieldTemplate::Id.canonical_name(), "UUID");
    let mut cache = TemplateCache::new();

    let created = ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap();
    assert_eq!(created, FieldTemplate::ALL.len() - 1);
    assert_eq!(catalog.calls().create_template, FieldTemplate::ALL.len() - 1);
    assert_eq!(cache.pk(FieldTemplate::Id).unwrap(), existing);

    for field in FieldTemplate::ALL {
        assert!(cache.pk(field).is_ok(), "{field} not cached");
    }
}

#[test]
fn test_ensure_templates_is_idempotent() {
    let catalog = InMemoryCatalog::new();
    let mut cache = TemplateCache::new();

    ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap();
    let first = cache.clone();
    let templates = catalog.templates();

    let created = ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap();
    assert_eq!(created, 0);
    assert_eq!(cache, first);
    assert_eq!(catalog.templates(), templates);
}

#[test]
fn test_template_names_and_units() {
    let catalog = InMemoryCatalog::new();
    let mut cache = TemplateCache::new();
    ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap();

    let volume = cache.get("Fusion360:Volume").unwrap();
    assert_eq!(volume.units, "cm3");

    let material = cache.get("Fusion360:Material").unwrap();
    assert_eq!(material.units, "");

    assert!(cache.get("Fusion360:BoundingBox:Width").is_some());
}

#[test]
fn test_ensure_templates_failure_is_not_retried() {
    let catalog = InMemoryCatalog::new();
    catalog.fail_on(Some("create_template"));
    let mut cache = TemplateCache::new();

    let err = ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap_err();
    assert!(matches!(err, CatalogError::Request { operation: "create_template", .. }));
    assert_eq!(catalog.calls().create_template, 1);
    assert!(cache.is_empty());
}

// =============================================================================
// Reference Cache
// =============================================================================

#[test]
fn test_reference_cache_hit_makes_no_remote_call() {
    let catalog = InMemoryCatalog::new();
    let category = catalog.add_category("Mechanical");
    let mut cache = ReferenceCache::new();

    let first = resolve_reference(&catalog, &names(), &mut cache, ReferenceKind::PartCategory)
        .unwrap()
        .unwrap();
    let calls = catalog.calls();

    let second = resolve_reference(&catalog, &names(), &mut cache, ReferenceKind::PartCategory)
        .unwrap()
        .unwrap();

    assert_eq!(first, second);
    assert!(matches!(first, Reference::Category(ref c) if c.pk == category));
    assert_eq!(catalog.calls(), calls);
    assert_eq!(calls.list_categories, 1);
}

#[test]
fn test_reference_miss_is_not_cached() {
    let catalog = InMemoryCatalog::new();
    let mut cache = ReferenceCache::new();

    let kind = ReferenceKind::TemplateParameter;
    assert!(resolve_reference(&catalog, &names(), &mut cache, kind)
        .unwrap()
        .is_none());
    assert!(cache.is_empty());

    catalog.add_template("Fusion360:Id", "UUID");
    let found = resolve_reference(&catalog, &names(), &mut cache, kind).unwrap();
    assert!(matches!(found, Some(Reference::Template(ref t)) if t.name == "Fusion360:Id"));
    assert_eq!(catalog.calls().list_templates, 2);
}

#[test]
fn test_unknown_reference_name() {
    let err = "supplier".parse::<ReferenceKind>().unwrap_err();
    assert!(matches!(err, CatalogError::UnknownReference { ref name } if name == "supplier"));
}

// =============================================================================
// Part Resolver
// =============================================================================

#[test]
fn test_find_parts_single_listing() {
    let catalog = InMemoryCatalog::new();
    catalog.add_parameter(10, 1, "X");
    catalog.add_parameter(11, 1, "other");
    let sink = RecordingSink::default();

    let results = find_parts(&catalog, &["X", "Y"], &sink).unwrap();

    assert_eq!(catalog.calls().list_parameters, 1);
    assert_eq!(results.len(), 2);
    assert_eq!(results["X"], PartLookup::Found { part: Part { pk: 10 } });
    assert_eq!(results["Y"], PartLookup::Missing);

    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, ["X", "Y"]);
}

#[test]
fn test_find_parts_many_ids_one_call() {
    let catalog = InMemoryCatalog::new();
    let ids: Vec<String> = (0..25).map(|i| format!("comp-{i}")).collect();
    for (part, id) in (100..).zip(&ids) {
        catalog.add_parameter(part, 1, id.as_str());
    }
    let sink = RecordingSink::default();

    let results = find_parts(&catalog, &ids, &sink).unwrap();
    assert_eq!(catalog.calls().list_parameters, 1);
    assert_eq!(results.len(), ids.len());
    assert!(results.values().all(PartLookup::is_found));
}

#[test]
fn test_find_parts_ambiguous() {
    let catalog = InMemoryCatalog::new();
    catalog.add_parameter(10, 1, "dup");
    catalog.add_parameter(12, 1, "dup");
    let sink = RecordingSink::default();

    let results = find_parts(&catalog, &["dup"], &sink).unwrap();
    assert_eq!(results["dup"], PartLookup::Ambiguous { parts: vec![10, 12] });
    assert_eq!(results["dup"].part(), None);
}

#[test]
fn test_remote_failure_reported_and_returned() {
    let catalog = InMemoryCatalog::new();
    catalog.fail_on(Some("list_parameters"));
    let sink = RecordingSink::default();

    let err = find_parts(&catalog, &["X"], &sink).unwrap_err();
    assert!(matches!(err, CatalogError::Request { operation: "list_parameters", .. }));

    let captured = sink.0.borrow();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0], err.to_string());
}

// =============================================================================
// Session Workflow
// =============================================================================

#[test]
fn test_session_caches_references_and_templates() {
    let catalog = Rc::new(InMemoryCatalog::new());
    catalog.add_category("Mechanical");
    let mut session = session_over(Rc::clone(&catalog));

    assert_eq!(session.initialise().unwrap(), FieldTemplate::ALL.len());
    assert_eq!(session.initialise().unwrap(), 0);
    assert_eq!(session.templates().len(), FieldTemplate::ALL.len());

    session.resolve_reference_named("part_category").unwrap();
    session.resolve_reference_named("part_category").unwrap();
    assert_eq!(catalog.calls().list_categories, 1);
    assert_eq!(session.references().len(), 1);
}

#[test]
fn test_session_catalog_status_and_link() {
    let catalog = Rc::new(InMemoryCatalog::new());
    let sink = RecordingSink::default();
    let mut session = session_over(Rc::clone(&catalog)).with_sink(Box::new(sink.clone()));
    session.initialise().unwrap();

    let design = Design::new(
        "asm",
        vec![
            Component::new("asm", "Fixture"),
            Component::new("pin", "Dowel Pin").with_body(Body::solid(0.75)),
            Component::new("plate", "Base Plate").with_body(Body::solid(40.0)),
        ],
        vec![
            Occurrence::of("plate"),
            Occurrence::of("pin"),
            Occurrence::of("pin"),
        ],
    )
    .unwrap();
    let host = SnapshotHost::new(Some(design));
    let entries = bom::extract_bom(&host, session.sink()).unwrap();

    let status = session.catalog_status(&entries).unwrap();
    assert!(status.iter().all(|s| s.catalog == PartLookup::Missing));

    let pin = entries.iter().find(|e| e.node.local_id == "pin").unwrap();
    let linked = session.link_component(55, pin).unwrap();
    assert_eq!(linked.len(), 2);
    assert_eq!(linked[0].data, "pin");
    assert_eq!(linked[1].data, "0.75");

    let parameters_before = catalog.parameters().len();
    session.link_component(55, pin).unwrap();
    assert_eq!(catalog.parameters().len(), parameters_before);

    let status = session.catalog_status(&entries).unwrap();
    let pin_status = status.iter().find(|s| s.entry.node.local_id == "pin").unwrap();
    assert_eq!(pin_status.catalog, PartLookup::Found { part: Part { pk: 55 } });
    assert!(sink.0.borrow().is_empty());
}

#[test]
fn test_session_reports_remote_failure() {
    let catalog = Rc::new(InMemoryCatalog::new());
    let sink = RecordingSink::default();
    let mut session = session_over(Rc::clone(&catalog)).with_sink(Box::new(sink.clone()));

    catalog.fail_on(Some("list_parameters"));
    assert!(session.find_part("pin").is_err());
    assert_eq!(sink.0.borrow().len(), 1);

    catalog.fail_on(None);
    assert_eq!(session.find_part("pin").unwrap(), PartLookup::Missing);
}

#[test]
fn test_session_reports_connect_failure() {
    let factory: ClientFactory =
        Box::new(|profile: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
            Err(CatalogError::connect(profile.address.clone(), "connection refused"))
        });
    let sink = RecordingSink::default();
    let mut session = Session::new(profile(), factory).with_sink(Box::new(sink.clone()));

    let err = session.find_parts(&["X", "Y"]).unwrap_err();
    assert!(matches!(err, CatalogError::Connect { .. }));
    assert_eq!(sink.0.borrow().len(), 1);

    assert!(session.find_part("X").is_err());
    assert_eq!(sink.0.borrow().len(), 2);
    assert!(!session.is_connected());
}
