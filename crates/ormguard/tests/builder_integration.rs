//! End-to-end use of the facade crate.

use ormguard::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn schema() -> Schema {
    Schema::new()
        .with_entity(EntityDef::new("Article").with_field(FieldDef::required("title")))
        .with_entity(EntityDef::new("Image").with_fields(["title", "size", "format", "article_id"]))
        .with_relation(RelationDef::has_many("images", "Article", "Image", "article_id"))
}

const RULES: &str = r#"{
    "Article": [ { "fields": ["images"], "from": ["BadGuy"] } ],
    "Image": [
        { "fields": ["size"], "from": ["BadGuy"] },
        { "fields": ["format"], "to": ["Superhero", "NiceGuy"] }
    ]
}"#;

#[test]
fn test_configured_guard_round_trip() {
    init_tracing();
    let config = GuardConfig::from_json_str(r#"{ "restricted_message": "is off limits" }"#).unwrap();
    let guard = GuardBuilder::new(schema())
        .with_rules_json(RULES)
        .with_store(Arc::new(SledStore::temporary().unwrap()))
        .with_config(config)
        .build()
        .unwrap();

    let article = guard
        .finder("Article")
        .unwrap()
        .create(Attributes::new().with("title", "all about degas"))
        .unwrap();
    assert!(article.is_persisted());

    let user: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("alice", ["BadGuy"]));
    let mut article = guard.bind(article, user);
    article.association("images").unwrap().create(Attributes::new()).unwrap();
    assert!(!article.save().unwrap());
    assert_eq!(article.errors().on("images"), ["is off limits".to_string()]);
}

#[test]
fn test_fail_fast_guard() {
    init_tracing();
    let guard = GuardBuilder::new(schema())
        .restrict("Image", ["size"], RestrictionSpec::from_roles(["BadGuy"]))
        .with_config(GuardConfig::new().with_enforcement(EnforcementMode::FailFast))
        .build()
        .unwrap();

    let user: Arc<dyn Principal> = Arc::new(StaticPrincipal::new("alice", ["BadGuy"]));
    let EntryPoint::Restricted(images) = guard.for_principal("Image", user).unwrap() else {
        panic!("Image carries rules");
    };
    let err = images
        .create(Attributes::new().with("title", "degas").with("size", 3))
        .unwrap_err();
    assert!(matches!(err, GuardError::PermissionDenied { .. }));
}
