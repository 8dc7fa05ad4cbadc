//! Engine assembly.

use std::sync::Arc;

use ormguard_core::{
    Guard, GuardConfig, GuardResult, MemoryStore, RecordStore, RestrictionSpec, RuleRegistry,
    Schema,
};
use tracing::info;

struct Declaration {
    entity: String,
    fields: Vec<String>,
    spec: RestrictionSpec,
}

/// Builder for a [`Guard`].
///
/// Rules are collected and declared in order when [`build`](Self::build)
/// runs, so a malformed rule fails the build rather than a later check.
pub struct GuardBuilder {
    schema: Schema,
    config: GuardConfig,
    store: Option<Arc<dyn RecordStore>>,
    declarations: Vec<Declaration>,
    rule_documents: Vec<String>,
}

impl GuardBuilder {
    /// Start from a schema, with default configuration and an in-memory
    /// store.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            config: GuardConfig::default(),
            store: None,
            declarations: Vec::new(),
            rule_documents: Vec::new(),
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific record store.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Declare a restriction on `fields` of `entity`.
    pub fn restrict<I, S>(mut self, entity: &str, fields: I, spec: RestrictionSpec) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declarations.push(Declaration {
            entity: entity.to_string(),
            fields: fields.into_iter().map(Into::into).collect(),
            spec,
        });
        self
    }

    /// Load rules from a JSON rule document at build time.
    pub fn with_rules_json(mut self, json: impl Into<String>) -> Self {
        self.rule_documents.push(json.into());
        self
    }

    /// Declare every rule and assemble the engine.
    pub fn build(self) -> GuardResult<Guard> {
        let registry = RuleRegistry::new(Arc::new(self.schema));

        let mut declared = 0;
        for declaration in self.declarations {
            declared += 1;
            registry.declare(&declaration.entity, declaration.fields, declaration.spec)?;
        }
        for document in &self.rule_documents {
            declared += registry.load_json(document)?;
        }

        let store: Arc<dyn RecordStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        info!(
            rules = declared,
            enforcement = ?self.config.enforcement,
            "restriction engine assembled"
        );
        Ok(Guard::new(Arc::new(registry), store, self.config))
    }
}

impl std::fmt::Debug for GuardBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardBuilder")
            .field("config", &self.config)
            .field("declarations", &self.declarations.len())
            .field("rule_documents", &self.rule_documents.len())
            .field("custom_store", &self.store.is_some())
            .finish()
    }
}
