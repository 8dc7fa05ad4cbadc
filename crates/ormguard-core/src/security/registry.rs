//! Rule registry.
//!
//! Holds every restriction declared per entity and answers "which rules
//! apply to this type", merging rules down the ancestry chain.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use super::rule::{RestrictionRule, RestrictionSpec};
use crate::catalog::Schema;
use crate::error::{GuardError, GuardResult};

/// Merged field -> rule mapping visible to one entity.
pub type RuleSet = HashMap<String, RestrictionRule>;

/// One entry of a JSON rule document.
#[derive(Debug, Deserialize)]
struct RuleDeclaration {
    fields: Vec<String>,
    #[serde(flatten)]
    spec: RestrictionSpec,
}

/// Registry of restriction rules keyed by entity.
///
/// Populated during bootstrap through [`RuleRegistry::declare`]; later
/// declarations are allowed and are synchronized against readers. There is
/// no way to remove a rule.
pub struct RuleRegistry {
    schema: Arc<Schema>,
    /// Rules declared directly on each entity.
    declarations: RwLock<HashMap<String, RuleSet>>,
    /// Merged rule sets per entity, dropped whenever a rule is declared.
    merged: DashMap<String, Arc<RuleSet>>,
}

impl RuleRegistry {
    /// Create an empty registry over a schema.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            declarations: RwLock::new(HashMap::new()),
            merged: DashMap::new(),
        }
    }

    /// The schema rules are resolved against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Declare a restriction on one or more fields of an entity.
    ///
    /// Fails with `Configuration` when the spec names both or neither of
    /// `to` / `from`, lists no roles, or no field is given, and with
    /// `UnknownEntity` when the entity is not in the schema.
    pub fn declare<I, S>(&self, entity: &str, fields: I, spec: RestrictionSpec) -> GuardResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = RestrictionRule::try_from(spec)?;
        self.declare_rule(entity, fields, rule)
    }

    /// Declare an already validated rule on one or more fields.
    pub fn declare_rule<I, S>(&self, entity: &str, fields: I, rule: RestrictionRule) -> GuardResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.require_entity(entity)?;
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(GuardError::Configuration(format!(
                "restriction on '{}' names no fields",
                entity
            )));
        }

        let mut declarations = self.declarations.write();
        let own = declarations.entry(entity.to_string()).or_default();
        for field in &fields {
            own.insert(field.clone(), rule.clone());
        }
        self.merged.clear();

        info!(
            entity,
            fields = ?fields,
            mode = ?rule.mode(),
            roles = ?rule.roles(),
            "restriction declared"
        );
        Ok(())
    }

    /// Load declarations from a JSON document of the form
    /// `{ "Image": [ { "fields": ["size"], "from": ["BadGuy"] } ] }`.
    ///
    /// Returns the number of declarations applied.
    pub fn load_json(&self, json: &str) -> GuardResult<usize> {
        let document: HashMap<String, Vec<RuleDeclaration>> = serde_json::from_str(json)
            .map_err(|e| GuardError::Configuration(format!("invalid rule document: {}", e)))?;

        let mut applied = 0;
        for (entity, entries) in document {
            for entry in entries {
                self.declare(&entity, entry.fields, entry.spec)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Merged rules visible to `entity`, walking from the root ancestor down
    /// so that more specific declarations override inherited ones.
    pub fn rules_for(&self, entity: &str) -> Arc<RuleSet> {
        if let Some(rules) = self.merged.get(entity) {
            return Arc::clone(rules.value());
        }

        let lineage = match self.schema.lineage(entity) {
            Ok(lineage) => lineage,
            Err(e) => {
                debug!(entity, error = %e, "no ancestry available, using own rules only");
                vec![entity.to_string()]
            }
        };

        // Fill the cache while holding the read lock so a concurrent
        // declaration cannot be cleared before this stale entry lands.
        let declarations = self.declarations.read();
        let mut rules = RuleSet::new();
        for ancestor in &lineage {
            if let Some(own) = declarations.get(ancestor) {
                rules.extend(own.iter().map(|(f, r)| (f.clone(), r.clone())));
            }
        }
        let rules = Arc::new(rules);
        self.merged.insert(entity.to_string(), Arc::clone(&rules));

        debug!(entity, depth = lineage.len(), rules = rules.len(), "rule set merged");
        rules
    }

    /// The rule governing one field, if any.
    pub fn rule_for(&self, entity: &str, field: &str) -> Option<RestrictionRule> {
        self.rules_for(entity).get(field).cloned()
    }

    /// Check whether any rule (own or inherited) applies to `entity`.
    pub fn has_rules(&self, entity: &str) -> bool {
        !self.rules_for(entity).is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("entities", &self.declarations.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
