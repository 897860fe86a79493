//! Entity and relationship type descriptors and the schema registry.
//!
//! Descriptors are plain static tables: each concrete type is declared once
//! through an explicit builder call and registered at startup. After
//! `SchemaRegistryBuilder::build` the registry is immutable and can be shared
//! across request handlers without locking.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;

use crate::error::SchemaError;

// ── Field Kinds ───────────────────────────────────────────────────

/// The storage kind of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    /// ISO calendar date (`YYYY-MM-DD`), stored as a string.
    Date,
    /// RFC 3339 timestamp, stored as a UTC string.
    DateTime,
    StringList,
    /// A string restricted to a fixed set of choices.
    Enum(&'static [&'static str]),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::StringList => "string list",
            FieldKind::Enum(_) => "enum",
        }
    }

    /// Kinds whose stored representation is a single string.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldKind::String | FieldKind::Date | FieldKind::DateTime | FieldKind::Enum(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Float)
    }
}

/// Normalization applied to string values before validation and storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    #[default]
    None,
    Trim,
    /// Trim, then lowercase.
    Lowercase,
}

impl Normalize {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Normalize::None => value.to_string(),
            Normalize::Trim => value.trim().to_string(),
            Normalize::Lowercase => value.trim().to_lowercase(),
        }
    }
}

/// Index flags, mapped to Neo4j constraints and indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    None,
    Indexed,
    Unique,
    Primary,
}

// ── Field Specs ───────────────────────────────────────────────────

/// Declaration of one field on an entity or relationship type.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    pub normalize: Normalize,
    pub index: IndexKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(rename = "pattern", skip_serializing_if = "Option::is_none")]
    pub pattern_source: Option<&'static str>,
    #[serde(skip)]
    pub pattern: Option<Regex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    pub description: &'static str,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            normalize: Normalize::None,
            index: IndexKind::None,
            min_len: None,
            max_len: None,
            pattern_source: None,
            pattern: None,
            range: None,
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: &'static str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn string_list(name: &'static str) -> Self {
        Self::new(name, FieldKind::StringList)
    }

    pub fn choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self::new(name, FieldKind::Enum(choices))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Primary key: required, unique, and used for lookups by key.
    pub fn primary(mut self) -> Self {
        self.index = IndexKind::Primary;
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.index = IndexKind::Unique;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = IndexKind::Indexed;
        self
    }

    pub fn trim(mut self) -> Self {
        self.normalize = Normalize::Trim;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.normalize = Normalize::Lowercase;
        self
    }

    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    /// Regex the (normalized) value must match. Compiled at registry build time.
    pub fn pattern(mut self, source: &'static str) -> Self {
        self.pattern_source = Some(source);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn compile(&mut self, type_name: &str) -> Result<(), SchemaError> {
        if let Some(source) = self.pattern_source {
            let regex = Regex::new(source).map_err(|e| SchemaError::InvalidPattern {
                type_name: type_name.to_string(),
                field: self.name.to_string(),
                message: e.to_string(),
            })?;
            self.pattern = Some(regex);
        }
        Ok(())
    }
}

// ── Record Schemas ────────────────────────────────────────────────

/// Anything with a declared field set: entity and relationship descriptors.
///
/// The filter compiler and property validation only need this view.
pub trait RecordSchema {
    fn type_name(&self) -> &str;

    fn fields(&self) -> &[FieldSpec];

    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    fn requires_provenance(&self) -> bool;
}

/// Declaration of an entity (node) type.
#[derive(Debug, Clone, Serialize)]
pub struct EntityTypeDescriptor {
    name: &'static str,
    labels: Vec<&'static str>,
    fields: Vec<FieldSpec>,
    primary_key: Option<&'static str>,
    requires_provenance: bool,
    description: &'static str,
}

impl EntityTypeDescriptor {
    /// Start a descriptor whose single label equals its type name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            labels: vec![name],
            fields: Vec::new(),
            primary_key: None,
            requires_provenance: true,
            description: "",
        }
    }

    /// Replace the native labels (e.g. `["Confluence", "Page"]`).
    pub fn labels(mut self, labels: &[&'static str]) -> Self {
        self.labels = labels.to_vec();
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Opt out of the provenance gate. Only used for bookkeeping types.
    pub fn without_provenance(mut self) -> Self {
        self.requires_provenance = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn native_labels(&self) -> &[&'static str] {
        &self.labels
    }

    /// Label expression for Cypher patterns, e.g. `Confluence:Page`.
    pub fn label_expr(&self) -> String {
        self.labels
            .iter()
            .map(|l| format!("`{l}`"))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn primary_key(&self) -> Option<&'static str> {
        self.primary_key
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    fn finalize(&mut self) -> Result<(), SchemaError> {
        let mut primary = self
            .fields
            .iter()
            .filter(|f| f.index == IndexKind::Primary);
        let pk = primary.next();
        if primary.next().is_some() {
            return Err(SchemaError::MultiplePrimaryKeys {
                type_name: self.name.to_string(),
            });
        }
        if let Some(pk) = pk {
            if !pk.kind.is_textual() || !pk.required {
                return Err(SchemaError::InvalidPrimaryKey {
                    type_name: self.name.to_string(),
                    field: pk.name.to_string(),
                });
            }
            self.primary_key = Some(pk.name);
        }
        for field in &mut self.fields {
            field.compile(self.name)?;
        }
        Ok(())
    }
}

impl RecordSchema for EntityTypeDescriptor {
    fn type_name(&self) -> &str {
        self.name
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn requires_provenance(&self) -> bool {
        self.requires_provenance
    }
}

/// Declaration of a relationship (edge) type.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipTypeDescriptor {
    name: &'static str,
    fields: Vec<FieldSpec>,
    requires_provenance: bool,
    description: &'static str,
}

impl RelationshipTypeDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            requires_provenance: true,
            description: "",
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    fn finalize(&mut self) -> Result<(), SchemaError> {
        for field in &mut self.fields {
            field.compile(self.name)?;
        }
        Ok(())
    }
}

impl RecordSchema for RelationshipTypeDescriptor {
    fn type_name(&self) -> &str {
        self.name
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn requires_provenance(&self) -> bool {
        self.requires_provenance
    }
}

// ── Registry ──────────────────────────────────────────────────────

/// Read-only mapping from type names to descriptors.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<&'static str, EntityTypeDescriptor>,
    relationships: BTreeMap<&'static str, RelationshipTypeDescriptor>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up an entity type by name.
    pub fn lookup(&self, type_name: &str) -> Result<&EntityTypeDescriptor, SchemaError> {
        self.entities
            .get(type_name)
            .ok_or_else(|| SchemaError::UnknownType {
                name: type_name.to_string(),
                available: self.entity_names(),
            })
    }

    /// Look up a relationship type by name.
    pub fn relationship(
        &self,
        type_name: &str,
    ) -> Result<&RelationshipTypeDescriptor, SchemaError> {
        self.relationships
            .get(type_name)
            .ok_or_else(|| SchemaError::UnknownRelationshipType {
                name: type_name.to_string(),
                available: self.relationship_names(),
            })
    }

    /// Primary-key field name of an entity type.
    pub fn primary_key_of(&self, type_name: &str) -> Result<&'static str, SchemaError> {
        self.lookup(type_name)?
            .primary_key()
            .ok_or_else(|| SchemaError::NoPrimaryKey(type_name.to_string()))
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().map(|k| k.to_string()).collect()
    }

    pub fn relationship_names(&self) -> Vec<String> {
        self.relationships.keys().map(|k| k.to_string()).collect()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityTypeDescriptor> {
        self.entities.values()
    }

    pub fn relationship_types(&self) -> impl Iterator<Item = &RelationshipTypeDescriptor> {
        self.relationships.values()
    }
}

/// Collects descriptors, then validates and freezes them into a registry.
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entities: Vec<EntityTypeDescriptor>,
    relationships: Vec<RelationshipTypeDescriptor>,
}

impl SchemaRegistryBuilder {
    pub fn entity(mut self, descriptor: EntityTypeDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    pub fn relationship(mut self, descriptor: RelationshipTypeDescriptor) -> Self {
        self.relationships.push(descriptor);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut registry = SchemaRegistry::default();

        for mut descriptor in self.entities {
            descriptor.finalize()?;
            let name = descriptor.name;
            if registry.entities.insert(name, descriptor).is_some() {
                return Err(SchemaError::DuplicateType(name.to_string()));
            }
        }

        for mut descriptor in self.relationships {
            descriptor.finalize()?;
            let name = descriptor.name;
            if registry.relationships.insert(name, descriptor).is_some() {
                return Err(SchemaError::DuplicateType(name.to_string()));
            }
        }

        tracing::debug!(
            entities = registry.entities.len(),
            relationships = registry.relationships.len(),
            "Schema registry built"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaRegistry {
        SchemaRegistry::builder()
            .entity(
                EntityTypeDescriptor::new("Widget")
                    .field(FieldSpec::string("sku").primary())
                    .field(FieldSpec::integer("count")),
            )
            .entity(EntityTypeDescriptor::new("Gadget").field(FieldSpec::string("name")))
            .relationship(RelationshipTypeDescriptor::new("FITS"))
            .build()
            .unwrap()
    }

    #[test]
    fn lookup_and_primary_key() {
        let registry = sample();
        assert_eq!(registry.lookup("Widget").unwrap().name(), "Widget");
        assert_eq!(registry.primary_key_of("Widget").unwrap(), "sku");
        assert_eq!(
            registry.primary_key_of("Gadget"),
            Err(SchemaError::NoPrimaryKey("Gadget".into()))
        );
    }

    #[test]
    fn unknown_names_enumerate_available_types() {
        let registry = sample();
        match registry.lookup("Sprocket") {
            Err(SchemaError::UnknownType { available, .. }) => {
                assert_eq!(available, vec!["Gadget".to_string(), "Widget".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            registry.relationship("BREAKS"),
            Err(SchemaError::UnknownRelationshipType { .. })
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = SchemaRegistry::builder()
            .entity(EntityTypeDescriptor::new("Widget"))
            .entity(EntityTypeDescriptor::new("Widget"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType("Widget".into()));
    }

    #[test]
    fn two_primary_keys_are_rejected() {
        let err = SchemaRegistry::builder()
            .entity(
                EntityTypeDescriptor::new("Widget")
                    .field(FieldSpec::string("a").primary())
                    .field(FieldSpec::string("b").primary()),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MultiplePrimaryKeys { .. }));
    }

    #[test]
    fn numeric_primary_key_is_rejected() {
        let err = SchemaRegistry::builder()
            .entity(EntityTypeDescriptor::new("Widget").field(FieldSpec::integer("n").primary()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPrimaryKey { .. }));
    }

    #[test]
    fn bad_pattern_fails_at_build() {
        let err = SchemaRegistry::builder()
            .entity(EntityTypeDescriptor::new("Widget").field(FieldSpec::string("x").pattern("(")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));
    }

    #[test]
    fn label_expr_joins_labels() {
        let d = EntityTypeDescriptor::new("ConfluencePage").labels(&["Confluence", "Page"]);
        assert_eq!(d.label_expr(), "`Confluence`:`Page`");
    }

    #[test]
    fn normalize_rules() {
        assert_eq!(Normalize::Trim.apply("  a B "), "a B");
        assert_eq!(Normalize::Lowercase.apply(" A@B.COM "), "a@b.com");
        assert_eq!(Normalize::None.apply(" x "), " x ");
    }
}
