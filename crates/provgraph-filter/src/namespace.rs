//! Safe name-resolution environment for one record type.
//!
//! A [`Namespace`] binds exactly the declared fields of a type, plus the
//! constants `True`, `False` and `None`. Nothing else resolves: there are no
//! builtins, modules or objects to reach through.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use provgraph_core::record::{canonical_date, canonical_datetime};
use provgraph_core::{FieldKind, FieldSpec, Normalize, RecordSchema};

use crate::error::FilterError;
use crate::predicate::{CompareOp, FieldRef, Literal, Predicate};

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

/// Identity of one namespace instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(u64);

impl NamespaceId {
    fn fresh() -> Self {
        NamespaceId(NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a name resolves to.
#[derive(Debug, Clone)]
pub enum Binding {
    Field(FieldAccessor),
    Constant(Literal),
}

#[derive(Debug)]
pub struct Namespace {
    id: NamespaceId,
    type_name: String,
    bindings: BTreeMap<String, Binding>,
}

impl Namespace {
    /// Build a fresh namespace exposing the fields of `schema`.
    pub fn for_schema<S: RecordSchema + ?Sized>(schema: &S) -> Self {
        let id = NamespaceId::fresh();
        let mut bindings = BTreeMap::new();
        for spec in schema.fields() {
            bindings.insert(
                spec.name.to_string(),
                Binding::Field(FieldAccessor::new(id, schema.type_name(), spec)),
            );
        }
        bindings.insert("True".into(), Binding::Constant(Literal::Bool(true)));
        bindings.insert("False".into(), Binding::Constant(Literal::Bool(false)));
        bindings.insert("None".into(), Binding::Constant(Literal::Null));

        Self {
            id,
            type_name: schema.type_name().to_string(),
            bindings,
        }
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Resolve a name, failing closed on anything undeclared.
    pub fn resolve(&self, name: &str) -> Result<&Binding, FilterError> {
        self.bindings.get(name).ok_or_else(|| FilterError::Name {
            name: name.to_string(),
            entity_type: self.type_name.clone(),
            available: self.field_names().map(str::to_string).collect(),
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|(name, b)| match b {
            Binding::Field(_) => Some(name.as_str()),
            Binding::Constant(_) => None,
        })
    }

    /// Whether `accessor` was handed out by this namespace.
    pub fn owns(&self, accessor: &FieldAccessor) -> bool {
        accessor.namespace == self.id
    }
}

/// One field of one namespace; the only way to build predicate leaves.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    namespace: NamespaceId,
    field: FieldRef,
    normalize: Normalize,
}

impl FieldAccessor {
    fn new(namespace: NamespaceId, owner: &str, spec: &FieldSpec) -> Self {
        Self {
            namespace,
            field: FieldRef {
                owner: owner.to_string(),
                name: spec.name.to_string(),
                kind: spec.kind.clone(),
            },
            normalize: spec.normalize,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.field.kind
    }

    pub fn eq(&self, value: Literal) -> Result<Predicate, FilterError> {
        self.equality(CompareOp::Eq, value)
    }

    pub fn ne(&self, value: Literal) -> Result<Predicate, FilterError> {
        self.equality(CompareOp::Ne, value)
    }

    pub fn startswith(&self, value: Literal) -> Result<Predicate, FilterError> {
        self.text_match(CompareOp::StartsWith, value)
    }

    pub fn endswith(&self, value: Literal) -> Result<Predicate, FilterError> {
        self.text_match(CompareOp::EndsWith, value)
    }

    /// Substring match on text fields, membership on list fields.
    pub fn contains(&self, value: Literal) -> Result<Predicate, FilterError> {
        self.text_match(CompareOp::Contains, value)
    }

    fn equality(&self, op: CompareOp, value: Literal) -> Result<Predicate, FilterError> {
        if value == Literal::Null {
            return Ok(Predicate::IsNull {
                field: self.field.clone(),
                negated: op == CompareOp::Ne,
            });
        }

        let value = match (&self.field.kind, value) {
            (FieldKind::Enum(choices), Literal::Str(s)) => {
                let s = self.normalize.apply(&s);
                if !choices.iter().any(|c| *c == s) {
                    return Err(FilterError::Type(format!(
                        "'{s}' is not a valid value for {}; expected one of: {}",
                        self.field.name,
                        choices.join(", ")
                    )));
                }
                Literal::Str(s)
            }
            (FieldKind::Date, Literal::Str(s)) => {
                Literal::Str(self.temporal(canonical_date, &s, "a YYYY-MM-DD date")?)
            }
            (FieldKind::DateTime, Literal::Str(s)) => {
                Literal::Str(self.temporal(canonical_datetime, &s, "an RFC 3339 datetime")?)
            }
            (kind, Literal::Str(s)) if kind.is_textual() => Literal::Str(self.normalize.apply(&s)),
            (FieldKind::Integer | FieldKind::Float, v @ (Literal::Int(_) | Literal::Float(_))) => v,
            (FieldKind::Boolean, v @ Literal::Bool(_)) => v,
            (FieldKind::StringList, _) => {
                return Err(FilterError::Type(format!(
                    "{} is a list field; use {}.contains('...')",
                    self.field.name, self.field.name
                )));
            }
            (kind, v) => return Err(self.mismatch(kind, &v)),
        };

        Ok(Predicate::Compare {
            field: self.field.clone(),
            op,
            value,
        })
    }

    fn text_match(&self, op: CompareOp, value: Literal) -> Result<Predicate, FilterError> {
        let applicable = match op {
            CompareOp::Contains => {
                self.field.kind.is_textual() || self.field.kind == FieldKind::StringList
            }
            _ => self.field.kind.is_textual(),
        };
        if !applicable {
            return Err(FilterError::Type(format!(
                "{}() does not apply to {} field {}",
                op.as_str(),
                self.field.kind.name(),
                self.field.name
            )));
        }

        let s = match value {
            Literal::Str(s) => s,
            other => {
                return Err(FilterError::Type(format!(
                    "{}() expects a string, got {}",
                    op.as_str(),
                    other.kind_name()
                )));
            }
        };
        // Stored values are lowercased, so the pattern must be too. Trimming
        // would change what a prefix or suffix means.
        let s = if self.normalize == Normalize::Lowercase {
            s.to_lowercase()
        } else {
            s
        };

        Ok(Predicate::Compare {
            field: self.field.clone(),
            op,
            value: Literal::Str(s),
        })
    }

    /// Render a date or datetime literal exactly as validation stores it.
    fn temporal(
        &self,
        canonical: fn(&str) -> Option<String>,
        raw: &str,
        expected: &str,
    ) -> Result<String, FilterError> {
        canonical(&self.normalize.apply(raw)).ok_or_else(|| {
            FilterError::Type(format!(
                "'{raw}' is not {expected}, as {} requires",
                self.field.name
            ))
        })
    }

    fn mismatch(&self, kind: &FieldKind, value: &Literal) -> FilterError {
        FilterError::Type(format!(
            "cannot compare {} field {} with {} {}",
            kind.name(),
            self.field.name,
            value.kind_name(),
            value
        ))
    }
}
