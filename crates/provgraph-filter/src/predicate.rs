//! Compiled filter predicates.
//!
//! A [`Predicate`] is the only thing a filter expression compiles to. Storage
//! backends translate it into their native query language; the in-memory
//! backend evaluates it directly with [`Predicate::evaluate`], which follows
//! Cypher's three-valued null logic so both backends agree.

use std::fmt;

use provgraph_core::{FieldKind, Properties};
use serde::Serialize;
use serde_json::Value;

/// A typed constant from a filter expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Str(_) => "string",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "boolean",
            Literal::Null => "None",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Null => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    StartsWith,
    EndsWith,
    /// Substring match on text fields, membership on list fields.
    Contains,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::StartsWith => "startswith",
            CompareOp::EndsWith => "endswith",
            CompareOp::Contains => "contains",
        }
    }
}

/// The declared field a predicate leaf reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRef {
    /// Type whose namespace produced this reference.
    pub owner: String,
    pub name: String,
    pub kind: FieldKind,
}

/// Boolean expression tree over the fields of one record type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Literal,
    },
    IsNull {
        field: FieldRef,
        negated: bool,
    },
    And {
        left: Box<Predicate>,
        right: Box<Predicate>,
    },
    Or {
        left: Box<Predicate>,
        right: Box<Predicate>,
    },
    Not {
        inner: Box<Predicate>,
    },
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn negate(self) -> Predicate {
        Predicate::Not {
            inner: Box::new(self),
        }
    }

    /// Every field reference in the tree, leaves in order.
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            Predicate::Compare { field, .. } | Predicate::IsNull { field, .. } => out.push(field),
            Predicate::And { left, right } | Predicate::Or { left, right } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Predicate::Not { inner } => inner.collect_fields(out),
        }
    }

    /// Whether the record satisfies the predicate. Unknown counts as no.
    pub fn matches(&self, properties: &Properties) -> bool {
        self.evaluate(properties) == Some(true)
    }

    /// Three-valued evaluation; `None` is Cypher's `null`.
    pub fn evaluate(&self, properties: &Properties) -> Option<bool> {
        match self {
            Predicate::IsNull { field, negated } => {
                let is_null = properties.get(&field.name).map_or(true, Value::is_null);
                Some(is_null != *negated)
            }
            Predicate::Compare { field, op, value } => {
                let stored = properties.get(&field.name).filter(|v| !v.is_null())?;
                compare(stored, *op, value)
            }
            Predicate::And { left, right } => {
                match (left.evaluate(properties), right.evaluate(properties)) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            }
            Predicate::Or { left, right } => {
                match (left.evaluate(properties), right.evaluate(properties)) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            }
            Predicate::Not { inner } => inner.evaluate(properties).map(|b| !b),
        }
    }
}

fn compare(stored: &Value, op: CompareOp, literal: &Literal) -> Option<bool> {
    match op {
        CompareOp::Eq => equals(stored, literal),
        CompareOp::Ne => equals(stored, literal).map(|b| !b),
        CompareOp::StartsWith | CompareOp::EndsWith | CompareOp::Contains => {
            let Literal::Str(needle) = literal else {
                return None;
            };
            match stored {
                Value::String(s) => Some(match op {
                    CompareOp::StartsWith => s.starts_with(needle.as_str()),
                    CompareOp::EndsWith => s.ends_with(needle.as_str()),
                    _ => s.contains(needle.as_str()),
                }),
                Value::Array(items) if op == CompareOp::Contains => {
                    if items.iter().any(|i| i.as_str() == Some(needle.as_str())) {
                        Some(true)
                    } else if items.iter().any(Value::is_null) {
                        None
                    } else {
                        Some(false)
                    }
                }
                _ => None,
            }
        }
    }
}

/// Cypher `=`: numbers compare by value across int/float, other kinds must
/// match exactly, and values of different kinds are unequal.
fn equals(stored: &Value, literal: &Literal) -> Option<bool> {
    let result = match (stored, literal) {
        (_, Literal::Null) => return None,
        (Value::String(s), Literal::Str(l)) => s == l,
        (Value::Bool(b), Literal::Bool(l)) => b == l,
        (Value::Number(n), Literal::Int(l)) => match n.as_i64() {
            Some(i) => i == *l,
            None => n.as_f64() == Some(*l as f64),
        },
        (Value::Number(n), Literal::Float(l)) => n.as_f64() == Some(*l),
        _ => false,
    };
    Some(result)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                field,
                op: op @ (CompareOp::Eq | CompareOp::Ne),
                value,
            } => write!(f, "{} {} {}", field.name, op.as_str(), value),
            Predicate::Compare { field, op, value } => {
                write!(f, "{}.{}({})", field.name, op.as_str(), value)
            }
            Predicate::IsNull {
                field,
                negated: false,
            } => write!(f, "{} == None", field.name),
            Predicate::IsNull {
                field,
                negated: true,
            } => write!(f, "{} != None", field.name),
            Predicate::And { left, right } => write!(f, "({left}) & ({right})"),
            Predicate::Or { left, right } => write!(f, "({left}) | ({right})"),
            Predicate::Not { inner } => write!(f, "~({inner})"),
        }
    }
}
