//! Evaluation of validated expressions into predicates.
//!
//! The evaluator has arms for the whitelisted node kinds only. Names
//! resolve through the [`Namespace`] and nowhere else; any other node is
//! refused even if validation was somehow skipped.

use crate::ast::*;
use crate::error::FilterError;
use crate::namespace::{Binding, FieldAccessor, Namespace};
use crate::predicate::{Literal, Predicate};

/// Intermediate result of evaluating one node.
enum Value<'ns> {
    Field(&'ns FieldAccessor),
    Literal(Literal),
    Predicate(Predicate),
}

impl Value<'_> {
    fn describe(&self) -> String {
        match self {
            Value::Field(f) => format!("field {}", f.name()),
            Value::Literal(l) => format!("literal {l}"),
            Value::Predicate(_) => "condition".to_string(),
        }
    }
}

/// Evaluate `expr` in `namespace`; the result must be a condition.
pub fn evaluate(expr: &Expr, namespace: &Namespace, source: &str) -> Result<Predicate, FilterError> {
    let evaluator = Evaluator { namespace, source };
    match evaluator.eval(expr)? {
        Value::Predicate(p) => Ok(p),
        other => Err(FilterError::Type(format!(
            "filter must be a condition, got {}",
            other.describe()
        ))),
    }
}

struct Evaluator<'ns, 's> {
    namespace: &'ns Namespace,
    source: &'s str,
}

impl<'ns> Evaluator<'ns, '_> {
    fn eval(&self, expr: &Expr) -> Result<Value<'ns>, FilterError> {
        match &expr.kind {
            ExprKind::Name(name) => match self.namespace.resolve(name)? {
                Binding::Field(accessor) if self.namespace.owns(accessor) => {
                    Ok(Value::Field(accessor))
                }
                Binding::Field(_) => Err(self.refuse(expr)),
                Binding::Constant(c) => Ok(Value::Literal(c.clone())),
            },

            ExprKind::Constant(c) => match c {
                Constant::Str(s) => Ok(Value::Literal(Literal::Str(s.clone()))),
                Constant::Int(i) => Ok(Value::Literal(Literal::Int(*i))),
                Constant::Float(f) => Ok(Value::Literal(Literal::Float(*f))),
                Constant::Bool(b) => Ok(Value::Literal(Literal::Bool(*b))),
                Constant::None => Ok(Value::Literal(Literal::Null)),
                _ => Err(self.refuse(expr)),
            },

            ExprKind::UnaryOp {
                op: UnaryOp::Neg,
                operand,
            } => match &operand.kind {
                ExprKind::Constant(Constant::Int(i)) => i
                    .checked_neg()
                    .map(|n| Value::Literal(Literal::Int(n)))
                    .ok_or_else(|| FilterError::Type("integer literal out of range".into())),
                ExprKind::Constant(Constant::Float(f)) => Ok(Value::Literal(Literal::Float(-f))),
                _ => Err(self.refuse(expr)),
            },

            ExprKind::UnaryOp {
                op: UnaryOp::Not | UnaryOp::Invert,
                operand,
            } => {
                let inner = self.condition(operand, "not")?;
                Ok(Value::Predicate(inner.negate()))
            }

            ExprKind::BoolOp { op, values } => {
                let keyword = match op {
                    BoolOp::And => "and",
                    BoolOp::Or => "or",
                };
                let mut iter = values.iter();
                let Some(first) = iter.next() else {
                    return Err(self.refuse(expr));
                };
                let mut acc = self.condition(first, keyword)?;
                for value in iter {
                    let next = self.condition(value, keyword)?;
                    acc = match op {
                        BoolOp::And => acc.and(next),
                        BoolOp::Or => acc.or(next),
                    };
                }
                Ok(Value::Predicate(acc))
            }

            ExprKind::BinOp {
                left,
                op: op @ (BinOp::BitAnd | BinOp::BitOr),
                right,
            } => {
                let symbol = op.symbol();
                let left = self.condition(left, symbol)?;
                let right = self.condition(right, symbol)?;
                Ok(Value::Predicate(match op {
                    BinOp::BitAnd => left.and(right),
                    _ => left.or(right),
                }))
            }

            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => match (ops.as_slice(), comparators.as_slice()) {
                ([op @ (CmpOp::Eq | CmpOp::NotEq)], [right]) => {
                    let left = self.eval(left)?;
                    let right = self.eval(right)?;
                    self.compare(*op, left, right).map(Value::Predicate)
                }
                _ => Err(self.refuse(expr)),
            },

            ExprKind::Call {
                func,
                args,
                keywords,
            } if keywords.is_empty() => self.call(expr, func, args).map(Value::Predicate),

            _ => Err(self.refuse(expr)),
        }
    }

    /// Evaluate an operand of a logical operator, which must be a condition.
    fn condition(&self, expr: &Expr, operator: &str) -> Result<Predicate, FilterError> {
        match self.eval(expr)? {
            Value::Predicate(p) => Ok(p),
            other => Err(FilterError::Type(format!(
                "'{operator}' needs conditions on both sides, got {}",
                other.describe()
            ))),
        }
    }

    fn compare(
        &self,
        op: CmpOp,
        left: Value<'ns>,
        right: Value<'ns>,
    ) -> Result<Predicate, FilterError> {
        let (field, literal) = match (left, right) {
            (Value::Field(f), Value::Literal(l)) | (Value::Literal(l), Value::Field(f)) => (f, l),
            (Value::Field(a), Value::Field(b)) => {
                return Err(FilterError::Type(format!(
                    "cannot compare field {} with field {}; compare a field with a literal",
                    a.name(),
                    b.name()
                )));
            }
            (Value::Literal(a), Value::Literal(b)) => {
                return Err(FilterError::Type(format!(
                    "comparison of {a} with {b} does not involve a field"
                )));
            }
            (a, b) => {
                return Err(FilterError::Type(format!(
                    "cannot compare {} with {}",
                    a.describe(),
                    b.describe()
                )));
            }
        };
        match op {
            CmpOp::Eq => field.eq(literal),
            _ => field.ne(literal),
        }
    }

    fn call(&self, call: &Expr, func: &Expr, args: &[Expr]) -> Result<Predicate, FilterError> {
        let ExprKind::Attribute { value, attr } = &func.kind else {
            return Err(self.refuse(call));
        };
        let ExprKind::Name(_) = value.kind else {
            return Err(self.refuse(call));
        };
        let [arg] = args else {
            return Err(self.refuse(call));
        };

        let field = match self.eval(value)? {
            Value::Field(f) => f,
            other => {
                return Err(FilterError::Type(format!(
                    "{attr}() must be called on a field, not {}",
                    other.describe()
                )));
            }
        };
        let literal = match self.eval(arg)? {
            Value::Literal(l) => l,
            _ => return Err(self.refuse(arg)),
        };

        match attr.as_str() {
            "startswith" => field.startswith(literal),
            "endswith" => field.endswith(literal),
            "contains" => field.contains(literal),
            _ => Err(self.refuse(call)),
        }
    }

    fn refuse(&self, expr: &Expr) -> FilterError {
        FilterError::security(expr.kind.describe(), expr.span, self.source)
    }
}
