//! Whitelist validation of parsed filter expressions.
//!
//! Every node of the tree is checked before anything is evaluated. Only
//! these constructs are permitted:
//!
//! - bare names
//! - string, integer, float, boolean and `None` literals, and negated
//!   numeric literals
//! - one `==` or `!=` comparison per comparison node
//! - `and`, `or`, `not` and their operator forms `&`, `|`, `~`
//! - `field.startswith('..')`, `field.endswith('..')`,
//!   `field.contains('..')` with exactly one string literal argument
//!
//! Anything else fails with [`FilterError::Security`] naming the construct.

use crate::ast::*;
use crate::error::FilterError;

/// Methods that may be called on a field.
pub const ALLOWED_METHODS: &[&str] = &["startswith", "endswith", "contains"];

/// Check every node of `expr` against the whitelist.
pub fn validate(expr: &Expr, source: &str) -> Result<(), FilterError> {
    Validator { source }.visit(expr)
}

struct Validator<'s> {
    source: &'s str,
}

impl Validator<'_> {
    fn reject(&self, construct: impl Into<String>, expr: &Expr) -> FilterError {
        let err = FilterError::security(construct, expr.span, self.source);
        tracing::debug!(error = %err, "Filter rejected by whitelist");
        err
    }

    fn visit(&self, expr: &Expr) -> Result<(), FilterError> {
        match &expr.kind {
            ExprKind::Name(_) => Ok(()),

            ExprKind::Constant(
                Constant::Str(_)
                | Constant::Int(_)
                | Constant::Float(_)
                | Constant::Bool(_)
                | Constant::None,
            ) => Ok(()),

            ExprKind::UnaryOp {
                op: UnaryOp::Not | UnaryOp::Invert,
                operand,
            } => self.visit(operand),

            ExprKind::UnaryOp {
                op: UnaryOp::Neg,
                operand,
            } if matches!(
                operand.kind,
                ExprKind::Constant(Constant::Int(_) | Constant::Float(_))
            ) =>
            {
                Ok(())
            }

            ExprKind::BoolOp { values, .. } => values.iter().try_for_each(|v| self.visit(v)),

            ExprKind::BinOp {
                left,
                op: BinOp::BitAnd | BinOp::BitOr,
                right,
            } => {
                self.visit(left)?;
                self.visit(right)
            }

            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                if ops.len() > 1 {
                    return Err(self.reject("chained comparison", expr));
                }
                if let Some(op) = ops.iter().find(|op| !matches!(op, CmpOp::Eq | CmpOp::NotEq)) {
                    return Err(self.reject(
                        format!("comparison operator '{}'", op.symbol()),
                        expr,
                    ));
                }
                self.visit(left)?;
                comparators.iter().try_for_each(|c| self.visit(c))
            }

            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.visit_call(expr, func, args, keywords),

            _ => Err(self.reject(expr.kind.describe(), expr)),
        }
    }

    /// Only `name.method('literal')` for an allowed method.
    fn visit_call(
        &self,
        call: &Expr,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
    ) -> Result<(), FilterError> {
        let ExprKind::Attribute { value, attr } = &func.kind else {
            let construct = match &func.kind {
                ExprKind::Name(name) => format!("function call '{name}()'"),
                _ => "function call".to_string(),
            };
            return Err(self.reject(construct, call));
        };
        if !ALLOWED_METHODS.contains(&attr.as_str()) {
            return Err(self.reject(format!("method '{attr}()'"), call));
        }
        if !matches!(value.kind, ExprKind::Name(_)) {
            return Err(self.reject(format!("method call on {}", value.kind.describe()), call));
        }
        if !keywords.is_empty() {
            let construct = if keywords.iter().any(|k| k.arg.is_none()) {
                "keyword unpacking '**'"
            } else {
                "keyword arguments"
            };
            return Err(self.reject(construct, call));
        }
        if let Some(starred) = args.iter().find(|a| matches!(a.kind, ExprKind::Starred(_))) {
            return Err(self.reject("argument unpacking '*'", starred));
        }
        match args {
            [arg] if matches!(arg.kind, ExprKind::Constant(Constant::Str(_))) => Ok(()),
            [arg] => {
                self.visit(arg)?;
                Err(self.reject(
                    format!("{attr}() with a non-literal argument"),
                    arg,
                ))
            }
            _ => Err(self.reject(
                format!("{attr}() with {} arguments", args.len()),
                call,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(source: &str) -> Result<(), FilterError> {
        let expr = parse(source, 64).unwrap_or_else(|e| panic!("parse {source:?}: {e}"));
        validate(&expr, source)
    }

    fn rejected(source: &str) -> String {
        match check(source) {
            Err(FilterError::Security { construct, .. }) => construct,
            other => panic!("expected security error for {source:?}, got {other:?}"),
        }
    }

    #[test]
    fn accepts_whitelisted_forms() {
        for source in [
            "name == 'Alice'",
            "name != 'Alice'",
            "age == -5",
            "budget == 1.5",
            "active == True",
            "title == None",
            "(a == 1) & (b == 2)",
            "(a == 1) | ~(b == 2)",
            "a == 1 and not b == 2 or c == 3",
            "email.endswith('@company.com')",
            "name.startswith(\"A\") & tags.contains('x')",
            "'Alice' == name",
        ] {
            assert!(check(source).is_ok(), "expected {source:?} to pass");
        }
    }

    #[test]
    fn rejects_calls_and_attributes() {
        assert_eq!(rejected("open('/etc/passwd')"), "function call 'open()'");
        assert_eq!(rejected("__import__('os')"), "function call '__import__()'");
        assert_eq!(rejected("name.upper() == 'X'"), "method 'upper()'");
        assert_eq!(rejected("name.__class__"), "attribute access '.__class__'");
        assert_eq!(
            rejected("x.__class__.__bases__[0].__subclasses__()"),
            "method '__subclasses__()'"
        );
        assert_eq!(
            rejected("name.lower().startswith('a')"),
            "method call on function call"
        );
        assert_eq!(rejected("(lambda: 1)()"), "function call");
    }

    #[test]
    fn rejects_bad_method_arguments() {
        assert_eq!(
            rejected("name.startswith(prefix)"),
            "startswith() with a non-literal argument"
        );
        assert_eq!(rejected("name.startswith('a', 1)"), "startswith() with 2 arguments");
        assert_eq!(rejected("name.startswith()"), "startswith() with 0 arguments");
        assert_eq!(rejected("name.startswith(*args)"), "argument unpacking '*'");
        assert_eq!(rejected("name.startswith(x='a')"), "keyword arguments");
        assert_eq!(rejected("name.startswith(**kw)"), "keyword unpacking '**'");
        assert_eq!(rejected("name.startswith(f'{x}')"), "f-string");
        assert_eq!(rejected("name.startswith(b'x')"), "bytes literal");
    }

    #[test]
    fn rejects_other_comparisons() {
        assert_eq!(rejected("age > 5"), "comparison operator '>'");
        assert_eq!(rejected("name in ['a']"), "comparison operator 'in'");
        assert_eq!(rejected("name is None"), "comparison operator 'is'");
        assert_eq!(rejected("a == 1 & b == 2"), "chained comparison");
        assert_eq!(rejected("1 == a == 1"), "chained comparison");
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(rejected("import os"), "import");
        assert_eq!(rejected("from os import system"), "import");
        assert_eq!(rejected("name = 'x'"), "assignment");
        assert_eq!(rejected("name += 'x'"), "augmented assignment '+='");
        assert_eq!(rejected("(x := 1)"), "assignment expression ':='");
        assert_eq!(rejected("lambda: 1"), "lambda");
        assert_eq!(rejected("[x for x in y]"), "list comprehension");
        assert_eq!(rejected("name == [1, 2][0]"), "subscript");
        assert_eq!(rejected("name == 'a' + 'b'"), "operator '+'");
        assert_eq!(rejected("age == 2 ** 8"), "operator '**'");
        assert_eq!(rejected("age == -x"), "operator '-'");
        assert_eq!(rejected("a if b else c"), "conditional expression");
        assert_eq!(rejected("name == f'{x}'"), "f-string");
        assert_eq!(rejected("name == b'x'"), "bytes literal");
        assert_eq!(rejected("age == 1j"), "complex number literal");
        assert_eq!(rejected("{'a': 1}"), "dict display");
        assert_eq!(rejected("await x"), "await");
        assert_eq!(rejected("(a == 1) ^ (b == 2)"), "operator '^'");
    }

    #[test]
    fn nested_violations_are_found() {
        assert_eq!(
            rejected("(name == 'a') & (email == open('x'))"),
            "function call 'open()'"
        );
        assert_eq!(rejected("not (name == __import__('os'))"), "function call '__import__()'");
    }
}
