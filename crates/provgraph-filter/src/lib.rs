//! Filter expression compiler for the provgraph knowledge graph.
//!
//! Turns an untrusted filter string such as
//! `(email.startswith('alice')) & (title == 'Engineer')` into a typed
//! [`Predicate`] over one record type's declared fields. The source is never
//! executed: it is parsed, every node is checked against a whitelist, and the
//! tree is then evaluated in a namespace that binds nothing but that type's
//! fields.
//!
//! ```text
//! source ──parse──▶ Expr ──validate──▶ Expr ──evaluate(Namespace)──▶ Predicate
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod namespace;
pub mod parser;
pub mod predicate;
pub mod validate;

use provgraph_core::RecordSchema;
use serde::Deserialize;

pub use error::{FilterError, ParseError, Span};
pub use namespace::{Binding, FieldAccessor, Namespace, NamespaceId};
pub use predicate::{CompareOp, FieldRef, Literal, Predicate};

/// Limits applied before an expression is parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileOptions {
    /// Longest accepted expression, in bytes.
    #[serde(default = "default_max_expression_len")]
    pub max_expression_len: usize,
    /// Deepest accepted nesting of brackets, calls and unary operators.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_expression_len() -> usize {
    2000
}

fn default_max_depth() -> usize {
    64
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_expression_len: default_max_expression_len(),
            max_depth: default_max_depth(),
        }
    }
}

/// Compile `source` into a predicate over the fields of `schema`.
pub fn compile<S: RecordSchema + ?Sized>(
    source: &str,
    schema: &S,
    options: &CompileOptions,
) -> Result<Predicate, FilterError> {
    if source.len() > options.max_expression_len {
        return Err(FilterError::Security {
            construct: format!(
                "expression longer than {} characters",
                options.max_expression_len
            ),
            fragment: Span::new(0, source.len(), 1).fragment(source),
        });
    }

    let expr = parser::parse(source, options.max_depth)?;
    validate::validate(&expr, source)?;
    let namespace = Namespace::for_schema(schema);
    let predicate = eval::evaluate(&expr, &namespace, source)?;

    tracing::debug!(
        entity_type = schema.type_name(),
        filter = source,
        predicate = %predicate,
        "Compiled filter"
    );
    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use provgraph_core::catalog;
    use serde_json::json;

    fn person(source: &str) -> Result<Predicate, FilterError> {
        compile(source, &catalog::person(), &CompileOptions::default())
    }

    #[test]
    fn compiles_and_matches() {
        let p = person("(email.startswith('alice')) & (title == 'Engineer')").unwrap();
        let alice = json!({"email": "alice@company.com", "title": "Engineer"});
        let bob = json!({"email": "bob@company.com", "title": "Engineer"});
        assert!(p.matches(alice.as_object().unwrap()));
        assert!(!p.matches(bob.as_object().unwrap()));
    }

    #[test]
    fn each_stage_has_its_own_error() {
        assert_eq!(person("name ==").unwrap_err().kind(), "parse");
        assert_eq!(person("__import__('os')").unwrap_err().kind(), "security");
        assert_eq!(person("salary == 1").unwrap_err().kind(), "name");
        assert_eq!(person("name == 1").unwrap_err().kind(), "type");
    }

    #[test]
    fn security_check_runs_before_name_resolution() {
        // `os` is undeclared, but the call is what gets reported.
        assert_eq!(person("os.system('rm -rf /')").unwrap_err().kind(), "security");
    }

    #[test]
    fn length_limit() {
        let options = CompileOptions {
            max_expression_len: 20,
            ..CompileOptions::default()
        };
        let err = compile(
            "name == 'a very long literal value'",
            &catalog::person(),
            &options,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "security");
        assert!(err.to_string().contains("longer than 20"));
    }

    #[test]
    fn depth_limit() {
        let options = CompileOptions {
            max_depth: 4,
            ..CompileOptions::default()
        };
        let source = "((((((name == 'a'))))))";
        assert_eq!(
            compile(source, &catalog::person(), &options)
                .unwrap_err()
                .kind(),
            "parse"
        );
    }

    #[test]
    fn predicates_only_reference_their_own_type() {
        let page = catalog::confluence_page();
        let p = compile(
            "(title.contains('Roadmap')) | (tags.contains('planning'))",
            &page,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(p.fields().iter().all(|f| f.owner == "ConfluencePage"));
    }

    #[test]
    fn fields_of_another_type_do_not_resolve() {
        let err = compile(
            "email == 'a@co.com'",
            &catalog::team(),
            &CompileOptions::default(),
        )
        .unwrap_err();
        match err {
            FilterError::Name {
                name,
                entity_type,
                available,
            } => {
                assert_eq!(name, "email");
                assert_eq!(entity_type, "Team");
                assert!(!available.contains(&"email".to_string()));
            }
            other => panic!("expected name error, got {other:?}"),
        }
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: CompileOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.max_expression_len, 2000);
    }
}
