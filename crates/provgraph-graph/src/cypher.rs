//! Translation of compiled predicates into Cypher `WHERE` clauses.
//!
//! Literal values never appear in the generated text; each one becomes a
//! positional parameter (`$filter_0`, `$filter_1`, ...). Property names come
//! from declared schema fields and are backtick-quoted regardless.

use provgraph_core::FieldKind;
use provgraph_filter::{CompareOp, FieldRef, Literal, Predicate};

/// Prefix of generated parameter names.
pub const PARAM_PREFIX: &str = "filter_";

/// A named query parameter produced by translation.
pub type FilterParam = (String, Literal);

/// A `WHERE` clause body plus the parameters it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherFilter {
    pub clause: String,
    pub params: Vec<FilterParam>,
}

impl CypherFilter {
    /// Translate `predicate` for a pattern that binds the record as `var`.
    pub fn translate(predicate: &Predicate, var: &str) -> Self {
        let mut translator = Translator {
            var,
            params: Vec::new(),
        };
        let clause = translator.predicate(predicate);
        Self {
            clause,
            params: translator.params,
        }
    }

    /// ` WHERE <clause>` or an empty string when there is no predicate.
    pub fn where_clause(filter: Option<&CypherFilter>) -> String {
        match filter {
            Some(f) => format!(" WHERE {}", f.clause),
            None => String::new(),
        }
    }
}

struct Translator<'a> {
    var: &'a str,
    params: Vec<FilterParam>,
}

impl Translator<'_> {
    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare { field, op, value } => self.compare(field, *op, value),
            Predicate::IsNull { field, negated } => {
                let test = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {test}", self.property(field))
            }
            Predicate::And { left, right } => {
                format!("({} AND {})", self.predicate(left), self.predicate(right))
            }
            Predicate::Or { left, right } => {
                format!("({} OR {})", self.predicate(left), self.predicate(right))
            }
            Predicate::Not { inner } => format!("NOT ({})", self.predicate(inner)),
        }
    }

    fn compare(&mut self, field: &FieldRef, op: CompareOp, value: &Literal) -> String {
        let property = self.property(field);
        let param = self.param(value);
        match op {
            CompareOp::Eq => format!("{property} = {param}"),
            CompareOp::Ne => format!("{property} <> {param}"),
            CompareOp::StartsWith => format!("{property} STARTS WITH {param}"),
            CompareOp::EndsWith => format!("{property} ENDS WITH {param}"),
            CompareOp::Contains if field.kind == FieldKind::StringList => {
                format!("{param} IN {property}")
            }
            CompareOp::Contains => format!("{property} CONTAINS {param}"),
        }
    }

    fn property(&self, field: &FieldRef) -> String {
        format!("{}.`{}`", self.var, field.name.replace('`', "``"))
    }

    fn param(&mut self, value: &Literal) -> String {
        let name = format!("{PARAM_PREFIX}{}", self.params.len());
        let placeholder = format!("${name}");
        self.params.push((name, value.clone()));
        placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provgraph_core::catalog;
    use provgraph_filter::{compile, CompileOptions};

    fn translate(source: &str) -> CypherFilter {
        let predicate = compile(source, &catalog::person(), &CompileOptions::default()).unwrap();
        CypherFilter::translate(&predicate, "n")
    }

    #[test]
    fn comparisons_use_parameters() {
        let f = translate("(email.startswith('Alice')) & (title == 'Engineer')");
        assert_eq!(
            f.clause,
            "(n.`email` STARTS WITH $filter_0 AND n.`title` = $filter_1)"
        );
        assert_eq!(
            f.params,
            vec![
                ("filter_0".to_string(), Literal::Str("alice".into())),
                ("filter_1".to_string(), Literal::Str("Engineer".into())),
            ]
        );
    }

    #[test]
    fn injection_attempts_stay_in_parameters() {
        let f = translate("name == \"x' OR 1=1 //\"");
        assert_eq!(f.clause, "n.`name` = $filter_0");
        assert_eq!(f.params[0].1, Literal::Str("x' OR 1=1 //".into()));
    }

    #[test]
    fn null_checks_and_negation() {
        let f = translate("~(title == None) | (phone != None)");
        assert_eq!(
            f.clause,
            "(NOT (n.`title` IS NULL) OR n.`phone` IS NOT NULL)"
        );
        assert!(f.params.is_empty());
    }

    #[test]
    fn list_containment_is_membership() {
        let predicate = compile(
            "tags.contains('planning') and not title.endswith('draft')",
            &catalog::confluence_page(),
            &CompileOptions::default(),
        )
        .unwrap();
        let f = CypherFilter::translate(&predicate, "n");
        assert_eq!(
            f.clause,
            "($filter_0 IN n.`tags` AND NOT (n.`title` ENDS WITH $filter_1))"
        );
    }

    #[test]
    fn relationship_variable() {
        let predicate = compile(
            "role.contains('lead')",
            &catalog::works_on(),
            &CompileOptions::default(),
        )
        .unwrap();
        let f = CypherFilter::translate(&predicate, "r");
        assert_eq!(f.clause, "r.`role` CONTAINS $filter_0");
        assert_eq!(CypherFilter::where_clause(Some(&f)), " WHERE r.`role` CONTAINS $filter_0");
        assert_eq!(CypherFilter::where_clause(None), "");
    }
}
