//! Acceptance and rejection guarantees of the filter compiler.

use proptest::prelude::*;
use provgraph_core::catalog;
use provgraph_filter::{compile, CompileOptions, FilterError};

const TEXT_FIELDS: [&str; 8] = [
    "email",
    "name",
    "title",
    "phone",
    "department",
    "primary_location",
    "employee_id",
    "hire_date",
];

fn arb_field() -> impl Strategy<Value = &'static str> {
    prop::sample::select(TEXT_FIELDS.to_vec())
}

fn arb_leaf() -> impl Strategy<Value = String> {
    let text = "[a-zA-Z0-9 @._-]{0,12}";
    prop_oneof![
        (arb_field(), text).prop_map(|(f, v)| format!("{f} == '{v}'")),
        (arb_field(), text).prop_map(|(f, v)| format!("{f} != \"{v}\"")),
        (arb_field(), text).prop_map(|(f, v)| format!("{f}.startswith('{v}')")),
        (arb_field(), text).prop_map(|(f, v)| format!("{f}.endswith('{v}')")),
        (arb_field(), text).prop_map(|(f, v)| format!("{f}.contains('{v}')")),
        (arb_field(), text).prop_map(|(f, v)| format!("'{v}' == {f}")),
        arb_field().prop_map(|f| format!("{f} == None")),
        arb_field().prop_map(|f| format!("{f} != None")),
    ]
}

fn arb_whitelisted() -> impl Strategy<Value = String> {
    arb_leaf().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) & ({b})")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) | ({b})")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) and ({b})")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) or ({b})")),
            inner.clone().prop_map(|a| format!("~({a})")),
            inner.prop_map(|a| format!("not ({a})")),
        ]
    })
}

const FORBIDDEN: &[&str] = &[
    "__import__('os')",
    "import {f}",
    "from {f} import system",
    "open('{f}')",
    "getattr({f}, 'x')",
    "{f}.__class__",
    "{f}.__class__.__bases__[0].__subclasses__()",
    "{f}.upper() == 'A'",
    "{f}.lower().startswith('a')",
    "[x for x in {f}]",
    "{{x for x in {f}}}",
    "({f} for {f} in 'abc')",
    "lambda: {f}",
    "({f} := 'a')",
    "{f} = 'a'",
    "{f} += 'a'",
    "{f}[0] == 'a'",
    "{f}[1:] == 'a'",
    "f'{{{f}}}' == 'a'",
    "{f} == b'a'",
    "{f}.startswith(*['a'])",
    "{f}.startswith(prefix='a')",
    "{f}.startswith({f})",
    "{f}.startswith('a', 1)",
    "{f} > 'a'",
    "{f} in ['a']",
    "{f} is None",
    "{f} == 'a' == 'a'",
    "{f} == 'a' + 'b'",
    "{f} == ('a' if True else 'b')",
    "{f} == {{'a': 1}}",
    "await {f}",
    "yield {f}",
];

fn arb_forbidden() -> impl Strategy<Value = String> {
    (prop::sample::select(FORBIDDEN.to_vec()), arb_field())
        .prop_map(|(template, field)| template.replace("{f}", field).replace("{{", "{").replace("}}", "}"))
}

fn compile_person(source: &str) -> Result<provgraph_filter::Predicate, FilterError> {
    compile(source, &catalog::person(), &CompileOptions::default())
}

proptest! {
    #[test]
    fn whitelisted_filters_compile(source in arb_whitelisted()) {
        let result = compile_person(&source);
        prop_assert!(result.is_ok(), "{source:?} failed: {:?}", result);
    }

    #[test]
    fn forbidden_constructs_are_security_errors(source in arb_forbidden()) {
        let result = compile_person(&source);
        prop_assert!(
            matches!(result, Err(FilterError::Security { .. })),
            "{source:?} gave {:?}",
            result
        );
    }

    #[test]
    fn forbidden_constructs_stay_forbidden_inside_valid_filters(
        good in arb_whitelisted(),
        bad in arb_forbidden(),
    ) {
        // Statement forms are not expressions and cannot be embedded.
        prop_assume!(!bad.starts_with("import") && !bad.starts_with("from") && !bad.starts_with("yield"));
        prop_assume!(!bad.contains(" = ") && !bad.contains("+="));
        let source = format!("({good}) & ({bad})");
        let result = compile_person(&source);
        prop_assert!(
            matches!(result, Err(FilterError::Security { .. })),
            "{source:?} gave {:?}",
            result
        );
    }

    #[test]
    fn arbitrary_input_never_panics(source in "\\PC{0,120}") {
        let _ = compile_person(&source);
    }
}

#[test]
fn canonical_examples() {
    for source in [
        "(email.startswith('alice')) & (title == 'Engineer')",
        "name == 'Alice Smith'",
        "email.endswith('@company.com')",
        "(department == 'Engineering') | (department == 'Research')",
        "~(title == None)",
    ] {
        assert!(compile_person(source).is_ok(), "{source}");
    }
}

#[test]
fn unparenthesized_bitwise_comparisons_are_rejected() {
    // `&` binds tighter than `==`, so this is a chained comparison.
    let err = compile_person("email == 'a' & name == 'b'").unwrap_err();
    assert_eq!(err.kind(), "security");
}
