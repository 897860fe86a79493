//! Syntax tree for filter expressions.
//!
//! Mirrors the Python expression grammar closely enough that every
//! construct an attacker might try has its own node kind.

use crate::error::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Str(String),
    Bytes(String),
    Int(i64),
    Float(f64),
    Imaginary(f64),
    Bool(bool),
    None,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    Add,
    Sub,
    Mul,
    MatMul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::MatMul => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Invert,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// One `for target in iter if cond` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// `name=value` in a call, or `**value` when `arg` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Constant(Constant),
    /// Formatted string literal; its interpolations are never parsed.
    FormattedString(String),
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Starred(Box<Expr>),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    /// `None` keys are `**mapping` unpacking entries.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Comprehension {
        kind: ComprehensionKind,
        element: Box<Expr>,
        value: Option<Box<Expr>>,
        generators: Vec<Generator>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    NamedExpr {
        target: String,
        value: Box<Expr>,
    },
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    Import {
        module: String,
        names: Vec<String>,
    },
    Assign {
        targets: Vec<Expr>,
        value: Box<Expr>,
    },
    AugAssign {
        target: Box<Expr>,
        op: &'static str,
        value: Box<Expr>,
    },
}

impl ExprKind {
    /// Description of the construct, used in security errors.
    pub fn describe(&self) -> String {
        match self {
            ExprKind::Name(_) => "name".into(),
            ExprKind::Constant(Constant::Bytes(_)) => "bytes literal".into(),
            ExprKind::Constant(Constant::Imaginary(_)) => "complex number literal".into(),
            ExprKind::Constant(Constant::Ellipsis) => "ellipsis literal".into(),
            ExprKind::Constant(_) => "literal".into(),
            ExprKind::FormattedString(_) => "f-string".into(),
            ExprKind::BoolOp { .. } => "boolean operator".into(),
            ExprKind::BinOp { op, .. } => format!("operator '{}'", op.symbol()),
            ExprKind::UnaryOp { op: UnaryOp::Neg, .. } => "operator '-'".into(),
            ExprKind::UnaryOp { op: UnaryOp::Pos, .. } => "operator '+'".into(),
            ExprKind::UnaryOp { .. } => "negation".into(),
            ExprKind::Compare { .. } => "comparison".into(),
            ExprKind::Call { .. } => "function call".into(),
            ExprKind::Starred(_) => "star unpacking".into(),
            ExprKind::Attribute { attr, .. } => format!("attribute access '.{attr}'"),
            ExprKind::Subscript { .. } => "subscript".into(),
            ExprKind::Slice { .. } => "slice".into(),
            ExprKind::List(_) => "list display".into(),
            ExprKind::Tuple(_) => "tuple".into(),
            ExprKind::Set(_) => "set display".into(),
            ExprKind::Dict { .. } => "dict display".into(),
            ExprKind::Comprehension { kind, .. } => match kind {
                ComprehensionKind::List => "list comprehension".into(),
                ComprehensionKind::Set => "set comprehension".into(),
                ComprehensionKind::Dict => "dict comprehension".into(),
                ComprehensionKind::Generator => "generator expression".into(),
            },
            ExprKind::Lambda { .. } => "lambda".into(),
            ExprKind::IfExp { .. } => "conditional expression".into(),
            ExprKind::NamedExpr { .. } => "assignment expression ':='".into(),
            ExprKind::Await(_) => "await".into(),
            ExprKind::Yield(_) => "yield".into(),
            ExprKind::Import { .. } => "import".into(),
            ExprKind::Assign { .. } => "assignment".into(),
            ExprKind::AugAssign { op, .. } => format!("augmented assignment '{op}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_forbidden_constructs() {
        let call = ExprKind::Call {
            func: Expr::new(ExprKind::Name("open".into()), Span::default()).boxed(),
            args: Vec::new(),
            keywords: Vec::new(),
        };
        assert_eq!(call.describe(), "function call");

        let attr = ExprKind::Attribute {
            value: Expr::new(ExprKind::Name("x".into()), Span::default()).boxed(),
            attr: "__class__".into(),
        };
        assert_eq!(attr.describe(), "attribute access '.__class__'");
        assert_eq!(
            ExprKind::Constant(Constant::Bytes("x".into())).describe(),
            "bytes literal"
        );
    }
}
