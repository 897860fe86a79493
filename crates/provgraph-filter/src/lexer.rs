//! Lexer for filter expressions.
//!
//! Tokenizes the full Python expression surface, not only the whitelisted
//! subset: forbidden constructs must survive lexing and parsing so the
//! validator can name them.

use crate::error::{ParseError, ParseResult, Span};

/// A string literal with the prefix flags that matter to validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StrLiteral {
    pub value: String,
    pub bytes: bool,
    pub formatted: bool,
}

/// Token types.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Name(String),
    Int(i64),
    Float(f64),
    Imaginary(f64),
    Str(StrLiteral),

    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    Lambda,
    For,
    Async,
    Await,
    Yield,
    Import,
    From,
    As,
    True,
    False,
    None,
    /// Statement keywords that can never start or continue an expression.
    Reserved(&'static str),

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Ellipsis,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    At,
    LShift,
    RShift,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    Assign,
    Walrus,
    AugAssign(&'static str),

    Eof,
}

impl TokenKind {
    /// Human-readable token description for error messages.
    pub fn name(&self) -> String {
        match self {
            TokenKind::Name(n) => format!("name '{n}'"),
            TokenKind::Int(i) => format!("number {i}"),
            TokenKind::Float(f) => format!("number {f}"),
            TokenKind::Imaginary(f) => format!("number {f}j"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Reserved(kw) => format!("keyword '{kw}'"),
            TokenKind::AugAssign(op) => format!("'{op}'"),
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Lambda => "lambda",
            TokenKind::For => "for",
            TokenKind::Async => "async",
            TokenKind::Await => "await",
            TokenKind::Yield => "yield",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::None => "None",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Ellipsis => "...",
            TokenKind::Arrow => "->",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::DoubleStar => "**",
            TokenKind::Slash => "/",
            TokenKind::DoubleSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::At => "@",
            TokenKind::LShift => "<<",
            TokenKind::RShift => ">>",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Assign => "=",
            TokenKind::Walrus => ":=",
            _ => "?",
        }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "is" => TokenKind::Is,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "lambda" => TokenKind::Lambda,
        "for" => TokenKind::For,
        "async" => TokenKind::Async,
        "await" => TokenKind::Await,
        "yield" => TokenKind::Yield,
        "import" => TokenKind::Import,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "True" => TokenKind::True,
        "False" => TokenKind::False,
        "None" => TokenKind::None,
        "assert" => TokenKind::Reserved("assert"),
        "break" => TokenKind::Reserved("break"),
        "class" => TokenKind::Reserved("class"),
        "continue" => TokenKind::Reserved("continue"),
        "def" => TokenKind::Reserved("def"),
        "del" => TokenKind::Reserved("del"),
        "elif" => TokenKind::Reserved("elif"),
        "except" => TokenKind::Reserved("except"),
        "finally" => TokenKind::Reserved("finally"),
        "global" => TokenKind::Reserved("global"),
        "nonlocal" => TokenKind::Reserved("nonlocal"),
        "pass" => TokenKind::Reserved("pass"),
        "raise" => TokenKind::Reserved("raise"),
        "return" => TokenKind::Reserved("return"),
        "try" => TokenKind::Reserved("try"),
        "while" => TokenKind::Reserved("while"),
        "with" => TokenKind::Reserved("with"),
        _ => return None,
    };
    Some(kind)
}

/// A token with its span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Lexer state.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            column: 1,
        }
    }

    /// Tokenize all input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_nth(0)
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        self.column += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    fn span_from(&self, start: usize, start_col: usize) -> Span {
        Span::new(start, self.pos, start_col)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else if c == '#' {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.next_char();
                }
            } else if c == '\\' && matches!(self.peek_nth(1), Some('\n') | Some('\r')) {
                self.next_char();
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_trivia();

        let start = self.pos;
        let start_col = self.column;

        let Some(c) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start, start_col)));
        };

        if c.is_ascii_digit() || (c == '.' && self.peek_nth(1).is_some_and(|d| d.is_ascii_digit()))
        {
            return self.number(start, start_col);
        }
        if c == '\'' || c == '"' {
            return self.string("", start, start_col);
        }
        if c.is_alphabetic() || c == '_' {
            return self.identifier(start, start_col);
        }

        self.next_char();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            '.' => {
                if self.peek_char() == Some('.') && self.peek_nth(1) == Some('.') {
                    self.next_char();
                    self.next_char();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            ':' => {
                if self.eat('=') {
                    TokenKind::Walrus
                } else {
                    TokenKind::Colon
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    return Err(ParseError::new(
                        "unexpected character '!'",
                        self.span_from(start, start_col),
                    ));
                }
            }
            '<' => {
                if self.eat('<') {
                    self.augmented("<<=", TokenKind::LShift)
                } else if self.eat('=') {
                    TokenKind::LtEq
                } else if self.eat('>') {
                    return Err(ParseError::new(
                        "'<>' is not an operator, use '!='",
                        self.span_from(start, start_col),
                    ));
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    self.augmented(">>=", TokenKind::RShift)
                } else if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '-' => {
                if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    self.augmented("-=", TokenKind::Minus)
                }
            }
            '*' => {
                if self.eat('*') {
                    self.augmented("**=", TokenKind::DoubleStar)
                } else {
                    self.augmented("*=", TokenKind::Star)
                }
            }
            '/' => {
                if self.eat('/') {
                    self.augmented("//=", TokenKind::DoubleSlash)
                } else {
                    self.augmented("/=", TokenKind::Slash)
                }
            }
            '+' => self.augmented("+=", TokenKind::Plus),
            '%' => self.augmented("%=", TokenKind::Percent),
            '@' => self.augmented("@=", TokenKind::At),
            '&' => self.augmented("&=", TokenKind::Amp),
            '|' => self.augmented("|=", TokenKind::Pipe),
            '^' => self.augmented("^=", TokenKind::Caret),
            other => {
                return Err(ParseError::new(
                    format!("unexpected character '{other}'"),
                    self.span_from(start, start_col),
                )
                .with_found(other.to_string()));
            }
        };

        Ok(Token::new(kind, self.span_from(start, start_col)))
    }

    /// `op` followed by `=` is an augmented assignment.
    fn augmented(&mut self, aug: &'static str, plain: TokenKind) -> TokenKind {
        if self.eat('=') {
            TokenKind::AugAssign(aug)
        } else {
            plain
        }
    }

    fn identifier(&mut self, start: usize, start_col: usize) -> ParseResult<Token> {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.next_char();
            } else {
                break;
            }
        }
        let ident = &self.input[start..self.pos];

        if matches!(self.peek_char(), Some('\'') | Some('"')) && is_string_prefix(ident) {
            return self.string(ident, start, start_col);
        }

        let kind = keyword(ident).unwrap_or_else(|| TokenKind::Name(ident.to_string()));
        Ok(Token::new(kind, self.span_from(start, start_col)))
    }

    fn string(&mut self, prefix: &str, start: usize, start_col: usize) -> ParseResult<Token> {
        let prefix = prefix.to_ascii_lowercase();
        let raw = prefix.contains('r');
        let bytes = prefix.contains('b');
        let formatted = prefix.contains('f');

        let Some(quote) = self.next_char() else {
            return Err(ParseError::unexpected_eof(
                self.span_from(start, start_col),
                "string literal",
            ));
        };
        let triple = self.peek_char() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.next_char();
            self.next_char();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.next_char() else {
                return Err(ParseError::new(
                    "unterminated string literal",
                    self.span_from(start, start_col),
                ));
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek_char() == Some(quote) && self.peek_nth(1) == Some(quote) {
                    self.next_char();
                    self.next_char();
                    break;
                }
                value.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(ParseError::new(
                    "unterminated string literal",
                    self.span_from(start, start_col),
                ));
            }
            if bytes && !c.is_ascii() {
                return Err(ParseError::new(
                    "bytes can only contain ASCII literal characters",
                    self.span_from(start, start_col),
                ));
            }
            if c == '\\' {
                if raw {
                    value.push('\\');
                    if let Some(next) = self.next_char() {
                        value.push(next);
                    }
                } else {
                    self.escape(&mut value, bytes, start, start_col)?;
                }
                continue;
            }
            value.push(c);
        }

        Ok(Token::new(
            TokenKind::Str(StrLiteral {
                value,
                bytes,
                formatted,
            }),
            self.span_from(start, start_col),
        ))
    }

    fn escape(
        &mut self,
        out: &mut String,
        bytes: bool,
        start: usize,
        start_col: usize,
    ) -> ParseResult<()> {
        let Some(c) = self.next_char() else {
            return Err(ParseError::new(
                "unterminated string literal",
                self.span_from(start, start_col),
            ));
        };
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek_char().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            self.next_char();
                            code = code * 8 + d;
                        }
                        None => break,
                    }
                }
                out.push(self.code_point(code, start, start_col)?);
            }
            'x' => {
                let code = self.hex_digits(2, start, start_col)?;
                out.push(self.code_point(code, start, start_col)?);
            }
            'u' if !bytes => {
                let code = self.hex_digits(4, start, start_col)?;
                out.push(self.code_point(code, start, start_col)?);
            }
            'U' if !bytes => {
                let code = self.hex_digits(8, start, start_col)?;
                out.push(self.code_point(code, start, start_col)?);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize, start: usize, start_col: usize) -> ParseResult<u32> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .next_char()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| {
                    ParseError::new("truncated escape sequence", self.span_from(start, start_col))
                })?;
            code = code.saturating_mul(16).saturating_add(digit);
        }
        Ok(code)
    }

    fn code_point(&self, code: u32, start: usize, start_col: usize) -> ParseResult<char> {
        char::from_u32(code).ok_or_else(|| {
            ParseError::new(
                format!("invalid character code {code:#x} in escape"),
                self.span_from(start, start_col),
            )
        })
    }

    fn number(&mut self, start: usize, start_col: usize) -> ParseResult<Token> {
        let radix = if self.peek_char() == Some('0') {
            match self.peek_nth(1).map(|c| c.to_ascii_lowercase()) {
                Some('x') => Some(16),
                Some('o') => Some(8),
                Some('b') => Some(2),
                _ => None,
            }
        } else {
            None
        };

        let kind = if let Some(radix) = radix {
            self.next_char();
            self.next_char();
            let digits = self.digits(|c| c.is_digit(radix));
            if digits.is_empty() {
                return Err(ParseError::new(
                    "invalid number literal",
                    self.span_from(start, start_col),
                ));
            }
            let value = i64::from_str_radix(&digits, radix).map_err(|_| {
                ParseError::new("integer literal too large", self.span_from(start, start_col))
            })?;
            TokenKind::Int(value)
        } else {
            let mut text = self.digits(|c| c.is_ascii_digit());
            let mut is_float = false;
            if self.peek_char() == Some('.') {
                self.next_char();
                is_float = true;
                text.push('.');
                text.push_str(&self.digits(|c| c.is_ascii_digit()));
            }
            if matches!(self.peek_char(), Some('e') | Some('E')) {
                let sign = self.peek_nth(1);
                let has_exp = match sign {
                    Some('+') | Some('-') => self.peek_nth(2).is_some_and(|d| d.is_ascii_digit()),
                    Some(d) => d.is_ascii_digit(),
                    None => false,
                };
                if has_exp {
                    self.next_char();
                    text.push('e');
                    if let Some(s @ ('+' | '-')) = self.peek_char() {
                        self.next_char();
                        text.push(s);
                    }
                    text.push_str(&self.digits(|c| c.is_ascii_digit()));
                    is_float = true;
                }
            }

            if matches!(self.peek_char(), Some('j') | Some('J')) {
                self.next_char();
                TokenKind::Imaginary(self.parse_float(&text, start, start_col)?)
            } else if is_float {
                TokenKind::Float(self.parse_float(&text, start, start_col)?)
            } else {
                if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
                    return Err(ParseError::new(
                        "leading zeros in decimal integer literals are not permitted",
                        self.span_from(start, start_col),
                    ));
                }
                let value = text.parse::<i64>().map_err(|_| {
                    ParseError::new("integer literal too large", self.span_from(start, start_col))
                })?;
                TokenKind::Int(value)
            }
        };

        if self.peek_char().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.next_char();
            return Err(ParseError::new(
                "invalid number literal",
                self.span_from(start, start_col),
            ));
        }

        Ok(Token::new(kind, self.span_from(start, start_col)))
    }

    /// Consume digits accepted by `accept`, allowing `_` separators.
    fn digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if accept(c) {
                text.push(c);
                self.next_char();
            } else if c == '_' && self.peek_nth(1).is_some_and(&accept) {
                self.next_char();
            } else {
                break;
            }
        }
        text
    }

    fn parse_float(&self, text: &str, start: usize, start_col: usize) -> ParseResult<f64> {
        let normalized = if text.starts_with('.') {
            format!("0{text}")
        } else {
            text.to_string()
        };
        normalized
            .parse::<f64>()
            .map_err(|_| ParseError::new("invalid number literal", self.span_from(start, start_col)))
    }
}

fn is_string_prefix(ident: &str) -> bool {
    matches!(
        ident.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn string(value: &str) -> TokenKind {
        TokenKind::Str(StrLiteral {
            value: value.to_string(),
            bytes: false,
            formatted: false,
        })
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            kinds("name == 'Alice'"),
            vec![
                TokenKind::Name("name".into()),
                TokenKind::EqEq,
                string("Alice"),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("& | ~ != <= >= ** // := ->"),
            vec![
                TokenKind::Amp,
                TokenKind::Pipe,
                TokenKind::Tilde,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::DoubleStar,
                TokenKind::DoubleSlash,
                TokenKind::Walrus,
                TokenKind::Arrow,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("x += 1"),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::AugAssign("+="),
                TokenKind::Int(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("not True and None or import"),
            vec![
                TokenKind::Not,
                TokenKind::True,
                TokenKind::And,
                TokenKind::None,
                TokenKind::Or,
                TokenKind::Import,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("del")[0], TokenKind::Reserved("del"));
        assert_eq!(kinds("true")[0], TokenKind::Name("true".into()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], TokenKind::Int(42));
        assert_eq!(kinds("1_000")[0], TokenKind::Int(1000));
        assert_eq!(kinds("0x1F")[0], TokenKind::Int(31));
        assert_eq!(kinds("0b101")[0], TokenKind::Int(5));
        assert_eq!(kinds("3.5")[0], TokenKind::Float(3.5));
        assert_eq!(kinds(".5")[0], TokenKind::Float(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
        assert_eq!(kinds("2j")[0], TokenKind::Imaginary(2.0));
        assert!(Lexer::new("99999999999999999999").tokenize().is_err());
        assert!(Lexer::new("012").tokenize().is_err());
        assert!(Lexer::new("1abc").tokenize().is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds(r#""it's""#)[0], string("it's"));
        assert_eq!(kinds(r"'a\nb'")[0], string("a\nb"));
        assert_eq!(kinds(r"'\x41é'")[0], string("Aé"));
        assert_eq!(kinds(r"r'\d+'")[0], string(r"\d+"));
        assert_eq!(kinds("'''multi\nline'''")[0], string("multi\nline"));
        assert_eq!(kinds(r"'\q'")[0], string(r"\q"));

        let TokenKind::Str(lit) = &kinds("b'raw'")[0] else {
            panic!("expected string");
        };
        assert!(lit.bytes);
        let TokenKind::Str(lit) = &kinds("f'{x}'")[0] else {
            panic!("expected string");
        };
        assert!(lit.formatted);
        assert_eq!(lit.value, "{x}");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("name == 'Alice").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!(err.column(), 9);
    }

    #[test]
    fn test_comments_and_continuations() {
        assert_eq!(
            kinds("a # trailing\n  \\\n b"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Name("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("name == $x").tokenize().unwrap_err();
        assert_eq!(err.found.as_deref(), Some("$"));
        assert!(Lexer::new("a ! b").tokenize().is_err());
        assert!(Lexer::new("a <> b").tokenize().is_err());
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("ab == 'c'").tokenize().unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 2, 1));
        assert_eq!(tokens[1].span, Span::new(3, 5, 4));
        assert_eq!(tokens[2].span, Span::new(6, 9, 7));
    }
}
