// crates/nods-rules/src/expr.rs
// ============================================================================
// Module: Rule Expression Language
// Description: Lexer, recursive-descent parser, and evaluator for rule text.
// Purpose: Evaluate boolean/arithmetic expressions over bound parameters.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Rule expressions combine literals and named parameters with boolean,
//! comparison, and arithmetic operators. The input is fully normalized before
//! it reaches this module: references are placeholders such as `__p0`, date
//! macros are quoted literals, and operator aliases are canonical.
//! Security posture: rule text comes from catalogue files and is treated as
//! untrusted; input size, token count, and nesting are bounded.
//!
//! ### Grammar (informal, lowest precedence first)
//! - `||`
//! - `&&`
//! - `==` `!=`
//! - `<` `<=` `>` `>=`
//! - `+` `-`
//! - `*` `/` `%`
//! - unary `!` `-`
//! - literals (`12`, `1.5`, `"text"`, `'text'`, `true`, `false`), parameters,
//!   and `( ... )`
//!
//! Strings compare lexicographically, which orders ISO dates correctly. `+`
//! concatenates when either side is a string.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Number;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted expression size in bytes.
pub const MAX_EXPR_INPUT_BYTES: usize = 64 * 1024;
/// Maximum nesting depth for parentheses and unary chains.
const MAX_EXPR_NESTING: usize = 32;
/// Maximum number of tokens in one expression.
const MAX_EXPR_TOKENS: usize = 4096;

// ============================================================================
// SECTION: Values
// ============================================================================

/// Runtime value of an expression or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    Str(String),
}

impl Value {
    /// Returns the truthiness used by logical operators.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(flag) => *flag,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::Str(text) => !text.is_empty(),
        }
    }

    /// Converts the value into JSON; integral numbers become integers.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(flag) => serde_json::Value::Bool(*flag),
            Self::Number(number) => integral(*number).map_or_else(
                || Number::from_f64(*number).map_or(serde_json::Value::Null, serde_json::Value::Number),
                serde_json::Value::from,
            ),
            Self::Str(text) => serde_json::Value::String(text.clone()),
        }
    }

    /// Returns a short type label for diagnostics.
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Number(number) => match integral(*number) {
                Some(whole) => write!(f, "{whole}"),
                None => write!(f, "{number}"),
            },
            Self::Str(text) => f.write_str(text),
        }
    }
}

/// Returns the integer form of an integral float within the exact range.
#[allow(clippy::cast_possible_truncation, reason = "Range and fraction are checked first.")]
fn integral(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= LIMIT {
        Some(value as i64)
    } else {
        None
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing or evaluating an expression.
///
/// # Invariants
/// - Positions are byte offsets into the normalized expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// Input was empty or whitespace only.
    EmptyInput,
    /// Input exceeded the size limit.
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input produced more tokens than allowed.
    TooManyTokens {
        /// Maximum allowed tokens.
        max_tokens: usize,
    },
    /// Nesting exceeded the depth limit.
    NestingTooDeep {
        /// Maximum allowed depth.
        max_depth: usize,
        /// Byte offset where the limit was hit.
        position: usize,
    },
    /// Unexpected token or character.
    UnexpectedToken {
        /// Expectation summary.
        expected: &'static str,
        /// What was found.
        found: String,
        /// Byte offset.
        position: usize,
    },
    /// String literal was not closed.
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// Numeric literal failed to parse.
    InvalidNumber {
        /// Raw literal text.
        raw: String,
        /// Byte offset.
        position: usize,
    },
    /// Identifier is not a bound parameter.
    UnknownParameter {
        /// Identifier text.
        name: String,
        /// Byte offset.
        position: usize,
    },
    /// Operator applied to unsupported operand types.
    TypeMismatch {
        /// Operator text.
        operator: &'static str,
        /// Left (or only) operand type.
        left: &'static str,
        /// Right operand type; empty for unary operators.
        right: &'static str,
        /// Byte offset of the operator.
        position: usize,
    },
    /// Division or remainder by zero.
    DivisionByZero {
        /// Byte offset of the operator.
        position: usize,
    },
    /// Input continued after a complete expression.
    TrailingInput {
        /// Byte offset of the trailing input.
        position: usize,
    },
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "expression is empty"),
            Self::InputTooLarge {
                max_bytes,
                actual_bytes,
            } => write!(f, "expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})"),
            Self::TooManyTokens {
                max_tokens,
            } => write!(f, "expression exceeds token limit (max {max_tokens})"),
            Self::NestingTooDeep {
                max_depth,
                position,
            } => write!(f, "expression nesting exceeds limit {max_depth} at {position}"),
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => write!(f, "unexpected token `{found}` at {position}, expected {expected}"),
            Self::UnterminatedString {
                position,
            } => write!(f, "unterminated string starting at {position}"),
            Self::InvalidNumber {
                raw,
                position,
            } => write!(f, "invalid number `{raw}` at {position}"),
            Self::UnknownParameter {
                name,
                position,
            } => write!(f, "unknown parameter `{name}` at {position}"),
            Self::TypeMismatch {
                operator,
                left,
                right,
                position,
            } => {
                if right.is_empty() {
                    write!(f, "operator `{operator}` cannot apply to {left} at {position}")
                } else {
                    write!(f, "operator `{operator}` cannot apply to {left} and {right} at {position}")
                }
            }
            Self::DivisionByZero {
                position,
            } => write!(f, "division by zero at {position}"),
            Self::TrailingInput {
                position,
            } => write!(f, "unexpected trailing input at {position}"),
        }
    }
}

impl std::error::Error for ExprError {}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parsed expression ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Root node.
    root: Expr,
}

impl Expression {
    /// Parses expression text.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] for empty or oversized input, lexical errors,
    /// syntax errors, or nesting beyond the limit.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        if input.len() > MAX_EXPR_INPUT_BYTES {
            return Err(ExprError::InputTooLarge {
                max_bytes: MAX_EXPR_INPUT_BYTES,
                actual_bytes: input.len(),
            });
        }
        let tokens = Lexer::new(input).lex()?;
        let mut parser = Parser::new(tokens);
        let root = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok(Self {
            root,
        })
    }

    /// Evaluates the expression against bound parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] for unknown parameters, type mismatches, or
    /// division by zero.
    pub fn evaluate(&self, params: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        self.root.eval(params)
    }
}

/// Parses and evaluates `input` in one step.
///
/// # Errors
///
/// Returns [`ExprError`] on any parse or evaluation failure.
pub fn evaluate(input: &str, params: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
    Expression::parse(input)?.evaluate(params)
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Numeric literal.
    Number(f64),
    /// String literal with escapes resolved.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// Parameter name.
    Ident(String),
    /// `||`
    Or,
    /// `&&`
    And,
    /// `!`
    Not,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// End of input.
    Eof,
}

impl Token {
    /// Formats the token for diagnostics.
    fn describe(&self) -> String {
        match self {
            Self::Number(number) => Value::Number(*number).to_string(),
            Self::Str(text) => format!("\"{text}\""),
            Self::Bool(flag) => flag.to_string(),
            Self::Ident(name) => name.clone(),
            Self::Eof => "end of input".to_string(),
            other => other.operator().to_string(),
        }
    }

    /// Returns the operator text for operator tokens.
    const fn operator(&self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Not => "!",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Number(_) | Self::Str(_) | Self::Bool(_) | Self::Ident(_) | Self::Eof => "",
        }
    }
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken {
    /// Token value.
    token: Token,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer over normalized expression text.
struct Lexer<'a> {
    /// Source input.
    input: &'a str,
    /// Current byte offset.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer for `input`.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the whole input.
    fn lex(&mut self) -> Result<Vec<SpannedToken>, ExprError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();
        while let Some(&ch) = bytes.get(self.offset) {
            if tokens.len() >= MAX_EXPR_TOKENS {
                return Err(ExprError::TooManyTokens {
                    max_tokens: MAX_EXPR_TOKENS,
                });
            }
            let start = self.offset;
            let token = match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                    continue;
                }
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'*' => self.single(Token::Star),
                b'/' => self.single(Token::Slash),
                b'%' => self.single(Token::Percent),
                b'|' => self.pair(b'|', Token::Or, "||")?,
                b'&' => self.pair(b'&', Token::And, "&&")?,
                b'=' => self.pair(b'=', Token::Eq, "==")?,
                b'!' => self.optional_pair(b'=', Token::Ne, Token::Not),
                b'<' => self.optional_pair(b'=', Token::Le, Token::Lt),
                b'>' => self.optional_pair(b'=', Token::Ge, Token::Gt),
                b'"' | b'\'' => self.string(ch)?,
                b'0' ..= b'9' | b'.' => self.number()?,
                b'a' ..= b'z' | b'A' ..= b'Z' | b'_' => self.identifier(),
                _ => {
                    let found = self.input[start ..].chars().next().unwrap_or('?');
                    return Err(ExprError::UnexpectedToken {
                        expected: "literal, parameter, or operator",
                        found: found.to_string(),
                        position: start,
                    });
                }
            };
            tokens.push(SpannedToken {
                token,
                position: start,
            });
        }
        if tokens.is_empty() {
            return Err(ExprError::EmptyInput);
        }
        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Consumes one byte and yields `token`.
    const fn single(&mut self, token: Token) -> Token {
        self.offset += 1;
        token
    }

    /// Consumes a mandatory two-byte operator.
    fn pair(&mut self, second: u8, token: Token, expected: &'static str) -> Result<Token, ExprError> {
        if self.input.as_bytes().get(self.offset + 1) == Some(&second) {
            self.offset += 2;
            Ok(token)
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: self.input[self.offset ..= self.offset].to_string(),
                position: self.offset,
            })
        }
    }

    /// Consumes a one- or two-byte operator.
    fn optional_pair(&mut self, second: u8, long: Token, short: Token) -> Token {
        if self.input.as_bytes().get(self.offset + 1) == Some(&second) {
            self.offset += 2;
            long
        } else {
            self.offset += 1;
            short
        }
    }

    /// Lexes a quoted string literal.
    fn string(&mut self, quote: u8) -> Result<Token, ExprError> {
        let start = self.offset;
        let mut text = String::new();
        let mut chars = self.input[start + 1 ..].char_indices();
        while let Some((index, ch)) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, escaped)) => text.push(escaped),
                    None => break,
                }
            } else if u32::from(ch) == u32::from(quote) {
                self.offset = start + 1 + index + 1;
                return Ok(Token::Str(text));
            } else {
                text.push(ch);
            }
        }
        Err(ExprError::UnterminatedString {
            position: start,
        })
    }

    /// Lexes a decimal number literal.
    fn number(&mut self) -> Result<Token, ExprError> {
        let start = self.offset;
        let bytes = self.input.as_bytes();
        let mut seen_dot = false;
        while let Some(&b) = bytes.get(self.offset) {
            if b.is_ascii_digit() {
                self.offset += 1;
            } else if b == b'.' && !seen_dot {
                seen_dot = true;
                self.offset += 1;
            } else {
                break;
            }
        }
        let raw = &self.input[start .. self.offset];
        raw.parse::<f64>().map(Token::Number).map_err(|_| ExprError::InvalidNumber {
            raw: raw.to_string(),
            position: start,
        })
    }

    /// Lexes an identifier or boolean keyword.
    fn identifier(&mut self) -> Token {
        let start = self.offset;
        let bytes = self.input.as_bytes();
        while bytes.get(self.offset).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
            self.offset += 1;
        }
        match &self.input[start .. self.offset] {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            name => Token::Ident(name.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Syntax Tree
// ============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    /// Logical negation.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary (non-logical) operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl BinaryOp {
    /// Maps a token to its binary operator.
    const fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Eq => Some(Self::Eq),
            Token::Ne => Some(Self::Ne),
            Token::Lt => Some(Self::Lt),
            Token::Le => Some(Self::Le),
            Token::Gt => Some(Self::Gt),
            Token::Ge => Some(Self::Ge),
            Token::Plus => Some(Self::Add),
            Token::Minus => Some(Self::Sub),
            Token::Star => Some(Self::Mul),
            Token::Slash => Some(Self::Div),
            Token::Percent => Some(Self::Rem),
            _ => None,
        }
    }

    /// Returns the operator text.
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    /// Literal value.
    Literal(Value),
    /// Bound parameter reference.
    Param {
        /// Parameter name.
        name: String,
        /// Byte offset.
        position: usize,
    },
    /// Short-circuit disjunction.
    Any(Vec<Expr>),
    /// Short-circuit conjunction.
    All(Vec<Expr>),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
        /// Byte offset of the operator.
        position: usize,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
        /// Byte offset of the operator.
        position: usize,
    },
}

impl Expr {
    /// Evaluates the node.
    fn eval(&self, params: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Param {
                name,
                position,
            } => params.get(name).cloned().ok_or_else(|| ExprError::UnknownParameter {
                name: name.clone(),
                position: *position,
            }),
            Self::Any(parts) => {
                for part in parts {
                    if part.eval(params)?.truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Self::All(parts) => {
                for part in parts {
                    if !part.eval(params)?.truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Self::Unary {
                op,
                operand,
                position,
            } => {
                let value = operand.eval(params)?;
                match (op, value) {
                    (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
                    (UnaryOp::Neg, Value::Number(number)) => Ok(Value::Number(-number)),
                    (UnaryOp::Neg, other) => Err(ExprError::TypeMismatch {
                        operator: "-",
                        left: other.type_name(),
                        right: "",
                        position: *position,
                    }),
                }
            }
            Self::Binary {
                op,
                left,
                right,
                position,
            } => apply_binary(*op, left.eval(params)?, right.eval(params)?, *position),
        }
    }
}

/// Applies a binary operator to evaluated operands.
#[allow(clippy::float_cmp, reason = "Equality mirrors the expression language semantics.")]
fn apply_binary(op: BinaryOp, left: Value, right: Value, position: usize) -> Result<Value, ExprError> {
    let mismatch = |left: &Value, right: &Value| ExprError::TypeMismatch {
        operator: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
        position,
    };
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(&left, &right)),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                return Err(mismatch(&left, &right));
            };
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && *b == 0.0 {
                return Err(ExprError::DivisionByZero {
                    position,
                });
            }
            Ok(Value::Number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over the token stream.
struct Parser {
    /// Token stream with positions.
    tokens: Vec<SpannedToken>,
    /// Current token index.
    index: usize,
    /// Current nesting depth.
    nesting: usize,
}

impl Parser {
    /// Creates a parser; `tokens` always ends with [`Token::Eof`].
    const fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses a full expression.
    fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    /// Parses `||` chains.
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut parts = vec![self.parse_and()?];
        while self.matches(&Token::Or) {
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Expr::Any(parts) })
    }

    /// Parses `&&` chains.
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut parts = vec![self.parse_equality()?];
        while self.matches(&Token::And) {
            parts.push(self.parse_equality()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Expr::All(parts) })
    }

    /// Parses `==` and `!=`.
    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(&[Token::Eq, Token::Ne], Self::parse_comparison)
    }

    /// Parses ordering comparisons.
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(&[Token::Lt, Token::Le, Token::Gt, Token::Ge], Self::parse_additive)
    }

    /// Parses `+` and `-`.
    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(&[Token::Plus, Token::Minus], Self::parse_multiplicative)
    }

    /// Parses `*`, `/`, and `%`.
    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.parse_binary_level(&[Token::Star, Token::Slash, Token::Percent], Self::parse_unary)
    }

    /// Parses a left-associative level of binary operators.
    fn parse_binary_level(
        &mut self,
        operators: &[Token],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        loop {
            let current = self.current().clone();
            if !operators.contains(&current.token) {
                return Ok(left);
            }
            let Some(op) = BinaryOp::from_token(&current.token) else {
                return Ok(left);
            };
            self.advance();
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: current.position,
            };
        }
    }

    /// Parses unary operators.
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let position = self.current().position;
        let op = match self.current().token {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.with_nesting(position, |parser| {
            let operand = parser.parse_unary()?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                position,
            })
        })
    }

    /// Parses literals, parameters, and parenthesized expressions.
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let SpannedToken {
            token,
            position,
        } = self.current().clone();
        match token {
            Token::Number(number) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(number)))
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Literal(Value::Str(text)))
            }
            Token::Bool(flag) => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(flag)))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Param {
                    name,
                    position,
                })
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_expression()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            other => Err(ExprError::UnexpectedToken {
                expected: "literal, parameter, or `(`",
                found: other.describe(),
                position,
            }),
        }
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPR_NESTING {
            return Err(ExprError::NestingTooDeep {
                max_depth: MAX_EXPR_NESTING,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes `token` or fails.
    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ExprError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken {
                expected,
                found: self.current().token.describe(),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser reached end of input.
    fn expect_eof(&self) -> Result<(), ExprError> {
        if self.current().token == Token::Eof {
            Ok(())
        } else {
            Err(ExprError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the current token when it equals `token`.
    fn matches(&mut self, token: &Token) -> bool {
        if &self.current().token == token {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    /// Advances to the next token, stopping at end of input.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}
