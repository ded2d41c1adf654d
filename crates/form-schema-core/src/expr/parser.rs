//! Parser producing the expression AST, built from `nom` combinators.
//!
//! Precedence, lowest first:
//!
//! ```text
//! ternary      a ? b : c
//! logical-or   ||  ??
//! logical-and  &&
//! equality     ==  !=  ===  !==
//! relational   <  <=  >  >=
//! additive     +  -
//! multiplicative  *  /  %
//! unary        !  -  +
//! postfix      .name  [expr]
//! ```
//!
//! Every nested operand and every chained operator counts against
//! [`MAX_DEPTH`]; deeper input is rejected with a parse error.

use std::cell::Cell;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, digit0, digit1, none_of, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    error::{ErrorKind, ParseError},
    multi::fold_many0,
    sequence::{pair, preceded, tuple},
    IResult,
};

use super::value::ExprValue;
use super::ExprError;

/// Deepest AST an expression may produce.
pub(crate) const MAX_DEPTH: usize = 64;

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ast {
    Literal(ExprValue),
    /// A dotted name chain such as `data.age`, resolved against bindings by
    /// longest bound prefix.
    Path(Vec<String>),
    Member(Box<Ast>, String),
    Index(Box<Ast>, Box<Ast>),
    Array(Vec<Ast>),
    Unary(UnaryOp, Box<Ast>),
    Binary(BinaryOp, Box<Ast>, Box<Ast>),
    Logical(LogicalOp, Box<Ast>, Box<Ast>),
    Conditional(Box<Ast>, Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

// ============================================================================
// Public API
// ============================================================================

/// Parses a complete expression.
pub(crate) fn parse(source: &str) -> Result<Ast, ExprError> {
    let parser = Parser {
        depth: Cell::new(0),
    };
    let result = parser.conditional(source).and_then(|(rest, ast)| {
        let rest = rest.trim_start();
        if rest.is_empty() {
            Ok(ast)
        } else {
            Err(nom::Err::Failure(Syntax::new(
                rest,
                format!("unexpected {}", describe(rest)),
            )))
        }
    });

    match result {
        Ok(ast) => Ok(ast),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(ExprError::Parse {
            offset: source.len() - e.at.len(),
            message: e
                .message
                .unwrap_or_else(|| format!("unexpected {}", describe(e.at))),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ExprError::Parse {
            offset: source.len(),
            message: "incomplete expression".to_string(),
        }),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Parse failure positioned at the remaining input.
#[derive(Debug)]
struct Syntax<'a> {
    at: &'a str,
    /// `None` for plain backtracking errors; described on demand.
    message: Option<String>,
}

impl<'a> Syntax<'a> {
    fn new(at: &'a str, message: impl Into<String>) -> Self {
        Self {
            at,
            message: Some(message.into()),
        }
    }

    fn expected(at: &'a str, what: &str) -> Self {
        let at = at.trim_start();
        Self::new(at, format!("expected {what}, found {}", describe(at)))
    }
}

impl<'a> ParseError<&'a str> for Syntax<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            at: input,
            message: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, O> = IResult<&'a str, O, Syntax<'a>>;

fn fail<'a, O>(error: Syntax<'a>) -> PResult<'a, O> {
    Err(nom::Err::Failure(error))
}

// ============================================================================
// Grammar
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Infix {
    fn apply(self, lhs: Ast, rhs: Ast) -> Ast {
        match self {
            Self::Binary(op) => Ast::Binary(op, Box::new(lhs), Box::new(rhs)),
            Self::Logical(op) => Ast::Logical(op, Box::new(lhs), Box::new(rhs)),
        }
    }
}

struct Parser {
    depth: Cell<usize>,
}

impl Parser {
    fn enter<'a>(&self, at: &'a str) -> Result<(), nom::Err<Syntax<'a>>> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return Err(nom::Err::Failure(Syntax::new(
                at.trim_start(),
                format!("expression nests deeper than {MAX_DEPTH} levels"),
            )));
        }
        self.depth.set(depth);
        Ok(())
    }

    fn leave(&self, levels: usize) {
        self.depth.set(self.depth.get().saturating_sub(levels));
    }

    fn conditional<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        let (input, test) = self.logical_or(input)?;
        let (input, question) = opt(symbol("?"))(input)?;
        if question.is_none() {
            return Ok((input, test));
        }
        let (input, consequent) = self.conditional(input)?;
        let (input, _) = expect(input, ":", "`:`")?;
        let (input, alternate) = self.conditional(input)?;
        Ok((
            input,
            Ast::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate)),
        ))
    }

    fn logical_or<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::logical_and, |i| {
            alt((
                value(Infix::Logical(LogicalOp::Or), tag("||")),
                value(Infix::Logical(LogicalOp::Nullish), tag("??")),
            ))(i)
        })
    }

    fn logical_and<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::equality, |i| {
            value(Infix::Logical(LogicalOp::And), tag("&&"))(i)
        })
    }

    fn equality<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::relational, |i| {
            alt((
                value(Infix::Binary(BinaryOp::StrictEq), tag("===")),
                value(Infix::Binary(BinaryOp::StrictNotEq), tag("!==")),
                value(Infix::Binary(BinaryOp::Eq), tag("==")),
                value(Infix::Binary(BinaryOp::NotEq), tag("!=")),
            ))(i)
        })
    }

    fn relational<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::additive, |i| {
            alt((
                value(Infix::Binary(BinaryOp::Le), tag("<=")),
                value(Infix::Binary(BinaryOp::Ge), tag(">=")),
                value(Infix::Binary(BinaryOp::Lt), tag("<")),
                value(Infix::Binary(BinaryOp::Gt), tag(">")),
            ))(i)
        })
    }

    fn additive<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::multiplicative, |i| {
            alt((
                value(Infix::Binary(BinaryOp::Add), char('+')),
                value(Infix::Binary(BinaryOp::Sub), char('-')),
            ))(i)
        })
    }

    fn multiplicative<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.infix_chain(input, Self::unary, |i| {
            alt((
                value(Infix::Binary(BinaryOp::Mul), char('*')),
                value(Infix::Binary(BinaryOp::Div), char('/')),
                value(Infix::Binary(BinaryOp::Rem), char('%')),
            ))(i)
        })
    }

    /// Left-associative chain `operand (op operand)*`.
    fn infix_chain<'a, O>(
        &self,
        input: &'a str,
        operand: fn(&Self, &'a str) -> PResult<'a, Ast>,
        mut operator: O,
    ) -> PResult<'a, Ast>
    where
        O: FnMut(&'a str) -> PResult<'a, Infix>,
    {
        let (mut input, mut lhs) = operand(self, input)?;
        let mut links = 0;
        let result = loop {
            let (after_ws, _) = ws(input)?;
            let (rest, op) = match operator(after_ws) {
                Ok(parsed) => parsed,
                Err(nom::Err::Error(_)) => break Ok((input, lhs)),
                Err(e) => break Err(e),
            };
            if let Err(e) = self.enter(after_ws) {
                break Err(e);
            }
            links += 1;
            match operand(self, rest) {
                Ok((rest, rhs)) => {
                    lhs = op.apply(lhs, rhs);
                    input = rest;
                }
                Err(e) => break Err(e),
            }
        };
        self.leave(links);
        result
    }

    fn unary<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        self.enter(input)?;
        let result = self.prefixed(input);
        self.leave(1);
        result
    }

    fn prefixed<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        let (rest, op) = opt(preceded(
            ws,
            alt((
                value(UnaryOp::Not, char('!')),
                value(UnaryOp::Neg, char('-')),
                value(UnaryOp::Plus, char('+')),
            )),
        ))(input)?;
        match op {
            Some(op) => {
                let (rest, operand) = self.unary(rest)?;
                Ok((rest, Ast::Unary(op, Box::new(operand))))
            }
            None => self.postfix(input),
        }
    }

    fn postfix<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        let (mut input, mut expr) = self.primary(input)?;
        loop {
            if let (rest, Some(_)) = opt(symbol("."))(input)? {
                let (rest, name) = property_name(rest)?;
                expr = match expr {
                    Ast::Path(mut segments) => {
                        segments.push(name);
                        Ast::Path(segments)
                    }
                    other => Ast::Member(Box::new(other), name),
                };
                input = rest;
            } else if let (rest, Some(_)) = opt(symbol("["))(input)? {
                let (rest, index) = self.conditional(rest)?;
                let (rest, _) = expect(rest, "]", "`]`")?;
                expr = Ast::Index(Box::new(expr), Box::new(index));
                input = rest;
            } else if let (_, Some(_)) = opt(symbol("("))(input)? {
                let at = input.trim_start();
                return fail(Syntax::new(
                    at,
                    format!("function calls are not supported, found {}", describe(at)),
                ));
            } else {
                return Ok((input, expr));
            }
        }
    }

    fn primary<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        if let (rest, Some(_)) = opt(symbol("("))(input)? {
            let (rest, inner) = self.conditional(rest)?;
            let (rest, _) = expect(rest, ")", "`)`")?;
            return Ok((rest, inner));
        }
        if let (rest, Some(_)) = opt(symbol("["))(input)? {
            return self.array_literal(rest);
        }

        let (input, _) = ws(input)?;
        alt((number, string_literal, map(identifier, name_or_keyword)))(input).map_err(|e| match e {
            nom::Err::Error(_) => nom::Err::Failure(Syntax::expected(input, "expression")),
            other => other,
        })
    }

    fn array_literal<'a>(&self, input: &'a str) -> PResult<'a, Ast> {
        let mut items = Vec::new();
        let mut input = input;
        loop {
            if let (rest, Some(_)) = opt(symbol("]"))(input)? {
                return Ok((rest, Ast::Array(items)));
            }
            let (rest, item) = self.conditional(input)?;
            items.push(item);
            if let (rest, Some(_)) = opt(symbol(","))(rest)? {
                input = rest;
                continue;
            }
            let (rest, _) = expect(rest, "]", "`,` or `]`")?;
            return Ok((rest, Ast::Array(items)));
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

fn ws(input: &str) -> PResult<'_, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn symbol<'a>(text: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(ws, tag(text))
}

fn expect<'a>(input: &'a str, text: &'static str, what: &str) -> PResult<'a, &'a str> {
    match symbol(text)(input) {
        Ok(parsed) => Ok(parsed),
        Err(_) => fail(Syntax::expected(input, what)),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_continue)))(input)
}

fn property_name(input: &str) -> PResult<'_, String> {
    let at = input.trim_start();
    match identifier(at) {
        Ok((rest, name)) => Ok((rest, name.to_string())),
        Err(_) => fail(Syntax::expected(at, "property name")),
    }
}

fn name_or_keyword(name: &str) -> Ast {
    match name {
        "true" => Ast::Literal(ExprValue::Bool(true)),
        "false" => Ast::Literal(ExprValue::Bool(false)),
        "null" => Ast::Literal(ExprValue::Null),
        "undefined" => Ast::Literal(ExprValue::Undefined),
        "NaN" => Ast::Literal(ExprValue::Number(f64::NAN)),
        "Infinity" => Ast::Literal(ExprValue::Number(f64::INFINITY)),
        _ => Ast::Path(vec![name.to_string()]),
    }
}

/// `12`, `1.5`, `.5`, `2e3`. Signs belong to the unary operators.
fn number_text(input: &str) -> PResult<'_, &str> {
    recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn number(input: &str) -> PResult<'_, Ast> {
    let (rest, text) = number_text(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, Ast::Literal(ExprValue::Number(n)))),
        Err(_) => fail(Syntax::new(input, format!("invalid number `{text}`"))),
    }
}

fn string_literal(input: &str) -> PResult<'_, Ast> {
    let opened: PResult<'_, char> = one_of("'\"")(input);
    let (body, quote) = opened?;
    let stop = if quote == '\'' { "'\\" } else { "\"\\" };

    let content: PResult<'_, String> = fold_many0(
        alt((none_of(stop), preceded(char('\\'), map(anychar, unescape)))),
        String::new,
        |mut text, c| {
            text.push(c);
            text
        },
    )(body);
    let (rest, text) = content?;

    let closed: PResult<'_, char> = char(quote)(rest);
    match closed {
        Ok((rest, _)) => Ok((rest, Ast::Literal(ExprValue::String(text)))),
        Err(_) => fail(Syntax::new(input, "unterminated string literal")),
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Names the token at the start of `rest` for error messages.
fn describe(rest: &str) -> String {
    let rest = rest.trim_start();
    let Some(first) = rest.chars().next() else {
        return "end of input".to_string();
    };
    let token = if is_ident_start(first) {
        rest.split(|c| !is_ident_continue(c)).next().unwrap_or(rest)
    } else {
        &rest[..first.len_utf8()]
    };
    format!("`{token}`")
}
