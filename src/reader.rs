//! S-expression reader and syntactic analysis.
//!
//! Parsing happens in two stages: a nom-based tokenizer/parser producing raw
//! s-expression data, then an analysis pass turning data into the [`Exp`]
//! tree. The analysis pass is where the two dialects diverge:
//!
//! - [`Dialect::Core`]: no dictionary syntax; `dict`, `get` and `dict?` are
//!   ordinary primitives applied to association-list data.
//! - [`Dialect::Sugar`]: `(dict (key expr) ...)` is a first-class literal
//!   form whose keys must be identifiers.
//!
//! Quoted data supports dotted pairs (`'(a . 1)`), which the core dialect
//! needs for association-list literals.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    multi::{many1, separated_list0},
    sequence::{preceded, terminated},
};

use crate::ast::{Exp, Form, Program, Value, is_valid_symbol, SYMBOL_SPECIAL_CHARS};
use crate::primitives::is_primitive;
use crate::{Error, MAX_PARSE_DEPTH};

/// Which surface language the analysis pass accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Dictionaries are data built with the `dict`/`get`/`dict?` primitives
    Core,
    /// Dictionaries are first-class literal syntax
    Sugar,
}

/// Raw parsed s-expression data, before syntactic analysis
#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Num(f64),
    Bool(bool),
    Str(String),
    Sym(String),
    List(Vec<SExpr>),
    /// A list with a dotted tail: `(a b . c)`
    Dotted(Vec<SExpr>, Box<SExpr>),
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::Char => format!("expected character at position {position}"),
                ErrorKind::Tag => format!("unexpected token at position {position}"),
                ErrorKind::TooLarge => {
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})")
                }
                _ => {
                    if position < input.len() {
                        let remaining_chars: String =
                            input.chars().skip(position).take(10).collect();
                        format!("invalid syntax near '{remaining_chars}'")
                    } else {
                        "unexpected end of input".into()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "incomplete input".into(),
    }
}

/// Parse a number: optional sign, digits, optional fractional part
fn parse_number(input: &str) -> IResult<&str, SExpr> {
    let (input, number_str) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        opt((char('.'), take_while1(|c: char| c.is_ascii_digit()))),
    ))
    .parse(input)?;

    match number_str.parse::<f64>() {
        Ok(n) => Ok((input, SExpr::Num(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, SExpr> {
    alt((
        value(SExpr::Bool(true), tag("#t")),
        value(SExpr::Bool(false), tag("#f")),
    ))
    .parse(input)
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, SExpr> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, SExpr::Sym(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )))
    }
}

/// Parse a string literal with escape sequences
fn parse_string(input: &str) -> IResult<&str, SExpr> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = Vec::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), SExpr::Str(chars.into_iter().collect())));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    _ => {
                        // Unknown or incomplete escape sequence
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            nom::error::ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // End of input without a closing quote
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parse a (possibly dotted) list
fn parse_list(input: &str, depth: usize) -> IResult<&str, SExpr> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;

    let (input, elements) =
        separated_list0(multispace1, |i| parse_sexpr(i, depth + 1)).parse(input)?;

    // Optional dotted tail: `(a . b)`. Requires at least one leading element.
    let (input, dotted_tail) = if elements.is_empty() {
        (input, None)
    } else {
        opt(preceded((multispace1, char('.'), multispace1), |i| {
            parse_sexpr(i, depth + 1)
        }))
        .parse(input)?
    };

    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char(')').parse(input)?;

    match dotted_tail {
        Some(tail) => Ok((input, SExpr::Dotted(elements, Box::new(tail)))),
        None => Ok((input, SExpr::List(elements))),
    }
}

/// Parse quote shorthand ('expr -> (quote expr))
fn parse_quote(input: &str, depth: usize) -> IResult<&str, SExpr> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = parse_sexpr(input, depth + 1)?;
    Ok((
        input,
        SExpr::List(vec![SExpr::Sym("quote".into()), expr]),
    ))
}

/// Parse a single s-expression with depth tracking
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, SExpr> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    preceded(
        multispace0,
        alt((
            |i| parse_quote(i, depth),
            |i| parse_list(i, depth),
            parse_number,
            parse_bool,
            parse_string,
            parse_symbol,
        )),
    )
    .parse(input)
}

/// Parse a whole program: one or more top-level forms
pub fn parse_program(input: &str, dialect: Dialect) -> Result<Program, Error> {
    match terminated(many1(|i| parse_sexpr(i, 0)), multispace0).parse(input) {
        Ok(("", sexprs)) => {
            let forms = sexprs
                .iter()
                .map(|sx| analyze_form(sx, dialect))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Program { forms })
        }
        Ok((remaining, _)) => Err(Error::ParseError(format!(
            "unexpected remaining input: '{remaining}'"
        ))),
        Err(e) => Err(Error::ParseError(parse_error_to_message(input, e))),
    }
}

/// Parse a single expression (no `define` allowed)
pub fn parse_exp(input: &str, dialect: Dialect) -> Result<Exp, Error> {
    match terminated(|i| parse_sexpr(i, 0), multispace0).parse(input) {
        Ok(("", sexpr)) => analyze_exp(&sexpr, dialect),
        Ok((remaining, _)) => Err(Error::ParseError(format!(
            "unexpected remaining input: '{remaining}'"
        ))),
        Err(e) => Err(Error::ParseError(parse_error_to_message(input, e))),
    }
}

/// Analyze a top-level form: a `define` or an ordinary expression
fn analyze_form(sx: &SExpr, dialect: Dialect) -> Result<Form, Error> {
    if let SExpr::List(items) = sx {
        if let Some(SExpr::Sym(head)) = items.first() {
            if head == "define" {
                return match &items[1..] {
                    [SExpr::Sym(name), val] => Ok(Form::Define {
                        var: name.clone(),
                        val: analyze_exp(val, dialect)?,
                    }),
                    [_, _] => Err(Error::ParseError(
                        "define requires a symbol name".into(),
                    )),
                    args => Err(Error::ParseError(format!(
                        "define requires a name and a value, got {} arguments",
                        args.len()
                    ))),
                };
            }
        }
    }
    Ok(Form::Exp(analyze_exp(sx, dialect)?))
}

/// Analyze an expression
fn analyze_exp(sx: &SExpr, dialect: Dialect) -> Result<Exp, Error> {
    match sx {
        SExpr::Num(n) => Ok(Exp::Num(*n)),
        SExpr::Bool(b) => Ok(Exp::Bool(*b)),
        SExpr::Str(s) => Ok(Exp::Str(s.clone())),
        SExpr::Sym(name) => {
            if is_primitive(name) {
                Ok(Exp::Prim(name.clone()))
            } else {
                Ok(Exp::Var(name.clone()))
            }
        }
        SExpr::Dotted(..) => Err(Error::ParseError(
            "dotted pair outside quoted data".into(),
        )),
        SExpr::List(items) => match items.split_first() {
            None => Err(Error::ParseError(
                "cannot evaluate the empty list ()".into(),
            )),
            Some((head, rest)) => analyze_compound(head, rest, dialect),
        },
    }
}

/// Analyze a non-empty list: special form or application
fn analyze_compound(head: &SExpr, rest: &[SExpr], dialect: Dialect) -> Result<Exp, Error> {
    if let SExpr::Sym(name) = head {
        match name.as_str() {
            "quote" => {
                return match rest {
                    [datum] => Ok(Exp::Lit(sexpr_to_value(datum))),
                    _ => Err(Error::ParseError(format!(
                        "quote requires exactly 1 argument, got {}",
                        rest.len()
                    ))),
                };
            }
            "if" => {
                return match rest {
                    [test, then, alt] => Ok(Exp::If {
                        test: Box::new(analyze_exp(test, dialect)?),
                        then: Box::new(analyze_exp(then, dialect)?),
                        alt: Box::new(analyze_exp(alt, dialect)?),
                    }),
                    _ => Err(Error::ParseError(format!(
                        "if requires exactly 3 arguments, got {}",
                        rest.len()
                    ))),
                };
            }
            "lambda" => return analyze_lambda(rest, dialect),
            "define" => {
                return Err(Error::ParseError(
                    "define is only allowed at the top level".into(),
                ));
            }
            "dict" if dialect == Dialect::Sugar => return analyze_dict(rest, dialect),
            _ => {}
        }
    }

    let rator = analyze_exp(head, dialect)?;
    let rands = rest
        .iter()
        .map(|r| analyze_exp(r, dialect))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Exp::App {
        rator: Box::new(rator),
        rands,
    })
}

/// Analyze a procedure literal: `(lambda (params...) body...)`
fn analyze_lambda(rest: &[SExpr], dialect: Dialect) -> Result<Exp, Error> {
    match rest {
        [SExpr::List(param_list), body @ ..] if !body.is_empty() => {
            let mut params = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    SExpr::Sym(name) => {
                        if params.contains(name) {
                            return Err(Error::ParseError(format!(
                                "duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    _ => {
                        return Err(Error::ParseError(
                            "lambda parameters must be symbols".into(),
                        ));
                    }
                }
            }
            let body = body
                .iter()
                .map(|e| analyze_exp(e, dialect))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Exp::Proc { params, body })
        }
        [SExpr::List(_)] => Err(Error::ParseError(
            "lambda requires a non-empty body".into(),
        )),
        _ => Err(Error::ParseError(
            "lambda requires a parameter list and a body".into(),
        )),
    }
}

/// Analyze a sugared-dialect dictionary literal: `(dict (key expr) ...)`.
/// Keys must be identifiers; they are taken verbatim as symbols and are
/// never evaluated.
fn analyze_dict(entries: &[SExpr], dialect: Dialect) -> Result<Exp, Error> {
    let mut analyzed = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            SExpr::List(parts) => match parts.as_slice() {
                [SExpr::Sym(key), value_exp] => {
                    analyzed.push((Value::Symbol(key.clone()), analyze_exp(value_exp, dialect)?));
                }
                [_, _] => {
                    return Err(Error::ParseError(
                        "dictionary keys must be identifiers".into(),
                    ));
                }
                _ => {
                    return Err(Error::ParseError(
                        "dictionary entries must be (key value) pairs".into(),
                    ));
                }
            },
            _ => {
                return Err(Error::ParseError(
                    "dictionary entries must be (key value) pairs".into(),
                ));
            }
        }
    }
    Ok(Exp::Dict(analyzed))
}

/// Convert raw s-expression data into a quoted datum value
fn sexpr_to_value(sx: &SExpr) -> Value {
    match sx {
        SExpr::Num(n) => Value::Num(*n),
        SExpr::Bool(b) => Value::Bool(*b),
        SExpr::Str(s) => Value::Str(s.clone()),
        SExpr::Sym(name) => Value::Symbol(name.clone()),
        SExpr::List(items) => items
            .iter()
            .rev()
            .fold(Value::Nil, |acc, item| {
                Value::Pair(Box::new(sexpr_to_value(item)), Box::new(acc))
            }),
        SExpr::Dotted(items, tail) => items
            .iter()
            .rev()
            .fold(sexpr_to_value(tail), |acc, item| {
                Value::Pair(Box::new(sexpr_to_value(item)), Box::new(acc))
            }),
    }
}
