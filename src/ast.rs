//! Expression tree and runtime value model.
//!
//! The main types are [`Exp`] (the expression tree produced by the reader and
//! consumed by the evaluator and the lowering pass) and [`Value`] (the closed
//! universe of runtime values). `define` is confined to the top level by the
//! [`Form`]/[`Exp`] split: a [`Program`] is a sequence of forms, and only
//! forms may be definitions.
//!
//! Every type here implements `Display`, rendering surface syntax. The
//! rendering is used pervasively in error messages (dictionary lookup
//! failures dump the whole dictionary) and round-trips through the reader
//! for plain data.

use std::fmt;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false, // name is empty
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-' {
                if let Some(second_char) = chars.next() {
                    if second_char.is_ascii_digit() {
                        return false;
                    }
                }
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Runtime values. The set is closed: evaluation never produces anything
/// outside these tags.
///
/// Pairs serve double duty as cons cells and, by convention, as
/// association-list entries for the core dialect's data-level dictionaries.
/// Closures own their parameter names and body verbatim and capture no
/// environment; application resolves free variables by substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numbers (host floating point)
    Num(f64),
    /// Boolean values
    Bool(bool),
    /// String literals
    Str(String),
    /// Symbols, compared by name
    Symbol(String),
    /// The unique empty-list terminator
    Nil,
    /// A cons cell: first / rest
    Pair(Box<Value>, Box<Value>),
    /// User-defined procedures. No captured environment: the body is held
    /// verbatim and closed over by substitution at application time.
    Closure { params: Vec<String>, body: Vec<Exp> },
    /// A reference to a built-in operation, identified by name
    Prim(String),
    /// Sugared-dialect dictionaries: an ordered key/value sequence.
    /// Insertion order is preserved; duplicate keys are not rejected at
    /// construction time (lookup is first-match-wins).
    Dict(Vec<DictEntry>),
}

/// One entry of a sugared-dialect dictionary value. Keys coming from surface
/// syntax are always symbols, but programmatically built dictionaries may key
/// on any value; lookup uses deep structural equality either way.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Value,
    pub value: Value,
}

/// Expressions. Produced by the reader, walked by the evaluator and the
/// lowering pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    /// Numeric literal
    Num(f64),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Variable reference
    Var(String),
    /// Primitive-operation reference (not yet applied)
    Prim(String),
    /// Quoted literal datum
    Lit(Value),
    /// Conditional: any test value other than `#f` selects the then-branch
    If {
        test: Box<Exp>,
        then: Box<Exp>,
        alt: Box<Exp>,
    },
    /// Procedure literal: parameter names plus a non-empty body sequence
    Proc { params: Vec<String>, body: Vec<Exp> },
    /// Application: operator expression plus ordered argument expressions
    App { rator: Box<Exp>, rands: Vec<Exp> },
    /// Sugared-dialect dictionary literal: ordered (key, value-expression)
    /// entries. Keys are data (symbols from surface syntax), never evaluated.
    Dict(Vec<(Value, Exp)>),
}

/// A top-level form: either a definition or an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Define { var: String, val: Exp },
    Exp(Exp),
}

/// A whole program: an ordered sequence of top-level forms
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub forms: Vec<Form>,
}

/// Deep structural equality, used for dictionary-key matching.
///
/// Unlike the `eq?` primitive (which never equates two pairs), this recurses
/// into pair structure: two independently constructed pairs match iff their
/// components match. Closures, primitives, and dictionaries never compare
/// equal under this predicate.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (Value::Pair(a1, a2), Value::Pair(b1, b2)) => deep_equals(a1, b1) && deep_equals(a2, b2),
        _ => false,
    }
}

/// Helper for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper for creating numbers
pub fn num(n: f64) -> Value {
    Value::Num(n)
}

/// Helper for creating the empty list
pub fn nil() -> Value {
    Value::Nil
}

/// Helper for creating a cons cell
pub fn pair(first: Value, rest: Value) -> Value {
    Value::Pair(Box::new(first), Box::new(rest))
}

/// Right-fold a sequence of values into nested pairs terminated by Nil
pub fn list(items: Vec<Value>) -> Value {
    items.into_iter().rev().fold(Value::Nil, |acc, v| pair(v, acc))
}

/// Render a dictionary's entries as `{ key: value, ... }`, the form used in
/// dictionary lookup failure messages
pub(crate) fn render_dict(entries: &[DictEntry]) -> String {
    let rendered: Vec<String> = entries
        .iter()
        .map(|entry| format!("{}: {}", entry.key, entry.value))
        .collect();
    format!("{{ {} }}", rendered.join(", "))
}

/// Render a number without a fractional part when it is integral, matching
/// the host language's notion of `42.0` printing as `42`
fn fmt_num(f: &mut fmt::Formatter, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

fn fmt_string(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Num(n) => fmt_num(f, *n),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Str(s) => fmt_string(f, s),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(first, rest) => {
                // List-style rendering with a dotted tail for improper lists
                write!(f, "({first}")?;
                let mut tail = rest.as_ref();
                loop {
                    match tail {
                        Value::Pair(first, rest) => {
                            write!(f, " {first}")?;
                            tail = rest.as_ref();
                        }
                        Value::Nil => return write!(f, ")"),
                        other => return write!(f, " . {other})"),
                    }
                }
            }
            Value::Closure { params, .. } => {
                write!(f, "#<closure ({})>", params.join(" "))
            }
            Value::Prim(op) => write!(f, "#<primitive:{op}>"),
            Value::Dict(entries) => write!(f, "{}", render_dict(entries)),
        }
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Exp::Num(n) => fmt_num(f, *n),
            Exp::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Exp::Str(s) => fmt_string(f, s),
            Exp::Var(name) => write!(f, "{name}"),
            Exp::Prim(op) => write!(f, "{op}"),
            Exp::Lit(v) => write!(f, "'{v}"),
            Exp::If { test, then, alt } => write!(f, "(if {test} {then} {alt})"),
            Exp::Proc { params, body } => {
                write!(f, "(lambda ({})", params.join(" "))?;
                for exp in body {
                    write!(f, " {exp}")?;
                }
                write!(f, ")")
            }
            Exp::App { rator, rands } => {
                write!(f, "({rator}")?;
                for rand in rands {
                    write!(f, " {rand}")?;
                }
                write!(f, ")")
            }
            Exp::Dict(entries) => {
                write!(f, "(dict")?;
                for (key, value) in entries {
                    write!(f, " ({key} {value})")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Form::Define { var, val } => write!(f, "(define {var} {val})"),
            Form::Exp(exp) => write!(f, "{exp}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, form) in self.forms.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{form}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_validation() {
        assert!(is_valid_symbol("foo"));
        assert!(is_valid_symbol("+"));
        assert!(is_valid_symbol("dict?"));
        assert!(is_valid_symbol("-abc"));
        assert!(is_valid_symbol("var123"));
        assert!(!is_valid_symbol(""));
        assert!(!is_valid_symbol("123var"));
        assert!(!is_valid_symbol("-42"));
        assert!(!is_valid_symbol("a.b"));
        assert!(!is_valid_symbol("has space"));
    }

    #[test]
    fn test_value_display() {
        let cases = vec![
            (num(42.0), "42"),
            (num(-5.0), "-5"),
            (num(1.5), "1.5"),
            (Value::Bool(true), "#t"),
            (Value::Bool(false), "#f"),
            (Value::Str("hi there".into()), "\"hi there\""),
            (Value::Str("with\"quote".into()), "\"with\\\"quote\""),
            (sym("foo"), "foo"),
            (nil(), "()"),
            (list(vec![num(1.0), num(2.0), num(3.0)]), "(1 2 3)"),
            (pair(sym("a"), num(1.0)), "(a . 1)"),
            (
                list(vec![pair(sym("a"), num(1.0)), pair(sym("b"), num(2.0))]),
                "((a . 1) (b . 2))",
            ),
            (pair(num(1.0), pair(num(2.0), num(3.0))), "(1 2 . 3)"),
            (Value::Prim("car".into()), "#<primitive:car>"),
            (
                Value::Dict(vec![
                    DictEntry {
                        key: sym("a"),
                        value: num(1.0),
                    },
                    DictEntry {
                        key: sym("b"),
                        value: Value::Str("x".into()),
                    },
                ]),
                "{ a: 1, b: \"x\" }",
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(format!("{value}"), expected);
        }
    }

    #[test]
    fn test_exp_display() {
        let exp = Exp::If {
            test: Box::new(Exp::App {
                rator: Box::new(Exp::Prim("<".into())),
                rands: vec![Exp::Var("x".into()), Exp::Num(0.0)],
            }),
            then: Box::new(Exp::Str("neg".into())),
            alt: Box::new(Exp::Lit(sym("pos"))),
        };
        assert_eq!(format!("{exp}"), "(if (< x 0) \"neg\" 'pos)");

        let proc = Exp::Proc {
            params: vec!["x".into(), "y".into()],
            body: vec![Exp::App {
                rator: Box::new(Exp::Prim("+".into())),
                rands: vec![Exp::Var("x".into()), Exp::Var("y".into())],
            }],
        };
        assert_eq!(format!("{proc}"), "(lambda (x y) (+ x y))");

        let dict = Exp::Dict(vec![
            (sym("a"), Exp::Num(1.0)),
            (sym("b"), Exp::Var("v".into())),
        ]);
        assert_eq!(format!("{dict}"), "(dict (a 1) (b v))");
    }

    #[test]
    fn test_deep_equals_recurses_into_pairs() {
        // Two independently constructed pairs match structurally
        let a = pair(sym("k"), list(vec![num(1.0), num(2.0)]));
        let b = pair(sym("k"), list(vec![num(1.0), num(2.0)]));
        assert!(deep_equals(&a, &b));

        // A single differing leaf breaks the match
        let c = pair(sym("k"), list(vec![num(1.0), num(3.0)]));
        assert!(!deep_equals(&a, &c));

        // Mixed tags never match
        assert!(!deep_equals(&num(1.0), &Value::Str("1".into())));
        assert!(!deep_equals(&nil(), &list(vec![num(1.0)])));

        // Closures and primitives are opaque to structural equality
        let f = Value::Closure {
            params: vec!["x".into()],
            body: vec![Exp::Var("x".into())],
        };
        assert!(!deep_equals(&f, &f.clone()));
        assert!(!deep_equals(
            &Value::Prim("car".into()),
            &Value::Prim("car".into())
        ));
    }
}
