//! Primitive-operation registry and dispatcher.
//!
//! All built-in operations live in one static table of [`PrimitiveDef`]
//! entries. Arity is validated before the operation function runs, so the
//! functions themselves can index their argument slice directly. Dispatch by
//! unknown name is [`Error::BadPrimitive`]; everything else a primitive can
//! fail with is a [`Error::TypeError`] or, for `get`, [`Error::KeyNotFound`].
//!
//! The dictionary primitives (`dict`, `get`, `dict?`) operate on association
//! lists built from ordinary pairs, e.g. `'((a . 1) (b . 2))`. They are what
//! the lowering pass targets.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{Value, deep_equals, pair};
use crate::evaluator::is_true_value;

/// Arity specification for a primitive operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn validate(&self, name: &str, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exactly(expected) if got != expected => {
                Err(Error::arity_error_in(expected, got, name))
            }
            Arity::AtLeast(expected) if got < expected => {
                Err(Error::arity_error_in(expected, got, format!("{name} (at least)")))
            }
            _ => Ok(()),
        }
    }
}

/// Definition of a single built-in operation
pub struct PrimitiveDef {
    pub name: &'static str,
    pub arity: Arity,
    func: fn(&[Value]) -> Result<Value, Error>,
}

static PRIMITIVES: LazyLock<Vec<PrimitiveDef>> = LazyLock::new(|| {
    use Arity::*;
    vec![
        PrimitiveDef { name: "+", arity: AtLeast(0), func: prim_add },
        PrimitiveDef { name: "*", arity: AtLeast(0), func: prim_mul },
        PrimitiveDef { name: "-", arity: Exactly(2), func: prim_sub },
        PrimitiveDef { name: "/", arity: Exactly(2), func: prim_div },
        PrimitiveDef { name: ">", arity: Exactly(2), func: prim_gt },
        PrimitiveDef { name: "<", arity: Exactly(2), func: prim_lt },
        PrimitiveDef { name: "=", arity: Exactly(2), func: prim_eq },
        PrimitiveDef { name: "not", arity: Exactly(1), func: prim_not },
        PrimitiveDef { name: "and", arity: Exactly(2), func: prim_and },
        PrimitiveDef { name: "or", arity: Exactly(2), func: prim_or },
        PrimitiveDef { name: "eq?", arity: Exactly(2), func: prim_eq },
        PrimitiveDef { name: "string=?", arity: Exactly(2), func: prim_string_eq },
        PrimitiveDef { name: "cons", arity: Exactly(2), func: prim_cons },
        PrimitiveDef { name: "car", arity: Exactly(1), func: prim_car },
        PrimitiveDef { name: "cdr", arity: Exactly(1), func: prim_cdr },
        PrimitiveDef { name: "list", arity: AtLeast(0), func: prim_list },
        PrimitiveDef { name: "pair?", arity: Exactly(1), func: prim_is_pair },
        PrimitiveDef { name: "number?", arity: Exactly(1), func: prim_is_number },
        PrimitiveDef { name: "boolean?", arity: Exactly(1), func: prim_is_boolean },
        PrimitiveDef { name: "symbol?", arity: Exactly(1), func: prim_is_symbol },
        PrimitiveDef { name: "string?", arity: Exactly(1), func: prim_is_string },
        PrimitiveDef { name: "dict", arity: Exactly(1), func: prim_dict },
        PrimitiveDef { name: "get", arity: Exactly(2), func: prim_get },
        PrimitiveDef { name: "dict?", arity: Exactly(1), func: prim_is_dict },
    ]
});

static PRIMITIVE_INDEX: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    PRIMITIVES
        .iter()
        .enumerate()
        .map(|(i, def)| (def.name, i))
        .collect()
});

/// Look up a primitive definition by name
pub fn find_primitive(name: &str) -> Option<&'static PrimitiveDef> {
    PRIMITIVE_INDEX.get(name).map(|&i| &PRIMITIVES[i])
}

/// Check whether a symbol names a built-in operation
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVE_INDEX.contains_key(name)
}

/// Apply a primitive by name to already-evaluated arguments
pub fn apply_primitive(name: &str, args: &[Value]) -> Result<Value, Error> {
    let def = find_primitive(name).ok_or_else(|| Error::BadPrimitive(name.to_owned()))?;
    def.arity.validate(name, args.len())?;
    (def.func)(args)
}

fn expect_num(op: &str, v: &Value) -> Result<f64, Error> {
    match v {
        Value::Num(n) => Ok(*n),
        other => Err(Error::TypeError(format!(
            "{op}: expected a number, got {other}"
        ))),
    }
}

fn expect_bool(op: &str, v: &Value) -> Result<bool, Error> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(Error::TypeError(format!(
            "{op}: expected a boolean, got {other}"
        ))),
    }
}

fn prim_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum = 0.0;
    for arg in args {
        sum += expect_num("+", arg)?;
    }
    Ok(Value::Num(sum))
}

fn prim_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product = 1.0;
    for arg in args {
        product *= expect_num("*", arg)?;
    }
    Ok(Value::Num(product))
}

fn prim_sub(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Num(expect_num("-", &args[0])? - expect_num("-", &args[1])?))
}

fn prim_div(args: &[Value]) -> Result<Value, Error> {
    // Division follows host float semantics; dividing by zero yields
    // an infinity rather than an error
    Ok(Value::Num(expect_num("/", &args[0])? / expect_num("/", &args[1])?))
}

fn prim_gt(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(expect_num(">", &args[0])? > expect_num(">", &args[1])?))
}

fn prim_lt(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(expect_num("<", &args[0])? < expect_num("<", &args[1])?))
}

fn prim_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!is_true_value(&args[0])))
}

fn prim_and(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(
        expect_bool("and", &args[0])? && expect_bool("and", &args[1])?,
    ))
}

fn prim_or(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(
        expect_bool("or", &args[0])? || expect_bool("or", &args[1])?,
    ))
}

/// Shallow identity-style equality, backing both `=` and `eq?`: atoms
/// compare by content, compound values (pairs, closures, dictionaries)
/// never compare equal
fn prim_eq(args: &[Value]) -> Result<Value, Error> {
    let eq = match (&args[0], &args[1]) {
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        _ => false,
    };
    Ok(Value::Bool(eq))
}

fn prim_string_eq(args: &[Value]) -> Result<Value, Error> {
    match (&args[0], &args[1]) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a == b)),
        (a, b) => Err(Error::TypeError(format!(
            "string=?: expected strings, got {a} and {b}"
        ))),
    }
}

fn prim_cons(args: &[Value]) -> Result<Value, Error> {
    Ok(pair(args[0].clone(), args[1].clone()))
}

fn prim_car(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(first, _) => Ok((**first).clone()),
        other => Err(Error::TypeError(format!(
            "car: expected a pair, got {other}"
        ))),
    }
}

fn prim_cdr(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(_, rest) => Ok((**rest).clone()),
        other => Err(Error::TypeError(format!(
            "cdr: expected a pair, got {other}"
        ))),
    }
}

fn prim_list(args: &[Value]) -> Result<Value, Error> {
    Ok(crate::ast::list(args.to_vec()))
}

fn prim_is_pair(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Pair(..))))
}

fn prim_is_number(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Num(_))))
}

fn prim_is_boolean(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn prim_is_symbol(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn prim_is_string(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Str(_))))
}

/// Construct a dictionary from association-list data. Pair data is the
/// dictionary representation and passes through unchanged; anything else is
/// wrapped as a singleton list. Shape validation is `dict?`'s job, not the
/// constructor's.
fn prim_dict(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(..) => Ok(args[0].clone()),
        other => Ok(pair(other.clone(), Value::Nil)),
    }
}

/// Look up a symbol key in an association list. The first matching entry
/// wins; entries that are not pairs are skipped.
fn prim_get(args: &[Value]) -> Result<Value, Error> {
    let key = match &args[1] {
        Value::Symbol(_) => &args[1],
        other => {
            return Err(Error::TypeError(format!(
                "get: expected a symbol key, got {other}"
            )));
        }
    };
    match &args[0] {
        Value::Pair(..) => {}
        other => {
            return Err(Error::TypeError(format!(
                "get: expected an association list, got {other}"
            )));
        }
    }

    let mut cursor = &args[0];
    while let Value::Pair(entry, rest) = cursor {
        if let Value::Pair(entry_key, entry_value) = entry.as_ref() {
            if deep_equals(entry_key, key) {
                return Ok((**entry_value).clone());
            }
        }
        cursor = rest.as_ref();
    }
    Err(Error::KeyNotFound(format!("{key} in {}", args[0])))
}

/// Association-list well-formedness predicate: every element must be a pair
/// whose first component is a symbol, and no key may repeat. Anything that
/// is not pair data (or the empty list) answers `#f` rather than erroring.
fn prim_is_dict(args: &[Value]) -> Result<Value, Error> {
    let mut seen: Vec<&str> = Vec::new();
    let mut cursor = &args[0];
    if !matches!(cursor, Value::Pair(..) | Value::Nil) {
        return Ok(Value::Bool(false));
    }
    while let Value::Pair(entry, rest) = cursor {
        match entry.as_ref() {
            Value::Pair(entry_key, _) => match entry_key.as_ref() {
                Value::Symbol(name) => {
                    if seen.contains(&name.as_str()) {
                        return Ok(Value::Bool(false));
                    }
                    seen.push(name);
                }
                _ => return Ok(Value::Bool(false)),
            },
            _ => return Ok(Value::Bool(false)),
        }
        cursor = rest.as_ref();
    }
    // An improper tail disqualifies the list
    Ok(Value::Bool(matches!(cursor, Value::Nil)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{list, nil, num, sym};

    #[test]
    fn test_registry_lookup() {
        assert!(is_primitive("+"));
        assert!(is_primitive("dict?"));
        assert!(is_primitive("string=?"));
        assert!(!is_primitive("lambda"));
        assert!(!is_primitive("frobnicate"));

        assert_eq!(
            apply_primitive("frobnicate", &[]),
            Err(Error::BadPrimitive("frobnicate".into()))
        );
    }

    #[test]
    fn test_arity_validation() {
        // Variadic identities
        assert_eq!(apply_primitive("+", &[]), Ok(num(0.0)));
        assert_eq!(apply_primitive("*", &[]), Ok(num(1.0)));
        assert_eq!(
            apply_primitive("+", &[num(1.0), num(2.0), num(3.0)]),
            Ok(num(6.0))
        );

        // Fixed-arity mismatches
        assert!(matches!(
            apply_primitive("-", &[num(1.0)]),
            Err(Error::ArityError { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            apply_primitive("car", &[num(1.0), num(2.0)]),
            Err(Error::ArityError { expected: 1, got: 2, .. })
        ));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let cases = vec![
            ("-", vec![num(7.0), num(3.0)], num(4.0)),
            ("/", vec![num(7.0), num(2.0)], num(3.5)),
            (">", vec![num(2.0), num(1.0)], Value::Bool(true)),
            ("<", vec![num(2.0), num(1.0)], Value::Bool(false)),
            ("=", vec![num(2.0), num(2.0)], Value::Bool(true)),
            ("=", vec![sym("a"), sym("a")], Value::Bool(true)),
            ("=", vec![num(2.0), sym("a")], Value::Bool(false)),
            // = is shallow like eq?: independently built pairs never match
            (
                "=",
                vec![list(vec![num(1.0)]), list(vec![num(1.0)])],
                Value::Bool(false),
            ),
        ];
        for (name, args, expected) in cases {
            assert_eq!(apply_primitive(name, &args), Ok(expected), "prim {name}");
        }

        assert!(matches!(
            apply_primitive("+", &[num(1.0), Value::Str("x".into())]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            apply_primitive("<", &[Value::Str("a".into()), Value::Str("b".into())]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_logic_and_equality() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(apply_primitive("and", &[t.clone(), f.clone()]), Ok(f.clone()));
        assert_eq!(apply_primitive("or", &[t.clone(), f.clone()]), Ok(t.clone()));
        assert!(matches!(
            apply_primitive("and", &[num(1.0), t.clone()]),
            Err(Error::TypeError(_))
        ));

        // not follows the language's falsiness rule: only #f is false
        assert_eq!(apply_primitive("not", &[f.clone()]), Ok(t.clone()));
        assert_eq!(apply_primitive("not", &[num(0.0)]), Ok(f.clone()));
        assert_eq!(apply_primitive("not", &[nil()]), Ok(f.clone()));

        // eq? is shallow: atoms by content, compound values never
        assert_eq!(apply_primitive("eq?", &[sym("a"), sym("a")]), Ok(t.clone()));
        assert_eq!(apply_primitive("eq?", &[nil(), nil()]), Ok(t.clone()));
        let p = list(vec![num(1.0)]);
        assert_eq!(apply_primitive("eq?", &[p.clone(), p]), Ok(f.clone()));

        assert_eq!(
            apply_primitive("string=?", &[Value::Str("ab".into()), Value::Str("ab".into())]),
            Ok(t)
        );
    }

    #[test]
    fn test_pair_operations() {
        let cell = apply_primitive("cons", &[num(1.0), num(2.0)]).unwrap();
        assert_eq!(format!("{cell}"), "(1 . 2)");
        assert_eq!(apply_primitive("car", &[cell.clone()]), Ok(num(1.0)));
        assert_eq!(apply_primitive("cdr", &[cell]), Ok(num(2.0)));
        assert!(matches!(
            apply_primitive("car", &[nil()]),
            Err(Error::TypeError(_))
        ));

        assert_eq!(
            apply_primitive("list", &[num(1.0), num(2.0)]),
            Ok(list(vec![num(1.0), num(2.0)]))
        );
        assert_eq!(apply_primitive("list", &[]), Ok(nil()));

        let preds = vec![
            ("pair?", list(vec![num(1.0)]), true),
            ("pair?", nil(), false),
            ("number?", num(1.0), true),
            ("number?", sym("x"), false),
            ("boolean?", Value::Bool(true), true),
            ("symbol?", sym("x"), true),
            ("string?", Value::Str("x".into()), true),
            ("string?", sym("x"), false),
        ];
        for (name, arg, expected) in preds {
            assert_eq!(
                apply_primitive(name, &[arg]),
                Ok(Value::Bool(expected)),
                "pred {name}"
            );
        }
    }

    fn alist(entries: Vec<(Value, Value)>) -> Value {
        list(entries.into_iter().map(|(k, v)| crate::ast::pair(k, v)).collect())
    }

    #[test]
    fn test_dict_primitives() {
        let d = alist(vec![(sym("a"), num(1.0)), (sym("b"), num(2.0))]);

        // dict passes pair data through and wraps anything else as a
        // singleton list; it never validates shape
        assert_eq!(apply_primitive("dict", &[d.clone()]), Ok(d.clone()));
        assert_eq!(
            apply_primitive("dict", &[num(1.0)]),
            Ok(crate::ast::pair(num(1.0), nil()))
        );
        assert_eq!(
            apply_primitive("dict", &[nil()]),
            Ok(crate::ast::pair(nil(), nil()))
        );

        assert_eq!(apply_primitive("get", &[d.clone(), sym("a")]), Ok(num(1.0)));
        assert_eq!(apply_primitive("get", &[d.clone(), sym("b")]), Ok(num(2.0)));
        assert!(matches!(
            apply_primitive("get", &[d.clone(), sym("c")]),
            Err(Error::KeyNotFound(_))
        ));
        assert!(matches!(
            apply_primitive("get", &[d.clone(), num(1.0)]),
            Err(Error::TypeError(_))
        ));
        // get requires pair data, so the bare empty list is rejected
        assert!(matches!(
            apply_primitive("get", &[nil(), sym("a")]),
            Err(Error::TypeError(_))
        ));

        // First matching entry wins when a key repeats
        let dup = alist(vec![(sym("a"), sym("x")), (sym("a"), sym("y"))]);
        assert_eq!(apply_primitive("get", &[dup.clone(), sym("a")]), Ok(sym("x")));

        // ...but the predicate rejects duplicate keys
        assert_eq!(apply_primitive("dict?", &[dup]), Ok(Value::Bool(false)));
        assert_eq!(apply_primitive("dict?", &[d]), Ok(Value::Bool(true)));
        assert_eq!(apply_primitive("dict?", &[nil()]), Ok(Value::Bool(true)));

        // An entry whose value is the empty list is still a pair entry
        let short_entry = list(vec![
            crate::ast::pair(sym("a"), num(1.0)),
            crate::ast::pair(sym("b"), nil()),
        ]);
        assert_eq!(apply_primitive("dict?", &[short_entry]), Ok(Value::Bool(true)));

        // A bare symbol element is not an entry
        let bad = list(vec![crate::ast::pair(sym("a"), num(1.0)), sym("b")]);
        assert_eq!(apply_primitive("dict?", &[bad]), Ok(Value::Bool(false)));

        // Non-symbol keys disqualify
        let num_key = alist(vec![(num(1.0), num(2.0))]);
        assert_eq!(apply_primitive("dict?", &[num_key]), Ok(Value::Bool(false)));

        // Non-list data is simply not a dictionary
        assert_eq!(apply_primitive("dict?", &[num(1.0)]), Ok(Value::Bool(false)));
    }
}
