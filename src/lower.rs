//! Dictionary-lowering pass.
//!
//! Rewrites sugared-dialect trees into core-dialect trees: every dictionary
//! literal becomes an application of the `dict` primitive to a quoted
//! association list, and every application whose operator is a dictionary
//! becomes an application of the `get` primitive. The pass is pure and
//! structure-preserving; trees without dictionary syntax come out unchanged.
//!
//! Entry values are converted to data directly on the tree, without going
//! through the printer and reader: literals become themselves, a variable
//! reference becomes the quoted symbol of its name, and a nested dictionary
//! literal becomes a nested association list. A value expression with any
//! other shape (an application, a conditional, a procedure literal) has no
//! data form and fails with [`Error::LoweringError`].
//!
//! Because entry values are quoted rather than evaluated, a lowered program
//! is observationally equivalent to its source only when every dictionary
//! entry holds a literal value.

use crate::Error;
use crate::ast::{pair, Exp, Form, Program, Value};

/// Lower every form of a program
pub fn lower_program(program: &Program) -> Result<Program, Error> {
    let forms = program
        .forms
        .iter()
        .map(|form| match form {
            Form::Define { var, val } => Ok(Form::Define {
                var: var.clone(),
                val: lower_exp(val)?,
            }),
            Form::Exp(exp) => Ok(Form::Exp(lower_exp(exp)?)),
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(Program { forms })
}

/// Lower a single expression
pub fn lower_exp(exp: &Exp) -> Result<Exp, Error> {
    match exp {
        Exp::Num(_) | Exp::Bool(_) | Exp::Str(_) | Exp::Var(_) | Exp::Prim(_) | Exp::Lit(_) => {
            Ok(exp.clone())
        }
        Exp::If { test, then, alt } => Ok(Exp::If {
            test: Box::new(lower_exp(test)?),
            then: Box::new(lower_exp(then)?),
            alt: Box::new(lower_exp(alt)?),
        }),
        Exp::Proc { params, body } => Ok(Exp::Proc {
            params: params.clone(),
            body: body.iter().map(lower_exp).collect::<Result<Vec<_>, _>>()?,
        }),
        Exp::Dict(entries) => lower_dict(entries),
        Exp::App { rator, rands } => {
            let rator = lower_exp(rator)?;
            let rands = rands
                .iter()
                .map(lower_exp)
                .collect::<Result<Vec<_>, _>>()?;
            if produces_dict(&rator) {
                // Dictionary application becomes an explicit lookup
                let mut get_args = Vec::with_capacity(rands.len() + 1);
                get_args.push(rator);
                get_args.extend(rands);
                Ok(Exp::App {
                    rator: Box::new(Exp::Prim("get".into())),
                    rands: get_args,
                })
            } else {
                Ok(Exp::App {
                    rator: Box::new(rator),
                    rands,
                })
            }
        }
    }
}

/// Rewrite a dictionary literal as `(dict '<association-list>)`
fn lower_dict(entries: &[(Value, Exp)]) -> Result<Exp, Error> {
    let mut alist = Value::Nil;
    for (key, value_exp) in entries.iter().rev() {
        let datum = entry_value_to_datum(value_exp)?;
        alist = pair(pair(key.clone(), datum), alist);
    }
    Ok(Exp::App {
        rator: Box::new(Exp::Prim("dict".into())),
        rands: vec![Exp::Lit(alist)],
    })
}

/// Convert a dictionary-entry value expression into the datum it denotes
/// under quotation
fn entry_value_to_datum(exp: &Exp) -> Result<Value, Error> {
    match exp {
        Exp::Num(n) => Ok(Value::Num(*n)),
        Exp::Bool(b) => Ok(Value::Bool(*b)),
        Exp::Str(s) => Ok(Value::Str(s.clone())),
        Exp::Var(name) | Exp::Prim(name) => Ok(Value::Symbol(name.clone())),
        Exp::Lit(v) => Ok(v.clone()),
        Exp::Dict(entries) => {
            let mut alist = Value::Nil;
            for (key, value_exp) in entries.iter().rev() {
                alist = pair(pair(key.clone(), entry_value_to_datum(value_exp)?), alist);
            }
            Ok(alist)
        }
        other => Err(Error::LoweringError(format!(
            "dictionary value has no data form: {other}"
        ))),
    }
}

/// Whether a lowered expression is known to produce a dictionary: a direct
/// `dict` construction, or a conditional that can yield one through either
/// branch
fn produces_dict(exp: &Exp) -> bool {
    match exp {
        Exp::App { rator, .. } => matches!(rator.as_ref(), Exp::Prim(op) if op == "dict"),
        Exp::If { then, alt, .. } => produces_dict(then) || produces_dict(alt),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{list, num, sym};
    use crate::evaluator::{eval_source, evaluate_program};
    use crate::reader::{parse_program, Dialect};

    fn lower_source(source: &str) -> Result<Program, Error> {
        lower_program(&parse_program(source, Dialect::Sugar)?)
    }

    #[test]
    fn test_lowering_is_identity_without_dictionaries() {
        let sources = vec![
            "42",
            "(+ 1 2)",
            "(define f (lambda (x) (if (< x 0) (- 0 x) x))) (f -3)",
            "'(a . 1)",
            "((lambda (x y) (* x y)) 2 3)",
        ];
        for source in sources {
            let program = parse_program(source, Dialect::Sugar).unwrap();
            assert_eq!(
                lower_program(&program).unwrap(),
                program,
                "lowering changed a dictionary-free program: {source}"
            );
        }
    }

    #[test]
    fn test_dict_literal_becomes_primitive_application() {
        let lowered = lower_source("(dict (a 1) (b 2))").unwrap();
        let rendered = format!("{lowered}");
        assert_eq!(rendered, "(dict '((a . 1) (b . 2)))");

        // The lowered form parses and evaluates in the core dialect
        assert_eq!(
            eval_source("(get (dict '((a . 1) (b . 2))) 'b)", Dialect::Core),
            Ok(num(2.0))
        );
    }

    #[test]
    fn test_dict_application_becomes_get() {
        let lowered = lower_source("((dict (a 1) (b 2)) 'a)").unwrap();
        assert_eq!(format!("{lowered}"), "(get (dict '((a . 1) (b . 2))) 'a)");
        assert_eq!(evaluate_program(&lowered), Ok(num(1.0)));
    }

    #[test]
    fn test_lowering_preserves_evaluation_for_literal_dictionaries() {
        let sources = vec![
            "((dict (a 1) (b 2)) 'a)",
            "((dict (a \"s\") (b #t)) 'b)",
            "((dict (a 1) (a 2)) 'a)",
            "(define pick (lambda (b) (if b (dict (k 1)) (dict (k 2)))))
             (+ ((pick #t) 'k) ((pick #f) 'k))",
        ];
        for source in sources {
            let direct = eval_source(source, Dialect::Sugar).unwrap();
            let lowered = evaluate_program(&lower_source(source).unwrap()).unwrap();
            assert_eq!(direct, lowered, "lowering changed the result of: {source}");
        }
    }

    #[test]
    fn test_conditional_dictionary_operator_is_wrapped() {
        let lowered = lower_source("((if #t (dict (k 1)) (dict (k 2))) 'k)").unwrap();
        assert_eq!(
            format!("{lowered}"),
            "(get (if #t (dict '((k . 1))) (dict '((k . 2)))) 'k)"
        );
        assert_eq!(evaluate_program(&lowered), Ok(num(1.0)));
    }

    #[test]
    fn test_entry_values_are_quoted_not_evaluated() {
        // A variable reference in entry position becomes a plain symbol datum
        let lowered = lower_source("(dict (k v))").unwrap();
        assert_eq!(format!("{lowered}"), "(dict '((k . v)))");

        // Quoted data passes through as itself
        let lowered = lower_source("((dict (k '(1 2))) 'k)").unwrap();
        assert_eq!(
            evaluate_program(&lowered),
            Ok(list(vec![num(1.0), num(2.0)]))
        );
    }

    #[test]
    fn test_nested_dictionary_literals_nest_as_association_lists() {
        let lowered = lower_source("((dict (a (dict (x 10)))) 'a)").unwrap();
        // `(a . ((x . 10)))` prints in its canonical list form
        assert_eq!(format!("{lowered}"), "(get (dict '((a (x . 10)))) 'a)");
        assert_eq!(
            evaluate_program(&lowered),
            Ok(list(vec![pair(sym("x"), num(10.0))]))
        );
    }

    #[test]
    fn test_computed_entry_values_are_rejected() {
        let cases = vec![
            "(dict (a (+ 1 2)))",
            "(dict (a (lambda (x) x)))",
            "(dict (a (if #t 1 2)))",
            "(dict (a (dict (b (car '(1))))))",
        ];
        for source in cases {
            let err = lower_source(source).unwrap_err();
            assert!(
                matches!(err, Error::LoweringError(_)),
                "expected LoweringError for {source}, got {err:?}"
            );
        }
    }
}
