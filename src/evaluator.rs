//! Substitution-based evaluator and the persistent environment chain.
//!
//! Procedure application here is the substitution model: a closure carries no
//! environment, so applying it alpha-renames the parameters in its body to
//! fresh names, converts each evaluated argument back into a literal
//! expression, substitutes those literals for the renamed parameters, and
//! evaluates the resulting body in the *caller's* environment. The renaming
//! step keeps independently introduced bindings from capturing each other.
//!
//! Dictionary values are applicable: `(d 'key)` performs a unary lookup by
//! deep structural equality over the dictionary's entries.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::{deep_equals, render_dict, DictEntry, Exp, Form, Program, Value};
use crate::primitives::apply_primitive;
use crate::reader::{parse_program, Dialect};
use crate::{Error, MAX_EVAL_DEPTH};

/// Persistent environment: a singly-linked chain of single-binding frames.
/// Extension allocates a new head frame and shares the tail, so older
/// environments are never disturbed.
#[derive(Debug, PartialEq)]
pub enum Env {
    Empty,
    Frame {
        var: String,
        val: Value,
        tail: Rc<Env>,
    },
}

impl Env {
    /// The environment with no bindings
    pub fn empty() -> Rc<Env> {
        Rc::new(Env::Empty)
    }

    /// Extend an environment with one binding, returning the new head frame
    pub fn extend(tail: &Rc<Env>, var: impl Into<String>, val: Value) -> Rc<Env> {
        Rc::new(Env::Frame {
            var: var.into(),
            val,
            tail: Rc::clone(tail),
        })
    }

    /// Walk the chain innermost-out for a binding
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut current = self;
        loop {
            match current {
                Env::Empty => return Err(Error::UnboundVariable(name.to_owned())),
                Env::Frame { var, val, tail } => {
                    if var == name {
                        return Ok(val.clone());
                    }
                    current = tail.as_ref();
                }
            }
        }
    }
}

/// The language's falsiness rule: `#f` is the only false value
pub fn is_true_value(v: &Value) -> bool {
    !matches!(v, Value::Bool(false))
}

/// Evaluate a single expression in the given environment
pub fn evaluate(exp: &Exp, env: &Rc<Env>) -> Result<Value, Error> {
    eval_exp(exp, env, 0)
}

/// Evaluate a whole program: each `define` extends the environment for the
/// remaining forms, and the last expression's value is the result
pub fn evaluate_program(program: &Program) -> Result<Value, Error> {
    let mut env = Env::empty();
    let mut result: Option<Value> = None;
    for form in &program.forms {
        match form {
            Form::Define { var, val } => {
                let value = eval_exp(val, &env, 0)?;
                env = Env::extend(&env, var.clone(), value);
                result = None;
            }
            Form::Exp(exp) => {
                result = Some(eval_exp(exp, &env, 0)?);
            }
        }
    }
    // A program that ends on a define (or is empty) produces no value
    result.ok_or(Error::EmptySequence)
}

/// Parse and evaluate source text in one step
pub fn eval_source(source: &str, dialect: Dialect) -> Result<Value, Error> {
    evaluate_program(&parse_program(source, dialect)?)
}

fn eval_exp(exp: &Exp, env: &Rc<Env>, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::StackOverflow(MAX_EVAL_DEPTH));
    }
    match exp {
        Exp::Num(n) => Ok(Value::Num(*n)),
        Exp::Bool(b) => Ok(Value::Bool(*b)),
        Exp::Str(s) => Ok(Value::Str(s.clone())),
        Exp::Lit(v) => Ok(v.clone()),
        Exp::Prim(op) => Ok(Value::Prim(op.clone())),
        Exp::Var(name) => env.lookup(name),
        Exp::If { test, then, alt } => {
            if is_true_value(&eval_exp(test, env, depth + 1)?) {
                eval_exp(then, env, depth + 1)
            } else {
                eval_exp(alt, env, depth + 1)
            }
        }
        Exp::Proc { params, body } => Ok(Value::Closure {
            params: params.clone(),
            body: body.clone(),
        }),
        Exp::Dict(entries) => eval_dict(entries, env, depth),
        Exp::App { rator, rands } => {
            let proc = eval_exp(rator, env, depth + 1)?;
            let args = rands
                .iter()
                .map(|rand| eval_exp(rand, env, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            apply_procedure(&proc, &args, env, depth)
        }
    }
}

/// Evaluate a dictionary literal: keys are taken verbatim, value expressions
/// are evaluated left to right. Duplicate keys are allowed; lookup later
/// takes the first match.
fn eval_dict(entries: &[(Value, Exp)], env: &Rc<Env>, depth: usize) -> Result<Value, Error> {
    let mut evaluated = Vec::with_capacity(entries.len());
    for (key, value_exp) in entries {
        evaluated.push(DictEntry {
            key: key.clone(),
            value: eval_exp(value_exp, env, depth + 1)?,
        });
    }
    Ok(Value::Dict(evaluated))
}

fn apply_procedure(
    proc: &Value,
    args: &[Value],
    env: &Rc<Env>,
    depth: usize,
) -> Result<Value, Error> {
    match proc {
        Value::Prim(op) => apply_primitive(op, args),
        Value::Closure { params, body } => apply_closure(params, body, args, env, depth),
        Value::Dict(entries) => dict_lookup(entries, args),
        other => Err(Error::NotApplicable(format!("{other}"))),
    }
}

/// Substitution-model closure application: rename bound variables in the body
/// to fresh names, substitute the argument values (as literal expressions)
/// for the parameters, and evaluate the body in the caller's environment.
fn apply_closure(
    params: &[String],
    body: &[Exp],
    args: &[Value],
    env: &Rc<Env>,
    depth: usize,
) -> Result<Value, Error> {
    if args.len() != params.len() {
        return Err(Error::arity_error(params.len(), args.len()));
    }
    let renamed_body: Vec<Exp> = body.iter().map(rename_exp).collect();
    let literal_args: Vec<Exp> = args.iter().map(value_to_lit_exp).collect();
    let substituted = substitute_all(&renamed_body, params, &literal_args);
    eval_body(&substituted, env, depth)
}

/// Evaluate a body sequence, returning the last expression's value
fn eval_body(body: &[Exp], env: &Rc<Env>, depth: usize) -> Result<Value, Error> {
    match body.split_last() {
        None => Err(Error::EmptySequence),
        Some((last, init)) => {
            for exp in init {
                eval_exp(exp, env, depth + 1)?;
            }
            eval_exp(last, env, depth + 1)
        }
    }
}

/// Unary dictionary application: deep-structural-equality lookup over the
/// entries, first match wins
fn dict_lookup(entries: &[DictEntry], args: &[Value]) -> Result<Value, Error> {
    match args {
        [key] => entries
            .iter()
            .find(|entry| deep_equals(&entry.key, key))
            .map(|entry| entry.value.clone())
            .ok_or_else(|| {
                Error::KeyNotFound(format!("{key} in {}", render_dict(entries)))
            }),
        _ => Err(Error::arity_error_in(
            1,
            args.len(),
            format!("dictionary application {}", render_dict(entries)),
        )),
    }
}

static FRESH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Generate a globally unique variable name for alpha-renaming
fn fresh_name(base: &str) -> String {
    let n = FRESH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{base}__{n}")
}

/// Alpha-rename every procedure literal in an expression: each parameter is
/// replaced by a fresh name in the parameter list and throughout the body.
/// Distinct applications of the same closure therefore never share bound
/// names, which is what keeps substitution capture-free.
fn rename_exp(exp: &Exp) -> Exp {
    match exp {
        Exp::Num(_) | Exp::Bool(_) | Exp::Str(_) | Exp::Var(_) | Exp::Prim(_) | Exp::Lit(_) => {
            exp.clone()
        }
        Exp::If { test, then, alt } => Exp::If {
            test: Box::new(rename_exp(test)),
            then: Box::new(rename_exp(then)),
            alt: Box::new(rename_exp(alt)),
        },
        Exp::App { rator, rands } => Exp::App {
            rator: Box::new(rename_exp(rator)),
            rands: rands.iter().map(rename_exp).collect(),
        },
        Exp::Dict(entries) => Exp::Dict(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), rename_exp(value)))
                .collect(),
        ),
        Exp::Proc { params, body } => {
            let fresh: Vec<String> = params.iter().map(|p| fresh_name(p)).collect();
            let fresh_refs: Vec<Exp> = fresh.iter().map(|p| Exp::Var(p.clone())).collect();
            let body: Vec<Exp> = body.iter().map(rename_exp).collect();
            let body = substitute_all(&body, params, &fresh_refs);
            Exp::Proc {
                params: fresh,
                body,
            }
        }
    }
}

/// Substitute expressions for variables across a body sequence
fn substitute_all(body: &[Exp], vars: &[String], replacements: &[Exp]) -> Vec<Exp> {
    body.iter()
        .map(|exp| substitute(exp, vars, replacements))
        .collect()
}

/// Capture-naive substitution: replaces free occurrences of `vars` with the
/// corresponding expressions, respecting shadowing by inner parameters.
/// Callers rename bound variables first, so capture cannot occur.
fn substitute(exp: &Exp, vars: &[String], replacements: &[Exp]) -> Exp {
    match exp {
        Exp::Num(_) | Exp::Bool(_) | Exp::Str(_) | Exp::Prim(_) | Exp::Lit(_) => exp.clone(),
        Exp::Var(name) => match vars.iter().position(|v| v == name) {
            Some(i) => replacements[i].clone(),
            None => exp.clone(),
        },
        Exp::If { test, then, alt } => Exp::If {
            test: Box::new(substitute(test, vars, replacements)),
            then: Box::new(substitute(then, vars, replacements)),
            alt: Box::new(substitute(alt, vars, replacements)),
        },
        Exp::App { rator, rands } => Exp::App {
            rator: Box::new(substitute(rator, vars, replacements)),
            rands: rands
                .iter()
                .map(|rand| substitute(rand, vars, replacements))
                .collect(),
        },
        Exp::Dict(entries) => Exp::Dict(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), substitute(value, vars, replacements)))
                .collect(),
        ),
        Exp::Proc { params, body } => {
            // Inner parameters shadow outer substitutions
            let (kept_vars, kept_replacements): (Vec<String>, Vec<Exp>) = vars
                .iter()
                .zip(replacements.iter())
                .filter(|(var, _)| !params.contains(var))
                .map(|(var, replacement)| (var.clone(), replacement.clone()))
                .unzip();
            Exp::Proc {
                params: params.clone(),
                body: substitute_all(body, &kept_vars, &kept_replacements),
            }
        }
    }
}

/// Convert a runtime value back into a literal expression for substitution.
/// Closures become procedure literals and dictionaries become dictionary
/// literals (recursively); everything else becomes a quoted datum or a
/// direct literal.
fn value_to_lit_exp(value: &Value) -> Exp {
    match value {
        Value::Num(n) => Exp::Num(*n),
        Value::Bool(b) => Exp::Bool(*b),
        Value::Str(s) => Exp::Str(s.clone()),
        Value::Prim(op) => Exp::Prim(op.clone()),
        Value::Closure { params, body } => Exp::Proc {
            params: params.clone(),
            body: body.clone(),
        },
        Value::Dict(entries) => Exp::Dict(
            entries
                .iter()
                .map(|entry| (entry.key.clone(), value_to_lit_exp(&entry.value)))
                .collect(),
        ),
        Value::Symbol(_) | Value::Nil | Value::Pair(..) => Exp::Lit(value.clone()),
    }
}
