//! Builtin function catalogue and the capability table built from it.
//!
//! The table is fixed when an evaluator is constructed. Names on the deny-list
//! always fail with an explicit rejection, even if a scope binding shadows them.

use crate::core::registry::UnitRegistry;
use crate::math::complex::Complex;
use crate::math::node::BinaryOp;
use crate::math::ops;
use crate::math::value::{Quantity, Unit, UnitTerm, Value};
use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};

pub type Builtin = fn(&str, &[Value], &UnitRegistry) -> Result<Value>;

/// Operations that must never be reachable from user input.
pub const RESTRICTED: &[&str] = &[
    "import",
    "createUnit",
    "eval",
    "evaluate",
    "parse",
    "compile",
    "simplify",
    "derivative",
];

const BUILTINS: &[(&str, Builtin)] = &[
    ("sqrt", sqrt),
    ("cbrt", cbrt),
    ("abs", abs),
    ("exp", exp),
    ("log", log),
    ("log10", log10),
    ("log2", log2),
    ("sin", sin),
    ("cos", cos),
    ("tan", tan),
    ("asin", asin),
    ("acos", acos),
    ("atan", atan),
    ("atan2", atan2),
    ("sinh", sinh),
    ("cosh", cosh),
    ("tanh", tanh),
    ("floor", floor),
    ("ceil", ceil),
    ("fix", fix),
    ("round", round),
    ("sign", sign),
    ("min", min),
    ("max", max),
    ("pow", pow),
    ("mod", modulo),
    ("hypot", hypot),
    ("re", re),
    ("im", im),
    ("conj", conj),
    ("arg", arg),
    ("number", number),
];

pub enum Capability {
    Builtin(Builtin),
    Disabled,
    Unknown,
}

#[derive(Clone)]
pub struct FunctionTable {
    builtins: HashMap<&'static str, Builtin>,
    disabled: HashSet<String>,
}

impl FunctionTable {
    /// Every builtin, with the restricted operations disabled.
    pub fn standard() -> Self {
        Self {
            builtins: BUILTINS.iter().copied().collect(),
            disabled: RESTRICTED.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.disabled.insert(name.into());
        self
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    pub fn resolve(&self, name: &str) -> Capability {
        if self.is_disabled(name) {
            return Capability::Disabled;
        }
        match self.builtins.get(name) {
            Some(builtin) => Capability::Builtin(*builtin),
            None => Capability::Unknown,
        }
    }

    /// Names callable from expressions, sorted.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .builtins
            .keys()
            .copied()
            .filter(|name| !self.is_disabled(name))
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min}-{max}")
        };
        bail!(
            "Wrong number of arguments in function {name} ({} provided, {expected} expected)",
            args.len()
        );
    }
    Ok(())
}

fn real(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Quantity(_) => bail!("Function {name} does not support units"),
        Value::Complex(_) => bail!("Function {name} does not support complex numbers"),
        Value::Function(_) => bail!("Function {name} does not support functions"),
        other => Ok(other.as_number().unwrap_or(f64::NAN)),
    }
}

fn unary_real(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    arity(name, args, 1, 1)?;
    Ok(Value::Number(f(real(name, &args[0])?)))
}

/// Applies `f` to a number or to the magnitude of a quantity.
fn magnitude_map(name: &str, value: &Value, f: impl Fn(f64) -> f64) -> Result<Value> {
    match value {
        Value::Quantity(q) => Ok(Value::Quantity(Quantity {
            value: f(q.value),
            unit: q.unit.clone(),
        })),
        other => Ok(Value::Number(f(real(name, other)?))),
    }
}

fn sqrt(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Complex(c) => Ok(Value::Complex(c.sqrt())),
        Value::Quantity(q) => {
            if q.unit.terms().iter().any(|t| t.power % 2 != 0) {
                bail!("Function sqrt needs even unit powers");
            }
            let halved: Vec<UnitTerm> = q
                .unit
                .terms()
                .iter()
                .map(|t| UnitTerm {
                    code: t.code.clone(),
                    power: t.power / 2,
                })
                .collect();
            let unit = halved.iter().try_fold(Unit::default(), |acc, t| {
                acc.mul(&Unit::single(&t.code).powi(t.power)?)
            })?;
            Ok(Value::Quantity(Quantity {
                value: q.value.sqrt(),
                unit,
            }))
        }
        other => {
            let x = real(name, other)?;
            if x < 0.0 {
                Ok(Value::Complex(Complex::real(x).sqrt()))
            } else {
                Ok(Value::Number(x.sqrt()))
            }
        }
    }
}

fn cbrt(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::cbrt)
}

fn abs(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Complex(c) => Ok(Value::Number(c.abs())),
        other => magnitude_map(name, other, f64::abs),
    }
}

fn exp(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Complex(c) => Ok(Value::Complex(c.exp())),
        other => Ok(Value::Number(real(name, other)?.exp())),
    }
}

fn log(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 2)?;
    if args.len() == 2 {
        let x = real(name, &args[0])?;
        let base = real(name, &args[1])?;
        return Ok(Value::Number(x.ln() / base.ln()));
    }
    match &args[0] {
        Value::Complex(c) => Ok(Value::Complex(c.ln())),
        other => {
            let x = real(name, other)?;
            if x < 0.0 {
                Ok(Value::Complex(Complex::real(x).ln()))
            } else {
                Ok(Value::Number(x.ln()))
            }
        }
    }
}

fn log10(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::log10)
}

fn log2(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::log2)
}

/// Radians from a plain number or a dimensionless quantity such as `45 deg`.
fn angle(name: &str, value: &Value, registry: &UnitRegistry) -> Result<f64> {
    match value {
        Value::Quantity(q) => {
            let (factor, dimension) = q.unit.resolve(registry)?;
            if !dimension.is_none() {
                bail!("Function {name} does not support units of {dimension}");
            }
            Ok(q.value * factor)
        }
        other => real(name, other),
    }
}

fn trig(name: &str, args: &[Value], registry: &UnitRegistry, f: fn(f64) -> f64) -> Result<Value> {
    arity(name, args, 1, 1)?;
    Ok(Value::Number(f(angle(name, &args[0], registry)?)))
}

fn sin(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    trig(name, args, registry, f64::sin)
}

fn cos(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    trig(name, args, registry, f64::cos)
}

fn tan(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    trig(name, args, registry, f64::tan)
}

fn asin(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::asin)
}

fn acos(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::acos)
}

fn atan(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::atan)
}

fn atan2(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 2, 2)?;
    Ok(Value::Number(
        real(name, &args[0])?.atan2(real(name, &args[1])?),
    ))
}

fn sinh(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::sinh)
}

fn cosh(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::cosh)
}

fn tanh(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, f64::tanh)
}

fn floor(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    magnitude_map(name, &args[0], f64::floor)
}

fn ceil(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    magnitude_map(name, &args[0], f64::ceil)
}

fn fix(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 1)?;
    magnitude_map(name, &args[0], f64::trunc)
}

fn round(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 2)?;
    let digits = match args.get(1) {
        Some(value) => {
            let n = real(name, value)?;
            if n.fract() != 0.0 || !(0.0..=15.0).contains(&n) {
                bail!("Number of decimals in function round must be an integer from 0 to 15");
            }
            n as i32
        }
        None => 0,
    };
    let scale = 10f64.powi(digits);
    magnitude_map(name, &args[0], |x| (x * scale).round() / scale)
}

fn sign(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    unary_real(name, args, |x| if x == 0.0 { 0.0 } else { x.signum() })
}

fn extreme(name: &str, args: &[Value], registry: &UnitRegistry, keep: std::cmp::Ordering) -> Result<Value> {
    arity(name, args, 1, usize::MAX)?;
    let mut best = args[0].clone();
    for candidate in &args[1..] {
        if ops::compare(candidate, &best, registry)? == keep {
            best = candidate.clone();
        }
    }
    Ok(best)
}

fn min(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    extreme(name, args, registry, std::cmp::Ordering::Less)
}

fn max(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    extreme(name, args, registry, std::cmp::Ordering::Greater)
}

fn pow(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    arity(name, args, 2, 2)?;
    ops::binary(BinaryOp::Pow, args[0].clone(), args[1].clone(), registry)
}

fn modulo(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    arity(name, args, 2, 2)?;
    ops::binary(BinaryOp::Mod, args[0].clone(), args[1].clone(), registry)
}

fn hypot(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, usize::MAX)?;
    let mut sum = 0.0;
    for value in args {
        let x = real(name, value)?;
        sum += x * x;
    }
    Ok(Value::Number(sum.sqrt()))
}

fn complex_arg(name: &str, args: &[Value]) -> Result<Complex> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Complex(c) => Ok(*c),
        other => Ok(Complex::real(real(name, other)?)),
    }
}

fn re(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    Ok(Value::Number(complex_arg(name, args)?.re))
}

fn im(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    Ok(Value::Number(complex_arg(name, args)?.im))
}

fn conj(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    Ok(Value::Complex(complex_arg(name, args)?.conj()))
}

fn arg(name: &str, args: &[Value], _: &UnitRegistry) -> Result<Value> {
    Ok(Value::Number(complex_arg(name, args)?.arg()))
}

/// `number(q)` is the magnitude of `q`; `number(q, u)` its magnitude in unit `u`.
fn number(name: &str, args: &[Value], registry: &UnitRegistry) -> Result<Value> {
    arity(name, args, 1, 2)?;
    match (&args[0], args.get(1)) {
        (Value::Quantity(q), None) => Ok(Value::Number(q.value)),
        (Value::Quantity(q), Some(Value::Quantity(target))) => Ok(Value::Number(
            ops::convert_value(q, &target.unit, registry)?,
        )),
        (_, Some(_)) => bail!("Function number expects a unit as second argument"),
        (other, None) => Ok(Value::Number(real(name, other)?)),
    }
}
