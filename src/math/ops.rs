//! Arithmetic over values.
//!
//! Quantities keep their magnitude in the unit they were written in and are
//! only converted through the registry when two units meet.

use crate::core::registry::UnitRegistry;
use crate::math::complex::Complex;
use crate::math::node::BinaryOp;
use crate::math::value::{Quantity, Unit, Value};
use anyhow::{Result, bail};
use std::cmp::Ordering;

pub fn binary(op: BinaryOp, lhs: Value, rhs: Value, registry: &UnitRegistry) -> Result<Value> {
    match op {
        BinaryOp::Add => add(lhs, rhs, registry),
        BinaryOp::Sub => add(lhs, negate(rhs)?, registry),
        BinaryOp::Mul => multiply(lhs, rhs, registry),
        BinaryOp::Div => divide(lhs, rhs, registry),
        BinaryOp::Mod => modulo(lhs, rhs, registry),
        BinaryOp::Pow => power(lhs, rhs, registry),
    }
}

fn complex_of(value: &Value) -> Option<Complex> {
    match value {
        Value::Complex(c) => Some(*c),
        other => other.as_number().map(Complex::real),
    }
}

fn reject_function(op: &str, value: &Value) -> Result<()> {
    if let Value::Function(f) = value {
        bail!("Cannot apply {op} to function {}", f.name);
    }
    Ok(())
}

pub fn negate(value: Value) -> Result<Value> {
    reject_function("-", &value)?;
    Ok(match value {
        Value::Complex(c) => Value::Complex(c.neg()),
        Value::Quantity(q) => Value::Quantity(Quantity {
            value: -q.value,
            unit: q.unit,
        }),
        other => Value::Number(-other.as_number().unwrap_or(f64::NAN)),
    })
}

pub fn add(lhs: Value, rhs: Value, registry: &UnitRegistry) -> Result<Value> {
    reject_function("+", &lhs)?;
    reject_function("+", &rhs)?;
    match (lhs, rhs) {
        (Value::Quantity(a), Value::Quantity(b)) => {
            let converted = convert_value(&b, &a.unit, registry)?;
            Ok(Value::Quantity(Quantity {
                value: a.value + converted,
                unit: a.unit,
            }))
        }
        (Value::Quantity(_), _) | (_, Value::Quantity(_)) => bail!("Units do not match"),
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Number(x + y)),
            _ => Ok(complex_result(complex_of(&a), complex_of(&b), Complex::add)),
        },
    }
}

pub fn multiply(lhs: Value, rhs: Value, registry: &UnitRegistry) -> Result<Value> {
    reject_function("*", &lhs)?;
    reject_function("*", &rhs)?;
    match (lhs, rhs) {
        (Value::Quantity(a), Value::Quantity(b)) => {
            collapse(a.value * b.value, a.unit.mul(&b.unit)?, registry)
        }
        (Value::Quantity(q), other) | (other, Value::Quantity(q)) => {
            let scalar = scalar_for_quantity(&other)?;
            Ok(Value::Quantity(Quantity {
                value: q.value * scalar,
                unit: q.unit,
            }))
        }
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Number(x * y)),
            _ => Ok(complex_result(complex_of(&a), complex_of(&b), Complex::mul)),
        },
    }
}

pub fn divide(lhs: Value, rhs: Value, registry: &UnitRegistry) -> Result<Value> {
    reject_function("/", &lhs)?;
    reject_function("/", &rhs)?;
    match (lhs, rhs) {
        (Value::Quantity(a), Value::Quantity(b)) => {
            collapse(a.value / b.value, a.unit.mul(&b.unit.powi(-1)?)?, registry)
        }
        (Value::Quantity(q), other) => {
            let scalar = scalar_for_quantity(&other)?;
            Ok(Value::Quantity(Quantity {
                value: q.value / scalar,
                unit: q.unit,
            }))
        }
        (other, Value::Quantity(q)) => {
            let scalar = scalar_for_quantity(&other)?;
            Ok(Value::Quantity(Quantity {
                value: scalar / q.value,
                unit: q.unit.powi(-1)?,
            }))
        }
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Number(x / y)),
            _ => Ok(complex_result(complex_of(&a), complex_of(&b), Complex::div)),
        },
    }
}

fn modulo(lhs: Value, rhs: Value, registry: &UnitRegistry) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Quantity(a), Value::Quantity(b)) => {
            let divisor = convert_value(b, &a.unit, registry)?;
            Ok(Value::Quantity(Quantity {
                value: floored_mod(a.value, divisor),
                unit: a.unit.clone(),
            }))
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(x), Some(y)) => Ok(Value::Number(floored_mod(x, y))),
            _ => bail!(
                "Function mod does not support {} and {}",
                lhs.kind(),
                rhs.kind()
            ),
        },
    }
}

fn floored_mod(x: f64, y: f64) -> f64 {
    if y == 0.0 {
        return x;
    }
    x - y * (x / y).floor()
}

pub fn power(base: Value, exponent: Value, registry: &UnitRegistry) -> Result<Value> {
    reject_function("^", &base)?;
    reject_function("^", &exponent)?;
    match (base, exponent) {
        (_, Value::Quantity(_)) => bail!("Exponent must be dimensionless"),
        (Value::Quantity(q), exponent) => {
            let Some(p) = exponent.as_number() else {
                bail!("Unit powers must be real numbers");
            };
            if p.fract() != 0.0 || p.abs() > i32::MAX as f64 {
                bail!("Unit powers must be integers");
            }
            collapse(q.value.powf(p), q.unit.powi(p as i32)?, registry)
        }
        (b, e) => match (b.as_number(), e.as_number()) {
            (Some(x), Some(y)) if x >= 0.0 || y.fract() == 0.0 || !y.is_finite() => {
                Ok(Value::Number(x.powf(y)))
            }
            _ => Ok(complex_result(complex_of(&b), complex_of(&e), Complex::pow)),
        },
    }
}

/// Re-expresses a quantity in `target` units.
pub fn convert_value(quantity: &Quantity, target: &Unit, registry: &UnitRegistry) -> Result<f64> {
    let (from_factor, from_dim) = quantity.unit.resolve(registry)?;
    let (to_factor, to_dim) = target.resolve(registry)?;
    if from_dim != to_dim {
        bail!("Units do not match");
    }
    Ok(quantity.value * from_factor / to_factor)
}

pub fn convert(value: Value, target: Value, registry: &UnitRegistry) -> Result<Value> {
    let Value::Quantity(target) = target else {
        bail!("Unit expected on the right hand side of \"to\"");
    };
    let Value::Quantity(quantity) = value else {
        bail!("Unit expected on the left hand side of \"to\"");
    };
    let converted = convert_value(&quantity, &target.unit, registry)?;
    Ok(Value::Quantity(Quantity {
        value: converted,
        unit: target.unit,
    }))
}

/// Orders two comparable values; quantities must share a dimension.
pub fn compare(lhs: &Value, rhs: &Value, registry: &UnitRegistry) -> Result<Ordering> {
    let (x, y) = match (lhs, rhs) {
        (Value::Quantity(a), Value::Quantity(b)) => (a.value, convert_value(b, &a.unit, registry)?),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(x), Some(y)) => (x, y),
            _ => bail!("Cannot compare {} with {}", lhs.kind(), rhs.kind()),
        },
    };
    x.partial_cmp(&y)
        .ok_or_else(|| anyhow::anyhow!("Cannot compare NaN"))
}

fn scalar_for_quantity(value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| anyhow::anyhow!("Cannot combine a unit with a {}", value.kind()))
}

/// Turns a quantity whose units cancel out into a plain number.
fn collapse(value: f64, unit: Unit, registry: &UnitRegistry) -> Result<Value> {
    if unit.is_empty() {
        return Ok(Value::Number(value));
    }
    let (factor, dimension) = unit.resolve(registry)?;
    if dimension.is_none() {
        return Ok(Value::Number(value * factor));
    }
    Ok(Value::Quantity(Quantity { value, unit }))
}

fn complex_result(
    a: Option<Complex>,
    b: Option<Complex>,
    f: impl Fn(Complex, Complex) -> Complex,
) -> Value {
    match (a, b) {
        (Some(a), Some(b)) => Value::Complex(f(a, b)),
        _ => Value::Number(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::{RateBatch, RateSample};

    fn registry() -> UnitRegistry {
        let registry = UnitRegistry::new("USD");
        registry.apply_batch(&RateBatch::new(
            "test",
            vec![RateSample::new("EUR", 1.25, "USD")],
        ));
        registry
    }

    fn qty(value: f64, code: &str) -> Value {
        Value::Quantity(Quantity {
            value,
            unit: Unit::single(code),
        })
    }

    #[test]
    fn test_add_quantities_uses_left_unit() {
        let registry = registry();
        let sum = add(qty(10.0, "EUR"), qty(5.0, "USD"), &registry).unwrap();
        assert_eq!(sum, qty(14.0, "EUR"));
    }

    #[test]
    fn test_add_number_to_quantity_fails() {
        let registry = registry();
        let err = add(qty(1.0, "EUR"), Value::Number(1.0), &registry).unwrap_err();
        assert_eq!(err.to_string(), "Units do not match");
    }

    #[test]
    fn test_add_mismatched_dimensions_fails() {
        let registry = registry();
        assert!(add(qty(1.0, "EUR"), qty(1.0, "km"), &registry).is_err());
    }

    #[test]
    fn test_division_of_like_units_collapses_to_number() {
        let registry = registry();
        let ratio = divide(qty(10.0, "EUR"), qty(5.0, "USD"), &registry).unwrap();
        assert_eq!(ratio, Value::Number(2.5));
    }

    #[test]
    fn test_convert_quantity() {
        let registry = registry();
        let converted = convert(qty(8.0, "EUR"), qty(1.0, "USD"), &registry).unwrap();
        assert_eq!(converted, qty(10.0, "USD"));
        assert!(convert(Value::Number(8.0), qty(1.0, "USD"), &registry).is_err());
    }

    #[test]
    fn test_negative_base_fractional_power_is_complex() {
        let registry = registry();
        let value = power(Value::Number(-4.0), Value::Number(0.5), &registry).unwrap();
        match value {
            Value::Complex(c) => {
                assert!(c.re.abs() < 1e-12);
                assert!((c.im - 2.0).abs() < 1e-12);
            }
            other => panic!("expected complex, got {other:?}"),
        }
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let registry = registry();
        let value = divide(Value::Number(1.0), Value::Number(0.0), &registry).unwrap();
        assert_eq!(value, Value::Number(f64::INFINITY));
    }

    #[test]
    fn test_compare_quantities() {
        let registry = registry();
        let ordering = compare(&qty(1.0, "EUR"), &qty(1.0, "USD"), &registry).unwrap();
        assert_eq!(ordering, Ordering::Greater);
    }
}
