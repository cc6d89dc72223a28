//! Values produced by evaluation and their persisted form.
//!
//! Persisted values are a tagged union (`{"type": "quantity", ...}`) so they can
//! be revived without guessing. Non-finite floats are written as strings since
//! JSON has no literal for them.

use crate::core::registry::{Dimension, UnitRegistry, is_valid_code, power_out_of_range};
use crate::math::complex::Complex;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTerm {
    pub code: String,
    pub power: i32,
}

/// A product of unit codes raised to integer powers, e.g. `km / h`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(Vec<UnitTerm>);

impl Unit {
    pub fn single(code: &str) -> Self {
        Unit(vec![UnitTerm {
            code: code.to_string(),
            power: 1,
        }])
    }

    pub fn terms(&self) -> &[UnitTerm] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn mul(&self, other: &Unit) -> Result<Unit> {
        let mut terms = self.0.clone();
        for term in &other.0 {
            match terms.iter_mut().find(|t| t.code == term.code) {
                Some(existing) => {
                    existing.power = existing
                        .power
                        .checked_add(term.power)
                        .ok_or_else(power_out_of_range)?;
                }
                None => terms.push(term.clone()),
            }
        }
        terms.retain(|t| t.power != 0);
        Ok(Unit(terms))
    }

    pub fn powi(&self, power: i32) -> Result<Unit> {
        let mut terms = Vec::with_capacity(self.0.len());
        for t in &self.0 {
            let raised = t.power.checked_mul(power).ok_or_else(power_out_of_range)?;
            if raised != 0 {
                terms.push(UnitTerm {
                    code: t.code.clone(),
                    power: raised,
                });
            }
        }
        Ok(Unit(terms))
    }

    /// Factor relative to the coherent base and the combined dimension.
    pub fn resolve(&self, registry: &UnitRegistry) -> Result<(f64, Dimension)> {
        let mut factor = 1.0;
        let mut dimension = Dimension::NONE;
        for term in &self.0 {
            let def = registry
                .lookup(&term.code)
                .ok_or_else(|| anyhow!("Unit {} is not available", term.code))?;
            factor *= def.factor.powi(term.power);
            dimension = dimension.mul(def.dimension.powi(term.power)?)?;
        }
        Ok((factor, dimension))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn term(code: &str, power: i64) -> String {
            if power == 1 {
                code.to_string()
            } else {
                format!("{code}^{power}")
            }
        }

        let numerator: Vec<String> = self
            .0
            .iter()
            .filter(|t| t.power > 0)
            .map(|t| term(&t.code, i64::from(t.power)))
            .collect();
        let denominator: Vec<String> = self
            .0
            .iter()
            .filter(|t| t.power < 0)
            .map(|t| term(&t.code, -i64::from(t.power)))
            .collect();

        match (numerator.is_empty(), denominator.is_empty()) {
            (_, true) => write!(f, "{}", numerator.join(" ")),
            (false, false) => write!(f, "{} / {}", numerator.join(" "), denominator.join(" ")),
            (true, false) => {
                let inverse: Vec<String> = self
                    .0
                    .iter()
                    .map(|t| term(&t.code, i64::from(t.power)))
                    .collect();
                write!(f, "{}", inverse.join(" "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// Canonical text of the body, parsed again on every call.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValueRepr", try_from = "ValueRepr")]
pub enum Value {
    Number(f64),
    Complex(Complex),
    Quantity(Quantity),
    Boolean(bool),
    Function(Function),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Complex(_) => "complex",
            Value::Quantity(_) => "quantity",
            Value::Boolean(_) => "boolean",
            Value::Function(_) => "function",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ValueRepr {
    Number {
        #[serde(with = "float_repr")]
        value: f64,
    },
    Complex {
        #[serde(with = "float_repr")]
        re: f64,
        #[serde(with = "float_repr")]
        im: f64,
    },
    Quantity {
        #[serde(with = "float_repr")]
        value: f64,
        unit: Unit,
    },
    Boolean {
        value: bool,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: String,
    },
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(value) => ValueRepr::Number { value },
            Value::Complex(c) => ValueRepr::Complex { re: c.re, im: c.im },
            Value::Quantity(q) => ValueRepr::Quantity {
                value: q.value,
                unit: q.unit,
            },
            Value::Boolean(value) => ValueRepr::Boolean { value },
            Value::Function(f) => ValueRepr::Function {
                name: f.name,
                params: f.params,
                body: f.body,
            },
        }
    }
}

impl TryFrom<ValueRepr> for Value {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            ValueRepr::Number { value } => Value::Number(value),
            ValueRepr::Complex { re, im } => Value::Complex(Complex::new(re, im)),
            ValueRepr::Quantity { value, unit } => {
                if let Some(bad) = unit.terms().iter().find(|t| !is_valid_code(&t.code)) {
                    return Err(format!("invalid unit code {:?}", bad.code));
                }
                Value::Quantity(Quantity { value, unit })
            }
            ValueRepr::Boolean { value } => Value::Boolean(value),
            ValueRepr::Function { name, params, body } => {
                if let Some(bad) = params.iter().find(|p| !is_valid_code(p)) {
                    return Err(format!("invalid parameter name {bad:?}"));
                }
                Value::Function(Function { name, params, body })
            }
        })
    }
}

mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(D::Error::custom(format!("invalid number {text:?}"))),
            },
        }
    }
}
