//! Live unit table shared by every evaluation.
//!
//! Each unit is stored as a factor relative to the coherent base of its
//! dimension: the configured base currency, the metre, the kilogram and the
//! second. The rate feed is the only writer; evaluators only read.

use crate::core::rates::{RateBatch, RateSample};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Currency every rate source quotes in, and the unit all others resolve to.
pub const BASE_CURRENCY: &str = "USD";

/// Exponents over (currency, length, mass, time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension([i8; 4]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0, 0, 0, 0]);
    pub const CURRENCY: Dimension = Dimension([1, 0, 0, 0]);
    pub const LENGTH: Dimension = Dimension([0, 1, 0, 0]);
    pub const MASS: Dimension = Dimension([0, 0, 1, 0]);
    pub const TIME: Dimension = Dimension([0, 0, 0, 1]);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn mul(self, other: Dimension) -> Result<Dimension> {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0) {
            *a = a.checked_add(b).ok_or_else(power_out_of_range)?;
        }
        Ok(Dimension(out))
    }

    pub fn powi(self, power: i32) -> Result<Dimension> {
        let mut out = self.0;
        for a in out.iter_mut() {
            let raised = i32::from(*a)
                .checked_mul(power)
                .ok_or_else(power_out_of_range)?;
            *a = i8::try_from(raised).map_err(|_| power_out_of_range())?;
        }
        Ok(Dimension(out))
    }
}

pub fn power_out_of_range() -> anyhow::Error {
    anyhow!("Unit power out of range")
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 4] = ["currency", "length", "mass", "time"];
        if self.is_none() {
            return write!(f, "dimensionless");
        }
        let parts: Vec<String> = NAMES
            .iter()
            .zip(self.0)
            .filter(|(_, exp)| *exp != 0)
            .map(|(name, exp)| {
                if exp == 1 {
                    name.to_string()
                } else {
                    format!("{name}^{exp}")
                }
            })
            .collect();
        write!(f, "{}", parts.join(" * "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDef {
    pub factor: f64,
    pub dimension: Dimension,
    pub origin: String,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of applying one batch; rejected samples carry their reason.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub applied: usize,
    pub rejected: Vec<(String, String)>,
}

const BUILTIN_UNITS: &[(&str, f64, Dimension)] = &[
    ("m", 1.0, Dimension::LENGTH),
    ("mm", 1e-3, Dimension::LENGTH),
    ("cm", 1e-2, Dimension::LENGTH),
    ("km", 1e3, Dimension::LENGTH),
    ("inch", 0.0254, Dimension::LENGTH),
    ("ft", 0.3048, Dimension::LENGTH),
    ("yd", 0.9144, Dimension::LENGTH),
    ("mi", 1609.344, Dimension::LENGTH),
    ("g", 1e-3, Dimension::MASS),
    ("mg", 1e-6, Dimension::MASS),
    ("kg", 1.0, Dimension::MASS),
    ("lb", 0.45359237, Dimension::MASS),
    ("oz", 0.028349523125, Dimension::MASS),
    ("s", 1.0, Dimension::TIME),
    ("ms", 1e-3, Dimension::TIME),
    ("min", 60.0, Dimension::TIME),
    ("h", 3600.0, Dimension::TIME),
    ("day", 86400.0, Dimension::TIME),
    ("week", 604800.0, Dimension::TIME),
    ("rad", 1.0, Dimension::NONE),
    ("deg", std::f64::consts::PI / 180.0, Dimension::NONE),
];

pub fn is_valid_code(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct UnitRegistry {
    base: String,
    units: RwLock<HashMap<String, UnitDef>>,
}

impl UnitRegistry {
    /// Creates a registry holding the base currency and the builtin physical units.
    pub fn new(base: &str) -> Self {
        let now = Utc::now();
        let mut units = HashMap::new();
        for (code, factor, dimension) in BUILTIN_UNITS {
            units.insert(
                code.to_string(),
                UnitDef {
                    factor: *factor,
                    dimension: *dimension,
                    origin: "builtin".to_string(),
                    updated_at: now,
                },
            );
        }
        units.insert(
            base.to_string(),
            UnitDef {
                factor: 1.0,
                dimension: Dimension::CURRENCY,
                origin: "base".to_string(),
                updated_at: now,
            },
        );
        debug!("Unit registry created with base {}", base);

        Self {
            base: base.to_string(),
            units: RwLock::new(units),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn lookup(&self, code: &str) -> Option<UnitDef> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        units.get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Codes of every unit expressed in the base currency, sorted.
    pub fn currencies(&self) -> Vec<String> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<String> = units
            .iter()
            .filter(|(_, def)| def.dimension == Dimension::CURRENCY)
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        codes
    }

    /// Registers a single sample, replacing any earlier definition for its code.
    pub fn create_or_override(&self, sample: &RateSample, origin: &str) -> Result<UnitDef> {
        let def = self.resolve(sample, origin, Utc::now(), &HashMap::new())?;
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        units.insert(sample.code.clone(), def.clone());
        Ok(def)
    }

    /// Applies a whole batch. Bad samples are skipped; the rest are committed together.
    pub fn apply_batch(&self, batch: &RateBatch) -> BatchReport {
        let mut report = BatchReport::default();
        let mut staged: HashMap<String, UnitDef> = HashMap::new();

        for sample in &batch.samples {
            match self.resolve(sample, &batch.source, batch.received_at, &staged) {
                Ok(def) => {
                    staged.insert(sample.code.clone(), def);
                }
                Err(e) => {
                    warn!(
                        source = %batch.source,
                        code = %sample.code,
                        "Can't create unit: {e}"
                    );
                    report.rejected.push((sample.code.clone(), e.to_string()));
                }
            }
        }

        report.applied = staged.len();
        if !staged.is_empty() {
            let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
            units.extend(staged);
        }
        debug!(
            source = %batch.source,
            applied = report.applied,
            rejected = report.rejected.len(),
            "Applied rate batch"
        );
        report
    }

    fn resolve(
        &self,
        sample: &RateSample,
        origin: &str,
        updated_at: DateTime<Utc>,
        staged: &HashMap<String, UnitDef>,
    ) -> Result<UnitDef> {
        let code = sample.code.as_str();
        let amount = sample.rate.amount;
        let reference = sample.rate.unit.as_str();

        if !is_valid_code(code) {
            bail!("Invalid unit name {code:?}");
        }
        if code == self.base {
            bail!("Base unit {code} cannot be overridden");
        }
        if code == reference {
            bail!("Unit {code} cannot be defined in terms of itself");
        }
        if !amount.is_finite() || amount <= 0.0 {
            bail!("Invalid rate {amount} for {code}");
        }

        let reference_def = staged
            .get(reference)
            .cloned()
            .or_else(|| self.lookup(reference))
            .ok_or_else(|| anyhow!("Unknown reference unit {reference} for {code}"))?;

        let factor = amount * reference_def.factor;
        if !factor.is_finite() || factor <= 0.0 {
            bail!("Rate for {code} overflows");
        }

        Ok(UnitDef {
            factor,
            dimension: reference_def.dimension,
            origin: origin.to_string(),
            updated_at,
        })
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new(BASE_CURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(samples: Vec<RateSample>) -> RateBatch {
        RateBatch::new("test", samples)
    }

    #[test]
    fn test_base_unit_is_registered() {
        let registry = UnitRegistry::new("USD");
        let usd = registry.lookup("USD").expect("base unit");
        assert_eq!(usd.factor, 1.0);
        assert_eq!(usd.dimension, Dimension::CURRENCY);
        assert_eq!(registry.base(), "USD");
        assert!(registry.contains("km"));
    }

    #[test]
    fn test_default_registry_accepts_feed_quotes() {
        let registry = UnitRegistry::default();
        assert_eq!(registry.base(), BASE_CURRENCY);
        let report = registry.apply_batch(&batch(vec![
            RateSample::new("GBP", 1.27, BASE_CURRENCY),
            RateSample::new("BTC", 30000.0, BASE_CURRENCY),
        ]));
        assert_eq!(report.applied, 2);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_base_unit_cannot_be_overridden() {
        let registry = UnitRegistry::new("USD");
        let result = registry.create_or_override(&RateSample::new("USD", 2.0, "EUR"), "test");
        assert!(result.is_err());

        let report = registry.apply_batch(&batch(vec![RateSample::new("USD", 3.0, "USD")]));
        assert_eq!(report.applied, 0);
        assert_eq!(registry.lookup("USD").unwrap().factor, 1.0);
    }

    #[test]
    fn test_later_sample_overrides_earlier() {
        let registry = UnitRegistry::new("USD");
        registry.apply_batch(&batch(vec![RateSample::new("EUR", 1.10, "USD")]));
        registry.apply_batch(&batch(vec![RateSample::new("EUR", 1.05, "USD")]));

        let eur = registry.lookup("EUR").unwrap();
        assert_eq!(eur.factor, 1.05);
        assert_eq!(eur.dimension, Dimension::CURRENCY);
    }

    #[test]
    fn test_bad_sample_does_not_drop_batch() {
        let registry = UnitRegistry::new("USD");
        let report = registry.apply_batch(&batch(vec![
            RateSample::new("EUR", 1.1, "USD"),
            RateSample::new("1INCH", 0.4, "USD"),
            RateSample::new("GBP", 1.27, "USD"),
            RateSample::new("XYZ", f64::NAN, "USD"),
            RateSample::new("ABC", 1.0, "ABC"),
            RateSample::new("DEF", 1.0, "NOPE"),
        ]));

        assert_eq!(report.applied, 2);
        assert_eq!(report.rejected.len(), 4);
        assert!(registry.contains("EUR"));
        assert!(registry.contains("GBP"));
        assert!(!registry.contains("1INCH"));
        assert!(!registry.contains("DEF"));
    }

    #[test]
    fn test_rejected_sample_keeps_prior_definition() {
        let registry = UnitRegistry::new("USD");
        registry.apply_batch(&batch(vec![RateSample::new("EUR", 1.1, "USD")]));
        registry.apply_batch(&batch(vec![RateSample::new("EUR", -1.0, "USD")]));
        assert_eq!(registry.lookup("EUR").unwrap().factor, 1.1);
    }

    #[test]
    fn test_sample_may_reference_earlier_sample_in_batch() {
        let registry = UnitRegistry::new("USD");
        let report = registry.apply_batch(&batch(vec![
            RateSample::new("CLP", 0.001, "USD"),
            RateSample::new("UF", 37000.0, "CLP"),
        ]));
        assert_eq!(report.applied, 2);
        let uf = registry.lookup("UF").unwrap();
        assert!((uf.factor - 37.0).abs() < 1e-9);
    }

    #[test]
    fn test_currencies_lists_currency_units_only() {
        let registry = UnitRegistry::new("USD");
        registry.apply_batch(&batch(vec![RateSample::new("EUR", 1.1, "USD")]));
        assert_eq!(registry.currencies(), vec!["EUR", "USD"]);
    }

    #[test]
    fn test_dimension_arithmetic() -> Result<()> {
        let speed = Dimension::LENGTH.mul(Dimension::TIME.powi(-1)?)?;
        assert_eq!(speed.to_string(), "length * time^-1");
        assert!(speed.mul(Dimension::TIME)?.mul(Dimension::LENGTH.powi(-1)?)?.is_none());
        Ok(())
    }

    #[test]
    fn test_dimension_overflow_is_an_error() {
        let big = Dimension::LENGTH.powi(100).unwrap();
        assert_eq!(
            big.mul(big).unwrap_err().to_string(),
            "Unit power out of range"
        );
        assert!(Dimension::LENGTH.powi(128).is_err());
        assert!(Dimension::LENGTH.powi(i32::MAX).is_err());
        assert!(Dimension::LENGTH.powi(-128).is_ok());
    }

    #[test]
    fn test_is_valid_code() {
        assert!(is_valid_code("BTC"));
        assert!(is_valid_code("USDT_2"));
        assert!(!is_valid_code("1INCH"));
        assert!(!is_valid_code("$PAC"));
        assert!(!is_valid_code(""));
    }
}
