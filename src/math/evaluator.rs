//! Turns raw user text into per-line results against a session.

use crate::core::config::AppConfig;
use crate::core::registry::UnitRegistry;
use crate::core::session::Session;
use crate::math::engine::{ExpressionEngine, MathEngine};
use crate::math::value::Value;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LineResult {
    Evaluated {
        index: usize,
        expression: String,
        value: Value,
        display: String,
    },
    /// `index` is set only when a stored pad entry was being re-evaluated.
    Failed {
        index: Option<usize>,
        expression: String,
        error: String,
    },
    Missing {
        index: usize,
    },
}

impl LineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LineResult::Evaluated { .. })
    }
}

/// Runs user text line by line through an [`ExpressionEngine`], keeping the
/// pad and scope of a session in step with the results.
pub struct Evaluator<E = MathEngine> {
    engine: E,
}

impl Evaluator<MathEngine> {
    pub fn from_config(registry: Arc<UnitRegistry>, config: &AppConfig) -> Self {
        Self::new(MathEngine::from_config(registry, config))
    }
}

impl<E: ExpressionEngine> Evaluator<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn format_value(&self, value: &Value) -> String {
        self.engine.format(value)
    }

    /// Evaluates every non-empty line of `raw` in order.
    ///
    /// Input made only of digits is a recall of that pad entry instead.
    pub fn evaluate(&self, session: &mut Session, raw: &str) -> Vec<LineResult> {
        if let Some(index) = parse_recall(raw) {
            return vec![self.recall(session, index)];
        }

        raw.split('\n')
            .map(strip_prompt)
            .filter(|line| !line.is_empty())
            .map(|line| self.evaluate_line(session, line))
            .collect()
    }

    /// Evaluates one line and appends it to the pad when it succeeds.
    pub fn evaluate_line(&self, session: &mut Session, line: &str) -> LineResult {
        let line = strip_prompt(line);
        let index = session.pad.len();
        match self.run(session, line) {
            Ok((expression, value)) => {
                session.pad.push(expression.clone());
                self.evaluated(index, expression, value)
            }
            Err((expression, error)) => LineResult::Failed {
                index: None,
                expression,
                error,
            },
        }
    }

    /// Re-evaluates `pad[index]`, overwriting the entry with its canonical form.
    pub fn recall(&self, session: &mut Session, index: usize) -> LineResult {
        let Some(stored) = session.pad.get(index).cloned() else {
            debug!("Recall of missing pad entry {index}");
            return LineResult::Missing { index };
        };
        match self.run(session, &stored) {
            Ok((expression, value)) => {
                session.pad[index] = expression.clone();
                self.evaluated(index, expression, value)
            }
            Err((expression, error)) => LineResult::Failed {
                index: Some(index),
                expression,
                error,
            },
        }
    }

    /// Parses and evaluates against a scratch scope, committing it on success.
    fn run(&self, session: &mut Session, line: &str) -> Result<(String, Value), (String, String)> {
        let expr = self
            .engine
            .parse(line)
            .map_err(|e| (line.to_string(), e.to_string()))?;
        let expression = expr.to_string();

        let mut scratch = session.scope.clone();
        match self.engine.evaluate(&expr, &mut scratch) {
            Ok(value) => {
                session.scope = scratch;
                Ok((expression, value))
            }
            Err(e) => Err((expression, e.to_string())),
        }
    }

    fn evaluated(&self, index: usize, expression: String, value: Value) -> LineResult {
        let display = self.engine.format(&value);
        LineResult::Evaluated {
            index,
            expression,
            value,
            display,
        }
    }
}

/// Removes a leading `>>>` or `»>` style prompt marker.
pub fn strip_prompt(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['>', '»'])
        .trim_start()
}

/// A recall request is input made only of ASCII digits, optionally after `/`.
pub fn parse_recall(raw: &str) -> Option<usize> {
    let text = raw.trim();
    let digits = text.strip_prefix('/').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // An index too large for usize can never be present in the pad.
    Some(digits.parse().unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::{RateBatch, RateSample};
    use crate::core::session::Scope;
    use crate::math::format::NumberFormat;
    use crate::math::functions::FunctionTable;
    use anyhow::{Result, bail};

    fn evaluator() -> Evaluator {
        let registry = Arc::new(UnitRegistry::default());
        registry.apply_batch(&RateBatch::new(
            "test",
            vec![RateSample::new("EUR", 1.25, "USD")],
        ));
        Evaluator::new(MathEngine::new(
            registry,
            FunctionTable::standard(),
            NumberFormat::default(),
        ))
    }

    /// Accepts integers only and counts them into `total`.
    struct Tally;

    impl ExpressionEngine for Tally {
        type Expr = i64;

        fn parse(&self, line: &str) -> Result<i64> {
            match line.parse() {
                Ok(n) => Ok(n),
                Err(_) => bail!("Not an integer: {line}"),
            }
        }

        fn evaluate(&self, expr: &i64, scope: &mut Scope) -> Result<Value> {
            let total = match scope.get("total") {
                Some(Value::Number(n)) => n + *expr as f64,
                _ => *expr as f64,
            };
            scope.insert("total".to_string(), Value::Number(total));
            Ok(Value::Number(total))
        }

        fn format(&self, value: &Value) -> String {
            format!("total {value:?}")
        }
    }

    fn value_of(result: &LineResult) -> &Value {
        match result {
            LineResult::Evaluated { value, .. } => value,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_turns_share_scope_and_pad() {
        let evaluator = evaluator();
        let mut session = Session::default();

        let first = evaluator.evaluate(&mut session, "area = 3 * 4");
        assert_eq!(value_of(&first[0]), &Value::Number(12.0));
        assert_eq!(session.pad, vec!["area = 3 * 4"]);
        assert_eq!(session.scope.get("area"), Some(&Value::Number(12.0)));

        let second = evaluator.evaluate(&mut session, "sqrt(area)");
        match &second[0] {
            LineResult::Evaluated { index, display, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(display, "3.464102");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.pad, vec!["area = 3 * 4", "sqrt(area)"]);

        let third = evaluator.evaluate(&mut session, "5");
        assert_eq!(third, vec![LineResult::Missing { index: 5 }]);
        assert_eq!(session.pad.len(), 2);
    }

    #[test]
    fn test_failing_line_does_not_stop_the_turn() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "1/0 * undefinedVar\n2 + 2");

        assert_eq!(results.len(), 2);
        match &results[0] {
            LineResult::Failed { index, error, .. } => {
                assert_eq!(*index, None);
                assert_eq!(error, "Undefined symbol undefinedVar");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(value_of(&results[1]), &Value::Number(4.0));
        assert_eq!(session.pad, vec!["2 + 2"]);
    }

    #[test]
    fn test_failed_line_keeps_earlier_bindings() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "a = 1\nb = a + nope\nc = a + 1");
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
        assert!(session.scope.contains_key("a"));
        assert!(!session.scope.contains_key("b"));
        assert_eq!(session.scope.get("c"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_parse_failure_is_contained() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "(1 + \n3 * 3");
        assert!(matches!(&results[0], LineResult::Failed { error, .. } if error == "Unexpected end of expression"));
        assert_eq!(value_of(&results[1]), &Value::Number(9.0));
        assert_eq!(session.pad, vec!["3 * 3"]);
    }

    #[test]
    fn test_recall_reevaluates_and_overwrites_in_place() {
        let evaluator = evaluator();
        let mut session = Session::default();
        evaluator.evaluate(&mut session, "x = 2\nx*10");
        evaluator.evaluate(&mut session, "x = 5");

        let recalled = evaluator.evaluate(&mut session, "1");
        assert_eq!(recalled.len(), 1);
        match &recalled[0] {
            LineResult::Evaluated {
                index, expression, ..
            } => {
                assert_eq!(*index, 1);
                assert_eq!(expression, "x * 10");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(value_of(&recalled[0]), &Value::Number(50.0));
        assert_eq!(session.pad, vec!["x = 2", "x * 10", "x = 5"]);
    }

    #[test]
    fn test_reset_forgets_variables() {
        let evaluator = evaluator();
        let mut session = Session::default();
        evaluator.evaluate(&mut session, "x = 3");
        session.reset();
        assert!(session.is_empty());

        let results = evaluator.evaluate(&mut session, "x");
        assert!(matches!(&results[0], LineResult::Failed { error, .. } if error == "Undefined symbol x"));
        assert!(session.pad.is_empty());
    }

    #[test]
    fn test_disabled_functions_fail_explicitly() {
        let registry = Arc::new(UnitRegistry::new("USD"));
        let config = AppConfig {
            disabled_functions: vec!["sqrt".to_string()],
            ..AppConfig::default()
        };
        let evaluator = Evaluator::from_config(registry, &config);
        let mut session = Session::default();

        let results = evaluator.evaluate(&mut session, "sqrt(4)\nimport(1)\ncreateUnit(2)");
        let errors: Vec<_> = results
            .iter()
            .map(|r| match r {
                LineResult::Failed { error, .. } => error.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            errors,
            vec![
                "Function sqrt is disabled",
                "Function import is disabled",
                "Function createUnit is disabled",
            ]
        );
        assert!(session.pad.is_empty());
    }

    #[test]
    fn test_prompt_markers_are_stripped() {
        let evaluator = evaluator();
        let mut session = Session::default();
        evaluator.evaluate(&mut session, ">>> 1+1\n»> 2*2\n\n   \n");
        assert_eq!(session.pad, vec!["1 + 1", "2 * 2"]);
    }

    #[test]
    fn test_currency_conversion_display() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "price = 8 EUR\nprice to USD");
        match &results[1] {
            LineResult::Evaluated { display, .. } => assert_eq!(display, "10 USD"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_engines_plug_in() {
        let evaluator = Evaluator::new(Tally);
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "+2\nthree\n5");

        assert!(matches!(&results[0], LineResult::Evaluated { expression, .. } if expression == "2"));
        assert!(matches!(&results[1], LineResult::Failed { error, .. } if error == "Not an integer: three"));
        assert!(matches!(&results[2], LineResult::Evaluated { display, .. } if display == "total Number(7.0)"));
        assert_eq!(session.pad, vec!["2", "5"]);
        assert_eq!(session.scope.get("total"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_deeply_nested_line_fails_without_crashing() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let nested = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
        let results = evaluator.evaluate(&mut session, &format!("{nested}\n1 + 1"));

        assert!(matches!(&results[0], LineResult::Failed { error, .. } if error == "Expression is nested too deeply"));
        assert!(results[1].is_success());
        assert_eq!(session.pad, vec!["1 + 1"]);
    }

    #[test]
    fn test_huge_unit_powers_fail_without_crashing() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(
            &mut session,
            "(1 km)^100 * (1 m)^100\n(1 m)^200\n(1 m)^2147483647 * (1 m)^2147483647\n(1 m)^2 * 3",
        );

        for result in &results[..3] {
            assert!(
                matches!(result, LineResult::Failed { error, .. } if error == "Unit power out of range"),
                "{result:?}"
            );
        }
        assert!(matches!(&results[3], LineResult::Evaluated { display, .. } if display == "3 m^2"));
    }

    #[test]
    fn test_trig_with_degrees() {
        let evaluator = evaluator();
        let mut session = Session::default();
        let results = evaluator.evaluate(&mut session, "width = sin(45 deg) ^ 2\n180 deg to rad");
        assert!(matches!(&results[0], LineResult::Evaluated { display, .. } if display == "0.5"));
        assert!(matches!(&results[1], LineResult::Evaluated { display, .. } if display == "3.141593 rad"));
        assert_eq!(session.pad, vec!["width = sin(45 deg) ^ 2", "180 deg to rad"]);
    }

    #[test]
    fn test_parse_recall() {
        assert_eq!(parse_recall("3"), Some(3));
        assert_eq!(parse_recall(" /12 "), Some(12));
        assert_eq!(parse_recall("99999999999999999999999"), Some(usize::MAX));
        assert_eq!(parse_recall("3 + 1"), None);
        assert_eq!(parse_recall("1e3"), None);
        assert_eq!(parse_recall(""), None);
    }
}
