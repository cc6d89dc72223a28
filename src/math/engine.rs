//! The parse, evaluate and format capability behind [`Evaluator`](super::Evaluator).

use crate::core::config::AppConfig;
use crate::core::registry::UnitRegistry;
use crate::core::session::Scope;
use crate::math::eval::Interpreter;
use crate::math::format::NumberFormat;
use crate::math::functions::FunctionTable;
use crate::math::node::Node;
use crate::math::parser::parse;
use crate::math::value::Value;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

pub trait ExpressionEngine: Send + Sync {
    /// Parsed line. Its `Display` form is what the pad stores.
    type Expr: fmt::Display;

    fn parse(&self, line: &str) -> Result<Self::Expr>;

    /// Evaluates `expr`, applying any assignments to `scope`.
    fn evaluate(&self, expr: &Self::Expr, scope: &mut Scope) -> Result<Value>;

    fn format(&self, value: &Value) -> String;
}

/// The builtin engine: unit-aware arithmetic over the live registry.
pub struct MathEngine {
    registry: Arc<UnitRegistry>,
    functions: FunctionTable,
    format: NumberFormat,
}

impl MathEngine {
    pub fn new(registry: Arc<UnitRegistry>, functions: FunctionTable, format: NumberFormat) -> Self {
        Self {
            registry,
            functions,
            format,
        }
    }

    /// Builds the engine with the configured names added to the deny-list.
    pub fn from_config(registry: Arc<UnitRegistry>, config: &AppConfig) -> Self {
        let functions = config
            .disabled_functions
            .iter()
            .fold(FunctionTable::standard(), |table, name| table.disable(name.as_str()));
        Self::new(registry, functions, NumberFormat::from(&config.format))
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

impl ExpressionEngine for MathEngine {
    type Expr = Node;

    fn parse(&self, line: &str) -> Result<Node> {
        parse(line)
    }

    fn evaluate(&self, expr: &Node, scope: &mut Scope) -> Result<Value> {
        let interpreter = Interpreter {
            registry: &self.registry,
            functions: &self.functions,
        };
        interpreter.eval(expr, scope)
    }

    fn format(&self, value: &Value) -> String {
        self.format.value(value)
    }
}
