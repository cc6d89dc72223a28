use crate::core::registry::UnitRegistry;
use crate::core::session::Scope;
use crate::math::complex::Complex;
use crate::math::functions::{Capability, FunctionTable};
use crate::math::node::{Node, UnaryOp};
use crate::math::ops;
use crate::math::parser::parse;
use crate::math::value::{Function, Quantity, Unit, Value};
use anyhow::{Result, bail};

const MAX_CALL_DEPTH: usize = 64;
/// Nodes that may be open at once, summed across user function calls.
const MAX_EVAL_DEPTH: usize = 512;

/// How deep the current evaluation is.
#[derive(Debug, Clone, Copy, Default)]
struct Depth {
    calls: usize,
    nodes: usize,
}

impl Depth {
    fn enter(self) -> Result<Depth> {
        if self.nodes >= MAX_EVAL_DEPTH {
            bail!("Expression is nested too deeply");
        }
        Ok(Depth {
            nodes: self.nodes + 1,
            ..self
        })
    }
}

pub struct Interpreter<'a> {
    pub registry: &'a UnitRegistry,
    pub functions: &'a FunctionTable,
}

impl Interpreter<'_> {
    /// Evaluates `node`, applying any assignments to `scope`.
    pub fn eval(&self, node: &Node, scope: &mut Scope) -> Result<Value> {
        self.eval_at(node, scope, Depth::default())
    }

    fn eval_at(&self, node: &Node, scope: &mut Scope, depth: Depth) -> Result<Value> {
        let depth = depth.enter()?;
        match node {
            Node::Number(text) => Ok(Value::Number(text.parse()?)),
            Node::Symbol(name) => self.symbol(name, scope),
            Node::Paren(inner) => self.eval_at(inner, scope, depth),
            Node::Unary { op, operand } => {
                let value = self.eval_at(operand, scope, depth)?;
                match op {
                    UnaryOp::Neg => ops::negate(value),
                    UnaryOp::Plus => Ok(value),
                }
            }
            Node::Binary { op, lhs, rhs, .. } => {
                let lhs = self.eval_at(lhs, scope, depth)?;
                let rhs = self.eval_at(rhs, scope, depth)?;
                ops::binary(*op, lhs, rhs, self.registry)
            }
            Node::Call { name, args } => self.call(name, args, scope, depth),
            Node::Assign { name, value } => {
                self.check_assignable(name)?;
                let value = self.eval_at(value, scope, depth)?;
                scope.insert(name.clone(), value.clone());
                Ok(value)
            }
            Node::FunctionDef { name, params, body } => {
                self.check_assignable(name)?;
                let function = Value::Function(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.to_string(),
                });
                scope.insert(name.clone(), function.clone());
                Ok(function)
            }
            Node::Convert { value, target } => {
                let value = self.eval_at(value, scope, depth)?;
                let target = self.eval_at(target, scope, depth)?;
                ops::convert(value, target, self.registry)
            }
        }
    }

    fn check_assignable(&self, name: &str) -> Result<()> {
        if self.functions.is_disabled(name) {
            bail!("Function {name} is disabled");
        }
        Ok(())
    }

    fn symbol(&self, name: &str, scope: &Scope) -> Result<Value> {
        if let Some(value) = scope.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = constant(name) {
            return Ok(value);
        }
        if self.registry.contains(name) {
            return Ok(Value::Quantity(Quantity {
                value: 1.0,
                unit: Unit::single(name),
            }));
        }
        bail!("Undefined symbol {name}")
    }

    fn call(&self, name: &str, args: &[Node], scope: &mut Scope, depth: Depth) -> Result<Value> {
        let builtin = match self.functions.resolve(name) {
            Capability::Disabled => bail!("Function {name} is disabled"),
            Capability::Builtin(builtin) => Some(builtin),
            Capability::Unknown => None,
        };

        let user_function = match scope.get(name) {
            Some(Value::Function(f)) => Some(f.clone()),
            Some(other) => bail!("{name} is not a function but a {}", other.kind()),
            None => None,
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_at(arg, scope, depth)?);
        }

        match (user_function, builtin) {
            (Some(function), _) => self.call_user(&function, values, scope, depth),
            (None, Some(builtin)) => builtin(name, &values, self.registry),
            (None, None) => bail!("Undefined function {name}"),
        }
    }

    fn call_user(
        &self,
        function: &Function,
        args: Vec<Value>,
        scope: &Scope,
        depth: Depth,
    ) -> Result<Value> {
        if depth.calls >= MAX_CALL_DEPTH {
            bail!("Maximum call depth exceeded in function {}", function.name);
        }
        if args.len() != function.params.len() {
            bail!(
                "Wrong number of arguments in function {} ({} provided, {} expected)",
                function.name,
                args.len(),
                function.params.len()
            );
        }

        let body = parse(&function.body)?;
        let mut local = scope.clone();
        for (param, value) in function.params.iter().zip(args) {
            local.insert(param.clone(), value);
        }
        let depth = Depth {
            calls: depth.calls + 1,
            ..depth
        };
        self.eval_at(&body, &mut local, depth)
    }
}

fn constant(name: &str) -> Option<Value> {
    let value = match name {
        "pi" | "PI" => Value::Number(std::f64::consts::PI),
        "e" | "E" => Value::Number(std::f64::consts::E),
        "tau" => Value::Number(std::f64::consts::TAU),
        "phi" => Value::Number(1.618_033_988_749_895),
        "i" => Value::Complex(Complex::I),
        "Infinity" => Value::Number(f64::INFINITY),
        "NaN" => Value::Number(f64::NAN),
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => return None,
    };
    Some(value)
}
