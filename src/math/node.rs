//! Expression tree and its canonical text form.
//!
//! The canonical form is what gets stored in a pad: parentheses the user wrote
//! are kept, spacing is normalised, and printing then parsing again yields the
//! same tree.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(String),
    Symbol(String),
    Paren(Box<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
        /// `4 EUR` rather than `4 * EUR`.
        implicit: bool,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
    Assign {
        name: String,
        value: Box<Node>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Box<Node>,
    },
    Convert {
        value: Box<Node>,
        target: Box<Node>,
    },
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Number(text) | Node::Symbol(text) => write!(f, "{text}"),
            Node::Paren(inner) => write!(f, "({inner})"),
            Node::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Plus => write!(f, "+{operand}"),
            },
            Node::Binary {
                op,
                lhs,
                rhs,
                implicit,
            } => {
                if *implicit {
                    write!(f, "{lhs} {rhs}")
                } else {
                    write!(f, "{lhs} {} {rhs}", op.symbol())
                }
            }
            Node::Call { name, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}({})", args.join(", "))
            }
            Node::Assign { name, value } => write!(f, "{name} = {value}"),
            Node::FunctionDef { name, params, body } => {
                write!(f, "{name}({}) = {body}", params.join(", "))
            }
            Node::Convert { value, target } => write!(f, "{value} to {target}"),
        }
    }
}
