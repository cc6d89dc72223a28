//! Recursive descent parser.
//!
//! Precedence, loosest first:
//! assignment, conversion (`to`/`in`), `+ -`, `* / %` and implicit
//! multiplication, unary `- +`, `^` (right associative), primaries.
//!
//! Every level of the resulting tree is counted against [`MAX_DEPTH`], so a
//! parsed tree can always be printed, evaluated and dropped without
//! exhausting the stack.

use crate::math::node::{BinaryOp, Node, UnaryOp};
use crate::math::tokens::{Token, tokenize};
use anyhow::{Result, bail};

/// Deepest tree a single line may produce.
pub const MAX_DEPTH: usize = 256;

pub fn parse(input: &str) -> Result<Node> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        bail!("Unexpected end of expression");
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.parse_assignment()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected token \"{}\"", token.describe());
    }
    Ok(node)
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "to" | "in")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            bail!("Expression is nested too deeply");
        }
        Ok(())
    }

    /// Runs `f` one level deeper, restoring the level afterwards.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.depth;
        self.descend()?;
        let result = f(self);
        self.depth = saved;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if is_keyword(name))
    }

    fn parse_assignment(&mut self) -> Result<Node> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Node> {
        let target = self.parse_conversion()?;
        if !self.eat(&Token::Assign) {
            return Ok(target);
        }

        match target {
            Node::Symbol(name) => {
                let value = self.parse_assignment()?;
                Ok(Node::Assign {
                    name,
                    value: Box::new(value),
                })
            }
            Node::Call { name, args } => {
                let mut params = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Node::Symbol(param) => params.push(param),
                        other => bail!("Invalid function parameter \"{other}\""),
                    }
                }
                let body = self.parse_assignment()?;
                Ok(Node::FunctionDef {
                    name,
                    params,
                    body: Box::new(body),
                })
            }
            other => bail!("Invalid left hand side of assignment \"{other}\""),
        }
    }

    fn parse_conversion(&mut self) -> Result<Node> {
        let saved = self.depth;
        let node = self.parse_conversion_chain();
        self.depth = saved;
        node
    }

    // Chains build left-deep trees, so each link counts as a level.
    fn parse_conversion_chain(&mut self) -> Result<Node> {
        let mut node = self.parse_additive()?;
        while self.peek_keyword() {
            self.descend()?;
            self.pos += 1;
            let target = self.parse_additive()?;
            node = Node::Convert {
                value: Box::new(node),
                target: Box::new(target),
            };
        }
        Ok(node)
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let saved = self.depth;
        let node = self.parse_additive_chain();
        self.depth = saved;
        node
    }

    fn parse_additive_chain(&mut self) -> Result<Node> {
        let mut node = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(node),
            };
            self.descend()?;
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            node = binary(op, node, rhs, false);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let saved = self.depth;
        let node = self.parse_multiplicative_chain();
        self.depth = saved;
        node
    }

    fn parse_multiplicative_chain(&mut self) -> Result<Node> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Some(BinaryOp::Mul),
                Some(Token::Slash) => Some(BinaryOp::Div),
                Some(Token::Percent) => Some(BinaryOp::Mod),
                Some(Token::Ident(name)) if !is_keyword(name) => None,
                Some(Token::LParen) => None,
                _ => return Ok(node),
            };
            self.descend()?;
            match op {
                Some(op) => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    node = binary(op, node, rhs, false);
                }
                None => {
                    let rhs = self.parse_power()?;
                    node = binary(BinaryOp::Mul, node, rhs, true);
                }
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Node> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinaryOp::Pow, base, exponent, false));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(text)) => {
                if text.parse::<f64>().is_err() {
                    bail!("Invalid number \"{text}\"");
                }
                Ok(Node::Number(text))
            }
            Some(Token::Ident(name)) => {
                if is_keyword(&name) {
                    bail!("Unexpected keyword \"{name}\"");
                }
                if self.eat(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    return Ok(Node::Call { name, args });
                }
                Ok(Node::Symbol(name))
            }
            Some(Token::LParen) => {
                let inner = self.parse_assignment()?;
                if !self.eat(&Token::RParen) {
                    bail!("Parenthesis ) expected");
                }
                Ok(Node::Paren(Box::new(inner)))
            }
            Some(token) => bail!("Unexpected token \"{}\"", token.describe()),
            None => bail!("Unexpected end of expression"),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            bail!("Parenthesis ) expected");
        }
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node, implicit: bool) -> Node {
    Node::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        implicit,
    }
}
