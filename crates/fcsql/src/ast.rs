// fcs-gateway is a federated corpus search gateway.
// Copyright (C) 2024 fcs-gateway contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The AST shared by both front-ends, and CQL generation.
//!
//! Generation never aborts: unresolved attribute or structure names append a
//! [`SemanticError`] and generation substitutes a best-effort form, so the
//! caller always gets the full picture of what is wrong with a query.

use thiserror::Error;

use crate::resource::{default_attr, resolve_attr, PosAttr, StructureMapping};

/// Byte range into the query source, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Adjacent segments, matched in order.
    Sequence { children: Vec<Node>, span: Span },
    /// One token position constrained by an attribute expression.
    Token {
        expr: AttrExpr,
        quant: Option<Quantifier>,
        span: Span,
    },
    /// One unconstrained token position (basic `*`, advanced `[]`).
    AnyToken {
        quant: Option<Quantifier>,
        span: Span,
    },
    /// Structure anchor, e.g. `<s/>`.
    Structure { anchor: String, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrExpr {
    Atom {
        /// `None` refers to the default attribute of the default layer.
        attr: Option<String>,
        op: CmpOp,
        value: RegexValue,
        span: Span,
    },
    And(Box<AttrExpr>, Box<AttrExpr>),
    Or(Box<AttrExpr>, Box<AttrExpr>),
    Not(Box<AttrExpr>),
    Group(Box<AttrExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn as_cql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexFlags {
    pub case_insensitive: bool,
    /// Treat the pattern as a literal string (basic-syntax words).
    pub literal: bool,
    pub ignore_diacritics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexValue {
    pub pattern: String,
    pub flags: RegexFlags,
}

impl RegexValue {
    pub fn regex(pattern: impl Into<String>) -> Self {
        RegexValue {
            pattern: pattern.into(),
            flags: RegexFlags::default(),
        }
    }

    pub fn literal(pattern: impl Into<String>) -> Self {
        RegexValue {
            pattern: pattern.into(),
            flags: RegexFlags {
                literal: true,
                ..Default::default()
            },
        }
    }
}

/// `{n}` is `min == max`; `{n,}` leaves `max` open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("unknown positional attribute: {0}")]
    UnknownAttr(String),

    #[error("unknown structure: {0}")]
    UnknownStruct(String),
}

impl SemanticError {
    /// The offending identifier, for diagnostics.
    pub fn ident(&self) -> &str {
        match self {
            SemanticError::UnknownAttr(name) => name,
            SemanticError::UnknownStruct(name) => name,
        }
    }
}

/// A parsed query bound to the resource metadata it will generate against.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    root: Node,
    attrs: Vec<PosAttr>,
    structures: StructureMapping,
}

/// Output of [`Ast::generate`]: best-effort CQL plus every semantic error
/// encountered along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub cql: String,
    pub errors: Vec<SemanticError>,
}

impl Generated {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Ast {
    pub fn new(root: Node, attrs: &[PosAttr], structures: &StructureMapping) -> Self {
        Ast {
            root,
            attrs: attrs.to_vec(),
            structures: structures.clone(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Single-pass, depth-first CQL generation. Deterministic: the same AST
    /// and resource metadata always produce byte-identical output.
    pub fn generate(&self) -> Generated {
        let mut gen = Generator {
            attrs: &self.attrs,
            structures: &self.structures,
            out: String::new(),
            errors: Vec::new(),
        };
        gen.node(&self.root);
        Generated {
            cql: gen.out,
            errors: gen.errors,
        }
    }
}

struct Generator<'a> {
    attrs: &'a [PosAttr],
    structures: &'a StructureMapping,
    out: String,
    errors: Vec<SemanticError>,
}

impl Generator<'_> {
    fn node(&mut self, node: &Node) {
        match node {
            Node::Sequence { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.out.push(' ');
                    }
                    self.node(child);
                }
            }
            Node::Token { expr, quant, .. } => {
                self.out.push('[');
                self.expr(expr);
                self.out.push(']');
                if let Some(quant) = quant {
                    self.quantifier(quant);
                }
            }
            Node::AnyToken { quant, .. } => {
                self.out.push_str("[]");
                if let Some(quant) = quant {
                    self.quantifier(quant);
                }
            }
            Node::Structure { anchor, .. } => {
                let tag = match self.structures.resolve(anchor) {
                    Some(tag) => tag,
                    None => {
                        self.errors
                            .push(SemanticError::UnknownStruct(anchor.clone()));
                        anchor.as_str()
                    }
                };
                self.out.push('<');
                self.out.push_str(tag);
                self.out.push_str("/>");
            }
        }
    }

    fn expr(&mut self, expr: &AttrExpr) {
        match expr {
            AttrExpr::Atom {
                attr, op, value, ..
            } => {
                let name = self.resolve_attr_name(attr.as_deref());
                self.out.push_str(&name);
                self.out.push_str(op.as_cql());
                self.out.push('"');
                if value.flags.case_insensitive {
                    self.out.push_str("(?i)");
                }
                escape_value(&mut self.out, &value.pattern, value.flags.literal);
                self.out.push('"');
            }
            AttrExpr::And(l, r) => {
                self.expr(l);
                self.out.push_str(" & ");
                self.expr(r);
            }
            AttrExpr::Or(l, r) => {
                self.expr(l);
                self.out.push_str(" | ");
                self.expr(r);
            }
            AttrExpr::Not(x) => {
                self.out.push('!');
                self.expr(x);
            }
            AttrExpr::Group(x) => {
                self.out.push('(');
                self.expr(x);
                self.out.push(')');
            }
        }
    }

    fn resolve_attr_name(&mut self, attr: Option<&str>) -> String {
        let default = || {
            default_attr(self.attrs)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "word".to_string())
        };
        match attr {
            None => default(),
            Some(name) => match resolve_attr(self.attrs, name) {
                Some(attr) => attr.name.clone(),
                None => {
                    self.errors
                        .push(SemanticError::UnknownAttr(name.to_string()));
                    default()
                }
            },
        }
    }

    fn quantifier(&mut self, quant: &Quantifier) {
        self.out.push('{');
        self.out.push_str(&quant.min.to_string());
        match quant.max {
            Some(max) if max == quant.min => {}
            Some(max) => {
                self.out.push(',');
                self.out.push_str(&max.to_string());
            }
            None => self.out.push(','),
        }
        self.out.push('}');
    }
}

/// Escapes a value for embedding inside a double-quoted CQL string:
/// backslash and double quote always, regex metacharacters when the value is
/// a literal.
fn escape_value(out: &mut String, value: &str, literal: bool) {
    for ch in value.chars() {
        match ch {
            '\\' | '"' => {
                out.push('\\');
                out.push(ch);
            }
            '.' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
                if literal =>
            {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}
