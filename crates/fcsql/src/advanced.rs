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

//! The advanced FCS-QL surface: token predicates with attribute
//! comparisons, boolean composition, grouping, quantifiers, regex flags and
//! structure anchors. Recursive descent with one token of lookahead; a
//! malformed query produces a single fatal error and no partial AST.

use crate::ast::{Ast, AttrExpr, CmpOp, Node, Quantifier, RegexFlags, RegexValue, Span};
use crate::lexer::{lex, Token};
use crate::resource::{PosAttr, StructureMapping};
use crate::{Error, Result};

pub fn parse(query: &str, attrs: &[PosAttr], structures: &StructureMapping) -> Result<Ast> {
    let toks = lex(query)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::syntax_at(query, e.at, e.msg))?;

    let mut parser = Parser {
        src: query,
        toks,
        pos: 0,
    };
    let root = parser.query()?;
    Ok(Ast::new(root, attrs, structures))
}

struct Parser<'a> {
    src: &'a str,
    toks: Vec<(usize, Token<'a>, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.toks.get(self.pos).map(|(_, t, _)| t)
    }

    fn bump(&mut self) -> Option<(usize, Token<'a>, usize)> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn offset(&self) -> usize {
        self.toks
            .get(self.pos)
            .map(|(start, _, _)| *start)
            .unwrap_or(self.src.len())
    }

    fn err_here(&self, msg: impl Into<String>) -> Error {
        Error::syntax_at(self.src, self.offset(), msg)
    }

    fn expect(&mut self, want: Token<'static>) -> Result<usize> {
        match self.bump() {
            Some((_, tok, end)) if tok == want => Ok(end),
            Some((start, tok, _)) => Err(Error::syntax_at(
                self.src,
                start,
                format!("expected {want}, found {tok}"),
            )),
            None => Err(Error::UnexpectedEof {
                expected: want.to_string(),
            }),
        }
    }

    fn query(&mut self) -> Result<Node> {
        let mut children = Vec::new();
        while self.peek().is_some() {
            children.push(self.segment()?);
        }
        if children.is_empty() {
            return Err(Error::syntax_at(self.src, 0, "empty query"));
        }
        let span = Span::new(0, self.src.len());
        Ok(Node::Sequence { children, span })
    }

    fn segment(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::OpenBracket) => self.token_predicate(),
            Some(Token::Str(_)) => self.implicit_token(),
            Some(Token::Lt) => self.structure(),
            Some(tok) => Err(self.err_here(format!(
                "expected a token predicate, quoted value or structure anchor, found {tok}"
            ))),
            None => Err(Error::UnexpectedEof {
                expected: "query segment".to_string(),
            }),
        }
    }

    /// `[ attr op "value" ... ]` or the unconstrained `[]`.
    fn token_predicate(&mut self) -> Result<Node> {
        let (start, _, _) = self.bump().expect("caller peeked OpenBracket");

        if let Some(Token::CloseBracket) = self.peek() {
            let end = self.expect(Token::CloseBracket)?;
            let quant = self.quantifier_opt()?;
            return Ok(Node::AnyToken {
                quant,
                span: Span::new(start, end),
            });
        }

        let expr = self.or_expr()?;
        let end = self.expect(Token::CloseBracket)?;
        let quant = self.quantifier_opt()?;
        Ok(Node::Token {
            expr,
            quant,
            span: Span::new(start, end),
        })
    }

    /// A bare quoted value constrains the default attribute.
    fn implicit_token(&mut self) -> Result<Node> {
        let (start, tok, mut end) = self.bump().expect("caller peeked Str");
        let Token::Str(pattern) = tok else {
            unreachable!("caller peeked Str")
        };
        let flags = self.flags_opt()?;
        if let Some((_, _, flags_end)) = self.toks.get(self.pos.wrapping_sub(1)) {
            end = *flags_end;
        }
        let span = Span::new(start, end);
        let quant = self.quantifier_opt()?;
        Ok(Node::Token {
            expr: AttrExpr::Atom {
                attr: None,
                op: CmpOp::Eq,
                value: RegexValue { pattern, flags },
                span,
            },
            quant,
            span,
        })
    }

    /// `<ident/>`
    fn structure(&mut self) -> Result<Node> {
        let (start, _, _) = self.bump().expect("caller peeked Lt");
        let anchor = match self.bump() {
            Some((_, Token::Ident(name), _)) => name.to_string(),
            Some((at, tok, _)) => {
                return Err(Error::syntax_at(
                    self.src,
                    at,
                    format!("expected structure name, found {tok}"),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    expected: "structure name".to_string(),
                })
            }
        };
        let end = self.expect(Token::SelfClose)?;
        Ok(Node::Structure {
            anchor,
            span: Span::new(start, end),
        })
    }

    fn or_expr(&mut self) -> Result<AttrExpr> {
        let mut left = self.and_expr()?;
        while let Some(Token::Pipe) = self.peek() {
            self.bump();
            let right = self.and_expr()?;
            left = AttrExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<AttrExpr> {
        let mut left = self.unary_expr()?;
        while let Some(Token::Amp) = self.peek() {
            self.bump();
            let right = self.unary_expr()?;
            left = AttrExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<AttrExpr> {
        match self.peek() {
            Some(Token::Bang) => {
                self.bump();
                let inner = self.unary_expr()?;
                Ok(AttrExpr::Not(Box::new(inner)))
            }
            Some(Token::OpenParen) => {
                self.bump();
                let inner = self.or_expr()?;
                self.expect(Token::CloseParen)?;
                Ok(AttrExpr::Group(Box::new(inner)))
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<AttrExpr> {
        let (start, attr) = match self.bump() {
            Some((start, Token::Ident(name), _)) => (start, name.to_string()),
            Some((at, tok, _)) => {
                return Err(Error::syntax_at(
                    self.src,
                    at,
                    format!("expected attribute name, found {tok}"),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    expected: "attribute name".to_string(),
                })
            }
        };

        let op = match self.bump() {
            Some((_, Token::Eq, _)) => CmpOp::Eq,
            Some((_, Token::NotEq, _)) => CmpOp::Ne,
            Some((_, Token::Lt, _)) => CmpOp::Lt,
            Some((_, Token::Gt, _)) => CmpOp::Gt,
            Some((_, Token::LtEq, _)) => CmpOp::Le,
            Some((_, Token::GtEq, _)) => CmpOp::Ge,
            Some((at, tok, _)) => {
                return Err(Error::syntax_at(
                    self.src,
                    at,
                    format!("expected comparison operator, found {tok}"),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    expected: "comparison operator".to_string(),
                })
            }
        };

        let (pattern, end) = match self.bump() {
            Some((_, Token::Str(s), end)) => (s, end),
            Some((at, tok, _)) => {
                return Err(Error::syntax_at(
                    self.src,
                    at,
                    format!("expected quoted value, found {tok}"),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    expected: "quoted value".to_string(),
                })
            }
        };
        let flags = self.flags_opt()?;

        Ok(AttrExpr::Atom {
            attr: Some(attr),
            op,
            value: RegexValue { pattern, flags },
            span: Span::new(start, end),
        })
    }

    /// `/flags` after a quoted value.
    fn flags_opt(&mut self) -> Result<RegexFlags> {
        let mut flags = RegexFlags::default();
        if !matches!(self.peek(), Some(Token::Slash)) {
            return Ok(flags);
        }
        self.bump();

        let (at, spec) = match self.bump() {
            Some((at, Token::Ident(spec), _)) => (at, spec),
            Some((at, tok, _)) => {
                return Err(Error::syntax_at(
                    self.src,
                    at,
                    format!("expected regex flags, found {tok}"),
                ))
            }
            None => {
                return Err(Error::UnexpectedEof {
                    expected: "regex flags".to_string(),
                })
            }
        };
        for ch in spec.chars() {
            match ch {
                'i' | 'c' => flags.case_insensitive = true,
                'C' => flags.case_insensitive = false,
                'l' => flags.literal = true,
                'd' => flags.ignore_diacritics = true,
                other => {
                    return Err(Error::syntax_at(
                        self.src,
                        at,
                        format!("unknown regex flag {other:?}"),
                    ))
                }
            }
        }
        Ok(flags)
    }

    /// `{n}`, `{n,}` or `{n,m}` after a token.
    fn quantifier_opt(&mut self) -> Result<Option<Quantifier>> {
        if !matches!(self.peek(), Some(Token::OpenBrace)) {
            return Ok(None);
        }
        let (brace_at, _, _) = self.bump().expect("peeked OpenBrace");

        let min = self.number()?;
        let max = match self.peek() {
            Some(Token::Comma) => {
                self.bump();
                match self.peek() {
                    Some(Token::Number(_)) => Some(self.number()?),
                    _ => None,
                }
            }
            _ => Some(min),
        };
        self.expect(Token::CloseBrace)?;

        if let Some(max) = max {
            if max < min {
                return Err(Error::syntax_at(
                    self.src,
                    brace_at,
                    format!("invalid quantifier range {{{min},{max}}}"),
                ));
            }
        }
        Ok(Some(Quantifier { min, max }))
    }

    fn number(&mut self) -> Result<u32> {
        match self.bump() {
            Some((at, Token::Number(n), _)) => n
                .parse::<u32>()
                .map_err(|_| Error::syntax_at(self.src, at, format!("number out of range: {n}"))),
            Some((at, tok, _)) => Err(Error::syntax_at(
                self.src,
                at,
                format!("expected a number, found {tok}"),
            )),
            None => Err(Error::UnexpectedEof {
                expected: "number".to_string(),
            }),
        }
    }
}
