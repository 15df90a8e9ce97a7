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

//! The basic FCS surface: whitespace-separated words matched against the
//! default attribute, quoted phrases matched as exact word sequences, and a
//! lone `*` matching any token.

use crate::ast::{Ast, AttrExpr, CmpOp, Node, RegexValue, Span};
use crate::resource::{PosAttr, StructureMapping};
use crate::{Error, Result};

/// Characters that only mean something in the advanced syntax. A bare word
/// containing one of these is a stray operator, not a literal.
const RESERVED: &[char] = &[
    '[', ']', '{', '}', '(', ')', '<', '>', '|', '&', '!', '=', '"', '\\', '/',
];

pub fn parse(query: &str, attrs: &[PosAttr], structures: &StructureMapping) -> Result<Ast> {
    let mut children = Vec::new();

    let mut rest = query.char_indices().peekable();
    while let Some(&(offset, ch)) = rest.peek() {
        if ch.is_whitespace() {
            rest.next();
            continue;
        }

        if ch == '"' {
            rest.next();
            let phrase_start = offset;
            let mut end = None;
            for (i, c) in rest.by_ref() {
                if c == '"' {
                    end = Some(i);
                    break;
                }
            }
            let end = end.ok_or_else(|| {
                Error::syntax_at(query, phrase_start, "unmatched quote".to_string())
            })?;

            let inner = &query[phrase_start + 1..end];
            let mut words = 0;
            for word in inner.split_whitespace() {
                children.push(word_token(
                    query,
                    word,
                    Span::new(phrase_start, end + 1),
                )?);
                words += 1;
            }
            if words == 0 {
                return Err(Error::syntax_at(query, phrase_start, "empty phrase"));
            }
            continue;
        }

        // bare term until the next whitespace
        let start = offset;
        let mut end = query.len();
        for (i, c) in rest.by_ref() {
            if c.is_whitespace() {
                end = i;
                break;
            }
        }
        let term = &query[start..end];
        let span = Span::new(start, end);

        if term == "*" {
            children.push(Node::AnyToken { quant: None, span });
        } else {
            children.push(word_token(query, term, span)?);
        }
    }

    if children.is_empty() {
        return Err(Error::syntax_at(query, 0, "empty query"));
    }

    let span = Span::new(0, query.len());
    Ok(Ast::new(
        Node::Sequence { children, span },
        attrs,
        structures,
    ))
}

fn word_token(query: &str, word: &str, span: Span) -> Result<Node> {
    if let Some(bad) = word.chars().find(|c| RESERVED.contains(c) || *c == '*') {
        return Err(Error::syntax_at(
            query,
            span.start,
            format!("unexpected character {bad:?} in word"),
        ));
    }
    Ok(Node::Token {
        expr: AttrExpr::Atom {
            attr: None,
            op: CmpOp::Eq,
            value: RegexValue::literal(word),
            span,
        },
        quant: None,
        span,
    })
}
