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

//! FCS-QL front-ends and the shared AST.
//!
//! Two surface grammars produce the same [`ast::Ast`]: the basic word-list
//! syntax ([`parse_basic`]) and full FCS-QL ([`parse_advanced`]). The AST is
//! bound to the resource metadata it was parsed against and generates the
//! back-end CQL via [`ast::Ast::generate`].

pub mod ast;
pub mod resource;

mod advanced;
mod basic;
mod lexer;

use thiserror::Error;

use crate::ast::Ast;
use crate::resource::{PosAttr, StructureMapping};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal parse errors. Semantic problems (unknown attribute, unknown
/// structure) are not errors at parse time; they accumulate during
/// generation instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("syntax error at {line}:{col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEof { expected: String },
}

impl Error {
    /// Builds a syntax error from a byte offset into the query source.
    pub(crate) fn syntax_at(src: &str, offset: usize, msg: impl Into<String>) -> Self {
        let (line, col) = line_col(src, offset);
        Error::Syntax {
            line,
            col,
            msg: msg.into(),
        }
    }
}

fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let mut line = 1;
    let mut col = 1;
    for ch in src[..offset].chars() {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Parses the basic word-list surface into an AST bound to `attrs` and
/// `structures`.
pub fn parse_basic(query: &str, attrs: &[PosAttr], structures: &StructureMapping) -> Result<Ast> {
    basic::parse(query, attrs, structures)
}

/// Parses full FCS-QL into an AST bound to `attrs` and `structures`.
pub fn parse_advanced(
    query: &str,
    attrs: &[PosAttr],
    structures: &StructureMapping,
) -> Result<Ast> {
    advanced::parse(query, attrs, structures)
}
