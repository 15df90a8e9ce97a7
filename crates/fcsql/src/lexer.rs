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

use logos::{Lexer, Logos};

#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Comma,
    Amp,
    Pipe,
    Bang,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    SelfClose,
    Slash,

    Number(&'a str),
    Ident(&'a str),
    /// Quoted value with `\"`, `\\` and `\/` escapes already resolved.
    Str(String),
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::OpenBracket => write!(f, "["),
            Token::CloseBracket => write!(f, "]"),
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::OpenBrace => write!(f, "{{"),
            Token::CloseBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Bang => write!(f, "!"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::SelfClose => write!(f, "/>"),
            Token::Slash => write!(f, "/"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Lexing failure: byte offset plus message. The parser turns this into a
/// positioned syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub at: usize,
    pub msg: String,
}

#[derive(Logos, Debug, PartialEq, Clone)]
enum Outer<'a> {
    #[error]
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Error,

    #[token("\"")]
    StartString,

    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token(",")]
    Comma,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("/>")]
    SelfClose,
    #[token("/")]
    Slash,

    #[regex(r"[0-9]+", |lex| lex.slice())]
    Number(&'a str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'a str),
}

#[derive(Logos, Debug, PartialEq, Clone)]
enum QuotedString<'a> {
    #[error]
    Error,

    #[regex(r#"[^\\"]+"#, |lex| lex.slice())]
    Text(&'a str),

    #[token(r#"\""#)]
    EscapedQuote,

    #[token(r"\\")]
    EscapedBackslash,

    #[token(r"\/")]
    EscapedSlash,

    #[token("\"")]
    EndString,
}

pub struct LexerBridge<'source> {
    lexer: Lexer<'source, Outer<'source>>,
}

impl<'source> LexerBridge<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Outer::lexer(source),
        }
    }

    fn read_string(&mut self) -> Result<(usize, Token<'source>, usize), LexError> {
        let start = self.lexer.span().start;
        let mut inner: Lexer<QuotedString> = self.lexer.clone().morph();

        let mut res = String::new();
        let mut closed = false;
        for tok in inner.by_ref() {
            match tok {
                QuotedString::Error => {
                    return Err(LexError {
                        at: inner.span().start,
                        msg: "invalid escape sequence in quoted value".to_string(),
                    })
                }
                QuotedString::Text(t) => res.push_str(t),
                QuotedString::EscapedQuote => res.push('"'),
                QuotedString::EscapedBackslash => res.push('\\'),
                QuotedString::EscapedSlash => res.push('/'),
                QuotedString::EndString => {
                    closed = true;
                    break;
                }
            }
        }

        if !closed {
            return Err(LexError {
                at: start,
                msg: "unterminated quoted value".to_string(),
            });
        }

        let end = inner.span().end;
        self.lexer = inner.morph();
        Ok((start, Token::Str(res), end))
    }
}

// Clones as we switch between modes.
impl<'source> Iterator for LexerBridge<'source> {
    type Item = Result<(usize, Token<'source>, usize), LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let tok = self.lexer.next()?;

        if let Outer::StartString = tok {
            return Some(self.read_string());
        }

        let s = self.lexer.span();
        let spanned = |t| Ok((s.start, t, s.end));
        Some(match tok {
            Outer::Error => Err(LexError {
                at: s.start,
                msg: format!("unrecognized character {:?}", self.lexer.slice()),
            }),
            Outer::StartString => unreachable!("handled above"),
            Outer::OpenBracket => spanned(Token::OpenBracket),
            Outer::CloseBracket => spanned(Token::CloseBracket),
            Outer::OpenParen => spanned(Token::OpenParen),
            Outer::CloseParen => spanned(Token::CloseParen),
            Outer::OpenBrace => spanned(Token::OpenBrace),
            Outer::CloseBrace => spanned(Token::CloseBrace),
            Outer::Comma => spanned(Token::Comma),
            Outer::Amp => spanned(Token::Amp),
            Outer::Pipe => spanned(Token::Pipe),
            Outer::Bang => spanned(Token::Bang),
            Outer::Eq => spanned(Token::Eq),
            Outer::NotEq => spanned(Token::NotEq),
            Outer::Lt => spanned(Token::Lt),
            Outer::Gt => spanned(Token::Gt),
            Outer::LtEq => spanned(Token::LtEq),
            Outer::GtEq => spanned(Token::GtEq),
            Outer::SelfClose => spanned(Token::SelfClose),
            Outer::Slash => spanned(Token::Slash),
            Outer::Number(n) => spanned(Token::Number(n)),
            Outer::Ident(i) => spanned(Token::Ident(i)),
        })
    }
}

pub fn lex(source: &str) -> impl Iterator<Item = Result<(usize, Token<'_>, usize), LexError>> {
    LexerBridge::new(source)
}
