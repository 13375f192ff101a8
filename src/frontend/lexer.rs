//! Lexer for the source language.
//!
//! Produces a flat token stream over a borrowed source string. Tokens carry
//! their source text and position for diagnostics. Line comments start with
//! `//`.

use crate::core::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Ident,
    Number,
    KwInt64,
    KwVoid,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    EqualEqual,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
}

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::Number => "number",
            TokenKind::KwInt64 => "`int64`",
            TokenKind::KwVoid => "`void`",
            TokenKind::KwIf => "`if`",
            TokenKind::KwElse => "`else`",
            TokenKind::KwWhile => "`while`",
            TokenKind::KwReturn => "`return`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Assign => "`=`",
            TokenKind::EqualEqual => "`==`",
            TokenKind::Less => "`<`",
            TokenKind::Greater => "`>`",
            TokenKind::LessEq => "`<=`",
            TokenKind::GreaterEq => "`>=`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::Semi => "`;`",
            TokenKind::Comma => "`,`",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: u32,
    pub col: u32,
}

pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.source[self.pos..].starts_with("//") => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'src>, ParseError> {
        self.skip_trivia();

        let start = self.pos;
        let line = self.line;
        let col = self.col;
        let token = |kind: TokenKind, lexer: &Self| Token {
            kind,
            text: &lexer.source[start..lexer.pos],
            line,
            col,
        };

        let Some(ch) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                line,
                col,
            });
        };

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '=' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            '0'..='9' => {
                while matches!(self.peek_char(), Some('0'..='9')) {
                    self.bump();
                }
                TokenKind::Number
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                    self.bump();
                }
                match &self.source[start..self.pos] {
                    "int64" => TokenKind::KwInt64,
                    "void" => TokenKind::KwVoid,
                    "if" => TokenKind::KwIf,
                    "else" => TokenKind::KwElse,
                    "while" => TokenKind::KwWhile,
                    "return" => TokenKind::KwReturn,
                    _ => TokenKind::Ident,
                }
            }
            other => {
                return Err(ParseError::UnexpectedChar {
                    ch: other,
                    line,
                    col,
                })
            }
        };

        Ok(token(kind, self))
    }
}

/// Tokenize a whole source string, EOF token excluded.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::Eof {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}
