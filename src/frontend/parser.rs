// Recursive-descent parser with single-token lookahead. Expression parsing is three
// precedence levels: comparisons over additive terms over multiplicative factors, all
// left-associative. Statements starting with an identifier are parsed as a full
// expression first; a following `=` turns a bare variable expression into an
// assignment target, anything else must close as an expression statement.

//! Parser producing the AST.

use super::ast::{Expr, FunctionDecl, Module, Stmt, TypeName};
use super::lexer::{Lexer, Token, TokenKind};
use crate::core::error::ParseError;
use crate::ir::graph::BinaryOp;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    peeked: Option<Token<'src>>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
        }
    }

    /// Parse a whole module.
    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut module = Module::default();
        while self.peek()?.kind != TokenKind::Eof {
            module.functions.push(self.parse_function()?);
        }
        Ok(module)
    }

    fn peek(&mut self) -> Result<Token<'src>, ParseError> {
        if let Some(token) = self.peeked {
            return Ok(token);
        }
        let token = self.lexer.next_token()?;
        self.peeked = Some(token);
        Ok(token)
    }

    fn advance(&mut self) -> Result<Token<'src>, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        let token = self.advance()?;
        if token.kind == kind {
            return Ok(token);
        }
        Err(self.unexpected(token, kind.describe()))
    }

    fn unexpected(&self, token: Token<'src>, expected: &str) -> ParseError {
        if token.kind == TokenKind::Eof {
            return ParseError::UnexpectedEof {
                expected: expected.to_string(),
            };
        }
        ParseError::Unexpected {
            expected: expected.to_string(),
            found: token.text.to_string(),
            line: token.line,
            col: token.col,
        }
    }

    fn parse_type(&mut self) -> Result<TypeName, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::KwInt64 => Ok(TypeName::Int64),
            TokenKind::KwVoid => Ok(TypeName::Void),
            _ => Err(self.unexpected(token, "a type")),
        }
    }

    fn parse_function(&mut self) -> Result<FunctionDecl, ParseError> {
        let return_type = self.parse_type()?;
        let name = self.expect(TokenKind::Ident)?.text.to_string();

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.peek()?.kind != TokenKind::RParen {
            loop {
                self.expect(TokenKind::KwInt64)?;
                params.push(self.expect(TokenKind::Ident)?.text.to_string());
                if self.peek()?.kind != TokenKind::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            return_type,
            params,
            body,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while self.peek()?.kind != TokenKind::RBrace {
            stmts.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek()?.kind {
            TokenKind::KwInt64 => {
                self.advance()?;
                let name = self.expect(TokenKind::Ident)?.text.to_string();
                let init = if self.peek()?.kind == TokenKind::Assign {
                    self.advance()?;
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Declaration { name, init })
            }
            TokenKind::KwIf => {
                self.advance()?;
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                let then_body = self.parse_block()?;
                let else_body = if self.peek()?.kind == TokenKind::KwElse {
                    self.advance()?;
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_body,
                    else_body,
                })
            }
            TokenKind::KwWhile => {
                self.advance()?;
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::KwReturn => {
                self.advance()?;
                let value = if self.peek()?.kind != TokenKind::Semi {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return(value))
            }
            _ => {
                let expr = self.parse_expression()?;
                if self.peek()?.kind == TokenKind::Assign {
                    let assign = self.advance()?;
                    let Expr::Variable(name) = expr else {
                        return Err(self.unexpected(assign, "`;`"));
                    };
                    let value = self.parse_expression()?;
                    self.expect(TokenKind::Semi)?;
                    return Ok(Stmt::Assign { name, value });
                }
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::ExprStmt(expr))
            }
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::EqualEqual => BinaryOp::Equals,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Number => {
                let value = token.text.parse::<i64>().map_err(|_| ParseError::BadNumber {
                    text: token.text.to_string(),
                    line: token.line,
                    col: token.col,
                })?;
                Ok(Expr::Number(value))
            }
            TokenKind::Ident => {
                if self.peek()?.kind == TokenKind::LParen {
                    self.advance()?;
                    let mut args = Vec::new();
                    if self.peek()?.kind != TokenKind::RParen {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.peek()?.kind != TokenKind::Comma {
                                break;
                            }
                            self.advance()?;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    return Ok(Expr::Call {
                        name: token.text.to_string(),
                        args,
                    });
                }
                Ok(Expr::Variable(token.text.to_string()))
            }
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected(token, "an expression")),
        }
    }
}

/// Parse a source string into a module.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    Parser::new(source).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let module = parse("int64 f() { return 1 + 2 * 3 < 10; }").unwrap();
        let Stmt::Return(Some(expr)) = &module.functions[0].body[0] else {
            panic!("expected return");
        };
        // (1 + (2 * 3)) < 10
        let Expr::Binary {
            op: BinaryOp::Less,
            lhs,
            ..
        } = expr
        else {
            panic!("expected comparison at the top");
        };
        let Expr::Binary {
            op: BinaryOp::Add,
            rhs: mul,
            ..
        } = lhs.as_ref()
        else {
            panic!("expected addition under the comparison");
        };
        assert!(matches!(
            mul.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_if_else_and_while() {
        let module = parse(
            "void f() { int64 a = 0; while (a < 10) { if (a == 5) { a = 6; } else { a = a + 1; } } }",
        )
        .unwrap();
        let body = &module.functions[0].body;
        assert!(matches!(body[0], Stmt::Declaration { .. }));
        let Stmt::While { body: loop_body, .. } = &body[1] else {
            panic!("expected while");
        };
        assert!(matches!(loop_body[0], Stmt::If { .. }));
    }

    #[test]
    fn test_call_statement_and_args() {
        let module = parse("void f() { g(1, 2 + 3); }").unwrap();
        let Stmt::ExprStmt(Expr::Call { name, args }) = &module.functions[0].body[0] else {
            panic!("expected call statement");
        };
        assert_eq!(name, "g");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_params() {
        let module = parse("int64 max(int64 a, int64 b) { return a; }").unwrap();
        assert_eq!(module.functions[0].params, vec!["a", "b"]);
    }

    #[test]
    fn test_error_position() {
        let err = parse("int64 f() { return ; ; }").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { line: 1, .. }));
    }

    #[test]
    fn test_error_eof() {
        let err = parse("int64 f() {").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }
}
