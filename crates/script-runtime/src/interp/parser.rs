//! Recursive-descent parser producing a [`Program`].
//!
//! The grammar is a whitelist: anything it does not recognise (function
//! definitions, classes, arrow functions, property assignment) is a
//! compilation error rather than something evaluated loosely.

use super::ast::{
    AssignOp, BinaryOp, DeclKind, Expr, LogicalOp, Program, Stmt, UnaryOp, UpdateOp,
};
use super::lexer::{Keyword, Position, Punct, Token, TokenKind, compile_error, tokenize};
use tenant_script_core::Result;

/// Parses `source` into a program, rejecting nesting deeper than `max_depth`.
pub fn parse(source: &str, max_depth: usize) -> Result<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
        max_depth,
        loop_depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
    max_depth: usize,
    loop_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and the cursor never passes it.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn pos(&self) -> Position {
        self.peek().pos
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.index += 1;
        }
        token
    }

    fn is_punct(&self, punct: Punct) -> bool {
        matches!(self.peek_kind(), TokenKind::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == keyword)
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", punct.as_str())))
        }
    }

    fn unexpected(&self, hint: &str) -> tenant_script_core::Error {
        let token = self.peek();
        match &token.kind {
            TokenKind::Punct(Punct::Arrow) => {
                compile_error("Arrow functions are not supported", token.pos)
            }
            kind => compile_error(
                format!("Unexpected {} ({hint})", kind.describe()),
                token.pos,
            ),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(compile_error(
                format!("Maximum nesting depth of {} exceeded", self.max_depth),
                self.pos(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consumes a statement terminator, allowing automatic semicolon
    /// insertion before `}`, end of input, or a line break.
    fn terminate(&mut self) -> Result<()> {
        if self.eat_punct(Punct::Semicolon)
            || self.is_punct(Punct::RBrace)
            || self.at_eof()
            || self.peek().newline_before
        {
            return Ok(());
        }
        Err(self.unexpected("expected ';'"))
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        self.enter()?;
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn statement_inner(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        match self.peek_kind().clone() {
            TokenKind::Punct(Punct::Semicolon) => {
                self.advance();
                Ok(Stmt::Empty)
            }
            TokenKind::Punct(Punct::LBrace) => Ok(Stmt::Block(self.block()?)),
            TokenKind::Keyword(Keyword::Const) => self.declaration(DeclKind::Const, true),
            TokenKind::Keyword(Keyword::Let) => self.declaration(DeclKind::Let, true),
            TokenKind::Keyword(Keyword::Var) => self.declaration(DeclKind::Var, true),
            TokenKind::Keyword(Keyword::If) => self.if_statement(),
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                self.expect_punct(Punct::LParen)?;
                let test = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                let body = self.loop_body()?;
                Ok(Stmt::While {
                    test,
                    body: Box::new(body),
                })
            }
            TokenKind::Keyword(Keyword::For) => self.for_statement(),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(compile_error("Illegal break statement", pos));
                }
                self.terminate()?;
                Ok(Stmt::Break)
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(compile_error(
                        "Illegal continue statement: no surrounding iteration statement",
                        pos,
                    ));
                }
                self.terminate()?;
                Ok(Stmt::Continue)
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.is_punct(Punct::Semicolon)
                    || self.is_punct(Punct::RBrace)
                    || self.at_eof()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.terminate()?;
                Ok(Stmt::Return(value))
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                if self.peek().newline_before {
                    return Err(compile_error("Illegal newline after throw", pos));
                }
                let value = self.expression()?;
                self.terminate()?;
                Ok(Stmt::Throw(value))
            }
            TokenKind::Keyword(Keyword::Try) => self.try_statement(),
            TokenKind::Keyword(Keyword::Function | Keyword::Async) => {
                Err(compile_error("Function definitions are not supported", pos))
            }
            TokenKind::Keyword(Keyword::Class) => {
                Err(compile_error("Class definitions are not supported", pos))
            }
            _ => {
                let expr = self.expression()?;
                self.terminate()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct(Punct::LBrace)?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn declaration(&mut self, kind: DeclKind, terminated: bool) -> Result<Stmt> {
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let pos = self.pos();
            let name = self.identifier()?;
            let init = if self.eat_punct(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(compile_error(
                        "Missing initializer in const declaration",
                        pos,
                    ));
                }
                None
            };
            bindings.push((name, init));
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        if terminated {
            self.terminate()?;
        }
        Ok(Stmt::Declare { kind, bindings })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct(Punct::LParen)?;
        let test = self.expression()?;
        self.expect_punct(Punct::RParen)?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then,
            otherwise,
        })
    }

    fn loop_body(&mut self) -> Result<Stmt> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct(Punct::LParen)?;

        let init = if self.eat_punct(Punct::Semicolon) {
            None
        } else {
            let init = match self.peek_kind() {
                TokenKind::Keyword(Keyword::Const) => self.declaration(DeclKind::Const, false)?,
                TokenKind::Keyword(Keyword::Let) => self.declaration(DeclKind::Let, false)?,
                TokenKind::Keyword(Keyword::Var) => self.declaration(DeclKind::Var, false)?,
                _ => Stmt::Expr(self.expression()?),
            };
            self.expect_punct(Punct::Semicolon)?;
            Some(Box::new(init))
        };

        let test = if self.is_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon)?;

        let update = if self.is_punct(Punct::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::RParen)?;

        let body = self.loop_body()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
        })
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.advance();
        let block = self.block()?;

        let handler = if self.eat_keyword(Keyword::Catch) {
            let param = if self.eat_punct(Punct::LParen) {
                let name = self.identifier()?;
                self.expect_punct(Punct::RParen)?;
                Some(name)
            } else {
                None
            };
            Some((param, self.block()?))
        } else {
            None
        };

        let finalizer = if self.eat_keyword(Keyword::Finally) {
            Some(self.block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(compile_error("Missing catch or finally after try", pos));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.assignment_inner();
        self.leave();
        expr
    }

    fn assignment_inner(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let target = self.conditional()?;

        let op = match self.peek_kind() {
            TokenKind::Punct(Punct::Assign) => AssignOp::Assign,
            TokenKind::Punct(Punct::PlusAssign) => AssignOp::Add,
            TokenKind::Punct(Punct::MinusAssign) => AssignOp::Sub,
            _ => return Ok(target),
        };
        self.advance();

        let Expr::Ident { name, .. } = target else {
            return Err(compile_error("Invalid left-hand side in assignment", pos));
        };
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: name,
            value: Box::new(value),
            pos,
        })
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.nullish()?;
        if !self.eat_punct(Punct::Question) {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect_punct(Punct::Colon)?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn nullish(&mut self) -> Result<Expr> {
        let mut left = self.logical_or()?;
        while self.eat_punct(Punct::Nullish) {
            let right = self.logical_or()?;
            left = Expr::Logical {
                op: LogicalOp::Nullish,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut left = self.logical_and()?;
        while self.eat_punct(Punct::OrOr) {
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut left = self.equality()?;
        while self.eat_punct(Punct::AndAnd) {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(Punct, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat_punct(*punct) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (Punct::StrictEq, BinaryOp::StrictEq),
                (Punct::StrictNotEq, BinaryOp::StrictNotEq),
                (Punct::Eq, BinaryOp::Eq),
                (Punct::NotEq, BinaryOp::NotEq),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (Punct::Lt, BinaryOp::Lt),
                (Punct::LtEq, BinaryOp::LtEq),
                (Punct::Gt, BinaryOp::Gt),
                (Punct::GtEq, BinaryOp::GtEq),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary_level(
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let op = match self.peek_kind() {
            TokenKind::Punct(Punct::Bang) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Neg),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOp::Typeof),
            TokenKind::Keyword(Keyword::Await) => Some(UnaryOp::Await),
            TokenKind::Punct(Punct::PlusPlus | Punct::MinusMinus) => {
                let op = if self.is_punct(Punct::PlusPlus) {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.advance();
                let Expr::Ident { name, .. } = self.unary()? else {
                    return Err(compile_error(
                        "Invalid left-hand side expression in prefix operation",
                        pos,
                    ));
                };
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    target: name,
                    pos,
                });
            }
            _ => None,
        };

        let Some(op) = op else {
            return self.postfix();
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let expr = self.call_member()?;
        let newline = self.peek().newline_before;
        let op = match self.peek_kind() {
            TokenKind::Punct(Punct::PlusPlus) if !newline => UpdateOp::Increment,
            TokenKind::Punct(Punct::MinusMinus) if !newline => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        let Expr::Ident { name, .. } = expr else {
            return Err(compile_error(
                "Invalid left-hand side expression in postfix operation",
                pos,
            ));
        };
        Ok(Expr::Update {
            op,
            prefix: false,
            target: name,
            pos,
        })
    }

    fn call_member(&mut self) -> Result<Expr> {
        let mut expr = if self.is_keyword(Keyword::New) {
            self.new_expression()?
        } else {
            self.primary()?
        };

        loop {
            let pos = self.pos();
            if self.eat_punct(Punct::Dot) {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct(Punct::LBracket) {
                let index = self.expression()?;
                self.expect_punct(Punct::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct(Punct::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    pos,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.advance();
        let mut callee = self.primary()?;
        while self.eat_punct(Punct::Dot) {
            let property = self.property_name()?;
            callee = Expr::Member {
                object: Box::new(callee),
                property,
            };
        }
        let args = if self.is_punct(Punct::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            pos,
        })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect_punct(Punct::LParen)?;
        let mut args = Vec::new();
        while !self.is_punct(Punct::RParen) {
            args.push(self.assignment()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(args)
    }

    fn property_name(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(kw) => {
                self.advance();
                Ok(keyword_name(kw))
            }
            _ => Err(self.unexpected("expected property name")),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::Number(n) => Expr::Number(n),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Keyword(Keyword::True) => Expr::Bool(true),
            TokenKind::Keyword(Keyword::False) => Expr::Bool(false),
            TokenKind::Keyword(Keyword::Null) => Expr::Null,
            TokenKind::Ident(name) if name == "undefined" => Expr::Undefined,
            TokenKind::Ident(name) => Expr::Ident {
                name,
                pos: token.pos,
            },
            TokenKind::Punct(Punct::LParen) => {
                let inner = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                if self.is_punct(Punct::Arrow) {
                    return Err(self.unexpected("arrow function"));
                }
                inner
            }
            TokenKind::Punct(Punct::LBracket) => {
                let mut items = Vec::new();
                while !self.is_punct(Punct::RBracket) {
                    items.push(self.assignment()?);
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
                self.expect_punct(Punct::RBracket)?;
                Expr::Array(items)
            }
            TokenKind::Punct(Punct::LBrace) => self.object_literal()?,
            TokenKind::Keyword(Keyword::Function | Keyword::Async) => {
                return Err(compile_error(
                    "Function definitions are not supported",
                    token.pos,
                ));
            }
            TokenKind::Keyword(Keyword::This) => {
                return Err(compile_error("'this' is not available to scripts", token.pos));
            }
            kind => {
                return Err(compile_error(
                    format!("Unexpected {}", kind.describe()),
                    token.pos,
                ));
            }
        };
        Ok(expr)
    }

    fn object_literal(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            let pos = self.pos();
            let (key, shorthand) = match self.advance().kind {
                TokenKind::Ident(name) => (name, true),
                TokenKind::Keyword(kw) => (keyword_name(kw), false),
                TokenKind::Str(s) => (s, false),
                TokenKind::Number(n) => (super::value::number_to_string(n), false),
                kind => {
                    return Err(compile_error(
                        format!("Unexpected {} in object literal", kind.describe()),
                        pos,
                    ));
                }
            };
            let value = if self.eat_punct(Punct::Colon) {
                self.assignment()?
            } else if shorthand {
                Expr::Ident {
                    name: key.clone(),
                    pos,
                }
            } else {
                return Err(self.unexpected("expected ':'"));
            };
            entries.push((key, value));
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(Expr::Object(entries))
    }
}

fn keyword_name(keyword: Keyword) -> String {
    format!("{keyword:?}").to_lowercase()
}
