use std::rc::Rc;

use crate::JSError;
use crate::core::statement::*;
use crate::core::token::{Token, TokenItem, tokenize};

/// Recursive-descent ES5 parser. `strip_locations` is used for polyfill and
/// `eval` sources; the resulting nodes carry line 0, which the evaluator
/// treats as "not user code" when pacing steps.
pub struct Parser {
    tokens: Vec<TokenItem>,
    pos: usize,
    strip_locations: bool,
}

pub fn parse_program(source: &str) -> Result<Program, JSError> {
    parse_program_opts(source, true)
}

pub fn parse_program_opts(source: &str, keep_locations: bool) -> Result<Program, JSError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        strip_locations: !keep_locations,
    };
    let mut body = Vec::new();
    while !parser.at_end() {
        body.push(parser.parse_statement()?);
    }
    let strict = directive_prologue_is_strict(&body);
    Ok(Program { body, strict })
}

/// Comma-separated parameter list for the `Function` constructor.
pub fn parse_parameter_list(source: &str) -> Result<Vec<Rc<str>>, JSError> {
    let tokens = tokenize(source)?;
    let mut params = Vec::new();
    let mut expect_name = true;
    for item in &tokens {
        match (&item.tok, expect_name) {
            (Token::Identifier(name), true) => {
                params.push(Rc::from(name.as_str()));
                expect_name = false;
            }
            (Token::Comma, false) => expect_name = true,
            _ => {
                return Err(JSError::SyntaxError {
                    message: "malformed formal parameter list".to_string(),
                    line: item.line,
                    column: item.column,
                });
            }
        }
    }
    if expect_name && !params.is_empty() {
        return Err(JSError::SyntaxError {
            message: "malformed formal parameter list".to_string(),
            line: 0,
            column: 0,
        });
    }
    Ok(params)
}

pub(crate) fn directive_prologue_is_strict(body: &[StmtRef]) -> bool {
    for stmt in body {
        match &stmt.kind {
            StatementKind::Expr(expr) => match &expr.kind {
                ExprKind::StringLit(s) => {
                    if &**s == "use strict" {
                        return true;
                    }
                }
                _ => return false,
            },
            _ => return false,
        }
    }
    false
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenItem> {
        self.tokens.get(self.pos)
    }

    fn peek_tok(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_tok_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|t| &t.tok)
    }

    fn newline_before(&self) -> bool {
        self.peek().map(|t| t.newline_before).unwrap_or(true)
    }

    fn here(&self) -> (u32, u32) {
        if self.strip_locations {
            return (0, 0);
        }
        self.peek()
            .map(|t| (t.line, t.column))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.column)))
            .unwrap_or((1, 1))
    }

    fn bump(&mut self) -> Option<TokenItem> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn at(&self, tok: &Token) -> bool {
        self.peek_tok() == Some(tok)
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.at(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> Result<(), JSError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> JSError {
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.column)))
            .unwrap_or((1, 1));
        JSError::SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }

    fn stmt(&self, kind: StatementKind, at: (u32, u32)) -> StmtRef {
        Rc::new(Statement {
            kind,
            line: at.0,
            column: at.1,
        })
    }

    fn expr(&self, kind: ExprKind, at: (u32, u32)) -> ExprRef {
        Rc::new(Expr {
            kind,
            line: at.0,
            column: at.1,
        })
    }

    /// Automatic semicolon insertion: an explicit `;`, or a `}` / end of
    /// input / preceding line break stands in for one.
    fn consume_semicolon(&mut self) -> Result<(), JSError> {
        if self.eat(&Token::Semicolon) {
            return Ok(());
        }
        if self.at_end() || self.at(&Token::RBrace) || self.newline_before() {
            return Ok(());
        }
        Err(self.error("expected ';'"))
    }

    fn expect_identifier(&mut self, what: &str) -> Result<Rc<str>, JSError> {
        match self.peek_tok() {
            Some(Token::Identifier(name)) => {
                let name: Rc<str> = Rc::from(name.as_str());
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    // ───────────────────────────── statements ─────────────────────────────

    fn parse_statement(&mut self) -> Result<StmtRef, JSError> {
        let at = self.here();
        match self.peek_tok() {
            Some(Token::LBrace) => self.parse_block(),
            Some(Token::Semicolon) => {
                self.pos += 1;
                Ok(self.stmt(StatementKind::Empty, at))
            }
            Some(Token::Var) => {
                self.pos += 1;
                let decls = self.parse_var_declarators(true)?;
                self.consume_semicolon()?;
                Ok(self.stmt(StatementKind::Var(decls), at))
            }
            Some(Token::If) => self.parse_if(at),
            Some(Token::While) => {
                self.pos += 1;
                self.expect(&Token::LParen, "'(' after 'while'")?;
                let test = self.parse_expression(true)?;
                self.expect(&Token::RParen, "')'")?;
                let body = self.parse_statement()?;
                Ok(self.stmt(StatementKind::While(test, body), at))
            }
            Some(Token::Do) => {
                self.pos += 1;
                let body = self.parse_statement()?;
                self.expect(&Token::While, "'while' after do body")?;
                self.expect(&Token::LParen, "'('")?;
                let test = self.parse_expression(true)?;
                self.expect(&Token::RParen, "')'")?;
                // the semicolon after do-while is always optional
                self.eat(&Token::Semicolon);
                Ok(self.stmt(StatementKind::DoWhile(body, test), at))
            }
            Some(Token::For) => self.parse_for(at),
            Some(Token::Return) => {
                self.pos += 1;
                let arg = if self.at_end()
                    || self.at(&Token::Semicolon)
                    || self.at(&Token::RBrace)
                    || self.newline_before()
                {
                    None
                } else {
                    Some(self.parse_expression(true)?)
                };
                self.consume_semicolon()?;
                Ok(self.stmt(StatementKind::Return(arg), at))
            }
            Some(Token::Break) | Some(Token::Continue) => {
                let is_break = matches!(self.peek_tok(), Some(Token::Break));
                self.pos += 1;
                let label = match self.peek_tok() {
                    Some(Token::Identifier(name)) if !self.newline_before() => {
                        let label: Rc<str> = Rc::from(name.as_str());
                        self.pos += 1;
                        Some(label)
                    }
                    _ => None,
                };
                self.consume_semicolon()?;
                let kind = if is_break {
                    StatementKind::Break(label)
                } else {
                    StatementKind::Continue(label)
                };
                Ok(self.stmt(kind, at))
            }
            Some(Token::Throw) => {
                self.pos += 1;
                if self.newline_before() {
                    return Err(self.error("newline not allowed after 'throw'"));
                }
                let arg = self.parse_expression(true)?;
                self.consume_semicolon()?;
                Ok(self.stmt(StatementKind::Throw(arg), at))
            }
            Some(Token::Try) => self.parse_try(at),
            Some(Token::Switch) => self.parse_switch(at),
            Some(Token::With) => {
                self.pos += 1;
                self.expect(&Token::LParen, "'(' after 'with'")?;
                let object = self.parse_expression(true)?;
                self.expect(&Token::RParen, "')'")?;
                let body = self.parse_statement()?;
                Ok(self.stmt(StatementKind::With(object, body), at))
            }
            Some(Token::Function) => {
                self.pos += 1;
                let func = self.parse_function(true, at)?;
                Ok(self.stmt(StatementKind::FunctionDeclaration(func), at))
            }
            Some(Token::Debugger) => {
                self.pos += 1;
                self.consume_semicolon()?;
                Ok(self.stmt(StatementKind::Debugger, at))
            }
            Some(Token::Identifier(_)) if self.peek_tok_at(1) == Some(&Token::Colon) => {
                let label = self.expect_identifier("label")?;
                self.pos += 1; // the colon
                let body = self.parse_statement()?;
                Ok(self.stmt(StatementKind::Label(label, body), at))
            }
            Some(_) => {
                let expr = self.parse_expression(true)?;
                self.consume_semicolon()?;
                Ok(self.stmt(StatementKind::Expr(expr), at))
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_block(&mut self) -> Result<StmtRef, JSError> {
        let at = self.here();
        self.expect(&Token::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error("unterminated block"));
            }
            body.push(self.parse_statement()?);
        }
        self.pos += 1;
        Ok(self.stmt(StatementKind::Block(body), at))
    }

    fn parse_var_declarators(
        &mut self,
        allow_in: bool,
    ) -> Result<Vec<(Rc<str>, Option<ExprRef>)>, JSError> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier("variable name")?;
            let init = if self.eat(&Token::Assign) {
                Some(self.parse_assignment(allow_in)?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_if(&mut self, at: (u32, u32)) -> Result<StmtRef, JSError> {
        self.pos += 1;
        self.expect(&Token::LParen, "'(' after 'if'")?;
        let test = self.parse_expression(true)?;
        self.expect(&Token::RParen, "')'")?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat(&Token::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.stmt(StatementKind::If(test, consequent, alternate), at))
    }

    fn parse_for(&mut self, at: (u32, u32)) -> Result<StmtRef, JSError> {
        self.pos += 1;
        self.expect(&Token::LParen, "'(' after 'for'")?;

        if self.at(&Token::Var) {
            let var_at = self.here();
            self.pos += 1;
            let decls = self.parse_var_declarators(false)?;
            if self.eat(&Token::In) {
                if decls.len() != 1 {
                    return Err(self.error("only one declaration allowed in a for-in loop"));
                }
                let (name, init) = decls.into_iter().next().unwrap_or((Rc::from(""), None));
                let object = self.parse_expression(true)?;
                self.expect(&Token::RParen, "')'")?;
                let body = self.parse_statement()?;
                return Ok(self.stmt(
                    StatementKind::ForIn(Box::new(ForInStatement {
                        target: ForInTarget::Var(name, init),
                        object,
                        body,
                    })),
                    at,
                ));
            }
            let init = Some(ForInit::Var(self.stmt(StatementKind::Var(decls), var_at)));
            return self.parse_for_tail(at, init);
        }

        if self.eat(&Token::Semicolon) {
            return self.parse_for_tail_after_init(at, None);
        }

        let first = self.parse_expression(false)?;
        if self.eat(&Token::In) {
            if !is_assignment_target(&first) {
                return Err(self.error("invalid left-hand side in for-in"));
            }
            let object = self.parse_expression(true)?;
            self.expect(&Token::RParen, "')'")?;
            let body = self.parse_statement()?;
            return Ok(self.stmt(
                StatementKind::ForIn(Box::new(ForInStatement {
                    target: ForInTarget::Expr(first),
                    object,
                    body,
                })),
                at,
            ));
        }
        self.parse_for_tail(at, Some(ForInit::Expr(first)))
    }

    fn parse_for_tail(&mut self, at: (u32, u32), init: Option<ForInit>) -> Result<StmtRef, JSError> {
        self.expect(&Token::Semicolon, "';' in for-loop header")?;
        self.parse_for_tail_after_init(at, init)
    }

    fn parse_for_tail_after_init(
        &mut self,
        at: (u32, u32),
        init: Option<ForInit>,
    ) -> Result<StmtRef, JSError> {
        let test = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.expect(&Token::Semicolon, "';' in for-loop header")?;
        let update = if self.at(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.expect(&Token::RParen, "')'")?;
        let body = self.parse_statement()?;
        Ok(self.stmt(
            StatementKind::For(Box::new(ForStatement {
                init,
                test,
                update,
                body,
            })),
            at,
        ))
    }

    fn parse_try(&mut self, at: (u32, u32)) -> Result<StmtRef, JSError> {
        self.pos += 1;
        let block = self.parse_block()?;
        let handler = if self.eat(&Token::Catch) {
            self.expect(&Token::LParen, "'(' after 'catch'")?;
            let param = self.expect_identifier("catch parameter")?;
            self.expect(&Token::RParen, "')'")?;
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("missing catch or finally after try"));
        }
        Ok(self.stmt(
            StatementKind::Try(Box::new(TryStatement {
                block,
                handler,
                finalizer,
            })),
            at,
        ))
    }

    fn parse_switch(&mut self, at: (u32, u32)) -> Result<StmtRef, JSError> {
        self.pos += 1;
        self.expect(&Token::LParen, "'(' after 'switch'")?;
        let discriminant = self.parse_expression(true)?;
        self.expect(&Token::RParen, "')'")?;
        self.expect(&Token::LBrace, "'{'")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat(&Token::RBrace) {
            let test = if self.eat(&Token::Case) {
                let test = self.parse_expression(true)?;
                Some(test)
            } else if self.eat(&Token::Default) {
                if seen_default {
                    return Err(self.error("more than one default clause in switch"));
                }
                seen_default = true;
                None
            } else {
                return Err(self.error("expected 'case' or 'default'"));
            };
            self.expect(&Token::Colon, "':'")?;
            let mut body = Vec::new();
            while !matches!(
                self.peek_tok(),
                Some(Token::Case) | Some(Token::Default) | Some(Token::RBrace) | None
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(self.stmt(
            StatementKind::Switch(Box::new(SwitchStatement {
                discriminant,
                cases,
            })),
            at,
        ))
    }

    /// Parses the remainder of a function after the `function` keyword.
    fn parse_function(
        &mut self,
        require_name: bool,
        at: (u32, u32),
    ) -> Result<Rc<FunctionNode>, JSError> {
        let name = match self.peek_tok() {
            Some(Token::Identifier(name)) => {
                let name: Rc<str> = Rc::from(name.as_str());
                self.pos += 1;
                Some(name)
            }
            _ if require_name => return Err(self.error("function declaration requires a name")),
            _ => None,
        };
        self.expect(&Token::LParen, "'(' before parameter list")?;
        let mut params = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "')'")?;
        self.expect(&Token::LBrace, "'{' before function body")?;
        let mut body = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at_end() {
                return Err(self.error("unterminated function body"));
            }
            body.push(self.parse_statement()?);
        }
        self.pos += 1;
        let strict = directive_prologue_is_strict(&body);
        Ok(Rc::new(FunctionNode {
            name,
            params,
            body,
            strict,
            line: at.0,
            column: at.1,
        }))
    }

    // ──────────────────────────── expressions ─────────────────────────────

    fn parse_expression(&mut self, allow_in: bool) -> Result<ExprRef, JSError> {
        let at = self.here();
        let first = self.parse_assignment(allow_in)?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.eat(&Token::Comma) {
            parts.push(self.parse_assignment(allow_in)?);
        }
        Ok(self.expr(ExprKind::Comma(parts), at))
    }

    fn parse_assignment(&mut self, allow_in: bool) -> Result<ExprRef, JSError> {
        let at = self.here();
        let target = self.parse_conditional(allow_in)?;
        let op = match self.peek_tok() {
            Some(Token::Assign) => None,
            Some(Token::AddAssign) => Some(BinaryOp::Add),
            Some(Token::SubAssign) => Some(BinaryOp::Sub),
            Some(Token::MulAssign) => Some(BinaryOp::Mul),
            Some(Token::DivAssign) => Some(BinaryOp::Div),
            Some(Token::ModAssign) => Some(BinaryOp::Mod),
            Some(Token::BitAndAssign) => Some(BinaryOp::BitAnd),
            Some(Token::BitOrAssign) => Some(BinaryOp::BitOr),
            Some(Token::BitXorAssign) => Some(BinaryOp::BitXor),
            Some(Token::LeftShiftAssign) => Some(BinaryOp::LeftShift),
            Some(Token::RightShiftAssign) => Some(BinaryOp::RightShift),
            Some(Token::UnsignedRightShiftAssign) => Some(BinaryOp::UnsignedRightShift),
            _ => return Ok(target),
        };
        self.pos += 1;
        if !is_assignment_target(&target) {
            return Err(self.error("invalid assignment target"));
        }
        let value = self.parse_assignment(allow_in)?;
        Ok(self.expr(ExprKind::Assign(op, target, value), at))
    }

    fn parse_conditional(&mut self, allow_in: bool) -> Result<ExprRef, JSError> {
        let at = self.here();
        let test = self.parse_binary(0, allow_in)?;
        if !self.eat(&Token::QuestionMark) {
            return Ok(test);
        }
        let consequent = self.parse_assignment(true)?;
        self.expect(&Token::Colon, "':' in conditional expression")?;
        let alternate = self.parse_assignment(allow_in)?;
        Ok(self.expr(ExprKind::Conditional(test, consequent, alternate), at))
    }

    /// Precedence-climbing over the binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8, allow_in: bool) -> Result<ExprRef, JSError> {
        let at = self.here();
        let mut left = self.parse_unary()?;
        loop {
            let Some((prec, kind)) = self.binary_precedence(allow_in) else {
                return Ok(left);
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.pos += 1;
            let right = self.parse_binary(prec + 1, allow_in)?;
            left = match kind {
                BinaryOrLogical::Binary(op) => self.expr(ExprKind::Binary(op, left, right), at),
                BinaryOrLogical::Logical(op) => self.expr(ExprKind::Logical(op, left, right), at),
            };
        }
    }

    fn binary_precedence(&self, allow_in: bool) -> Option<(u8, BinaryOrLogical)> {
        use BinaryOrLogical::*;
        let entry = match self.peek_tok()? {
            Token::LogicalOr => (1, Logical(LogicalOp::Or)),
            Token::LogicalAnd => (2, Logical(LogicalOp::And)),
            Token::BitOr => (3, Binary(BinaryOp::BitOr)),
            Token::BitXor => (4, Binary(BinaryOp::BitXor)),
            Token::BitAnd => (5, Binary(BinaryOp::BitAnd)),
            Token::Equal => (6, Binary(BinaryOp::Equal)),
            Token::NotEqual => (6, Binary(BinaryOp::NotEqual)),
            Token::StrictEqual => (6, Binary(BinaryOp::StrictEqual)),
            Token::StrictNotEqual => (6, Binary(BinaryOp::StrictNotEqual)),
            Token::LessThan => (7, Binary(BinaryOp::Less)),
            Token::GreaterThan => (7, Binary(BinaryOp::Greater)),
            Token::LessEqual => (7, Binary(BinaryOp::LessEqual)),
            Token::GreaterEqual => (7, Binary(BinaryOp::GreaterEqual)),
            Token::InstanceOf => (7, Binary(BinaryOp::InstanceOf)),
            Token::In if allow_in => (7, Binary(BinaryOp::In)),
            Token::LeftShift => (8, Binary(BinaryOp::LeftShift)),
            Token::RightShift => (8, Binary(BinaryOp::RightShift)),
            Token::UnsignedRightShift => (8, Binary(BinaryOp::UnsignedRightShift)),
            Token::Plus => (9, Binary(BinaryOp::Add)),
            Token::Minus => (9, Binary(BinaryOp::Sub)),
            Token::Multiply => (10, Binary(BinaryOp::Mul)),
            Token::Divide => (10, Binary(BinaryOp::Div)),
            Token::Mod => (10, Binary(BinaryOp::Mod)),
            _ => return None,
        };
        Some(entry)
    }

    fn parse_unary(&mut self) -> Result<ExprRef, JSError> {
        let at = self.here();
        let op = match self.peek_tok() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::LogicalNot) => Some(UnaryOp::Not),
            Some(Token::BitNot) => Some(UnaryOp::BitNot),
            Some(Token::TypeOf) => Some(UnaryOp::TypeOf),
            Some(Token::Void) => Some(UnaryOp::Void),
            Some(Token::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let arg = self.parse_unary()?;
            return Ok(self.expr(ExprKind::Unary(op, arg), at));
        }
        if self.at(&Token::Increment) || self.at(&Token::Decrement) {
            let op = if self.at(&Token::Increment) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.pos += 1;
            let arg = self.parse_unary()?;
            if !is_assignment_target(&arg) {
                return Err(self.error("invalid increment/decrement target"));
            }
            return Ok(self.expr(ExprKind::Update(op, true, arg), at));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExprRef, JSError> {
        let at = self.here();
        let arg = self.parse_call_or_member()?;
        // restricted production: no line break before postfix ++/--
        if !self.newline_before() && (self.at(&Token::Increment) || self.at(&Token::Decrement)) {
            let op = if self.at(&Token::Increment) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.pos += 1;
            if !is_assignment_target(&arg) {
                return Err(self.error("invalid increment/decrement target"));
            }
            return Ok(self.expr(ExprKind::Update(op, false, arg), at));
        }
        Ok(arg)
    }

    fn parse_call_or_member(&mut self) -> Result<ExprRef, JSError> {
        let at = self.here();
        let mut expr = if self.at(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek_tok() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_property_name()?;
                    expr = self.expr(ExprKind::Property(expr, name), at);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression(true)?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = self.expr(ExprKind::Index(expr, index), at);
                }
                Some(Token::LParen) => {
                    let args = self.parse_arguments()?;
                    expr = self.expr(ExprKind::Call(expr, args), at);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `new` binds to the member chain of its callee; arguments are optional.
    fn parse_new(&mut self) -> Result<ExprRef, JSError> {
        let at = self.here();
        self.expect(&Token::New, "'new'")?;
        let mut callee = if self.at(&Token::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek_tok() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_property_name()?;
                    callee = self.expr(ExprKind::Property(callee, name), at);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression(true)?;
                    self.expect(&Token::RBracket, "']'")?;
                    callee = self.expr(ExprKind::Index(callee, index), at);
                }
                _ => break,
            }
        }
        let args = if self.at(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(self.expr(ExprKind::New(callee, args), at))
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExprRef>, JSError> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                args.push(self.parse_assignment(true)?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(args)
    }

    /// A property name after `.` — keywords are allowed there.
    fn expect_property_name(&mut self) -> Result<Rc<str>, JSError> {
        match self.peek_tok() {
            Some(Token::Identifier(name)) => {
                let name: Rc<str> = Rc::from(name.as_str());
                self.pos += 1;
                Ok(name)
            }
            Some(tok) => {
                if let Some(word) = tok.as_identifier_string() {
                    self.pos += 1;
                    Ok(Rc::from(word))
                } else {
                    Err(self.error("expected property name"))
                }
            }
            None => Err(self.error("expected property name")),
        }
    }

    fn parse_primary(&mut self) -> Result<ExprRef, JSError> {
        let at = self.here();
        let Some(item) = self.peek().cloned() else {
            return Err(self.error("unexpected end of input"));
        };
        match item.tok {
            Token::Number(n) => {
                self.pos += 1;
                Ok(self.expr(ExprKind::Number(n), at))
            }
            Token::StringLit(s) => {
                self.pos += 1;
                Ok(self.expr(ExprKind::StringLit(Rc::from(s.as_str())), at))
            }
            Token::Regex(source, flags) => {
                self.pos += 1;
                Ok(self.expr(
                    ExprKind::Regex(Rc::from(source.as_str()), Rc::from(flags.as_str())),
                    at,
                ))
            }
            Token::True => {
                self.pos += 1;
                Ok(self.expr(ExprKind::Boolean(true), at))
            }
            Token::False => {
                self.pos += 1;
                Ok(self.expr(ExprKind::Boolean(false), at))
            }
            Token::Null => {
                self.pos += 1;
                Ok(self.expr(ExprKind::Null, at))
            }
            Token::This => {
                self.pos += 1;
                Ok(self.expr(ExprKind::This, at))
            }
            Token::Identifier(name) => {
                self.pos += 1;
                Ok(self.expr(ExprKind::Ident(Rc::from(name.as_str())), at))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expression(true)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => self.parse_array_literal(at),
            Token::LBrace => self.parse_object_literal(at),
            Token::Function => {
                self.pos += 1;
                let func = self.parse_function(false, at)?;
                Ok(self.expr(ExprKind::Function(func), at))
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_array_literal(&mut self, at: (u32, u32)) -> Result<ExprRef, JSError> {
        self.expect(&Token::LBracket, "'['")?;
        let mut elements = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                break;
            }
            if self.eat(&Token::Comma) {
                elements.push(None); // elision
                continue;
            }
            elements.push(Some(self.parse_assignment(true)?));
            if self.eat(&Token::RBracket) {
                break;
            }
            self.expect(&Token::Comma, "',' in array literal")?;
            // trailing comma: `[1, 2,]` has length 2
            if self.eat(&Token::RBracket) {
                break;
            }
        }
        Ok(self.expr(ExprKind::Array(elements), at))
    }

    fn parse_object_literal(&mut self, at: (u32, u32)) -> Result<ExprRef, JSError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut properties = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            let prop_at = self.here();
            let kind = match self.peek_tok() {
                Some(Token::Identifier(word))
                    if (word == "get" || word == "set")
                        && !matches!(
                            self.peek_tok_at(1),
                            Some(Token::Colon) | Some(Token::Comma) | Some(Token::RBrace) | None
                        ) =>
                {
                    let kind = if word == "get" {
                        PropertyKind::Get
                    } else {
                        PropertyKind::Set
                    };
                    self.pos += 1;
                    kind
                }
                _ => PropertyKind::Init,
            };
            let key = self.parse_property_key()?;
            let value = match kind {
                PropertyKind::Init => {
                    self.expect(&Token::Colon, "':' in object literal")?;
                    self.parse_assignment(true)?
                }
                PropertyKind::Get | PropertyKind::Set => {
                    let func = self.parse_function_tail_for_accessor(prop_at)?;
                    if kind == PropertyKind::Get && !func_params_len_is(&func, 0) {
                        return Err(self.error("getter must not declare parameters"));
                    }
                    if kind == PropertyKind::Set && !func_params_len_is(&func, 1) {
                        return Err(self.error("setter must declare exactly one parameter"));
                    }
                    self.expr(ExprKind::Function(func), prop_at)
                }
            };
            properties.push(ObjectProperty { key, kind, value });
            if self.eat(&Token::RBrace) {
                break;
            }
            self.expect(&Token::Comma, "',' in object literal")?;
        }
        Ok(self.expr(ExprKind::Object(properties), at))
    }

    /// Accessor bodies reuse the function grammar minus the `function` keyword.
    fn parse_function_tail_for_accessor(
        &mut self,
        at: (u32, u32),
    ) -> Result<Rc<FunctionNode>, JSError> {
        self.parse_function(false, at)
    }

    fn parse_property_key(&mut self) -> Result<Rc<str>, JSError> {
        match self.peek_tok().cloned() {
            Some(Token::Identifier(name)) => {
                self.pos += 1;
                Ok(Rc::from(name.as_str()))
            }
            Some(Token::StringLit(s)) => {
                self.pos += 1;
                Ok(Rc::from(s.as_str()))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Rc::from(crate::js_number::format_number(n).as_str()))
            }
            Some(tok) => {
                if let Some(word) = tok.as_identifier_string() {
                    self.pos += 1;
                    Ok(Rc::from(word))
                } else {
                    Err(self.error("expected property key"))
                }
            }
            None => Err(self.error("expected property key")),
        }
    }
}

#[derive(Clone, Copy)]
enum BinaryOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn func_params_len_is(func: &Rc<FunctionNode>, len: usize) -> bool {
    func.params.len() == len
}

fn is_assignment_target(expr: &ExprRef) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_) | ExprKind::Property(..) | ExprKind::Index(..)
    )
}
