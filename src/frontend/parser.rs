//! Parser for Carbide
//!
//! Recursive descent parser with Pratt parsing for expressions. The only
//! lookahead-driven disambiguations are `Name { ... }` struct literals
//! (suppressed in loop/match header position) and the trailing-closure
//! form `recv.method { ... }`.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{StringPart, Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Whether `Name { ... }` may be read as a struct literal here
    struct_allowed: bool,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(lexer: Lexer) -> Result<Self> {
        Ok(Self {
            tokens: lexer.tokenize()?,
            pos: 0,
            struct_allowed: true,
        })
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            struct_allowed: true,
        }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("tokens should not be empty"))
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("{:?}", expected),
                got: format!("{:?}", self.current_kind()),
                span: self.current_span(),
            })
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_ident(&mut self) -> Result<String> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(Error::ExpectedIdent { span: token.span }),
        }
    }

    // ==================== Program and Statements ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_stmt()?);
        }

        Ok(Program { statements })
    }

    /// Parse a single statement
    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::Let => self.parse_let(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Return => self.parse_return(),
            TokenKind::Export => self.parse_export(),
            TokenKind::Extern => self.parse_extern(),
            TokenKind::Struct => self.parse_struct_def(),
            TokenKind::Enum => self.parse_enum_def(),
            TokenKind::Trait => self.parse_trait_decl(),
            TokenKind::Impl => self.parse_impl_block(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                let span = self.advance().span;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Break { span })
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Continue { span })
            }
            TokenKind::Import => self.parse_import(),
            _ => {
                let span = self.current_span();
                let expr = self.parse_expr()?;
                // Brace-terminated expressions close themselves
                let needs_semi = !matches!(
                    expr,
                    Expr::Function(_) | Expr::Match { .. } | Expr::Unsafe { .. }
                );
                if needs_semi {
                    self.expect(TokenKind::Semicolon)?;
                } else {
                    self.consume(&TokenKind::Semicolon);
                }
                Ok(Stmt::Expression { expr, span })
            }
        }
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Let)?.span;
        let mutable = self.consume(&TokenKind::Mut);
        let name = self.parse_ident()?;

        let annotation = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Stmt::Let(LetStmt {
            name,
            mutable,
            annotation,
            value,
            span,
        }))
    }

    /// Parse a braced block
    fn parse_block(&mut self) -> Result<Block> {
        let span = self.expect(TokenKind::LBrace)?.span;
        // A fresh block resets header-position restrictions
        let saved = self.struct_allowed;
        self.struct_allowed = true;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;

        self.struct_allowed = saved;
        Ok(Block { statements, span })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Return)?.span;
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Return { value, span })
    }

    fn parse_export(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Export)?.span;
        let inner = Box::new(self.parse_stmt()?);
        Ok(Stmt::Export { inner, span })
    }

    fn parse_extern(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Extern)?.span;
        self.expect(TokenKind::Fn)?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_type()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(Stmt::Extern(ExternDecl {
            name,
            params,
            ret,
            span,
        }))
    }

    fn parse_type_param_names(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.consume(&TokenKind::Lt) {
            while !self.check(&TokenKind::Gt) && !self.is_at_end() {
                names.push(self.parse_ident()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
        }
        Ok(names)
    }

    fn parse_struct_def(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Struct)?.span;
        let name = self.parse_ident()?;
        let type_params = self.parse_type_param_names()?;

        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_span = self.current_span();
            let field_name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push(FieldDef {
                name: field_name,
                ty,
                span: field_span,
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::StructDef(StructDef {
            name,
            type_params,
            fields,
            span,
        }))
    }

    fn parse_enum_def(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Enum)?.span;
        let name = self.parse_ident()?;
        let type_params = self.parse_type_param_names()?;

        self.expect(TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let variant_span = self.current_span();
            let variant_name = self.parse_ident()?;
            let mut fields = Vec::new();
            if self.consume(&TokenKind::LParen) {
                while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                    fields.push(self.parse_type()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            variants.push(VariantDef {
                name: variant_name,
                fields,
                span: variant_span,
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::EnumDef(EnumDef {
            name,
            type_params,
            variants,
            span,
        }))
    }

    fn parse_trait_decl(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Trait)?.span;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let sig_span = self.expect(TokenKind::Fn)?.span;
            let method_name = self.parse_ident()?;
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                params.push(self.parse_type()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            let ret = if self.consume(&TokenKind::Arrow) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon)?;
            methods.push(TraitMethodSig {
                name: method_name,
                params,
                ret,
                span: sig_span,
            });
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::TraitDecl(TraitDecl {
            name,
            methods,
            span,
        }))
    }

    fn parse_impl_block(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Impl)?.span;
        let first = self.parse_ident()?;

        // `impl Trait for Target` vs `impl Target`
        let (trait_name, target) = if self.check(&TokenKind::For) {
            self.advance();
            (Some(first), self.parse_ident()?)
        } else {
            (None, first)
        };

        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_fn_literal()? {
                Expr::Function(f) => methods.push(f),
                _ => unreachable!("parse_fn_literal returns a function"),
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::ImplBlock(ImplBlock {
            trait_name,
            target,
            methods,
            span,
        }))
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::While)?.span;
        let cond = self.parse_expr_no_struct()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, span })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::For)?.span;
        let var = self.parse_ident()?;
        self.expect(TokenKind::In)?;
        let iter = self.parse_expr_no_struct()?;
        let body = self.parse_block()?;
        Ok(Stmt::For(ForStmt {
            var,
            iter,
            body,
            span,
        }))
    }

    fn parse_import(&mut self) -> Result<Stmt> {
        let span = self.expect(TokenKind::Import)?.span;
        self.expect(TokenKind::LBrace)?;
        let mut names = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            names.push(self.parse_ident()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::From)?;

        let specifier = match self.advance() {
            Token {
                kind: TokenKind::StringLit(s),
                ..
            } => s,
            token => {
                return Err(Error::UnexpectedToken {
                    expected: "module path string".to_string(),
                    got: format!("{:?}", token.kind),
                    span: token.span,
                })
            }
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(Stmt::Import(ImportDecl {
            names,
            specifier,
            span,
        }))
    }

    // ==================== Types ====================

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let span = self.current_span();

        // Pointer type
        if self.consume(&TokenKind::Star) {
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Pointer {
                elem: Box::new(elem),
                span,
            });
        }

        // Function type
        if self.consume(&TokenKind::Fn) {
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                params.push(self.parse_type()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            let ret = if self.consume(&TokenKind::Arrow) {
                self.parse_type()?
            } else {
                TypeExpr::named("void", span)
            };
            return Ok(TypeExpr::Function {
                params,
                ret: Box::new(ret),
                span,
            });
        }

        let name = self.parse_ident()?;
        let mut args = Vec::new();
        if self.consume(&TokenKind::Lt) {
            while !self.check(&TokenKind::Gt) && !self.is_at_end() {
                args.push(self.parse_type()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
        }

        Ok(TypeExpr::Named { name, args, span })
    }

    // ==================== Expressions ====================

    /// Parse an expression
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// Parse an expression where `Name { ... }` must not be read as a
    /// struct literal (while/for/match headers)
    fn parse_expr_no_struct(&mut self) -> Result<Expr> {
        let saved = self.struct_allowed;
        self.struct_allowed = false;
        let result = self.parse_expr_bp(0);
        self.struct_allowed = saved;
        result
    }

    /// Pratt precedence-climbing loop
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let Some(bp) = self.current_kind().binary_precedence() else {
                break;
            };
            if bp < min_bp {
                break;
            }

            let span = lhs.span();
            if self.check(&TokenKind::As) {
                self.advance();
                let target = self.parse_type()?;
                lhs = Expr::Cast {
                    value: Box::new(lhs),
                    target,
                    span,
                };
                continue;
            }

            let op_token = self.advance();
            match op_token.kind {
                // Assignment is right-associative
                TokenKind::Eq => {
                    let value = self.parse_expr_bp(bp)?;
                    lhs = Expr::Assign {
                        target: Box::new(lhs),
                        value: Box::new(value),
                        span,
                    };
                }
                TokenKind::DotDot => {
                    let end = self.parse_expr_bp(bp + 1)?;
                    lhs = Expr::Range {
                        start: Box::new(lhs),
                        end: Box::new(end),
                        span,
                    };
                }
                kind => {
                    let op = Self::bin_op_for(&kind);
                    let rhs = self.parse_expr_bp(bp + 1)?;
                    lhs = Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        span,
                    };
                }
            }
        }

        Ok(lhs)
    }

    fn bin_op_for(kind: &TokenKind) -> BinOp {
        match kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::AndAnd => BinOp::And,
            TokenKind::OrOr => BinOp::Or,
            other => unreachable!("not a binary operator: {:?}", other),
        }
    }

    /// Prefix operators bind tighter than any binary operator
    fn parse_unary(&mut self) -> Result<Expr> {
        let span = self.current_span();
        let op = match self.current_kind() {
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::And => Some(UnaryOp::AddrOf),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            });
        }

        self.parse_postfix()
    }

    /// Primary expression followed by postfix operators
    /// (call, member/method, index, `?`)
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_kind() {
                TokenKind::LParen => {
                    let span = expr.span();
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        generic_args: Vec::new(),
                        args,
                        span,
                    };
                }
                TokenKind::Dot => {
                    expr = self.parse_member_or_method(expr)?;
                }
                TokenKind::LBracket => {
                    let span = expr.span();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenKind::Question => {
                    let span = expr.span();
                    self.advance();
                    expr = Expr::Question {
                        operand: Box::new(expr),
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let saved = self.struct_allowed;
        self.struct_allowed = true;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            args.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.struct_allowed = saved;
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_member_or_method(&mut self, receiver: Expr) -> Result<Expr> {
        let span = receiver.span();
        self.expect(TokenKind::Dot)?;
        let name = self.parse_ident()?;

        if self.check(&TokenKind::LParen) {
            let args = self.parse_call_args()?;
            return Ok(Expr::MethodCall {
                receiver: Box::new(receiver),
                method: name,
                args,
                span,
            });
        }

        // Trailing closure: `recv.method { it * 2 }`
        if self.check(&TokenKind::LBrace) && self.struct_allowed {
            let closure = self.parse_brace_closure()?;
            return Ok(Expr::MethodCall {
                receiver: Box::new(receiver),
                method: name,
                args: vec![closure],
                span,
            });
        }

        Ok(Expr::Member {
            object: Box::new(receiver),
            field: name,
            span,
        })
    }

    /// An implicit-`it` closure written as a bare block
    fn parse_brace_closure(&mut self) -> Result<Expr> {
        let span = self.current_span();
        let body = self.parse_closure_body()?;
        Ok(Expr::Closure(ClosureLit {
            params: Vec::new(),
            implicit_it: true,
            ret: None,
            body,
            captures: Vec::new(),
            inferred_ret: None,
            span,
        }))
    }

    /// Closure body: a block, or a bare expression wrapped in one
    fn parse_closure_body(&mut self) -> Result<Block> {
        if self.check(&TokenKind::LBrace) {
            let span = self.current_span();
            self.expect(TokenKind::LBrace)?;
            let saved = self.struct_allowed;
            self.struct_allowed = true;
            let mut statements = Vec::new();
            while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                // A trailing expression without `;` is the closure's value
                let stmt_span = self.current_span();
                if self.stmt_starts_here() {
                    statements.push(self.parse_stmt()?);
                } else {
                    let expr = self.parse_expr()?;
                    if self.consume(&TokenKind::Semicolon) || self.check(&TokenKind::RBrace) {
                        statements.push(Stmt::Expression {
                            expr,
                            span: stmt_span,
                        });
                    } else {
                        return Err(Error::UnexpectedToken {
                            expected: "`;` or `}`".to_string(),
                            got: format!("{:?}", self.current_kind()),
                            span: self.current_span(),
                        });
                    }
                }
            }
            self.struct_allowed = saved;
            self.expect(TokenKind::RBrace)?;
            Ok(Block { statements, span })
        } else {
            let span = self.current_span();
            let expr = self.parse_expr()?;
            Ok(Block {
                statements: vec![Stmt::Expression { expr, span }],
                span,
            })
        }
    }

    /// Whether the current token begins a non-expression statement
    fn stmt_starts_here(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Let
                | TokenKind::Return
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Trait
                | TokenKind::Impl
                | TokenKind::Extern
                | TokenKind::Export
                | TokenKind::Import
        )
    }

    // ==================== Primary Expressions ====================

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let span = token.span;

        match token.kind {
            TokenKind::IntLit(value) => {
                self.advance();
                Ok(Expr::IntLit { value, span })
            }
            TokenKind::FloatLit(value) => {
                self.advance();
                Ok(Expr::FloatLit { value, span })
            }
            TokenKind::StringLit(value) => {
                self.advance();
                Ok(Expr::StringLit { value, span })
            }
            TokenKind::InterpLit(parts) => {
                self.advance();
                self.parse_interp_parts(parts, span)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLit { value: true, span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLit { value: false, span })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::NullLit { span })
            }
            TokenKind::LParen => {
                self.advance();
                let saved = self.struct_allowed;
                self.struct_allowed = true;
                let expr = self.parse_expr()?;
                self.struct_allowed = saved;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_vec_literal(),
            TokenKind::Pipe | TokenKind::OrOr => self.parse_closure(),
            TokenKind::Unsafe => {
                self.advance();
                let body = self.parse_block()?;
                Ok(Expr::Unsafe { body, span })
            }
            TokenKind::Match => self.parse_match(),
            TokenKind::Fn => self.parse_fn_literal(),
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_ident_expr(name, span)
            }
            other => Err(Error::UnexpectedToken {
                expected: "expression".to_string(),
                got: format!("{:?}", other),
                span,
            }),
        }
    }

    fn parse_interp_parts(&mut self, parts: Vec<StringPart>, span: Span) -> Result<Expr> {
        let mut out = Vec::new();
        for part in parts {
            match part {
                StringPart::Lit(text) => out.push(InterpPart::Lit(text)),
                StringPart::Expr(src) => {
                    let mut sub = Parser::new(Lexer::new(&src))?;
                    let expr = sub.parse_expr()?;
                    out.push(InterpPart::Expr(expr));
                }
            }
        }
        Ok(Expr::InterpString { parts: out, span })
    }

    fn parse_vec_literal(&mut self) -> Result<Expr> {
        let span = self.expect(TokenKind::LBracket)?.span;
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            elements.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::VecLit { elements, span })
    }

    /// `|a, b: int| -> int { ... }` or `|a| a + 1`; `||` for no parameters
    fn parse_closure(&mut self) -> Result<Expr> {
        let span = self.current_span();
        let mut params = Vec::new();

        if self.consume(&TokenKind::OrOr) {
            // empty parameter list
        } else {
            self.expect(TokenKind::Pipe)?;
            while !self.check(&TokenKind::Pipe) && !self.is_at_end() {
                let param_span = self.current_span();
                let name = self.parse_ident()?;
                let annotation = if self.consume(&TokenKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                params.push(ClosureParam {
                    name,
                    annotation,
                    inferred: None,
                    span: param_span,
                });
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Pipe)?;
        }

        let ret = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_closure_body()?;

        Ok(Expr::Closure(ClosureLit {
            params,
            implicit_it: false,
            ret,
            body,
            captures: Vec::new(),
            inferred_ret: None,
            span,
        }))
    }

    fn parse_match(&mut self) -> Result<Expr> {
        let span = self.expect(TokenKind::Match)?.span;
        let scrutinee = self.parse_expr_no_struct()?;
        self.expect(TokenKind::LBrace)?;

        let mut arms = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let arm_span = self.current_span();
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::FatArrow)?;
            let body = if self.check(&TokenKind::LBrace) {
                self.parse_block()?
            } else {
                let body_span = self.current_span();
                let expr = self.parse_expr()?;
                Block {
                    statements: vec![Stmt::Expression {
                        expr,
                        span: body_span,
                    }],
                    span: body_span,
                }
            };
            arms.push(MatchArm {
                pattern,
                body,
                span: arm_span,
            });
            self.consume(&TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            span,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Underscore => {
                self.advance();
                Ok(Pattern::Wildcard { span })
            }
            TokenKind::Ident(first) => {
                self.advance();
                let (enum_name, variant) = if self.consume(&TokenKind::ColonColon) {
                    (Some(first), self.parse_ident()?)
                } else {
                    (None, first)
                };

                let mut bindings = Vec::new();
                if self.consume(&TokenKind::LParen) {
                    while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                        bindings.push(self.parse_ident()?);
                        if !self.consume(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                }

                Ok(Pattern::Variant {
                    enum_name,
                    variant,
                    bindings,
                    span,
                })
            }
            TokenKind::IntLit(_)
            | TokenKind::FloatLit(_)
            | TokenKind::StringLit(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::Minus => {
                let expr = self.parse_unary()?;
                Ok(Pattern::Literal(expr))
            }
            _ => Err(Error::ExpectedPattern { span }),
        }
    }

    /// `fn [name]<T: Bound, ...>(params) [-> Ret] { body }`
    fn parse_fn_literal(&mut self) -> Result<Expr> {
        let span = self.expect(TokenKind::Fn)?.span;

        let name = match self.current_kind() {
            TokenKind::Ident(_) => Some(self.parse_ident()?),
            _ => None,
        };

        let mut type_params = Vec::new();
        if self.consume(&TokenKind::Lt) {
            while !self.check(&TokenKind::Gt) && !self.is_at_end() {
                let tp_span = self.current_span();
                let tp_name = self.parse_ident()?;
                let mut bounds = Vec::new();
                if self.consume(&TokenKind::Colon) {
                    loop {
                        bounds.push(self.parse_ident()?);
                        if !self.consume(&TokenKind::Plus) {
                            break;
                        }
                    }
                }
                type_params.push(TypeParam {
                    name: tp_name,
                    bounds,
                    span: tp_span,
                });
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
        }

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let param_span = self.current_span();
            let param_name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            params.push(Param {
                name: param_name,
                ty,
                span: param_span,
            });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Expr::Function(FunctionLit {
            name,
            type_params,
            params,
            ret,
            body,
            span,
        }))
    }

    /// An identifier in expression position: a plain reference, an explicit
    /// generic call `f::<T>(...)`, a static call `Recv::method(...)`
    /// (with optional `Recv::<T, ...>`), or a struct literal `Name { ... }`.
    fn parse_ident_expr(&mut self, name: String, span: Span) -> Result<Expr> {
        if self.check(&TokenKind::ColonColon) {
            self.advance();

            // `Name::<T, ...>` - generic arguments for the receiver or callee
            if self.consume(&TokenKind::Lt) {
                let mut generic_args = Vec::new();
                while !self.check(&TokenKind::Gt) && !self.is_at_end() {
                    generic_args.push(self.parse_type()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::Gt)?;

                // `Vec::<int>::new()`
                if self.consume(&TokenKind::ColonColon) {
                    let method = self.parse_ident()?;
                    let args = if self.check(&TokenKind::LParen) {
                        self.parse_call_args()?
                    } else {
                        Vec::new()
                    };
                    return Ok(Expr::StaticCall {
                        receiver: name,
                        receiver_args: generic_args,
                        method,
                        args,
                        span,
                    });
                }

                // `Point::<int> { ... }`
                if self.check(&TokenKind::LBrace) && self.struct_allowed {
                    return self.parse_struct_literal(name, generic_args, span);
                }

                // `f::<int>(...)`
                let args = self.parse_call_args()?;
                return Ok(Expr::Call {
                    callee: Box::new(Expr::Ident {
                        name,
                        span,
                    }),
                    generic_args,
                    args,
                    span,
                });
            }

            // `Recv::method[(args)]` - parens optional for nullary variants
            let method = self.parse_ident()?;
            let args = if self.check(&TokenKind::LParen) {
                self.parse_call_args()?
            } else {
                Vec::new()
            };
            return Ok(Expr::StaticCall {
                receiver: name,
                receiver_args: Vec::new(),
                method,
                args,
                span,
            });
        }

        // Struct literal: `Name { field: ..., }` - requires field syntax or
        // an empty body so blocks are not swallowed
        if self.check(&TokenKind::LBrace) && self.struct_allowed && self.looks_like_struct_body() {
            return self.parse_struct_literal(name, Vec::new(), span);
        }

        Ok(Expr::Ident { name, span })
    }

    fn looks_like_struct_body(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::RBrace) => true,
            Some(TokenKind::Ident(_)) => {
                matches!(self.peek_kind_at(2), Some(TokenKind::Colon))
            }
            _ => false,
        }
    }

    fn parse_struct_literal(
        &mut self,
        name: String,
        generic_args: Vec<TypeExpr>,
        span: Span,
    ) -> Result<Expr> {
        self.expect(TokenKind::LBrace)?;
        let saved = self.struct_allowed;
        self.struct_allowed = true;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push((field_name, value));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.struct_allowed = saved;
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::StructLit {
            name,
            generic_args,
            fields,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        let mut parser = Parser::new(Lexer::new(source)).expect("lex failure");
        parser.parse_program().expect("parse failure")
    }

    fn parse_single_expr(source: &str) -> Expr {
        let program = parse(source);
        match program.statements.into_iter().next() {
            Some(Stmt::Expression { expr, .. }) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn parses_let_with_annotation() {
        let program = parse("let mut total: int = 0;");
        match &program.statements[0] {
            Stmt::Let(decl) => {
                assert_eq!(decl.name, "total");
                assert!(decl.mutable);
                assert!(decl.annotation.is_some());
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let expr = parse_single_expr("1 + 2 * 3;");
        match expr {
            Expr::Binary {
                op: BinOp::Add,
                rhs,
                ..
            } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected addition at the root, got {:?}", other),
        }
    }

    #[test]
    fn trailing_closure_becomes_method_arg() {
        let expr = parse_single_expr("[1, 2, 3].map { it * 2 };");
        match expr {
            Expr::MethodCall { method, args, .. } => {
                assert_eq!(method, "map");
                assert_eq!(args.len(), 1);
                match &args[0] {
                    Expr::Closure(c) => {
                        assert!(c.implicit_it);
                        assert!(c.params.is_empty());
                    }
                    other => panic!("expected closure argument, got {:?}", other),
                }
            }
            other => panic!("expected method call, got {:?}", other),
        }
    }

    #[test]
    fn turbofish_static_call() {
        let expr = parse_single_expr("Vec::<int>::new();");
        match expr {
            Expr::StaticCall {
                receiver,
                receiver_args,
                method,
                args,
                ..
            } => {
                assert_eq!(receiver, "Vec");
                assert_eq!(receiver_args.len(), 1);
                assert_eq!(method, "new");
                assert!(args.is_empty());
            }
            other => panic!("expected static call, got {:?}", other),
        }
    }

    #[test]
    fn explicit_generic_call() {
        let expr = parse_single_expr("describe::<int>(5);");
        match expr {
            Expr::Call {
                callee,
                generic_args,
                args,
                ..
            } => {
                assert!(matches!(*callee, Expr::Ident { ref name, .. } if name == "describe"));
                assert_eq!(generic_args.len(), 1);
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn while_condition_is_not_a_struct_literal() {
        let program = parse("while running { break; }");
        match &program.statements[0] {
            Stmt::While { cond, body, .. } => {
                assert!(matches!(cond, Expr::Ident { .. }));
                assert_eq!(body.statements.len(), 1);
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn match_with_variant_patterns() {
        let expr = parse_single_expr(
            "match result { Ok(value) => value, Err(e) => 0, _ => 1, }",
        );
        match expr {
            Expr::Match { arms, .. } => {
                assert_eq!(arms.len(), 3);
                assert!(matches!(
                    &arms[0].pattern,
                    Pattern::Variant { variant, bindings, .. }
                        if variant == "Ok" && bindings == &vec!["value".to_string()]
                ));
                assert!(matches!(&arms[2].pattern, Pattern::Wildcard { .. }));
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[test]
    fn fn_literal_with_bounds() {
        let expr = parse_single_expr("fn largest<T: Comparable + Printable>(a: T) -> T { return a; }");
        match expr {
            Expr::Function(f) => {
                assert_eq!(f.name.as_deref(), Some("largest"));
                assert_eq!(f.type_params.len(), 1);
                assert_eq!(f.type_params[0].bounds, vec!["Comparable", "Printable"]);
            }
            other => panic!("expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn interpolated_string_parses_embedded_expr() {
        let expr = parse_single_expr(r#""total: ${count + 1}";"#);
        match expr {
            Expr::InterpString { parts, .. } => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[1], InterpPart::Expr(Expr::Binary { .. })));
            }
            other => panic!("expected interpolated string, got {:?}", other),
        }
    }

    #[test]
    fn import_statement() {
        let program = parse(r#"import { helper, Config } from "./util";"#);
        match &program.statements[0] {
            Stmt::Import(import) => {
                assert_eq!(import.names, vec!["helper", "Config"]);
                assert_eq!(import.specifier, "./util");
            }
            other => panic!("expected import, got {:?}", other),
        }
    }
}
