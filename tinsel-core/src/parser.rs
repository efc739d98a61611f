//! Recursive-descent parser producing a [`Program`].
//!
//! Binary operators are parsed by precedence climbing over a fixed level
//! table, so every token sequence has at most one parse. Statement breaks
//! (newline or `;`) are significant at statement level and ignored inside
//! parentheses and brackets, after binary operators and around the
//! punctuation that cannot end a statement.

use crate::ast::{
    Args, AssignOp, BinOp, ExprArena, ExprId, ExprKind, FnDef, Input, Mutability, NamedArg,
    Param, ProcDef, Program, RenderBlock, Stmt, StmtId, StmtKind, UnaryOp, VarDecl,
};
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind, lex};
use crate::span::Span;
use crate::types::Type;

/// Binary operator levels, lowest precedence first.
const LEVELS: &[&[(TokenKind, BinOp)]] = &[
    &[(TokenKind::PipePipe, BinOp::Or)],
    &[(TokenKind::CaretCaret, BinOp::Xor)],
    &[(TokenKind::AmpAmp, BinOp::And)],
    &[(TokenKind::Pipe, BinOp::BitOr)],
    &[(TokenKind::Caret, BinOp::BitXor)],
    &[(TokenKind::Amp, BinOp::BitAnd)],
    &[
        (TokenKind::EqualEqual, BinOp::Eq),
        (TokenKind::BangEqual, BinOp::NotEq),
    ],
    &[
        (TokenKind::Less, BinOp::Less),
        (TokenKind::Greater, BinOp::Greater),
        (TokenKind::LessEqual, BinOp::LessEq),
        (TokenKind::GreaterEqual, BinOp::GreaterEq),
    ],
    &[(TokenKind::Shl, BinOp::Shl), (TokenKind::Shr, BinOp::Shr)],
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
    &[
        (TokenKind::Star, BinOp::Mul),
        (TokenKind::Slash, BinOp::Div),
        (TokenKind::Percent, BinOp::Mod),
    ],
];

pub fn parse(input: &str) -> Result<Program, CompileError> {
    let tokens = lex(input)?;
    log::debug!("lexed {} tokens", tokens.len());
    let mut parser = Parser::new(tokens);
    let body = parser.parse_program()?;
    Ok(Program {
        exprs: parser.exprs,
        body,
    })
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    position: usize,
    /// Depth of open `(` / `[`; breaks are insignificant while positive.
    nesting: u32,
    exprs: ExprArena,
    next_stmt: u32,
}

impl<'src> Parser<'src> {
    fn new(tokens: Vec<Token<'src>>) -> Self {
        Parser {
            tokens,
            position: 0,
            nesting: 0,
            exprs: ExprArena::default(),
            next_stmt: 0,
        }
    }

    // ------------------------------------------------------------------
    // token cursor
    // ------------------------------------------------------------------

    fn peek(&mut self) -> Token<'src> {
        if self.nesting > 0 {
            self.skip_breaks();
        }
        self.tokens[self.position]
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    /// Kind of the token after the current one, without consuming.
    fn peek_second(&mut self) -> TokenKind {
        self.peek();
        self.tokens
            .get(self.position + 1)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    /// Kind of the next non-break token, without consuming.
    fn peek_past_breaks(&self) -> TokenKind {
        self.tokens[self.position..]
            .iter()
            .find(|t| t.kind != TokenKind::Break)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn skip_breaks(&mut self) {
        while self.tokens[self.position].kind == TokenKind::Break {
            self.position += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'src>, CompileError> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(token, what))
        }
    }

    fn unexpected(&self, token: Token<'src>, what: &str) -> CompileError {
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Break => "end of statement".to_string(),
            _ => format!("'{}'", token.text),
        };
        CompileError::syntax(token.span, format!("expected {what}, found {found}"))
    }

    fn open(&mut self, kind: TokenKind, what: &str) -> Result<Token<'src>, CompileError> {
        let token = self.expect(kind, what)?;
        self.nesting += 1;
        Ok(token)
    }

    fn close(&mut self, kind: TokenKind, what: &str) -> Result<(), CompileError> {
        self.expect(kind, what)?;
        self.nesting -= 1;
        Ok(())
    }

    fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.alloc(kind, span)
    }

    fn stmt(&mut self, kind: StmtKind, span: Span) -> Stmt {
        let id = StmtId(self.next_stmt);
        self.next_stmt += 1;
        Stmt { id, kind, span }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn parse_program(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        loop {
            self.skip_breaks();
            if self.peek_kind() == TokenKind::Eof {
                break;
            }
            if self.peek_kind() == TokenKind::RBrace {
                let token = self.peek();
                return Err(CompileError::syntax(token.span, "unmatched '}'"));
            }
            body.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
        Ok(body)
    }

    /// Statements inside `{ ... }`; the opening brace is already consumed.
    fn parse_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        loop {
            self.skip_breaks();
            match self.peek_kind() {
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(body);
                }
                TokenKind::Eof => {
                    let token = self.peek();
                    return Err(self.unexpected(token, "'}'"));
                }
                _ => {}
            }
            body.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
    }

    fn expect_terminator(&mut self) -> Result<(), CompileError> {
        match self.peek_kind() {
            TokenKind::Break => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::RBrace => Ok(()),
            _ if self.position > 0
                && self.tokens[self.position - 1].kind == TokenKind::RBrace =>
            {
                Ok(())
            }
            _ => {
                let token = self.peek();
                Err(self.unexpected(token, "a newline or ';' after the statement"))
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        let token = self.peek();
        match token.kind {
            TokenKind::Def => self.parse_def(),
            TokenKind::Uniform => self.parse_uniform(),
            TokenKind::Fn => self.parse_function(token.span, None),
            TokenKind::Pr => self.parse_procedure(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(self.stmt(StmtKind::Return(value), token.span))
            }
            TokenKind::Refresh => {
                self.advance();
                Ok(self.stmt(StmtKind::Refresh, token.span))
            }
            TokenKind::Mut | TokenKind::Const => self.parse_decl(),
            TokenKind::LBrace | TokenKind::Loop | TokenKind::Once => {
                self.parse_render_block(token.span, None)
            }
            TokenKind::TypeName => {
                let save = self.position;
                let ty = self.parse_type()?;
                match self.peek_kind() {
                    TokenKind::Fn => self.parse_function(token.span, Some(ty)),
                    TokenKind::Ident => {
                        self.position = save;
                        self.parse_decl()
                    }
                    _ => {
                        self.position = save;
                        self.parse_simple_statement()
                    }
                }
            }
            TokenKind::Ident if self.peek_second() == TokenKind::ColonEqual => self.parse_decl(),
            _ => self.parse_simple_statement(),
        }
    }

    /// Expression statement, assignment, or a render block with an input
    /// number (`expr -> { ... }`).
    fn parse_simple_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.peek().span;
        let expr = self.parse_expr()?;

        if self.peek_kind() == TokenKind::Arrow {
            self.check_block_number(expr)?;
            self.advance();
            self.skip_breaks();
            return self.parse_render_block(start, Some(expr));
        }

        if let Some(op) = assign_op(self.peek_kind()) {
            self.advance();
            self.skip_breaks();
            let value = self.parse_expr()?;
            return Ok(self.stmt(
                StmtKind::Assign {
                    target: expr,
                    op,
                    value,
                },
                start,
            ));
        }

        Ok(self.stmt(StmtKind::Expr(expr), start))
    }

    fn parse_def(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance();
        let name = self.expect(TokenKind::Ident, "a name after 'def'")?;
        let value = self.parse_expr()?;
        Ok(self.stmt(
            StmtKind::Def {
                name: name.text.to_string(),
                value,
            },
            keyword.span,
        ))
    }

    fn parse_uniform(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance();
        let ty = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "a uniform name")?;
        Ok(self.stmt(
            StmtKind::Uniform {
                name: name.text.to_string(),
                ty,
            },
            keyword.span,
        ))
    }

    fn parse_decl(&mut self) -> Result<Stmt, CompileError> {
        let start = self.peek().span;
        let mutability = if self.eat(TokenKind::Mut) {
            Mutability::Mutable
        } else if self.eat(TokenKind::Const) {
            Mutability::Const
        } else {
            Mutability::Final
        };

        let ty = if self.peek_kind() == TokenKind::TypeName {
            Some(self.parse_type()?)
        } else {
            None
        };
        let name = self.expect(TokenKind::Ident, "a variable name")?;
        if ty.is_some() {
            self.expect(TokenKind::Equal, "'=' in a typed declaration")?;
        } else {
            self.expect(TokenKind::ColonEqual, "':=' in a declaration")?;
        }
        self.skip_breaks();
        let value = self.parse_expr()?;
        Ok(self.stmt(
            StmtKind::VarDecl(VarDecl {
                name: name.text.to_string(),
                mutability,
                ty,
                value,
            }),
            start,
        ))
    }

    fn parse_function(&mut self, start: Span, ret: Option<Type>) -> Result<Stmt, CompileError> {
        self.expect(TokenKind::Fn, "'fn'")?;
        let name = self.expect(TokenKind::Ident, "a function name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::LBrace, "'{' to open the function body")?;
        let body = self.parse_body()?;
        Ok(self.stmt(
            StmtKind::Function(FnDef {
                name: name.text.to_string(),
                ret,
                params,
                body,
            }),
            start,
        ))
    }

    fn parse_procedure(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance();
        let name = self.expect(TokenKind::Ident, "a procedure name")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::LBrace, "'{' to open the procedure body")?;
        let body = self.parse_body()?;
        Ok(self.stmt(
            StmtKind::Procedure(ProcDef {
                name: name.text.to_string(),
                params,
                body,
            }),
            keyword.span,
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.open(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                let ty = self.parse_type()?;
                let name = self.expect(TokenKind::Ident, "a parameter name")?;
                let default = if self.eat(TokenKind::Equal) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param {
                    name: name.text.to_string(),
                    span: name.span,
                    ty,
                    default,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.close(TokenKind::RParen, "',' or ')' in the parameter list")?;
        Ok(params)
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance();
        self.open(TokenKind::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.close(TokenKind::RParen, "')' after the condition")?;
        self.expect(TokenKind::LBrace, "'{' to open the if body")?;
        let then_body = self.parse_body()?;

        let else_body = if self.peek_past_breaks() == TokenKind::Else {
            self.skip_breaks();
            self.advance();
            if self.peek_kind() == TokenKind::If {
                Some(vec![self.parse_if()?])
            } else {
                self.expect(TokenKind::LBrace, "'{' or 'if' after 'else'")?;
                Some(self.parse_body()?)
            }
        } else {
            None
        };

        Ok(self.stmt(
            StmtKind::If {
                cond,
                then_body,
                else_body,
            },
            keyword.span,
        ))
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        let keyword = self.advance();
        // The header separators are break tokens, so parse it with
        // breaks significant.
        self.expect(TokenKind::LParen, "'(' after 'for'")?;

        let init = if self.peek_kind() == TokenKind::Break {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.expect(TokenKind::Break, "';' after the loop initializer")?;

        // `;;` lexes as a single break, so an empty condition may already
        // have consumed its separator.
        let cond = match self.peek_kind() {
            TokenKind::Break => {
                self.advance();
                None
            }
            TokenKind::RParen => None,
            _ => {
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Break, "';' after the loop condition")?;
                Some(cond)
            }
        };

        let update = if self.peek_kind() == TokenKind::RParen {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.expect(TokenKind::RParen, "')' after the loop header")?;

        self.expect(TokenKind::LBrace, "'{' to open the loop body")?;
        let body = self.parse_body()?;
        Ok(self.stmt(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            keyword.span,
        ))
    }

    fn parse_for_clause(&mut self) -> Result<Stmt, CompileError> {
        match self.peek_kind() {
            TokenKind::Mut | TokenKind::Const => self.parse_decl(),
            TokenKind::TypeName => self.parse_decl(),
            TokenKind::Ident if self.peek_second() == TokenKind::ColonEqual => self.parse_decl(),
            _ => self.parse_simple_statement(),
        }
    }

    fn parse_render_block(
        &mut self,
        start: Span,
        in_num: Option<ExprId>,
    ) -> Result<Stmt, CompileError> {
        let loop_num = if self.eat(TokenKind::Loop) {
            Some(self.parse_block_number()?)
        } else {
            None
        };
        let once = self.eat(TokenKind::Once);
        self.expect(TokenKind::LBrace, "'{' to open the render block")?;
        let body = self.parse_body()?;

        let out_num = if self.peek_past_breaks() == TokenKind::Arrow {
            self.skip_breaks();
            self.advance();
            self.skip_breaks();
            Some(self.parse_block_number()?)
        } else {
            None
        };

        Ok(self.stmt(
            StmtKind::RenderBlock(RenderBlock {
                once,
                in_num,
                out_num,
                loop_num,
                body,
            }),
            start,
        ))
    }

    fn parse_block_number(&mut self) -> Result<ExprId, CompileError> {
        let token = self.peek();
        match token.kind {
            TokenKind::IntLiteral | TokenKind::Ident => self.parse_primary(),
            _ => Err(self.unexpected(token, "an integer literal or identifier")),
        }
    }

    fn check_block_number(&self, expr: ExprId) -> Result<(), CompileError> {
        let node = &self.exprs[expr];
        match node.kind {
            ExprKind::Int(_) | ExprKind::Ident(_) => Ok(()),
            _ => Err(CompileError::syntax(
                node.span,
                "a render block input number must be an integer literal or identifier",
            )),
        }
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let token = self.expect(TokenKind::TypeName, "a type name")?;
        let base: Type = token
            .text
            .parse()
            .map_err(|message: String| CompileError::syntax(token.span, message))?;
        if self.peek_kind() != TokenKind::LBracket {
            return Ok(base);
        }
        self.open(TokenKind::LBracket, "'['")?;
        let size = if self.peek_kind() == TokenKind::IntLiteral {
            let size_token = self.advance();
            let size: usize = size_token.text.parse().map_err(|_| {
                CompileError::syntax(size_token.span, "array size is too large")
            })?;
            if size == 0 {
                return Err(CompileError::syntax(
                    size_token.span,
                    "array size must be greater than zero",
                ));
            }
            size
        } else {
            0
        };
        self.close(TokenKind::RBracket, "']' after the array size")?;
        Ok(Type::Array(Box::new(base), size))
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<ExprId, CompileError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<ExprId, CompileError> {
        let cond = self.parse_binary(0)?;
        if self.peek_kind() != TokenKind::Question {
            return Ok(cond);
        }
        let question = self.advance();
        self.skip_breaks();
        let then_expr = self.parse_ternary()?;
        if self.peek_past_breaks() == TokenKind::Colon {
            self.skip_breaks();
        }
        self.expect(TokenKind::Colon, "':' in a conditional expression")?;
        self.skip_breaks();
        let else_expr = self.parse_ternary()?;
        Ok(self.alloc(
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            question.span,
        ))
    }

    fn parse_binary(&mut self, level: usize) -> Result<ExprId, CompileError> {
        if level == LEVELS.len() {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let token = self.peek();
            let Some(&(_, op)) = LEVELS[level].iter().find(|(kind, _)| *kind == token.kind)
            else {
                break;
            };
            self.advance();
            self.skip_breaks();
            let right = self.parse_binary(level + 1)?;
            left = self.alloc(ExprKind::Binary { op, left, right }, token.span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprId, CompileError> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.alloc(ExprKind::Unary { op, operand }, token.span))
            }
            None => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_postfix(&mut self, mut expr: ExprId) -> Result<ExprId, CompileError> {
        loop {
            let token = self.peek();
            expr = match token.kind {
                TokenKind::LBracket => {
                    self.open(TokenKind::LBracket, "'['")?;
                    let index = self.parse_expr()?;
                    self.close(TokenKind::RBracket, "']' after the index")?;
                    self.alloc(ExprKind::Subscript { base: expr, index }, token.span)
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect(TokenKind::Ident, "a field or swizzle after '.'")?;
                    if field.text == "length" && self.peek_kind() == TokenKind::LParen {
                        self.open(TokenKind::LParen, "'('")?;
                        self.close(TokenKind::RParen, "')' after 'length('")?;
                        self.alloc(ExprKind::Length { base: expr }, field.span)
                    } else {
                        self.alloc(
                            ExprKind::Member {
                                base: expr,
                                field: field.text.to_string(),
                            },
                            field.span,
                        )
                    }
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    self.advance();
                    let op = if token.kind == TokenKind::PlusPlus {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    self.alloc(ExprKind::Unary { op, operand: expr }, token.span)
                }
                _ => return Ok(expr),
            };
        }
    }

    fn parse_primary(&mut self) -> Result<ExprId, CompileError> {
        let token = self.peek();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::FloatLiteral => {
                self.advance();
                ExprKind::Float(token.text.to_string())
            }
            TokenKind::IntLiteral => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| {
                    CompileError::syntax(span, "integer literal is too large")
                })?;
                ExprKind::Int(value)
            }
            TokenKind::UintLiteral => {
                self.advance();
                let digits = token.text.trim_end_matches('u');
                let value = digits.parse::<u64>().map_err(|_| {
                    CompileError::syntax(span, "unsigned integer literal is too large")
                })?;
                ExprKind::Uint(value)
            }
            TokenKind::BoolLiteral => {
                self.advance();
                ExprKind::Bool(token.text == "true")
            }
            TokenKind::StringLiteral => {
                self.advance();
                let (quoted, size) = match token.text.as_bytes().last() {
                    Some(b'3') => (&token.text[..token.text.len() - 1], 3),
                    Some(b'4') => (&token.text[..token.text.len() - 1], 4),
                    _ => (token.text, 4),
                };
                ExprKind::Color {
                    text: quoted[1..quoted.len() - 1].to_string(),
                    size,
                }
            }
            TokenKind::Ident => {
                self.advance();
                if self.peek_kind() == TokenKind::LParen {
                    let args = self.parse_args()?;
                    ExprKind::Call {
                        callee: token.text.to_string(),
                        args,
                    }
                } else {
                    ExprKind::Ident(token.text.to_string())
                }
            }
            TokenKind::TypeName => {
                let ty = self.parse_type()?;
                if self.peek_kind() != TokenKind::LParen {
                    let next = self.peek();
                    return Err(self.unexpected(next, "'(' to call the type constructor"));
                }
                let args = self.parse_args()?;
                ExprKind::Construct { ty, args }
            }
            TokenKind::Frag => {
                self.advance();
                let digits = &token.text["frag".len()..];
                let unit = if digits.is_empty() {
                    None
                } else {
                    Some(digits.parse::<u32>().map_err(|_| {
                        CompileError::syntax(span, "texture number is too large")
                    })?)
                };
                let args = if self.peek_kind() == TokenKind::LParen {
                    Some(self.parse_args()?)
                } else {
                    None
                };
                ExprKind::Frag { unit, args }
            }
            TokenKind::Prev => {
                self.advance();
                let uv = if self.peek_kind() == TokenKind::LParen {
                    self.open(TokenKind::LParen, "'('")?;
                    let uv = if self.peek_kind() == TokenKind::RParen {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.close(TokenKind::RParen, "')' after the prev coordinate")?;
                    uv
                } else {
                    None
                };
                ExprKind::Prev { uv }
            }
            TokenKind::Pos | TokenKind::NPos | TokenKind::Res | TokenKind::Time => {
                self.advance();
                ExprKind::Input(match token.kind {
                    TokenKind::Pos => Input::Pos,
                    TokenKind::NPos => Input::NPos,
                    TokenKind::Res => Input::Res,
                    _ => Input::Time,
                })
            }
            TokenKind::LParen => {
                self.open(TokenKind::LParen, "'('")?;
                let inner = self.parse_expr()?;
                self.close(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected(token, "an expression")),
        };
        Ok(self.alloc(kind, span))
    }

    fn parse_args(&mut self) -> Result<Args, CompileError> {
        self.open(TokenKind::LParen, "'('")?;
        let mut positional = Vec::new();
        let mut named = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                let token = self.peek();
                let is_named =
                    token.kind == TokenKind::Ident && self.peek_second() == TokenKind::Colon;
                if is_named {
                    if !positional.is_empty() {
                        return Err(CompileError::syntax(
                            token.span,
                            "cannot mix named and positional arguments",
                        ));
                    }
                    self.advance();
                    self.advance();
                    let value = self.parse_expr()?;
                    named.push(NamedArg {
                        name: token.text.to_string(),
                        span: token.span,
                        value,
                    });
                } else {
                    if !named.is_empty() {
                        return Err(CompileError::syntax(
                            token.span,
                            "cannot mix named and positional arguments",
                        ));
                    }
                    positional.push(self.parse_expr()?);
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.close(TokenKind::RParen, "',' or ')' in the argument list")?;
        Ok(if named.is_empty() {
            Args::Positional(positional)
        } else {
            Args::Named(named)
        })
    }
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Equal => return Some(AssignOp::Assign),
        TokenKind::PlusEqual => BinOp::Add,
        TokenKind::MinusEqual => BinOp::Sub,
        TokenKind::StarEqual => BinOp::Mul,
        TokenKind::SlashEqual => BinOp::Div,
        TokenKind::PercentEqual => BinOp::Mod,
        TokenKind::AmpEqual => BinOp::BitAnd,
        TokenKind::PipeEqual => BinOp::BitOr,
        TokenKind::CaretEqual => BinOp::BitXor,
        TokenKind::ShlEqual => BinOp::Shl,
        TokenKind::ShrEqual => BinOp::Shr,
        _ => return None,
    };
    Some(AssignOp::Compound(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_expr(source: &str) -> (Program, ExprId) {
        let program = parse(source).expect("parse");
        let id = match &program.body[0].kind {
            StmtKind::RenderBlock(block) => match &block.body[0].kind {
                StmtKind::Expr(id) => *id,
                other => panic!("unexpected statement: {other:?}"),
            },
            other => panic!("unexpected statement: {other:?}"),
        };
        (program, id)
    }

    /// Render an expression back with full parenthesisation.
    fn show(program: &Program, id: ExprId) -> String {
        match &program.exprs[id].kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(text) => text.clone(),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Binary { op, left, right } => format!(
                "({} {} {})",
                show(program, *left),
                op.symbol(),
                show(program, *right)
            ),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::PostInc | UnaryOp::PostDec => {
                    format!("({}{})", show(program, *operand), op.symbol())
                }
                _ => format!("({}{})", op.symbol(), show(program, *operand)),
            },
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "({} ? {} : {})",
                show(program, *cond),
                show(program, *then_expr),
                show(program, *else_expr)
            ),
            ExprKind::Member { base, field } => format!("{}.{field}", show(program, *base)),
            ExprKind::Subscript { base, index } => {
                format!("{}[{}]", show(program, *base), show(program, *index))
            }
            other => format!("{other:?}"),
        }
    }

    fn shown(source: &str) -> String {
        let (program, id) = only_expr(&format!("{{ {source} }}"));
        show(&program, id)
    }

    #[test]
    fn respects_precedence_and_left_associativity() {
        assert_eq!(shown("a + b * c"), "(a + (b * c))");
        assert_eq!(shown("a - b - c"), "((a - b) - c)");
        assert_eq!(shown("a << 1 + 2"), "(a << (1 + 2))");
        assert_eq!(shown("a || b ^^ c && d"), "(a || (b ^^ (c && d)))");
        assert_eq!(shown("a | b ^ c & d"), "(a | (b ^ (c & d)))");
        assert_eq!(shown("a == b < c"), "(a == (b < c))");
        assert_eq!(shown("-a.x[1]++"), "(-(a.x[1]++))");
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(shown("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
    }

    #[test]
    fn newlines_inside_parentheses_are_ignored() {
        assert_eq!(shown("(a +\n b\n )"), "(a + b)");
        assert_eq!(shown("a +\n b"), "(a + b)");
    }

    #[test]
    fn parses_render_block_routing() {
        let program = parse("1 -> loop 3 once { frag } -> 2").expect("parse");
        let StmtKind::RenderBlock(block) = &program.body[0].kind else {
            panic!("expected render block");
        };
        assert!(block.once);
        assert_eq!(program.exprs[block.in_num.expect("in")].kind, ExprKind::Int(1));
        assert_eq!(program.exprs[block.out_num.expect("out")].kind, ExprKind::Int(2));
        assert_eq!(program.exprs[block.loop_num.expect("loop")].kind, ExprKind::Int(3));

        let program = parse("{ frag }").expect("parse");
        let StmtKind::RenderBlock(block) = &program.body[0].kind else {
            panic!("expected render block");
        };
        assert!(block.in_num.is_none() && block.out_num.is_none() && block.loop_num.is_none());
    }

    #[test]
    fn rejects_expression_as_block_number() {
        let err = parse("1 + 1 -> { frag }").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn parses_declarations_and_assignments() {
        let program = parse("{ mut x := 1.\n vec2 y = vec2(1.); const int z = 2; x += 2. }")
            .expect("parse");
        let StmtKind::RenderBlock(block) = &program.body[0].kind else {
            panic!("expected render block");
        };
        assert_eq!(block.body.len(), 4);
        assert!(matches!(
            &block.body[0].kind,
            StmtKind::VarDecl(VarDecl { mutability: Mutability::Mutable, ty: None, .. })
        ));
        assert!(matches!(
            &block.body[1].kind,
            StmtKind::VarDecl(VarDecl { mutability: Mutability::Final, ty: Some(_), .. })
        ));
        assert!(matches!(
            &block.body[2].kind,
            StmtKind::VarDecl(VarDecl { mutability: Mutability::Const, .. })
        ));
        assert!(matches!(
            &block.body[3].kind,
            StmtKind::Assign { op: AssignOp::Compound(BinOp::Add), .. }
        ));
    }

    #[test]
    fn parses_functions_procedures_and_calls() {
        let source = "float fn f(float a, float b = 2.) { return a * b }\n\
                      pr p(int n) { frag(n) }\n\
                      { p(n: 1); f(1.) }";
        let program = parse(source).expect("parse");
        let StmtKind::Function(f) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(f.ret, Some(Type::FLOAT));
        assert!(f.params[1].default.is_some());
        let StmtKind::RenderBlock(block) = &program.body[2].kind else {
            panic!("expected render block");
        };
        let StmtKind::Expr(call) = block.body[0].kind else {
            panic!("expected a call statement");
        };
        assert!(matches!(
            &program.exprs[call].kind,
            ExprKind::Call { args: Args::Named(_), .. }
        ));
        assert!(matches!(&block.body[1].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn rejects_mixed_named_and_positional_arguments() {
        let err = parse("{ f(1., b: 2.) }").unwrap_err();
        assert!(err.to_string().contains("cannot mix"));
    }

    #[test]
    fn parses_control_flow() {
        let source = "fn f(int n) {\n mut s := 0\n for (int i = 0; i < n; i++) { s += i }\n\
                      if (s > 3) { return 1 } else if (s > 1) { return 2 }\n else { return 3 }\n}";
        let program = parse(source).expect("parse");
        let StmtKind::Function(f) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert!(matches!(f.body[1].kind, StmtKind::For { .. }));
        let StmtKind::If { else_body, .. } = &f.body[2].kind else {
            panic!("expected if");
        };
        assert!(matches!(
            else_body.as_deref(),
            Some([Stmt { kind: StmtKind::If { .. }, .. }])
        ));
    }

    #[test]
    fn parses_constructors_and_literals() {
        let (program, id) = only_expr("{ int[](1, 2, 3)[0] }");
        let ExprKind::Subscript { base, .. } = &program.exprs[id].kind else {
            panic!("expected subscript");
        };
        assert!(matches!(
            &program.exprs[*base].kind,
            ExprKind::Construct { ty: Type::Array(_, 0), .. }
        ));

        let (program, id) = only_expr("{ \"#ff0000\"3 }");
        assert_eq!(
            program.exprs[id].kind,
            ExprKind::Color {
                text: "#ff0000".to_string(),
                size: 3
            }
        );
    }

    #[test]
    fn parses_frag_forms() {
        let (program, id) = only_expr("{ frag2(npos) }");
        assert!(matches!(
            &program.exprs[id].kind,
            ExprKind::Frag { unit: Some(2), args: Some(Args::Positional(a)) } if a.len() == 1
        ));
    }

    #[test]
    fn reports_position_of_syntax_errors() {
        match parse("{\n  a + }") {
            Err(CompileError::Syntax { line, column, .. }) => assert_eq!((line, column), (2, 7)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn statements_on_one_line_need_a_separator() {
        assert!(parse("{ a b }").is_err());
        assert!(parse("{ a; b }").is_ok());
    }
}
