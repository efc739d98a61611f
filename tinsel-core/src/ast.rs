//! Abstract syntax tree.
//!
//! Expressions live in an arena and are referred to by [`ExprId`], so the
//! later stages can hang caches (resolved types, resolved names, argument
//! mappings) off side tables keyed by id instead of mutating nodes.
//! Statements own their children directly and carry a [`StmtId`] for the
//! same purpose.

use core::ops::Index;

use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub u32);

/// A whole parsed program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub exprs: ExprArena,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(Expr { kind, span });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Index<ExprId> for ExprArena {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        &self.nodes[id.0 as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Float literal; the source spelling is kept for code generation.
    Float(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    /// Colour string literal: contents without quotes, and 3 or 4 components.
    Color { text: String, size: u8 },
    Ident(String),
    Input(Input),
    /// `frag`, `fragN`, `frag(...)`, `fragN(...)`.
    Frag {
        unit: Option<u32>,
        args: Option<Args>,
    },
    /// `prev` or `prev(uv)`.
    Prev { uv: Option<ExprId> },
    Binary {
        op: BinOp,
        left: ExprId,
        right: ExprId,
    },
    Unary { op: UnaryOp, operand: ExprId },
    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    /// Call of a user or built-in function by name.
    Call { callee: String, args: Args },
    /// Type constructor: `vec4(...)`, `float[3](...)`, `int[](...)`.
    Construct { ty: Type, args: Args },
    Subscript { base: ExprId, index: ExprId },
    /// Swizzle / member access.
    Member { base: ExprId, field: String },
    /// `expr.length()`.
    Length { base: ExprId },
}

impl ExprKind {
    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ExprKind::Float(_)
            | ExprKind::Int(_)
            | ExprKind::Uint(_)
            | ExprKind::Bool(_)
            | ExprKind::Color { .. }
            | ExprKind::Ident(_)
            | ExprKind::Input(_) => Vec::new(),
            ExprKind::Frag { args, .. } => args.as_ref().map(Args::exprs).unwrap_or_default(),
            ExprKind::Prev { uv } => uv.iter().copied().collect(),
            ExprKind::Binary { left, right, .. } => vec![*left, *right],
            ExprKind::Unary { operand, .. } => vec![*operand],
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => vec![*cond, *then_expr, *else_expr],
            ExprKind::Call { args, .. } | ExprKind::Construct { args, .. } => args.exprs(),
            ExprKind::Subscript { base, index } => vec![*base, *index],
            ExprKind::Member { base, .. } | ExprKind::Length { base } => vec![*base],
        }
    }
}

/// Built-in read-only inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Pos,
    NPos,
    Res,
    Time,
}

impl Input {
    pub fn name(self) -> &'static str {
        match self {
            Input::Pos => "pos",
            Input::NPos => "npos",
            Input::Res => "res",
            Input::Time => "time",
        }
    }
}

/// Call arguments: either all positional or all named.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    Positional(Vec<ExprId>),
    Named(Vec<NamedArg>),
}

impl Args {
    pub fn len(&self) -> usize {
        match self {
            Args::Positional(list) => list.len(),
            Args::Named(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The argument expressions in written order.
    pub fn exprs(&self) -> Vec<ExprId> {
        match self {
            Args::Positional(list) => list.clone(),
            Args::Named(list) => list.iter().map(|arg| arg.value).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: String,
    pub span: Span,
    pub value: ExprId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Eq,
    NotEq,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Less => "<",
            BinOp::Greater => ">",
            BinOp::LessEq => "<=",
            BinOp::GreaterEq => ">=",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Xor => "^^",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        const ALL: [BinOp; 19] = [
            BinOp::Add,
            BinOp::Sub,
            BinOp::Mul,
            BinOp::Div,
            BinOp::Mod,
            BinOp::BitAnd,
            BinOp::BitOr,
            BinOp::BitXor,
            BinOp::Shl,
            BinOp::Shr,
            BinOp::Less,
            BinOp::Greater,
            BinOp::LessEq,
            BinOp::GreaterEq,
            BinOp::Eq,
            BinOp::NotEq,
            BinOp::And,
            BinOp::Or,
            BinOp::Xor,
        ];
        ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    pub fn is_step(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

/// `=` or a compound assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinOp),
}

impl AssignOp {
    pub fn symbol(self) -> String {
        match self {
            AssignOp::Assign => "=".to_string(),
            AssignOp::Compound(op) => format!("{}=", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: StmtId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Assign {
        target: ExprId,
        op: AssignOp,
        value: ExprId,
    },
    Expr(ExprId),
    If {
        cond: ExprId,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<ExprId>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Return(ExprId),
    Refresh,
    Def { name: String, value: ExprId },
    Uniform { name: String, ty: Type },
    Function(FnDef),
    Procedure(ProcDef),
    RenderBlock(RenderBlock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Const,
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub mutability: Mutability,
    /// `None` for `name := value` declarations.
    pub ty: Option<Type>,
    pub value: ExprId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub span: Span,
    pub ty: Type,
    pub default: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub ret: Option<Type>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// `[in ->] [loop n] [once] { body } [-> out]`
///
/// Each number is an integer literal or identifier expression, or `None`
/// to inherit from the enclosing block.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBlock {
    pub once: bool,
    pub in_num: Option<ExprId>,
    pub out_num: Option<ExprId>,
    pub loop_num: Option<ExprId>,
    pub body: Vec<Stmt>,
}
