//! Abstract Syntax Tree definitions for Carbide
//!
//! Statements and expressions are closed enums: the analyzer dispatches with
//! exhaustive matches, so adding a variant without handling it everywhere is
//! a compile error. Closure nodes carry slots the analyzer fills in during
//! inference (captures, parameter and return types) for later stages.

use crate::types::Type;
use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A braced sequence of statements
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

// ==================== Types (syntactic) ====================

/// A type as written in source, resolved by the analyzer
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A named type, possibly with generic arguments: `int`, `Vec<int>`, `T`
    Named {
        name: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// A raw pointer: `*int`
    Pointer { elem: Box<TypeExpr>, span: Span },
    /// A function type: `fn(int, f64) -> bool`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. } => *span,
            TypeExpr::Pointer { span, .. } => *span,
            TypeExpr::Function { span, .. } => *span,
        }
    }

    pub fn named(name: impl Into<String>, span: Span) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }
}

// ==================== Statements ====================

/// Statement kinds
#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Expression { expr: Expr, span: Span },
    Block(Block),
    Return { value: Option<Expr>, span: Span },
    Export { inner: Box<Stmt>, span: Span },
    Extern(ExternDecl),
    StructDef(StructDef),
    EnumDef(EnumDef),
    TraitDecl(TraitDecl),
    ImplBlock(ImplBlock),
    While { cond: Expr, body: Block, span: Span },
    For(ForStmt),
    Break { span: Span },
    Continue { span: Span },
    /// Resolved and consumed by the module loader before analysis
    Import(ImportDecl),
}

/// `let [mut] name [: Type] = value;`
#[derive(Debug, Clone)]
pub struct LetStmt {
    pub name: String,
    pub mutable: bool,
    pub annotation: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

/// `extern fn name(T, ...) [-> T];`
#[derive(Debug, Clone)]
pub struct ExternDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub ret: Option<TypeExpr>,
    pub span: Span,
}

/// Struct definition
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

/// Struct field
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Enum definition
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub variants: Vec<VariantDef>,
    pub span: Span,
}

/// Enum variant; the tag is its 0-based declaration index
#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: String,
    pub fields: Vec<TypeExpr>,
    pub span: Span,
}

/// Trait declaration. Method signatures are recorded but not checked
/// against implementors.
#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: String,
    pub methods: Vec<TraitMethodSig>,
    pub span: Span,
}

/// Method signature inside a trait declaration
#[derive(Debug, Clone)]
pub struct TraitMethodSig {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub ret: Option<TypeExpr>,
    pub span: Span,
}

/// `impl [Trait for] Target { fn ... }`
#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub trait_name: Option<String>,
    pub target: String,
    pub methods: Vec<FunctionLit>,
    pub span: Span,
}

/// `for var in iter { body }` - range and collection forms share a node;
/// the analyzer keys off the iterable expression
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub var: String,
    pub iter: Expr,
    pub body: Block,
    pub span: Span,
}

/// `import { a, b } from "./path";`
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub names: Vec<String>,
    pub specifier: String,
    pub span: Span,
}

// ==================== Expressions ====================

/// Expression kinds
#[derive(Debug, Clone)]
pub enum Expr {
    IntLit { value: i64, span: Span },
    FloatLit { value: f64, span: Span },
    StringLit { value: String, span: Span },
    BoolLit { value: bool, span: Span },
    NullLit { span: Span },
    VecLit { elements: Vec<Expr>, span: Span },
    InterpString { parts: Vec<InterpPart>, span: Span },
    Ident { name: String, span: Span },
    Unsafe { body: Block, span: Span },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Function(FunctionLit),
    Call {
        callee: Box<Expr>,
        generic_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        span: Span,
    },
    StaticCall {
        receiver: String,
        receiver_args: Vec<TypeExpr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Cast {
        value: Box<Expr>,
        target: TypeExpr,
        span: Span,
    },
    StructLit {
        name: String,
        generic_args: Vec<TypeExpr>,
        fields: Vec<(String, Expr)>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        field: String,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    Question { operand: Box<Expr>, span: Span },
    Closure(ClosureLit),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::NullLit { span }
            | Expr::VecLit { span, .. }
            | Expr::InterpString { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Unsafe { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::StaticCall { span, .. }
            | Expr::Match { span, .. }
            | Expr::Cast { span, .. }
            | Expr::StructLit { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Question { span, .. }
            | Expr::Range { span, .. } => *span,
            Expr::Function(f) => f.span,
            Expr::Closure(c) => c.span,
        }
    }
}

/// One segment of an interpolated string
#[derive(Debug, Clone)]
pub enum InterpPart {
    Lit(String),
    Expr(Expr),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `*expr` - raw pointer dereference, unsafe-gated
    Deref,
    /// `-expr`
    Neg,
    /// `!expr`
    Not,
    /// `&expr`
    AddrOf,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// A function literal. Named functions define themselves in the enclosing
/// scope; anonymous ones only produce a value.
#[derive(Debug, Clone)]
pub struct FunctionLit {
    pub name: Option<String>,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

/// A declared type parameter with its trait bounds: `T: Display + Clone`
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<String>,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// A closure literal: `|x| x + 1` or a trailing `{ it * 2 }` block.
///
/// `captures`, `inferred` parameter types and `inferred_ret` start empty and
/// are written by the analyzer so downstream stages see a fully typed node.
#[derive(Debug, Clone)]
pub struct ClosureLit {
    pub params: Vec<ClosureParam>,
    /// Brace-form closure whose single `it` parameter is materialized
    /// during inference when the use site expects one
    pub implicit_it: bool,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub captures: Vec<String>,
    pub inferred_ret: Option<Type>,
    pub span: Span,
}

/// Closure parameter with its inference slot
#[derive(Debug, Clone)]
pub struct ClosureParam {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    pub inferred: Option<Type>,
    pub span: Span,
}

/// A match arm
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
    pub span: Span,
}

/// Match patterns
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `Ok(v)`, `Some(x)`, `Shape::Circle(r)` - binds variant fields
    Variant {
        enum_name: Option<String>,
        variant: String,
        bindings: Vec<String>,
        span: Span,
    },
    /// A literal compared against the scrutinee
    Literal(Expr),
    /// `_`
    Wildcard { span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Variant { span, .. } => *span,
            Pattern::Literal(expr) => expr.span(),
            Pattern::Wildcard { span } => *span,
        }
    }
}
