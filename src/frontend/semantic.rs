//! Semantic Analysis for Carbide
//!
//! Performs:
//! - Symbol table management (scopes, definitions)
//! - Single-pass type checking and inference
//! - Closure capture analysis and bidirectional typing
//!
//! Type-level problems never stop the walk: they are recorded as
//! diagnostics and the offending expression types as `unknown` so
//! downstream checks do not cascade.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::frontend::ast::*;
use crate::types::type_system::types_equal;
use crate::types::{EnumVariant, Primitive, StructField, Type};
use crate::utils::{Diagnostic, Span};

// ==================== Symbol Table ====================

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Symbol information
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
    /// Line of the definition site
    pub line: u32,
    /// Module the symbol was originally defined in, for imports
    pub source_module: Option<String>,
    /// Calls to unsafe symbols must sit inside an unsafe block
    pub is_unsafe: bool,
}

impl Symbol {
    /// An immutable local binding with no import or unsafe flags
    pub fn local(name: impl Into<String>, ty: Type, line: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            mutable: false,
            line,
            source_module: None,
            is_unsafe: false,
        }
    }
}

/// A scope containing symbols
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

/// Symbol table with nested scopes, arena-allocated so child scopes hold
/// plain indices instead of references to their parents
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    /// Create a table with an empty global scope
    pub fn new() -> Self {
        let global = Scope {
            parent: None,
            symbols: HashMap::new(),
        };
        Self {
            scopes: vec![global],
            current: ScopeId(0),
        }
    }

    /// Create a table whose global scope is seeded with the built-ins.
    /// The sum-type constructors are typed permissively; their concrete
    /// types are inferred per call site.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        let builtins = [
            ("console", Type::ANY),
            ("print", Type::function(vec![Type::ANY], Type::VOID)),
            ("drop", Type::function(vec![Type::ANY], Type::VOID)),
            ("File", Type::ANY),
            ("Ok", Type::function(vec![Type::ANY], Type::ANY)),
            ("Err", Type::function(vec![Type::ANY], Type::ANY)),
            ("Some", Type::function(vec![Type::ANY], Type::ANY)),
            ("None", Type::option(Type::ANY)),
        ];
        for (name, ty) in builtins {
            table.define(Symbol::local(name, ty, 0));
        }
        table
    }

    /// Enter a new scope
    pub fn enter_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            symbols: HashMap::new(),
        });
        self.current = id;
        id
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    /// Define a symbol in the current scope. Redefinition shadows: any
    /// same-named symbol in this or an ancestor scope is hidden for
    /// subsequent lookups, ancestors themselves are untouched.
    pub fn define(&mut self, symbol: Symbol) {
        let scope = &mut self.scopes[self.current.0];
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Look up a symbol, searching from the current scope outward
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some(symbol);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Look up a symbol only in the current scope
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current.0].symbols.get(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Trait / Generic Registry ====================

/// Resolved signature of an impl-block method
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Trait bounds of one generic function, keyed off the full declared
/// type-parameter order so positions stay correct when only some
/// parameters carry bounds
#[derive(Debug, Clone, Default)]
pub struct FunctionConstraints {
    pub type_params: Vec<String>,
    pub bounds: HashMap<String, Vec<String>>,
}

/// Tracks declared traits, their implementors, per-function bounds, and
/// impl-block methods for inherent/static lookup. Lives as long as the
/// analyzer: one compilation session, never reset between modules.
#[derive(Debug, Default)]
pub struct TraitRegistry {
    trait_defs: HashSet<String>,
    trait_impls: HashMap<String, HashSet<String>>,
    function_constraints: HashMap<String, FunctionConstraints>,
    methods: HashMap<String, HashMap<String, MethodSig>>,
}

impl TraitRegistry {
    pub fn register_trait(&mut self, name: &str) {
        self.trait_defs.insert(name.to_string());
    }

    pub fn register_impl(&mut self, trait_name: &str, target: &str) {
        self.trait_impls
            .entry(trait_name.to_string())
            .or_default()
            .insert(target.to_string());
    }

    pub fn register_constraints(&mut self, function: &str, constraints: FunctionConstraints) {
        self.function_constraints
            .insert(function.to_string(), constraints);
    }

    pub fn register_method(&mut self, target: &str, method: &str, sig: MethodSig) {
        self.methods
            .entry(target.to_string())
            .or_default()
            .insert(method.to_string(), sig);
    }

    pub fn implements(&self, trait_name: &str, target: &str) -> bool {
        self.trait_impls
            .get(trait_name)
            .map_or(false, |targets| targets.contains(target))
    }

    pub fn method(&self, target: &str, method: &str) -> Option<&MethodSig> {
        self.methods.get(target).and_then(|m| m.get(method))
    }
}

// ==================== Semantic Analyzer ====================

/// The tree-walking type checker. One instance covers a whole
/// compilation session: diagnostics and trait registries accumulate
/// across `analyze` calls, the symbol table is replaced per module.
pub struct Analyzer {
    symbols: SymbolTable,
    registry: TraitRegistry,
    diagnostics: Vec<Diagnostic>,
    /// Stack of in-scope type-parameter name groups
    generic_context: Vec<Vec<String>>,
    /// Dynamically-scoped unsafe flag
    in_unsafe: bool,
    /// Current loop nesting depth; break/continue require > 0
    loop_depth: u32,
    /// Declared return type of each enclosing function literal or closure
    return_context: Vec<Option<Type>>,
    module_path: Option<String>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::with_builtins(),
            registry: TraitRegistry::default(),
            diagnostics: Vec::new(),
            generic_context: Vec::new(),
            in_unsafe: false,
            loop_depth: 0,
            return_context: Vec::new(),
            module_path: None,
        }
    }

    /// Analyze one module. `imports`, when given, is a scope pre-populated
    /// by the module loader; otherwise a fresh built-in scope is used.
    /// Diagnostics and tree annotations are the outputs.
    pub fn analyze(
        &mut self,
        program: &mut Program,
        imports: Option<SymbolTable>,
        module_path: &str,
    ) {
        self.symbols = imports.unwrap_or_else(SymbolTable::with_builtins);
        self.module_path = Some(module_path.to_string());
        debug!("analyzing module {}", module_path);

        for stmt in &mut program.statements {
            self.visit_stmt(stmt);
        }
    }

    /// The populated symbol environment, for export extraction
    pub fn scope(&self) -> &SymbolTable {
        &self.symbols
    }

    /// All diagnostics accumulated so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn report(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::new(message, span, self.module_path.clone()));
    }

    fn in_generic_context(&self, name: &str) -> bool {
        self.generic_context
            .iter()
            .any(|group| group.iter().any(|n| n == name))
    }

    /// Declared return type of the nearest enclosing function literal
    fn enclosing_return(&self) -> Option<&Type> {
        self.return_context.last().and_then(|t| t.as_ref())
    }

    // ==================== Type Resolution ====================

    /// Resolve a syntactic type to a semantic one. Unknown names resolve
    /// to `unknown` rather than failing.
    fn resolve_type(&mut self, te: &TypeExpr) -> Type {
        match te {
            TypeExpr::Named { name, args, .. } => {
                if args.is_empty() {
                    if let Some(p) = Primitive::from_name(name) {
                        return Type::Primitive(p);
                    }
                    if self.in_generic_context(name) {
                        return Type::GenericParam(name.clone());
                    }
                }
                let resolved: Vec<Type> = args.iter().map(|a| self.resolve_type(a)).collect();
                match name.as_str() {
                    "Result" => {
                        let mut it = resolved.into_iter();
                        Type::result(
                            it.next().unwrap_or(Type::Unknown),
                            it.next().unwrap_or(Type::Unknown),
                        )
                    }
                    "Option" => Type::option(
                        resolved.into_iter().next().unwrap_or(Type::Unknown),
                    ),
                    "Vec" | "HashMap" | "Iterator" | "Box" => Type::generic(name.clone(), resolved),
                    _ => {
                        if !resolved.is_empty() {
                            return Type::generic(name.clone(), resolved);
                        }
                        match self.symbols.resolve(name) {
                            Some(sym)
                                if matches!(sym.ty, Type::Struct { .. } | Type::Enum { .. }) =>
                            {
                                sym.ty.clone()
                            }
                            _ => Type::Unknown,
                        }
                    }
                }
            }
            TypeExpr::Pointer { elem, .. } => Type::ptr(self.resolve_type(elem)),
            TypeExpr::Function { params, ret, .. } => {
                let params = params.iter().map(|p| self.resolve_type(p)).collect();
                Type::function(params, self.resolve_type(ret))
            }
        }
    }

    // ==================== Statements ====================

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Let(decl) => self.visit_let(decl),
            Stmt::Expression { expr, .. } => {
                self.visit_expr(expr);
            }
            Stmt::Block(block) => {
                self.symbols.enter_scope();
                for inner in &mut block.statements {
                    self.visit_stmt(inner);
                }
                self.symbols.exit_scope();
            }
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.visit_expr(expr);
                }
            }
            Stmt::Export { inner, .. } => self.visit_stmt(inner),
            Stmt::Extern(decl) => self.visit_extern(decl),
            Stmt::StructDef(def) => self.visit_struct_def(def),
            Stmt::EnumDef(def) => self.visit_enum_def(def),
            Stmt::TraitDecl(decl) => {
                self.registry.register_trait(&decl.name);
            }
            Stmt::ImplBlock(block) => self.visit_impl_block(block),
            Stmt::While { cond, body, .. } => {
                self.visit_expr(cond);
                self.loop_depth += 1;
                self.symbols.enter_scope();
                for inner in &mut body.statements {
                    self.visit_stmt(inner);
                }
                self.symbols.exit_scope();
                self.loop_depth -= 1;
            }
            Stmt::For(stmt) => self.visit_for(stmt),
            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    self.report("`break` can only be used inside a loop", *span);
                }
            }
            Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    self.report("`continue` can only be used inside a loop", *span);
                }
            }
            // Imports are resolved by the module loader before analysis
            Stmt::Import(_) => {}
        }
    }

    fn visit_let(&mut self, decl: &mut LetStmt) {
        let inferred = self.visit_expr(&mut decl.value);

        // An explicit annotation wins over the inferred type
        let ty = match &decl.annotation {
            Some(annotation) => {
                let declared = self.resolve_type(annotation);
                if !types_equal(&declared, &inferred) {
                    self.report(
                        format!("Type mismatch: expected {}, got {}", declared, inferred),
                        decl.span,
                    );
                }
                declared
            }
            None => inferred,
        };

        self.symbols.define(Symbol {
            name: decl.name.clone(),
            ty,
            mutable: decl.mutable,
            line: decl.span.line,
            source_module: None,
            is_unsafe: false,
        });
    }

    fn visit_extern(&mut self, decl: &mut ExternDecl) {
        let params: Vec<Type> = decl.params.iter().map(|p| self.resolve_type(p)).collect();
        let ret = decl
            .ret
            .as_ref()
            .map(|r| self.resolve_type(r))
            .unwrap_or(Type::VOID);

        self.symbols.define(Symbol {
            name: decl.name.clone(),
            ty: Type::function(params, ret),
            mutable: false,
            line: decl.span.line,
            source_module: None,
            is_unsafe: true,
        });
    }

    fn visit_struct_def(&mut self, def: &mut StructDef) {
        self.generic_context.push(def.type_params.clone());
        let fields: Vec<StructField> = def
            .fields
            .iter()
            .map(|f| StructField {
                name: f.name.clone(),
                ty: self.resolve_type(&f.ty),
            })
            .collect();
        self.generic_context.pop();

        self.symbols.define(Symbol::local(
            def.name.clone(),
            Type::Struct {
                name: def.name.clone(),
                type_params: def.type_params.clone(),
                fields,
            },
            def.span.line,
        ));
    }

    fn visit_enum_def(&mut self, def: &mut EnumDef) {
        self.generic_context.push(def.type_params.clone());
        // Variant tags follow declaration order; lowering depends on them
        let variants: Vec<EnumVariant> = def
            .variants
            .iter()
            .enumerate()
            .map(|(tag, v)| EnumVariant {
                name: v.name.clone(),
                fields: v.fields.iter().map(|f| self.resolve_type(f)).collect(),
                tag,
            })
            .collect();
        self.generic_context.pop();

        self.symbols.define(Symbol::local(
            def.name.clone(),
            Type::Enum {
                name: def.name.clone(),
                variants,
            },
            def.span.line,
        ));
    }

    fn visit_impl_block(&mut self, block: &mut ImplBlock) {
        if let Some(trait_name) = &block.trait_name {
            self.registry.register_impl(trait_name, &block.target);
        }

        // Record method signatures first so the methods can call each other
        for method in &block.methods {
            let Some(name) = &method.name else { continue };
            let params: Vec<Type> = method.params.iter().map(|p| self.resolve_type(&p.ty)).collect();
            let ret = method
                .ret
                .as_ref()
                .map(|r| self.resolve_type(r))
                .unwrap_or(Type::VOID);
            self.registry
                .register_method(&block.target, name, MethodSig { params, ret });
        }

        for method in &mut block.methods {
            self.visit_function(method, false);
        }
    }

    fn visit_for(&mut self, stmt: &mut ForStmt) {
        let elem_ty = if matches!(stmt.iter, Expr::Range { .. }) {
            self.visit_expr(&mut stmt.iter);
            Type::INT
        } else {
            let iter_ty = self.visit_expr(&mut stmt.iter);
            self.element_type_of(&iter_ty)
        };

        self.symbols.enter_scope();
        self.symbols
            .define(Symbol::local(stmt.var.clone(), elem_ty, stmt.span.line));
        self.loop_depth += 1;
        for inner in &mut stmt.body.statements {
            self.visit_stmt(inner);
        }
        self.loop_depth -= 1;
        self.symbols.exit_scope();
    }

    /// Element type an iterable yields: `Vec<T> -> T`,
    /// `HashMap<K, V> -> K` (keys), `Iterator<T> -> T`, user structs via
    /// their `IntoIterator` impl. Falls back to `unknown`.
    fn element_type_of(&self, iter_ty: &Type) -> Type {
        match iter_ty {
            Type::GenericInst { name, args } => match (name.as_str(), args.as_slice()) {
                ("Vec", [elem]) => elem.clone(),
                ("HashMap", [key, _]) => key.clone(),
                ("Iterator", [elem]) => elem.clone(),
                _ => Type::Unknown,
            },
            Type::Struct { name, .. } => {
                if self.registry.implements("IntoIterator", name) {
                    if let Some(sig) = self.registry.method(name, "into_iter") {
                        if let Type::GenericInst { name: n, args } = &sig.ret {
                            if n == "Vec" && args.len() == 1 {
                                return args[0].clone();
                            }
                        }
                    }
                }
                Type::Unknown
            }
            _ => Type::Unknown,
        }
    }

    // ==================== Expressions ====================

    /// Type an expression. Never fails: user-level problems become
    /// diagnostics and the expression types as `unknown`.
    fn visit_expr(&mut self, expr: &mut Expr) -> Type {
        match expr {
            Expr::IntLit { .. } => Type::INT,
            Expr::FloatLit { .. } => Type::F64,
            Expr::StringLit { .. } => Type::STRING,
            Expr::BoolLit { .. } => Type::BOOL,
            Expr::NullLit { .. } => Type::NULL,
            Expr::VecLit { elements, .. } => {
                let mut elem_ty = Type::Unknown;
                for (i, element) in elements.iter_mut().enumerate() {
                    let ty = self.visit_expr(element);
                    if i == 0 {
                        elem_ty = ty;
                    }
                }
                Type::generic("Vec", vec![elem_ty])
            }
            Expr::InterpString { parts, span } => {
                let span = *span;
                for part in parts {
                    if let InterpPart::Expr(inner) = part {
                        let ty = self.visit_expr(inner);
                        if !Self::interpolatable(&ty) {
                            self.report(
                                format!("Cannot interpolate value of type {} into a string", ty),
                                span,
                            );
                        }
                    }
                }
                Type::STRING
            }
            Expr::Ident { name, span } => match self.symbols.resolve(name) {
                Some(symbol) => symbol.ty.clone(),
                None => {
                    let message = format!("Variable '{}' not found", name);
                    self.report(message, *span);
                    Type::Unknown
                }
            },
            Expr::Unsafe { body, .. } => {
                let saved = self.in_unsafe;
                self.in_unsafe = true;
                self.symbols.enter_scope();
                for inner in &mut body.statements {
                    self.visit_stmt(inner);
                }
                self.symbols.exit_scope();
                self.in_unsafe = saved;
                Type::VOID
            }
            Expr::Unary { op, operand, span } => {
                let span = *span;
                let op = *op;
                let operand_ty = self.visit_expr(operand);
                self.visit_unary(op, operand_ty, span)
            }
            Expr::Assign {
                target,
                value,
                span,
            } => {
                let span = *span;
                // Mutability is checked before the walk re-resolves the name
                if let Expr::Ident { name, .. } = target.as_ref() {
                    if let Some(symbol) = self.symbols.resolve(name) {
                        if !symbol.mutable {
                            self.report("Cannot assign to immutable variable", span);
                        }
                    }
                }
                let target_ty = self.visit_expr(target);
                let value_ty = self.visit_expr(value);
                if !types_equal(&target_ty, &value_ty) {
                    self.report(
                        format!("Type mismatch: cannot assign {} to {}", value_ty, target_ty),
                        span,
                    );
                }
                target_ty
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                span,
            } => {
                let span = *span;
                let op = *op;
                let lhs_ty = self.visit_expr(lhs);
                let rhs_ty = self.visit_expr(rhs);
                self.visit_binary(op, lhs_ty, rhs_ty, span)
            }
            Expr::Function(f) => self.visit_function(f, true),
            Expr::Call {
                callee,
                generic_args,
                args,
                span,
            } => self.visit_call(callee, generic_args, args, *span),
            Expr::StaticCall {
                receiver,
                receiver_args,
                method,
                args,
                span,
            } => {
                let receiver = receiver.clone();
                let method = method.clone();
                let receiver_args = receiver_args.clone();
                let span = *span;
                self.visit_static_call(&receiver, &receiver_args, &method, args, span)
            }
            Expr::Match {
                scrutinee, arms, ..
            } => {
                let scrutinee_ty = self.visit_expr(scrutinee);
                for arm in arms {
                    self.visit_match_arm(&scrutinee_ty, arm);
                }
                // Arm body types are not unified into a match type
                Type::Unknown
            }
            Expr::Cast { value, target, .. } => {
                self.visit_expr(value);
                // The target annotation is trusted unconditionally
                self.resolve_type(target)
            }
            Expr::StructLit {
                name,
                generic_args,
                fields,
                span,
            } => {
                let name = name.clone();
                let generic_args = generic_args.clone();
                let span = *span;
                for (_, value) in fields.iter_mut() {
                    self.visit_expr(value);
                }
                self.visit_struct_lit(&name, &generic_args, span)
            }
            Expr::Member { object, field, .. } => {
                let object_ty = self.visit_expr(object);
                match object_ty {
                    Type::Struct { fields, .. } => fields
                        .iter()
                        .find(|f| f.name == **field)
                        .map(|f| f.ty.clone())
                        .unwrap_or(Type::Unknown),
                    _ => Type::Unknown,
                }
            }
            Expr::Index { object, index, .. } => {
                self.visit_expr(object);
                let index_span = index.span();
                let index_ty = self.visit_expr(index);
                if !types_equal(&index_ty, &Type::INT) {
                    self.report(
                        format!("Index must be int, got {}", index_ty),
                        index_span,
                    );
                }
                Type::Unknown
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                span,
            } => {
                let method = method.clone();
                let span = *span;
                let receiver_ty = self.visit_expr(receiver);
                self.visit_method_call(receiver_ty, &method, args, span)
            }
            Expr::Question { operand, span } => {
                let span = *span;
                let operand_ty = self.visit_expr(operand);
                self.visit_question(operand_ty, span)
            }
            Expr::Closure(closure) => self.infer_closure(closure, None, None),
            Expr::Range { start, end, .. } => {
                self.visit_expr(start);
                self.visit_expr(end);
                Type::Unknown
            }
        }
    }

    fn interpolatable(ty: &Type) -> bool {
        matches!(
            ty,
            Type::Primitive(
                Primitive::Int
                    | Primitive::F64
                    | Primitive::String
                    | Primitive::Bool
                    | Primitive::I8
                    | Primitive::Any
            ) | Type::Unknown
        )
    }

    fn visit_unary(&mut self, op: UnaryOp, operand_ty: Type, span: Span) -> Type {
        match op {
            UnaryOp::Deref => {
                if !self.in_unsafe {
                    self.report("Dereference of raw pointer requires unsafe block", span);
                }
                match operand_ty {
                    Type::Pointer(elem) => *elem,
                    _ => Type::Unknown,
                }
            }
            UnaryOp::Neg => match operand_ty {
                Type::Primitive(p) if p.is_numeric() => Type::Primitive(p),
                _ => Type::Unknown,
            },
            UnaryOp::Not => Type::BOOL,
            UnaryOp::AddrOf => Type::ptr(operand_ty),
        }
    }

    fn visit_binary(&mut self, op: BinOp, lhs: Type, rhs: Type, span: Span) -> Type {
        if op.is_logical() {
            return Type::BOOL;
        }
        if op.is_comparison() {
            if !types_equal(&lhs, &rhs) {
                self.report(
                    format!("Type mismatch: cannot compare {} and {}", lhs, rhs),
                    span,
                );
            }
            return Type::BOOL;
        }

        // Arithmetic. Wildcard operands stay quiet and type as unknown.
        if lhs.is_wildcard() || rhs.is_wildcard() {
            return Type::Unknown;
        }
        match (&lhs, &rhs) {
            (Type::Primitive(Primitive::Int), Type::Primitive(Primitive::Int)) => Type::INT,
            (Type::Primitive(Primitive::F64), Type::Primitive(Primitive::F64)) => Type::F64,
            (Type::Primitive(Primitive::String), Type::Primitive(Primitive::String))
                if op == BinOp::Add =>
            {
                Type::STRING
            }
            // Pointer arithmetic keeps the pointer type
            (Type::Pointer(_), Type::Primitive(Primitive::Int))
                if matches!(op, BinOp::Add | BinOp::Sub) =>
            {
                lhs
            }
            _ => {
                self.report(
                    format!(
                        "Invalid operand types for '{}': {} and {}",
                        Self::op_symbol(op),
                        lhs,
                        rhs
                    ),
                    span,
                );
                Type::Unknown
            }
        }
    }

    fn op_symbol(op: BinOp) -> &'static str {
        match op {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    // ==================== Functions and Calls ====================

    /// Visit a function literal. Named functions define themselves in the
    /// enclosing scope before their body is visited, which makes simple
    /// recursion and forward references work in one pass.
    fn visit_function(&mut self, f: &mut FunctionLit, define_in_enclosing: bool) -> Type {
        let tp_names: Vec<String> = f.type_params.iter().map(|tp| tp.name.clone()).collect();
        self.generic_context.push(tp_names.clone());

        let param_tys: Vec<Type> = f.params.iter().map(|p| self.resolve_type(&p.ty)).collect();
        let ret_ty = f
            .ret
            .as_ref()
            .map(|r| self.resolve_type(r))
            .unwrap_or(Type::VOID);
        let fn_ty = Type::function(param_tys.clone(), ret_ty.clone());

        if let Some(name) = &f.name {
            if define_in_enclosing {
                self.symbols
                    .define(Symbol::local(name.clone(), fn_ty.clone(), f.span.line));
            }
            if !f.type_params.is_empty() {
                let mut bounds = HashMap::new();
                for tp in &f.type_params {
                    if !tp.bounds.is_empty() {
                        bounds.insert(tp.name.clone(), tp.bounds.clone());
                    }
                }
                self.registry.register_constraints(
                    name,
                    FunctionConstraints {
                        type_params: tp_names,
                        bounds,
                    },
                );
            }
        }

        self.symbols.enter_scope();
        for (param, ty) in f.params.iter().zip(param_tys.iter()) {
            self.symbols
                .define(Symbol::local(param.name.clone(), ty.clone(), param.span.line));
        }

        // Function boundaries reset loop and unsafe context; the declared
        // return type gates `?` and seeds Ok/Err inference in the body
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let saved_unsafe = std::mem::replace(&mut self.in_unsafe, false);
        self.return_context.push(Some(ret_ty));

        for stmt in &mut f.body.statements {
            self.visit_stmt(stmt);
        }

        self.return_context.pop();
        self.in_unsafe = saved_unsafe;
        self.loop_depth = saved_loop;
        self.symbols.exit_scope();
        self.generic_context.pop();

        fn_ty
    }

    fn visit_call(
        &mut self,
        callee: &mut Expr,
        generic_args: &[TypeExpr],
        args: &mut [Expr],
        span: Span,
    ) -> Type {
        if let Expr::Ident { name, .. } = callee {
            let name = name.clone();

            // Sum-type constructors are typed per call site
            match name.as_str() {
                "Ok" => {
                    let ok_ty = self.visit_args_first(args);
                    let err_ty = match self.enclosing_return() {
                        Some(Type::Result { err, .. }) => (**err).clone(),
                        _ => Type::Unknown,
                    };
                    return Type::result(ok_ty, err_ty);
                }
                "Err" => {
                    let err_ty = self.visit_args_first(args);
                    let ok_ty = match self.enclosing_return() {
                        Some(Type::Result { ok, .. }) => (**ok).clone(),
                        _ => Type::Unknown,
                    };
                    return Type::result(ok_ty, err_ty);
                }
                "Some" => {
                    let inner = self.visit_args_first(args);
                    return Type::option(inner);
                }
                _ => {}
            }

            let unsafe_callee = self
                .symbols
                .resolve(&name)
                .map_or(false, |symbol| symbol.is_unsafe);
            if unsafe_callee && !self.in_unsafe {
                self.report(
                    format!("Call to unsafe function '{}' requires unsafe block", name),
                    span,
                );
            }

            // Trait bounds are validated only at explicit generic call sites
            if !generic_args.is_empty() {
                let supplied: Vec<Type> =
                    generic_args.iter().map(|g| self.resolve_type(g)).collect();
                self.validate_trait_bounds(&name, &supplied, span);
            }
        }

        let callee_ty = self.visit_expr(callee);
        match callee_ty {
            Type::Function { params, ret } => {
                for (i, arg) in args.iter_mut().enumerate() {
                    // Closure arguments get bidirectional inference seeded
                    // from the declared parameter type
                    if let Expr::Closure(closure) = arg {
                        let (expected_params, expected_ret) = match params.get(i) {
                            Some(Type::Function { params, ret }) => {
                                (Some(params.clone()), Some((**ret).clone()))
                            }
                            _ => (None, None),
                        };
                        self.infer_closure(closure, expected_params.as_deref(), expected_ret);
                    } else {
                        self.visit_expr(arg);
                    }
                }
                *ret
            }
            Type::Primitive(Primitive::Any) => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                }
                Type::ANY
            }
            _ => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                }
                Type::Unknown
            }
        }
    }

    /// Visit all arguments, returning the type of the first
    fn visit_args_first(&mut self, args: &mut [Expr]) -> Type {
        let mut first = Type::Unknown;
        for (i, arg) in args.iter_mut().enumerate() {
            let ty = self.visit_expr(arg);
            if i == 0 {
                first = ty;
            }
        }
        first
    }

    fn validate_trait_bounds(&mut self, fn_name: &str, supplied: &[Type], span: Span) {
        let Some(constraints) = self.registry.function_constraints.get(fn_name) else {
            return;
        };

        // Positions are computed against the declared type-parameter
        // order, so bounds stay aligned when only some parameters have them
        let mut failures = Vec::new();
        for (idx, tp_name) in constraints.type_params.iter().enumerate() {
            let Some(required) = constraints.bounds.get(tp_name) else {
                continue;
            };
            let Some(arg) = supplied.get(idx) else {
                continue;
            };
            if arg.is_wildcard() {
                continue;
            }
            for trait_name in required {
                let satisfied = self
                    .registry
                    .trait_impls
                    .get(trait_name)
                    .map_or(false, |targets| targets.contains(&arg.display_name()));
                if !satisfied {
                    failures.push(format!(
                        "Type '{}' does not implement trait '{}' (required by '{}')",
                        arg, trait_name, fn_name
                    ));
                }
            }
        }

        for message in failures {
            self.report(message, span);
        }
    }

    // ==================== Static Calls ====================

    fn visit_static_call(
        &mut self,
        receiver: &str,
        receiver_args: &[TypeExpr],
        method: &str,
        args: &mut [Expr],
        span: Span,
    ) -> Type {
        match receiver {
            "Option" => match method {
                "Some" => {
                    let inner = self.visit_args_first(args);
                    Type::option(inner)
                }
                "None" => Type::option(Type::Unknown),
                _ => {
                    self.visit_args_first(args);
                    Type::Unknown
                }
            },
            "Vec" => {
                self.visit_args_first(args);
                if method == "new" {
                    let elem = receiver_args
                        .first()
                        .map(|t| self.resolve_type(t))
                        .unwrap_or(Type::Unknown);
                    Type::generic("Vec", vec![elem])
                } else {
                    Type::Unknown
                }
            }
            "HashMap" => {
                self.visit_args_first(args);
                if method == "new" {
                    let mut resolved = receiver_args.iter().map(|t| self.resolve_type(t));
                    let key = resolved.next().unwrap_or(Type::Unknown);
                    let value = resolved.next().unwrap_or(Type::Unknown);
                    Type::generic("HashMap", vec![key, value])
                } else {
                    Type::Unknown
                }
            }
            // Numeric helpers promote to f64 when any argument is f64
            "Math" => {
                let mut any_float = false;
                for arg in args.iter_mut() {
                    if types_equal(&self.visit_expr(arg), &Type::F64) {
                        any_float = true;
                    }
                }
                if any_float {
                    Type::F64
                } else {
                    Type::INT
                }
            }
            "File" => {
                self.visit_args_first(args);
                match method {
                    "open" | "create" => Type::result(Type::FILE, Type::STRING),
                    _ => Type::Unknown,
                }
            }
            _ => self.visit_user_static_call(receiver, method, args, span),
        }
    }

    /// Enum variant construction or an inherent static method found
    /// through the impl-block registry
    fn visit_user_static_call(
        &mut self,
        receiver: &str,
        method: &str,
        args: &mut [Expr],
        span: Span,
    ) -> Type {
        let receiver_ty = self.symbols.resolve(receiver).map(|s| s.ty.clone());

        if let Some(Type::Enum { name, variants }) = receiver_ty {
            let Some(variant) = variants.iter().find(|v| v.name == method) else {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                }
                self.report(
                    format!("Unknown enum variant '{}::{}'", receiver, method),
                    span,
                );
                return Type::Unknown;
            };

            if args.len() != variant.fields.len() {
                self.report(
                    format!(
                        "Enum variant '{}::{}' expects {} arguments, got {}",
                        receiver,
                        method,
                        variant.fields.len(),
                        args.len()
                    ),
                    span,
                );
            }
            let fields = variant.fields.clone();
            for (i, arg) in args.iter_mut().enumerate() {
                let arg_span = arg.span();
                let arg_ty = self.visit_expr(arg);
                if let Some(expected) = fields.get(i) {
                    if !types_equal(expected, &arg_ty) {
                        self.report(
                            format!(
                                "Type mismatch in '{}::{}': expected {}, got {}",
                                receiver, method, expected, arg_ty
                            ),
                            arg_span,
                        );
                    }
                }
            }
            return Type::Enum {
                name,
                variants: variants.clone(),
            };
        }

        if let Some(sig) = self.registry.method(receiver, method).cloned() {
            self.visit_seeded_args(args, &sig.params);
            return sig.ret;
        }

        for arg in args.iter_mut() {
            self.visit_expr(arg);
        }
        Type::Unknown
    }

    /// Visit arguments, seeding closure arguments from declared
    /// parameter types
    fn visit_seeded_args(&mut self, args: &mut [Expr], declared: &[Type]) {
        for (i, arg) in args.iter_mut().enumerate() {
            if let Expr::Closure(closure) = arg {
                let (expected_params, expected_ret) = match declared.get(i) {
                    Some(Type::Function { params, ret }) => {
                        (Some(params.clone()), Some((**ret).clone()))
                    }
                    _ => (None, None),
                };
                self.infer_closure(closure, expected_params.as_deref(), expected_ret);
            } else {
                self.visit_expr(arg);
            }
        }
    }

    // ==================== Match ====================

    fn visit_match_arm(&mut self, scrutinee_ty: &Type, arm: &mut MatchArm) {
        self.symbols.enter_scope();

        match &mut arm.pattern {
            Pattern::Variant {
                enum_name,
                variant,
                bindings,
                span,
            } => {
                let span = *span;
                let variant = variant.clone();
                let enum_name = enum_name.clone();
                let field_tys = self.variant_field_types(scrutinee_ty, enum_name.as_deref(), &variant, span);
                if let Some(field_tys) = &field_tys {
                    if bindings.len() != field_tys.len() {
                        self.report(
                            format!(
                                "Pattern '{}' expects {} bindings, got {}",
                                variant,
                                field_tys.len(),
                                bindings.len()
                            ),
                            span,
                        );
                    }
                }
                for (i, binding) in bindings.iter().enumerate() {
                    let ty = field_tys
                        .as_ref()
                        .and_then(|tys| tys.get(i).cloned())
                        .unwrap_or(Type::Unknown);
                    self.symbols.define(Symbol::local(binding.clone(), ty, span.line));
                }
            }
            Pattern::Literal(expr) => {
                self.visit_expr(expr);
            }
            Pattern::Wildcard { .. } => {}
        }

        for stmt in &mut arm.body.statements {
            self.visit_stmt(stmt);
        }

        self.symbols.exit_scope();
    }

    /// Field types a variant pattern binds, from the scrutinee's type.
    /// `None` means the scrutinee gives us nothing to check against.
    fn variant_field_types(
        &mut self,
        scrutinee_ty: &Type,
        enum_name: Option<&str>,
        variant: &str,
        span: Span,
    ) -> Option<Vec<Type>> {
        match scrutinee_ty {
            Type::Result { ok, err } => match variant {
                "Ok" => Some(vec![(**ok).clone()]),
                "Err" => Some(vec![(**err).clone()]),
                _ => None,
            },
            Type::Option(inner) => match variant {
                "Some" => Some(vec![(**inner).clone()]),
                "None" => Some(Vec::new()),
                _ => None,
            },
            Type::Enum { name, variants } => {
                match variants.iter().find(|v| v.name == variant) {
                    Some(v) => Some(v.fields.clone()),
                    None => {
                        // Only a qualified pattern naming this enum is a
                        // resolution failure; bare names may be bindings
                        if enum_name == Some(name.as_str()) || enum_name.is_none() {
                            self.report(
                                format!("Unknown enum variant '{}::{}'", name, variant),
                                span,
                            );
                        }
                        None
                    }
                }
            }
            _ => None,
        }
    }

    // ==================== Struct Literals ====================

    fn visit_struct_lit(&mut self, name: &str, generic_args: &[TypeExpr], span: Span) -> Type {
        let Some(symbol) = self.symbols.resolve(name) else {
            self.report(format!("Unknown struct '{}'", name), span);
            return Type::Unknown;
        };
        let ty = symbol.ty.clone();
        match ty {
            Type::Struct {
                ref type_params, ..
            } => {
                if !generic_args.is_empty() && !type_params.is_empty() {
                    let args: Vec<Type> =
                        generic_args.iter().map(|g| self.resolve_type(g)).collect();
                    Type::generic(name.to_string(), args)
                } else {
                    ty
                }
            }
            _ => {
                self.report(format!("Unknown struct '{}'", name), span);
                Type::Unknown
            }
        }
    }

    // ==================== Method Calls ====================

    /// Dispatch a method call on the receiver's resolved type through the
    /// fixed built-in method tables. Anything unmatched types as `unknown`
    /// after its arguments are visited; the built-in surface is not closed.
    fn visit_method_call(
        &mut self,
        receiver_ty: Type,
        method: &str,
        args: &mut [Expr],
        span: Span,
    ) -> Type {
        match receiver_ty {
            Type::GenericInst { name, args: targs } => {
                self.visit_container_method(&name, &targs, method, args, span)
            }
            Type::Option(inner) => self.visit_option_method(*inner, method, args),
            Type::Result { ok, err } => self.visit_result_method(*ok, *err, method, args),
            Type::Primitive(Primitive::File) => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                }
                match method {
                    "read_line" => Type::STRING,
                    "write_string" | "close" | "seek" | "tell" => Type::INT,
                    _ => Type::Unknown,
                }
            }
            Type::Struct { ref name, .. } => {
                if let Some(sig) = self.registry.method(name, method).cloned() {
                    self.visit_seeded_args(args, &sig.params);
                    sig.ret
                } else {
                    for arg in args.iter_mut() {
                        self.visit_expr(arg);
                    }
                    Type::Unknown
                }
            }
            _ => {
                for arg in args.iter_mut() {
                    self.visit_expr(arg);
                }
                Type::Unknown
            }
        }
    }

    fn visit_container_method(
        &mut self,
        container: &str,
        targs: &[Type],
        method: &str,
        args: &mut [Expr],
        _span: Span,
    ) -> Type {
        match container {
            "Vec" => {
                let elem = targs.first().cloned().unwrap_or(Type::Unknown);
                match method {
                    "get" | "pop" => {
                        self.visit_args_first(args);
                        elem
                    }
                    "len" => {
                        self.visit_args_first(args);
                        Type::INT
                    }
                    "collect" => {
                        self.visit_args_first(args);
                        Type::generic("Vec", vec![elem])
                    }
                    "iter" => {
                        self.visit_args_first(args);
                        Type::generic("Iterator", vec![elem])
                    }
                    "map" => {
                        let mapped = self.closure_result(args, &[elem], None);
                        Type::generic("Vec", vec![mapped])
                    }
                    "filter" => {
                        self.closure_result(args, &[elem.clone()], Some(Type::BOOL));
                        Type::generic("Vec", vec![elem])
                    }
                    _ => {
                        self.visit_args_first(args);
                        Type::Unknown
                    }
                }
            }
            "HashMap" => {
                let key = targs.first().cloned().unwrap_or(Type::Unknown);
                let value = targs.get(1).cloned().unwrap_or(Type::Unknown);
                self.visit_args_first(args);
                match method {
                    "get" => value,
                    "len" => Type::INT,
                    "contains_key" => Type::BOOL,
                    "keys" => Type::generic("Vec", vec![key]),
                    "values" => Type::generic("Vec", vec![value]),
                    "iter" | "keys_iter" => Type::generic("Iterator", vec![key]),
                    "values_iter" => Type::generic("Iterator", vec![value]),
                    _ => Type::Unknown,
                }
            }
            "Iterator" => {
                let elem = targs.first().cloned().unwrap_or(Type::Unknown);
                match method {
                    "map" => {
                        let mapped = self.closure_result(args, &[elem], None);
                        Type::generic("Iterator", vec![mapped])
                    }
                    "filter" => {
                        self.closure_result(args, &[elem.clone()], Some(Type::BOOL));
                        Type::generic("Iterator", vec![elem])
                    }
                    "collect" => {
                        self.visit_args_first(args);
                        Type::generic("Vec", vec![elem])
                    }
                    "count" | "sum" => {
                        self.visit_args_first(args);
                        Type::INT
                    }
                    "for_each" => {
                        self.closure_result(args, &[elem], Some(Type::VOID));
                        Type::VOID
                    }
                    _ => {
                        self.visit_args_first(args);
                        Type::Unknown
                    }
                }
            }
            _ => {
                self.visit_args_first(args);
                Type::Unknown
            }
        }
    }

    fn visit_option_method(&mut self, inner: Type, method: &str, args: &mut [Expr]) -> Type {
        match method {
            "unwrap" | "unwrap_or" => {
                self.visit_args_first(args);
                inner
            }
            "is_some" | "is_none" => {
                self.visit_args_first(args);
                Type::BOOL
            }
            "map" => {
                let mapped = self.closure_result(args, &[inner], None);
                Type::option(mapped)
            }
            "and_then" => {
                let produced = self.closure_result(args, &[inner], None);
                match produced {
                    Type::Option(_) => produced,
                    _ => Type::option(Type::Unknown),
                }
            }
            "or_else" => {
                self.closure_result(args, &[], None);
                Type::option(inner)
            }
            _ => {
                self.visit_args_first(args);
                Type::Unknown
            }
        }
    }

    fn visit_result_method(&mut self, ok: Type, err: Type, method: &str, args: &mut [Expr]) -> Type {
        match method {
            "unwrap" | "unwrap_or" => {
                self.visit_args_first(args);
                ok
            }
            "is_ok" | "is_err" => {
                self.visit_args_first(args);
                Type::BOOL
            }
            "map" => {
                let mapped = self.closure_result(args, &[ok], None);
                Type::result(mapped, err)
            }
            "map_err" => {
                let mapped = self.closure_result(args, &[err], None);
                Type::result(ok, mapped)
            }
            "and_then" => {
                let produced = self.closure_result(args, &[ok], None);
                match produced {
                    Type::Result { ok: new_ok, .. } => Type::Result {
                        ok: new_ok,
                        err: Box::new(err),
                    },
                    _ => Type::result(Type::Unknown, err),
                }
            }
            "or_else" => {
                let produced = self.closure_result(args, &[err], None);
                match produced {
                    Type::Result { err: new_err, .. } => Type::Result {
                        ok: Box::new(ok),
                        err: new_err,
                    },
                    _ => Type::result(ok, Type::Unknown),
                }
            }
            _ => {
                self.visit_args_first(args);
                Type::Unknown
            }
        }
    }

    /// Visit a higher-order method's arguments; the first, when it is a
    /// closure, is typed bidirectionally from the element type. Returns
    /// the closure's resolved return type.
    fn closure_result(
        &mut self,
        args: &mut [Expr],
        expected_params: &[Type],
        expected_ret: Option<Type>,
    ) -> Type {
        let mut result = Type::Unknown;
        for (i, arg) in args.iter_mut().enumerate() {
            if i == 0 {
                let ty = if let Expr::Closure(closure) = arg {
                    self.infer_closure(closure, Some(expected_params), expected_ret.clone())
                } else {
                    self.visit_expr(arg)
                };
                if let Type::Function { ret, .. } = ty {
                    result = *ret;
                }
            } else {
                self.visit_expr(arg);
            }
        }
        result
    }

    // ==================== Question Operator ====================

    fn visit_question(&mut self, operand_ty: Type, span: Span) -> Type {
        match operand_ty {
            Type::Result { ok, .. } => {
                if !matches!(self.enclosing_return(), Some(Type::Result { .. })) {
                    self.report(
                        "The '?' operator requires the enclosing function to return Result",
                        span,
                    );
                }
                *ok
            }
            Type::Option(inner) => {
                if !matches!(self.enclosing_return(), Some(Type::Option(_))) {
                    self.report(
                        "The '?' operator requires the enclosing function to return Option",
                        span,
                    );
                }
                *inner
            }
            ty if ty.is_wildcard() => Type::Unknown,
            ty => {
                self.report(
                    format!("The '?' operator cannot be applied to {}", ty),
                    span,
                );
                Type::Unknown
            }
        }
    }

    // ==================== Closure Inference ====================

    /// Two independent passes over a closure literal: capture analysis,
    /// then bidirectional parameter/return typing. Inferred types are
    /// written back onto the node so later stages see a fully typed
    /// closure.
    fn infer_closure(
        &mut self,
        closure: &mut ClosureLit,
        expected_params: Option<&[Type]>,
        expected_ret: Option<Type>,
    ) -> Type {
        closure.captures = self.collect_captures(closure);

        // A brace closure materializes its `it` parameter when the use
        // site expects at least one, or when the body mentions it
        if closure.implicit_it && closure.params.is_empty() {
            let wants_param = expected_params.map_or_else(
                || Self::block_references(&closure.body, "it"),
                |params| !params.is_empty(),
            );
            if wants_param {
                closure.params.push(ClosureParam {
                    name: "it".to_string(),
                    annotation: None,
                    inferred: None,
                    span: closure.span,
                });
            }
        }

        self.symbols.enter_scope();

        let mut param_tys = Vec::new();
        for (i, param) in closure.params.iter_mut().enumerate() {
            let ty = if let Some(annotation) = param.annotation.clone() {
                // An explicit annotation is trusted as-is
                self.resolve_type(&annotation)
            } else {
                match expected_params.and_then(|p| p.get(i)) {
                    Some(expected) if !matches!(expected, Type::Unknown) => {
                        // Back-patch the tree so codegen sees a typed closure
                        param.inferred = Some(expected.clone());
                        expected.clone()
                    }
                    _ => Type::Unknown,
                }
            };
            self.symbols
                .define(Symbol::local(param.name.clone(), ty.clone(), param.span.line));
            param_tys.push(ty);
        }

        let declared_ret = closure.ret.as_ref().map(|r| self.resolve_type(r));
        let context_ret = declared_ret
            .clone()
            .or_else(|| expected_ret.clone().filter(|t| !matches!(t, Type::Unknown)));
        self.return_context.push(context_ret);

        // Visit the body, keeping the trailing statement's type for
        // return inference
        let mut last_ty = Type::VOID;
        let body_len = closure.body.statements.len();
        for (i, stmt) in closure.body.statements.iter_mut().enumerate() {
            let is_last = i + 1 == body_len;
            match stmt {
                Stmt::Expression { expr, .. } if is_last => {
                    last_ty = self.visit_expr(expr);
                }
                Stmt::Return { value: Some(expr), .. } if is_last => {
                    last_ty = self.visit_expr(expr);
                }
                other => {
                    self.visit_stmt(other);
                    if is_last {
                        last_ty = Type::VOID;
                    }
                }
            }
        }

        self.return_context.pop();
        self.symbols.exit_scope();

        // Resolution order: annotation, caller expectation, body inference.
        // The latter two are back-patched onto the node.
        let ret_ty = if let Some(declared) = declared_ret {
            declared
        } else if let Some(expected) = expected_ret.filter(|t| !matches!(t, Type::Unknown)) {
            closure.inferred_ret = Some(expected.clone());
            expected
        } else {
            closure.inferred_ret = Some(last_ty.clone());
            last_ty
        };

        Type::function(param_tys, ret_ty)
    }

    /// Capture analysis: free identifiers referenced anywhere in the body
    /// except inside nested closures, minus parameters and top-level
    /// `let`/`for` bindings, filtered to names that resolve in the
    /// enclosing scope chain. Deeper shadowing is not excluded; names
    /// bound by inner blocks simply fail the resolve filter when they are
    /// genuinely local.
    fn collect_captures(&self, closure: &ClosureLit) -> Vec<String> {
        let mut bound: HashSet<String> = closure.params.iter().map(|p| p.name.clone()).collect();
        if closure.implicit_it {
            bound.insert("it".to_string());
        }
        for stmt in &closure.body.statements {
            match stmt {
                Stmt::Let(decl) => {
                    bound.insert(decl.name.clone());
                }
                Stmt::For(f) => {
                    bound.insert(f.var.clone());
                }
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        let mut captures = Vec::new();
        let mut record = |name: &str| {
            if bound.contains(name) || seen.contains(name) {
                return;
            }
            seen.insert(name.to_string());
            if self.symbols.resolve(name).is_some() {
                captures.push(name.to_string());
            }
        };
        for stmt in &closure.body.statements {
            Self::walk_stmt_idents(stmt, &mut record);
        }
        captures
    }

    fn block_references(block: &Block, target: &str) -> bool {
        let mut found = false;
        for stmt in &block.statements {
            Self::walk_stmt_idents(stmt, &mut |name| {
                if name == target {
                    found = true;
                }
            });
        }
        found
    }

    fn walk_stmt_idents(stmt: &Stmt, record: &mut impl FnMut(&str)) {
        match stmt {
            Stmt::Let(decl) => Self::walk_expr_idents(&decl.value, record),
            Stmt::Expression { expr, .. } => Self::walk_expr_idents(expr, record),
            Stmt::Block(block) => {
                for inner in &block.statements {
                    Self::walk_stmt_idents(inner, record);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    Self::walk_expr_idents(expr, record);
                }
            }
            Stmt::Export { inner, .. } => Self::walk_stmt_idents(inner, record),
            Stmt::While { cond, body, .. } => {
                Self::walk_expr_idents(cond, record);
                for inner in &body.statements {
                    Self::walk_stmt_idents(inner, record);
                }
            }
            Stmt::For(f) => {
                Self::walk_expr_idents(&f.iter, record);
                for inner in &f.body.statements {
                    Self::walk_stmt_idents(inner, record);
                }
            }
            Stmt::Extern(_)
            | Stmt::StructDef(_)
            | Stmt::EnumDef(_)
            | Stmt::TraitDecl(_)
            | Stmt::ImplBlock(_)
            | Stmt::Break { .. }
            | Stmt::Continue { .. }
            | Stmt::Import(_) => {}
        }
    }

    fn walk_expr_idents(expr: &Expr, record: &mut impl FnMut(&str)) {
        match expr {
            Expr::Ident { name, .. } => record(name),
            // Nested closures compute their own captures independently
            Expr::Closure(_) => {}
            Expr::IntLit { .. }
            | Expr::FloatLit { .. }
            | Expr::StringLit { .. }
            | Expr::BoolLit { .. }
            | Expr::NullLit { .. } => {}
            Expr::VecLit { elements, .. } => {
                for element in elements {
                    Self::walk_expr_idents(element, record);
                }
            }
            Expr::InterpString { parts, .. } => {
                for part in parts {
                    if let InterpPart::Expr(inner) = part {
                        Self::walk_expr_idents(inner, record);
                    }
                }
            }
            Expr::Unsafe { body, .. } => {
                for inner in &body.statements {
                    Self::walk_stmt_idents(inner, record);
                }
            }
            Expr::Unary { operand, .. } => Self::walk_expr_idents(operand, record),
            Expr::Assign { target, value, .. } => {
                Self::walk_expr_idents(target, record);
                Self::walk_expr_idents(value, record);
            }
            Expr::Binary { lhs, rhs, .. } => {
                Self::walk_expr_idents(lhs, record);
                Self::walk_expr_idents(rhs, record);
            }
            Expr::Function(f) => {
                for inner in &f.body.statements {
                    Self::walk_stmt_idents(inner, record);
                }
            }
            Expr::Call { callee, args, .. } => {
                Self::walk_expr_idents(callee, record);
                for arg in args {
                    Self::walk_expr_idents(arg, record);
                }
            }
            Expr::StaticCall { args, .. } => {
                for arg in args {
                    Self::walk_expr_idents(arg, record);
                }
            }
            Expr::Match {
                scrutinee, arms, ..
            } => {
                Self::walk_expr_idents(scrutinee, record);
                for arm in arms {
                    if let Pattern::Literal(inner) = &arm.pattern {
                        Self::walk_expr_idents(inner, record);
                    }
                    for inner in &arm.body.statements {
                        Self::walk_stmt_idents(inner, record);
                    }
                }
            }
            Expr::Cast { value, .. } => Self::walk_expr_idents(value, record),
            Expr::StructLit { fields, .. } => {
                for (_, value) in fields {
                    Self::walk_expr_idents(value, record);
                }
            }
            Expr::Member { object, .. } => Self::walk_expr_idents(object, record),
            Expr::Index { object, index, .. } => {
                Self::walk_expr_idents(object, record);
                Self::walk_expr_idents(index, record);
            }
            Expr::MethodCall { receiver, args, .. } => {
                Self::walk_expr_idents(receiver, record);
                for arg in args {
                    Self::walk_expr_idents(arg, record);
                }
            }
            Expr::Question { operand, .. } => Self::walk_expr_idents(operand, record),
            Expr::Range { start, end, .. } => {
                Self::walk_expr_idents(start, record);
                Self::walk_expr_idents(end, record);
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use pretty_assertions::assert_eq;

    fn analyze_program(source: &str) -> (Analyzer, Program) {
        let mut parser = Parser::new(Lexer::new(source)).expect("lex failure");
        let mut program = parser.parse_program().expect("parse failure");
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&mut program, None, "test.cb");
        (analyzer, program)
    }

    fn analyze_src(source: &str) -> Analyzer {
        analyze_program(source).0
    }

    fn messages(analyzer: &Analyzer) -> Vec<String> {
        analyzer
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }

    /// Type an expression in isolation, optionally inside a function that
    /// declares the given return type
    fn type_of_expr(source: &str, enclosing_ret: Option<Type>) -> (Type, Expr) {
        let mut parser = Parser::new(Lexer::new(source)).expect("lex failure");
        let mut expr = parser.parse_expr().expect("parse failure");
        let mut analyzer = Analyzer::new();
        if let Some(ret) = enclosing_ret {
            analyzer.return_context.push(Some(ret));
        }
        let ty = analyzer.visit_expr(&mut expr);
        (ty, expr)
    }

    // ==================== Symbol Table ====================

    #[test]
    fn shadowing_does_not_corrupt_parent_scope() {
        let mut table = SymbolTable::new();
        let symbol = |name: &str, ty: Type| Symbol {
            name: name.to_string(),
            ty,
            mutable: false,
            line: 1,
            source_module: None,
            is_unsafe: false,
        };

        table.define(symbol("x", Type::INT));
        table.enter_scope();
        table.define(symbol("x", Type::STRING));
        assert_eq!(table.resolve("x").unwrap().ty, Type::STRING);

        // Redefinition in the same scope shadows again
        table.define(symbol("x", Type::BOOL));
        assert_eq!(table.resolve("x").unwrap().ty, Type::BOOL);

        table.exit_scope();
        assert_eq!(table.resolve("x").unwrap().ty, Type::INT);
    }

    #[test]
    fn block_scope_is_restored_on_exit() {
        let analyzer = analyze_src(
            r#"
            let x = 1;
            {
                let x = "inner";
                let y = x + "!";
            }
            let z = x + 1;
            "#,
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
    }

    // ==================== Let and Annotations ====================

    #[test]
    fn annotation_wins_over_inferred_type() {
        let analyzer = analyze_src(r#"let x: int = "s";"#);
        let diags = messages(&analyzer);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("Type mismatch"), "got: {}", diags[0]);
        // The declared type, not the inferred one, is bound
        assert_eq!(analyzer.scope().resolve("x").unwrap().ty, Type::INT);
    }

    #[test]
    fn vec_literal_infers_element_type() {
        let analyzer = analyze_src("let v = [1, 2, 3];");
        assert_eq!(
            analyzer.scope().resolve("v").unwrap().ty,
            Type::generic("Vec", vec![Type::INT])
        );
    }

    #[test]
    fn unknown_identifier_reports_and_recovers() {
        let analyzer = analyze_src("let q = missing; let r = q;");
        let diags = messages(&analyzer);
        assert_eq!(diags, vec!["Variable 'missing' not found".to_string()]);
        assert_eq!(analyzer.scope().resolve("q").unwrap().ty, Type::Unknown);
    }

    // ==================== Unsafe ====================

    #[test]
    fn deref_outside_unsafe_is_reported_but_typed() {
        let analyzer = analyze_src("let p = 0 as *int; let v = *p;");
        let diags = messages(&analyzer);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("unsafe block"), "got: {}", diags[0]);
        // The walk still yields the element type
        assert_eq!(analyzer.scope().resolve("v").unwrap().ty, Type::INT);
    }

    #[test]
    fn deref_inside_unsafe_is_clean() {
        let analyzer = analyze_src("let p = 0 as *int; unsafe { let v = *p; }");
        assert_eq!(messages(&analyzer), Vec::<String>::new());
    }

    #[test]
    fn extern_symbols_require_unsafe_calls() {
        let analyzer = analyze_src("extern fn sys_time(int) -> int; let t = sys_time(0);");
        let diags = messages(&analyzer);
        assert_eq!(diags.len(), 1);
        assert!(
            diags[0].contains("requires unsafe block"),
            "got: {}",
            diags[0]
        );

        let clean =
            analyze_src("extern fn sys_time(int) -> int; unsafe { let t = sys_time(0); }");
        assert_eq!(messages(&clean), Vec::<String>::new());
    }

    // ==================== Loops ====================

    #[test]
    fn break_outside_loop_is_reported() {
        let analyzer = analyze_src("break;");
        let diags = messages(&analyzer);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("break"), "got: {}", diags[0]);

        let clean = analyze_src("while true { break; }");
        assert_eq!(messages(&clean), Vec::<String>::new());

        let cont = analyze_src("continue;");
        assert!(messages(&cont)[0].contains("continue"));
    }

    #[test]
    fn range_loop_binds_int() {
        let analyzer = analyze_src("for i in 0..10 { let next = i + 1; }");
        assert_eq!(messages(&analyzer), Vec::<String>::new());
    }

    #[test]
    fn collection_loops_bind_element_types() {
        let vec_loop = analyze_src(r#"let words = ["a", "b"]; for w in words { let line = w + "!"; }"#);
        assert_eq!(messages(&vec_loop), Vec::<String>::new());

        // HashMap iteration yields keys
        let map_loop = analyze_src(
            r#"let m = HashMap::<string, int>::new(); for key in m { let label = key + ":"; }"#,
        );
        assert_eq!(messages(&map_loop), Vec::<String>::new());
    }

    #[test]
    fn for_over_user_struct_uses_into_iter_impl() {
        let analyzer = analyze_src(
            r#"
            struct Bag { items: Vec<int> }
            impl IntoIterator for Bag {
                fn into_iter() -> Vec<int> { return [1]; }
            }
            let b = Bag { items: [1] };
            for item in b { let doubled = item * 2; }
            "#,
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
    }

    // ==================== Operators ====================

    #[test]
    fn assignment_to_immutable_is_reported() {
        let analyzer = analyze_src("let x = 1; x = 2;");
        let diags = messages(&analyzer);
        assert_eq!(diags, vec!["Cannot assign to immutable variable".to_string()]);

        let clean = analyze_src("let mut y = 1; y = 2;");
        assert_eq!(messages(&clean), Vec::<String>::new());
    }

    #[test]
    fn arithmetic_operand_types() {
        assert_eq!(messages(&analyze_src("let a = 1 + 2 * 3;")), Vec::<String>::new());
        assert_eq!(messages(&analyze_src("let b = 1.5 / 0.5;")), Vec::<String>::new());
        assert_eq!(
            messages(&analyze_src(r#"let c = "a" + "b";"#)),
            Vec::<String>::new()
        );

        let bad = analyze_src(r#"let d = 1 + "s";"#);
        let diags = messages(&bad);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("Invalid operand types"), "got: {}", diags[0]);
    }

    #[test]
    fn pointer_arithmetic_keeps_pointer_type() {
        let analyzer = analyze_src("let p = 0 as *i8; let q = p + 4;");
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(
            analyzer.scope().resolve("q").unwrap().ty,
            Type::ptr(Type::I8)
        );
    }

    #[test]
    fn comparisons_require_equal_operands_and_yield_bool() {
        let analyzer = analyze_src("let ok = 1 < 2;");
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("ok").unwrap().ty, Type::BOOL);

        let bad = analyze_src(r#"let no = 1 == "one";"#);
        assert!(messages(&bad)[0].contains("cannot compare"));
        assert_eq!(bad.scope().resolve("no").unwrap().ty, Type::BOOL);
    }

    // ==================== Functions and Calls ====================

    #[test]
    fn named_function_supports_recursion() {
        let analyzer = analyze_src(
            "fn countdown(n: int) -> int { return countdown(n - 1); } let r = countdown(3);",
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("r").unwrap().ty, Type::INT);
    }

    #[test]
    fn ok_infers_error_side_from_enclosing_return() {
        let (ty, _) = type_of_expr("Ok(5)", Some(Type::result(Type::INT, Type::STRING)));
        assert_eq!(ty, Type::result(Type::INT, Type::STRING));

        let (bare, _) = type_of_expr("Ok(5)", None);
        assert_eq!(bare, Type::result(Type::INT, Type::Unknown));

        let (err, _) = type_of_expr(r#"Err("boom")"#, Some(Type::result(Type::INT, Type::STRING)));
        assert_eq!(err, Type::result(Type::INT, Type::STRING));
    }

    #[test]
    fn some_infers_from_argument() {
        let (ty, _) = type_of_expr("Some(1.5)", None);
        assert_eq!(ty, Type::option(Type::F64));

        let (none, _) = type_of_expr("None", None);
        assert_eq!(none, Type::option(Type::ANY));
    }

    #[test]
    fn call_through_any_stays_any() {
        let (ty, _) = type_of_expr("console(1)", None);
        assert_eq!(ty, Type::ANY);
    }

    // ==================== Trait Bounds ====================

    #[test]
    fn unsatisfied_trait_bound_is_reported() {
        let analyzer = analyze_src(
            r#"
            trait Printable { }
            struct Point { x: int, y: int }
            impl Printable for Point { }
            fn show<T: Printable>(value: T) -> void { }
            show::<Point>(Point { x: 1, y: 2 });
            show::<int>(3);
            "#,
        );
        assert_eq!(
            messages(&analyzer),
            vec!["Type 'int' does not implement trait 'Printable' (required by 'show')".to_string()]
        );
    }

    #[test]
    fn bounds_use_declared_type_parameter_order() {
        // Only the second parameter is constrained; positions must still
        // line up with the declared order
        let analyzer = analyze_src(
            r#"
            trait Printable { }
            struct Point { x: int, y: int }
            impl Printable for Point { }
            fn pair<A, B: Printable>(a: A, b: B) -> void { }
            pair::<int, Point>(1, Point { x: 1, y: 2 });
            "#,
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());

        let bad = analyze_src(
            r#"
            trait Printable { }
            struct Point { x: int, y: int }
            impl Printable for Point { }
            fn pair<A, B: Printable>(a: A, b: B) -> void { }
            pair::<Point, int>(Point { x: 1, y: 2 }, 1);
            "#,
        );
        assert_eq!(
            messages(&bad),
            vec!["Type 'int' does not implement trait 'Printable' (required by 'pair')".to_string()]
        );
    }

    // ==================== Enums and Match ====================

    #[test]
    fn enum_variant_construction_checks_arity_and_types() {
        let clean = analyze_src(
            "enum Shape { Circle(f64), Square(f64, f64) } let c = Shape::Circle(1.5);",
        );
        assert_eq!(messages(&clean), Vec::<String>::new());
        assert_eq!(
            clean.scope().resolve("c").unwrap().ty.display_name(),
            "Shape"
        );

        let wrong_type =
            analyze_src("enum Shape { Circle(f64) } let c = Shape::Circle(1);");
        assert!(messages(&wrong_type)[0].contains("Type mismatch"));

        let wrong_arity =
            analyze_src("enum Shape { Square(f64, f64) } let s = Shape::Square(1.0);");
        assert!(messages(&wrong_arity)[0].contains("expects 2 arguments, got 1"));

        let unknown =
            analyze_src("enum Shape { Circle(f64) } let t = Shape::Triangle(1.0);");
        assert!(messages(&unknown)[0].contains("Unknown enum variant"));
    }

    #[test]
    fn enum_variants_are_tagged_by_declaration_order() {
        let analyzer = analyze_src("enum Shape { Circle(f64), Square(f64, f64) }");
        match &analyzer.scope().resolve("Shape").unwrap().ty {
            Type::Enum { variants, .. } => {
                assert_eq!(variants[0].tag, 0);
                assert_eq!(variants[1].tag, 1);
            }
            other => panic!("expected enum type, got {}", other),
        }
    }

    #[test]
    fn match_binds_variant_fields() {
        let analyzer = analyze_src(
            r#"
            fn describe(r: Result<int, string>) -> void {
                match r {
                    Ok(value) => value + 1,
                    Err(message) => 0,
                    _ => 0,
                }
            }
            "#,
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
    }

    #[test]
    fn match_arity_mismatch_is_reported() {
        let analyzer = analyze_src(
            r#"
            fn first(o: Option<int>) -> void {
                match o {
                    Some(a, b) => a,
                    _ => 0,
                }
            }
            "#,
        );
        let diags = messages(&analyzer);
        assert_eq!(diags.len(), 1);
        assert!(
            diags[0].contains("expects 1 bindings, got 2"),
            "got: {}",
            diags[0]
        );
    }

    // ==================== Question Operator ====================

    #[test]
    fn question_requires_matching_return_type() {
        let clean = analyze_src(
            r#"
            fn read_num() -> Result<int, string> { return Ok(3); }
            fn chain() -> Result<int, string> {
                let n = read_num()?;
                return Ok(n * 2);
            }
            "#,
        );
        assert_eq!(messages(&clean), Vec::<String>::new());

        let bad = analyze_src(
            r#"
            fn read_num() -> Result<int, string> { return Ok(3); }
            fn plain() -> int {
                let n = read_num()?;
                return n;
            }
            "#,
        );
        let diags = messages(&bad);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("'?' operator"), "got: {}", diags[0]);
    }

    // ==================== Built-in Method Tables ====================

    #[test]
    fn vec_map_with_implicit_it_closure() {
        let (ty, expr) = type_of_expr("[1, 2, 3].map { it * 2 }", None);
        assert_eq!(ty, Type::generic("Vec", vec![Type::INT]));

        // The closure node is back-patched with its inferred types
        match expr {
            Expr::MethodCall { args, .. } => match &args[0] {
                Expr::Closure(closure) => {
                    assert_eq!(closure.params.len(), 1);
                    assert_eq!(closure.params[0].name, "it");
                    assert_eq!(closure.params[0].inferred, Some(Type::INT));
                    assert_eq!(closure.inferred_ret, Some(Type::INT));
                }
                other => panic!("expected closure argument, got {:?}", other),
            },
            other => panic!("expected method call, got {:?}", other),
        }
    }

    #[test]
    fn iterator_chain_types() {
        let (ty, _) = type_of_expr("[1, 2].iter().map { it * 2 }.collect()", None);
        assert_eq!(ty, Type::generic("Vec", vec![Type::INT]));

        let (count, _) = type_of_expr("[1, 2].iter().count()", None);
        assert_eq!(count, Type::INT);
    }

    #[test]
    fn filter_keeps_element_type() {
        let (ty, expr) = type_of_expr("[1, 2, 3].filter { it > 0 }", None);
        assert_eq!(ty, Type::generic("Vec", vec![Type::INT]));

        // The closure's return type is forced to bool by the use site
        match expr {
            Expr::MethodCall { args, .. } => match &args[0] {
                Expr::Closure(closure) => {
                    assert_eq!(closure.inferred_ret, Some(Type::BOOL));
                }
                other => panic!("expected closure argument, got {:?}", other),
            },
            other => panic!("expected method call, got {:?}", other),
        }
    }

    #[test]
    fn option_and_result_method_types() {
        let (mapped, _) = type_of_expr("Some(5).map { it + 1 }", None);
        assert_eq!(mapped, Type::option(Type::INT));

        let (flag, _) = type_of_expr("Some(5).is_some()", None);
        assert_eq!(flag, Type::BOOL);

        let (res, _) = type_of_expr(
            "Ok(2).map { it * 2 }",
            Some(Type::result(Type::INT, Type::STRING)),
        );
        assert_eq!(res, Type::result(Type::INT, Type::STRING));

        let (unwrapped, _) = type_of_expr("Some(5).unwrap()", None);
        assert_eq!(unwrapped, Type::INT);
    }

    #[test]
    fn hashmap_method_types() {
        let (keys, _) = type_of_expr("HashMap::<string, int>::new().keys()", None);
        assert_eq!(keys, Type::generic("Vec", vec![Type::STRING]));

        let (value, _) = type_of_expr(r#"HashMap::<string, int>::new().get("k")"#, None);
        assert_eq!(value, Type::INT);
    }

    #[test]
    fn file_method_types() {
        let (opened, _) = type_of_expr(r#"File::open("data.txt")"#, None);
        assert_eq!(opened, Type::result(Type::FILE, Type::STRING));

        let (line, _) = type_of_expr(r#"File::open("data.txt").unwrap().read_line()"#, None);
        assert_eq!(line, Type::STRING);
    }

    #[test]
    fn unlisted_method_degrades_to_unknown() {
        let (ty, _) = type_of_expr("[1].shuffle()", None);
        assert_eq!(ty, Type::Unknown);
    }

    // ==================== Closure Inference ====================

    #[test]
    fn closure_captures_enclosing_variable_once() {
        let (_, program) = analyze_program("let offset = 10; let add = |x| x + offset + offset;");
        let closure = match &program.statements[1] {
            Stmt::Let(decl) => match &decl.value {
                Expr::Closure(c) => c,
                other => panic!("expected closure, got {:?}", other),
            },
            other => panic!("expected let, got {:?}", other),
        };
        assert_eq!(closure.captures, vec!["offset".to_string()]);
    }

    #[test]
    fn nested_closure_captures_are_not_flattened() {
        let (_, program) = analyze_program(
            "let n = 1; let outer = |x| { let g = |n| n + x; g(2); };",
        );
        let outer = match &program.statements[1] {
            Stmt::Let(decl) => match &decl.value {
                Expr::Closure(c) => c,
                other => panic!("expected closure, got {:?}", other),
            },
            other => panic!("expected let, got {:?}", other),
        };
        // `n` is only used by the nested closure's own parameter, so the
        // outer capture list must not contain it
        assert_eq!(outer.captures, Vec::<String>::new());

        let inner = match &outer.body.statements[0] {
            Stmt::Let(decl) => match &decl.value {
                Expr::Closure(c) => c,
                other => panic!("expected closure, got {:?}", other),
            },
            other => panic!("expected let, got {:?}", other),
        };
        assert_eq!(inner.captures, vec!["x".to_string()]);
    }

    #[test]
    fn closure_annotation_is_trusted() {
        let (ty, _) = type_of_expr("|x: f64| x", None);
        assert_eq!(ty, Type::function(vec![Type::F64], Type::F64));
    }

    #[test]
    fn unseeded_closure_parameter_stays_unknown() {
        let (ty, _) = type_of_expr("|x| x", None);
        assert_eq!(ty, Type::function(vec![Type::Unknown], Type::Unknown));
    }

    #[test]
    fn closure_return_inferred_from_trailing_statement() {
        let (ty, _) = type_of_expr(r#"|x: int| { let label = "n"; x * 2 }"#, None);
        assert_eq!(ty, Type::function(vec![Type::INT], Type::INT));

        let (void_ty, _) = type_of_expr("|x: int| { let y = x; }", None);
        assert_eq!(void_ty, Type::function(vec![Type::INT], Type::VOID));
    }

    // ==================== Structs and Members ====================

    #[test]
    fn struct_literal_and_member_access() {
        let analyzer = analyze_src(
            "struct Point { x: int, y: int } let p = Point { x: 1, y: 2 }; let q = p.x + 1;",
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("q").unwrap().ty, Type::INT);
    }

    #[test]
    fn generic_struct_literal_with_explicit_args() {
        let analyzer = analyze_src(
            "struct Wrap<T> { value: T } let w = Wrap::<int> { value: 1 };",
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(
            analyzer.scope().resolve("w").unwrap().ty,
            Type::generic("Wrap", vec![Type::INT])
        );
    }

    #[test]
    fn inherent_method_via_impl_block() {
        let analyzer = analyze_src(
            r#"
            struct Counter { count: int }
            impl Counter {
                fn bump(amount: int) -> int { return amount + 1; }
            }
            let c = Counter { count: 0 };
            let n = c.bump(1);
            "#,
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("n").unwrap().ty, Type::INT);
    }

    #[test]
    fn unknown_struct_literal_is_reported() {
        let analyzer = analyze_src("let g = Ghost { x: 1 };");
        assert!(messages(&analyzer)[0].contains("Unknown struct"));
    }

    // ==================== Interpolated Strings ====================

    #[test]
    fn interpolation_accepts_scalars_and_rejects_containers() {
        let clean = analyze_src(r#"let n = 3; let s = "n = ${n + 1}";"#);
        assert_eq!(messages(&clean), Vec::<String>::new());
        assert_eq!(clean.scope().resolve("s").unwrap().ty, Type::STRING);

        let bad = analyze_src(r#"let v = Vec::<int>::new(); let s = "v = ${v}";"#);
        let diags = messages(&bad);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].contains("interpolate"), "got: {}", diags[0]);
    }

    // ==================== Index and Cast ====================

    #[test]
    fn index_requires_int() {
        let analyzer = analyze_src(r#"let v = [1, 2]; let x = v["no"];"#);
        assert!(messages(&analyzer)[0].contains("Index must be int"));

        let clean = analyze_src("let v = [1, 2]; let x = v[0];");
        assert_eq!(messages(&clean), Vec::<String>::new());
    }

    #[test]
    fn cast_trusts_target_type() {
        let analyzer = analyze_src(r#"let x = "5" as int;"#);
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("x").unwrap().ty, Type::INT);
    }

    // ==================== Exports and Diagnostics ====================

    #[test]
    fn export_delegates_to_inner_statement() {
        let analyzer = analyze_src(
            "export fn helper() -> int { return 1; } let h = helper();",
        );
        assert_eq!(messages(&analyzer), Vec::<String>::new());
        assert_eq!(analyzer.scope().resolve("h").unwrap().ty, Type::INT);
    }

    #[test]
    fn diagnostics_accumulate_across_analyze_calls() {
        let mut analyzer = Analyzer::new();

        let mut first = Parser::new(Lexer::new("break;"))
            .unwrap()
            .parse_program()
            .unwrap();
        analyzer.analyze(&mut first, None, "a.cb");
        assert_eq!(analyzer.diagnostics().len(), 1);

        let mut second = Parser::new(Lexer::new("continue;"))
            .unwrap()
            .parse_program()
            .unwrap();
        analyzer.analyze(&mut second, None, "b.cb");
        assert_eq!(analyzer.diagnostics().len(), 2);
        assert_eq!(analyzer.diagnostics()[0].file.as_deref(), Some("a.cb"));
        assert_eq!(analyzer.diagnostics()[1].file.as_deref(), Some("b.cb"));
    }
}
