//! The `ComponentAst` and its three sections (spec §3, §4.3).
//!
//! A fully-located tree: every node that can anchor a diagnostic or a
//! sourcemap entry carries a [`Span`]. Built by `parser/`, consumed by
//! `reactivity/` and `codegen/`.

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentAst {
    pub name: Ident,
    pub imports: Vec<ImportSpec>,
    pub script: ScriptAst,
    pub template: TemplateAst,
    pub style: StyleAst,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub bindings: Vec<Ident>,
    pub source: String,
    pub span: Span,
}

/// Ordered top-level declarations inside `<script>`, in source order — order
/// is load-bearing for declaration-order tie-breaking in the dependency
/// graph (spec §3, §4.4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptAst {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Binding(BindingDecl),
    Derived(DerivedDecl),
    Effect(EffectDecl),
    Function(FunctionDecl),
    Import(ImportSpec),
}

/// `~name = expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingDecl {
    pub name: Ident,
    pub initializer: Expr,
    pub reactive: bool,
    pub span: Span,
}

/// `name => expr`. `deps` is filled in by the reactivity analyzer, not the
/// parser — empty until then.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDecl {
    pub name: Ident,
    pub expr: Expr,
    pub deps: Vec<Ident>,
    pub span: Span,
}

/// `name :: { body }`.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDecl {
    pub name: Ident,
    pub deps: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: Ident, value: Expr },
    Assign { target: Ident, value: Expr },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
}

/// Expressions. `deps` used by interpolations/deriveds is attached
/// out-of-band in the reactivity graph rather than inline here, keeping the
/// parser's output independent of analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Number(f64, Span),
    Str(String, Span),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    FieldAccess {
        base: Box<Expr>,
        field: String,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(id) => id.span,
            Expr::Number(_, span) | Expr::Str(_, span) => *span,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::FieldAccess { span, .. } => *span,
        }
    }

    /// Free identifiers referenced by this expression, used by the
    /// reactivity analyzer to compute `deps` (spec §4.4 step 2).
    pub fn free_identifiers(&self, out: &mut Vec<String>) {
        match self {
            Expr::Ident(id) => out.push(id.name.clone()),
            Expr::Number(..) | Expr::Str(..) => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.free_identifiers(out);
                rhs.free_identifiers(out);
            }
            Expr::Unary { expr, .. } => expr.free_identifiers(out),
            Expr::Call { callee, args, .. } => {
                callee.free_identifiers(out);
                for a in args {
                    a.free_identifiers(out);
                }
            }
            Expr::FieldAccess { base, .. } => base.free_identifiers(out),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateAst {
    pub root: Option<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Interpolation(InterpolationNode),
    If(IfNode),
    Each(EachNode),
    Slot(SlotNode),
    ComponentInstance(ComponentInstanceNode),
    /// Multiple top-level siblings under one root, e.g. adjacent elements
    /// with no common wrapper (spec §4.3).
    Fragment(Vec<TemplateNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub attrs: Vec<Attr>,
    pub events: Vec<EventBinding>,
    pub two_way_binding: Option<Expr>,
    pub children: Vec<TemplateNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Static { name: String, value: String },
    Dynamic { name: String, value: Expr },
    Style { prop: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBinding {
    pub name: String,
    pub handler: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub literal: String,
    pub span: Span,
}

/// `{expr}` (escaped) or `{@html expr}` (raw opt-out). `patch_id` is filled
/// in by the reactivity analyzer (spec §4.4 step 5).
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationNode {
    pub expr: Expr,
    pub raw_html: bool,
    pub patch_id: Option<u32>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub branches: Vec<(Expr, Vec<TemplateNode>)>,
    pub else_branch: Option<Vec<TemplateNode>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EachNode {
    pub iterable: Expr,
    pub item_binding: Ident,
    pub key_expr: Option<Expr>,
    pub body: Vec<TemplateNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotNode {
    pub name: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstanceNode {
    pub name: String,
    pub props: Vec<Attr>,
    pub children: Vec<TemplateNode>,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleAst {
    pub rules: Vec<StyleRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: String,
    pub body: String,
    pub span: Span,
}
