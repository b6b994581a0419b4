//! Virtual-node emission: translates `TemplateNode`/`Expr` into JS source
//! text built around `h(tag, attrs, children)` factory calls, grounded
//! structurally on the teacher's `transformer.rs` per-node dispatch and
//! variable-numbering approach (retargeted from Rust/web_sys output to a
//! JS module).

use crate::ast::{
    Attr, BinOp, Block, EachNode, ElementNode, Expr, IfNode, Stmt, TemplateNode, UnOp,
};
use std::fmt::Write as _;

pub struct VarGen {
    next: u32,
}

impl VarGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self, prefix: &str) -> String {
        let id = self.next;
        self.next += 1;
        format!("__{prefix}{id}")
    }
}

pub fn expr_to_js(expr: &Expr) -> String {
    match expr {
        Expr::Ident(id) => id.name.clone(),
        Expr::Number(n, _) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Expr::Str(s, _) => format!("{:?}", s),
        Expr::Binary { op, lhs, rhs, .. } => {
            format!("({} {} {})", expr_to_js(lhs), bin_op_js(*op), expr_to_js(rhs))
        }
        Expr::Unary { op, expr, .. } => {
            format!("{}{}", un_op_js(*op), expr_to_js(expr))
        }
        Expr::Call { callee, args, .. } => {
            let args_js: Vec<String> = args.iter().map(expr_to_js).collect();
            format!("{}({})", expr_to_js(callee), args_js.join(", "))
        }
        Expr::FieldAccess { base, field, .. } => {
            format!("{}.{}", expr_to_js(base), field)
        }
    }
}

fn bin_op_js(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "===",
        BinOp::Ne => "!==",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn un_op_js(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
    }
}

fn escape_html_call(expr_js: &str) -> String {
    format!("__escape({expr_js})")
}

/// Transpiles a `Block`'s statements to JS source, one statement per line,
/// indented by `indent`. Used for function and effect bodies (spec §4.5).
pub fn block_to_js(block: &Block, indent: &str) -> String {
    let mut out = String::new();
    for stmt in &block.stmts {
        let _ = writeln!(out, "{}{}", indent, stmt_to_js(stmt, indent));
    }
    out
}

fn stmt_to_js(stmt: &Stmt, indent: &str) -> String {
    match stmt {
        Stmt::Let { name, value } => format!("let {} = {};", name.name, expr_to_js(value)),
        Stmt::Assign { target, value } => {
            format!("{} = {};", target.name, expr_to_js(value))
        }
        Stmt::Expr(expr) => format!("{};", expr_to_js(expr)),
        Stmt::Return(Some(expr)) => format!("return {};", expr_to_js(expr)),
        Stmt::Return(None) => "return;".to_string(),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let inner_indent = format!("{indent}  ");
            let mut out = format!("if ({}) {{\n", expr_to_js(cond));
            out.push_str(&block_to_js(then_branch, &inner_indent));
            out.push_str(indent);
            out.push('}');
            if let Some(else_branch) = else_branch {
                out.push_str(" else {\n");
                out.push_str(&block_to_js(else_branch, &inner_indent));
                out.push_str(indent);
                out.push('}');
            }
            out
        }
    }
}

/// Emits a JS expression constructing the virtual-node (sub)tree for one
/// template node. `if`/`each` expand to guarded subtrees carrying their
/// `patch_id` (spec §4.5) so the runtime can reconcile minimally; both are
/// wrapped as an immediately-invoked function expression so the whole node
/// stays embeddable anywhere an expression is expected.
pub fn node_to_vnode_expr(node: &TemplateNode, vars: &mut VarGen) -> String {
    match node {
        TemplateNode::Text(t) => format!("{:?}", t.literal),
        TemplateNode::Interpolation(interp) => {
            let value = expr_to_js(&interp.expr);
            let patch_id = interp.patch_id.unwrap_or(0);
            if interp.raw_html {
                format!("__rawHtml({value}, {patch_id})")
            } else {
                format!("__text({}, {patch_id})", escape_html_call(&value))
            }
        }
        TemplateNode::Element(el) => element_to_vnode_expr(el, vars),
        TemplateNode::If(if_node) => if_to_vnode_expr(if_node, vars),
        TemplateNode::Each(each) => each_to_vnode_expr(each, vars),
        TemplateNode::Slot(slot) => match &slot.name {
            Some(name) => format!("__slot({name:?})"),
            None => "__slot(null)".to_string(),
        },
        TemplateNode::ComponentInstance(comp) => {
            let props: Vec<String> = comp
                .props
                .iter()
                .map(|attr| attr_to_prop_entry(attr))
                .collect();
            let children: Vec<String> = comp
                .children
                .iter()
                .map(|c| node_to_vnode_expr(c, vars))
                .collect();
            format!(
                "h({}, {{{}}}, [{}])",
                comp.name,
                props.join(", "),
                children.join(", ")
            )
        }
        TemplateNode::Fragment(children) => {
            let items: Vec<String> = children.iter().map(|c| node_to_vnode_expr(c, vars)).collect();
            format!("__frag([{}])", items.join(", "))
        }
    }
}

fn attr_to_prop_entry(attr: &Attr) -> String {
    match attr {
        Attr::Static { name, value } => format!("{name:?}: {value:?}"),
        Attr::Dynamic { name, value } => format!("{name:?}: {}", expr_to_js(value)),
        Attr::Style { prop, value } => format!("{prop:?}: {}", expr_to_js(value)),
    }
}

fn element_to_vnode_expr(el: &ElementNode, vars: &mut VarGen) -> String {
    let mut attr_entries: Vec<String> = el.attrs.iter().map(attr_to_prop_entry).collect();
    for event in &el.events {
        attr_entries.push(format!("on{}: {}", capitalize(&event.name), expr_to_js(&event.handler)));
    }
    if let Some(binding) = &el.two_way_binding {
        attr_entries.push(format!("__bind: {}", expr_to_js(binding)));
    }
    let children: Vec<String> = el
        .children
        .iter()
        .map(|c| node_to_vnode_expr(c, vars))
        .collect();
    format!(
        "h({:?}, {{{}}}, [{}])",
        el.tag,
        attr_entries.join(", "),
        children.join(", ")
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn if_to_vnode_expr(if_node: &IfNode, vars: &mut VarGen) -> String {
    let var = vars.next("if");
    let mut body = String::new();
    let _ = writeln!(body, "let {var};");
    for (i, (cond, branch)) in if_node.branches.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        let _ = writeln!(body, "{keyword} ({}) {{", expr_to_js(cond));
        let items: Vec<String> = branch.iter().map(|n| node_to_vnode_expr(n, vars)).collect();
        let _ = writeln!(body, "  {var} = __frag([{}]);", items.join(", "));
        let _ = writeln!(body, "}}");
    }
    if let Some(else_branch) = &if_node.else_branch {
        let _ = writeln!(body, "else {{");
        let items: Vec<String> = else_branch.iter().map(|n| node_to_vnode_expr(n, vars)).collect();
        let _ = writeln!(body, "  {var} = __frag([{}]);", items.join(", "));
        let _ = writeln!(body, "}}");
    } else {
        let _ = writeln!(body, "else {{ {var} = __empty(); }}");
    }
    let _ = writeln!(body, "return {var};");
    format!("(() => {{\n{body}}})()")
}

fn each_to_vnode_expr(each: &EachNode, vars: &mut VarGen) -> String {
    let item = &each.item_binding.name;
    let key_js = each
        .key_expr
        .as_ref()
        .map(expr_to_js)
        .unwrap_or_else(|| "__index".to_string());
    let items: Vec<String> = each.body.iter().map(|n| node_to_vnode_expr(n, vars)).collect();
    format!(
        "{}.map(({item}, __index) => __keyed({key_js}, [{}]))",
        expr_to_js(&each.iterable),
        items.join(", ")
    )
}
