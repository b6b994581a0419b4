//! `<template>` block parsing: elements, text, interpolations, `{#if}`,
//! `{#each}`, `{@html}`, components, slots (spec §4.3, §6.3).

use super::expr::parse_expr;
use super::Cursor;
use crate::ast::{
    Attr, ComponentInstanceNode, EachNode, ElementNode, EventBinding, Ident, IfNode,
    InterpolationNode, SlotNode, TemplateAst, TemplateNode, TextNode,
};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::lexer::{Keyword, Punct, Token};

pub fn parse_template_block(c: &mut Cursor) -> TemplateAst {
    let mut nodes = parse_nodes(c, &mut |_| false);
    if matches!(c.peek(), Token::TemplateClose) {
        c.advance();
    }
    let root = if nodes.len() <= 1 {
        nodes.pop()
    } else {
        Some(TemplateNode::Fragment(nodes))
    };
    TemplateAst { root }
}

/// Parses a run of sibling nodes, stopping when `is_end` reports that the
/// current position is a closing delimiter the caller owns (e.g. `{:else}`,
/// `{/if}`, `</tag>`).
fn parse_nodes(c: &mut Cursor, is_end: &mut dyn FnMut(&mut Cursor) -> bool) -> Vec<TemplateNode> {
    let mut nodes = Vec::new();
    loop {
        if matches!(c.peek(), Token::TemplateClose | Token::Eof) {
            break;
        }
        if is_end(c) {
            break;
        }
        match parse_node(c) {
            Some(node) => nodes.push(node),
            None => {
                c.recover_to_boundary();
                if matches!(c.peek(), Token::TemplateClose | Token::Eof) {
                    break;
                }
            }
        }
    }
    nodes
}

fn parse_node(c: &mut Cursor) -> Option<TemplateNode> {
    match c.peek().clone() {
        Token::Text(text) => {
            let span = c.current_span();
            c.advance();
            Some(TemplateNode::Text(TextNode {
                literal: text,
                span,
            }))
        }
        Token::InterpOpen => parse_interp_or_block(c),
        Token::Punct(Punct::LAngle) => parse_element_or_component(c),
        other => {
            c.push_error(Diagnostic::error(
                DiagnosticCode::ParseError,
                format!("unexpected token in template: {other:?}"),
            ));
            None
        }
    }
}

fn close_interp(c: &mut Cursor) {
    if matches!(c.peek(), Token::InterpClose) {
        c.advance();
    }
}

fn parse_interp_or_block(c: &mut Cursor) -> Option<TemplateNode> {
    let start = c.current_span();
    c.advance(); // InterpOpen
    match c.peek().clone() {
        Token::Punct(Punct::Hash) => {
            c.advance();
            match c.peek().clone() {
                Token::Keyword(Keyword::If) => {
                    c.advance();
                    Some(TemplateNode::If(parse_if_tail(c, start)?))
                }
                Token::Keyword(Keyword::Each) => {
                    c.advance();
                    Some(TemplateNode::Each(parse_each_tail(c, start)?))
                }
                other => {
                    c.push_error(Diagnostic::error(
                        DiagnosticCode::ParseError,
                        format!("expected `if` or `each` after `#`, found {other:?}"),
                    ));
                    None
                }
            }
        }
        Token::Punct(Punct::At) => {
            c.advance();
            if !matches!(c.peek(), Token::Keyword(Keyword::Html)) {
                c.push_error(Diagnostic::error(
                    DiagnosticCode::ParseError,
                    "expected `html` after `@` in template interpolation",
                ));
                return None;
            }
            c.advance();
            let expr = parse_expr(c);
            let end = c.current_span();
            close_interp(c);
            c.push_error(
                Diagnostic::hint(
                    DiagnosticCode::HtmlOptOut,
                    "{@html ...} renders unescaped markup; make sure the expression is trusted",
                )
                .with_span(crate::diagnostics::Span::new(c.path().clone(), start.merge(end))),
            );
            Some(TemplateNode::Interpolation(InterpolationNode {
                expr,
                raw_html: true,
                patch_id: None,
                span: start.merge(end),
            }))
        }
        _ => {
            let expr = parse_expr(c);
            let end = c.current_span();
            close_interp(c);
            Some(TemplateNode::Interpolation(InterpolationNode {
                expr,
                raw_html: false,
                patch_id: None,
                span: start.merge(end),
            }))
        }
    }
}

/// After `{#if`, parses `cond} body {:else if cond} body ... {:else} body {/if}`.
fn parse_if_tail(c: &mut Cursor, start: crate::span::Span) -> Option<IfNode> {
    let mut branches = Vec::new();
    let mut else_branch = None;
    let mut cond = parse_expr(c);
    close_interp(c);
    loop {
        let body = parse_nodes(c, &mut |c| is_else_or_endif(c));
        branches.push((cond.clone(), body));
        if !at_else_marker(c) {
            break;
        }
        consume_interp_hash_or_colon(c); // InterpOpen + `:`
        c.advance(); // `else`
        if matches!(c.peek(), Token::Keyword(Keyword::If)) {
            c.advance();
            cond = parse_expr(c);
            close_interp(c);
            continue;
        } else {
            close_interp(c);
            let body = parse_nodes(c, &mut |c| is_endif(c));
            else_branch = Some(body);
            break;
        }
    }
    consume_endif(c);
    let end = c.current_span();
    Some(IfNode {
        branches,
        else_branch,
        span: start.merge(end),
    })
}

fn is_else_or_endif(c: &mut Cursor) -> bool {
    at_else_marker(c) || is_endif(c)
}

fn at_else_marker(c: &mut Cursor) -> bool {
    matches!(c.peek(), Token::InterpOpen)
        && matches!(c.peek_at(1), Token::Punct(Punct::Colon))
        && matches!(c.peek_at(2), Token::Ident(name) if name == "else")
}

fn is_endif(c: &mut Cursor) -> bool {
    matches!(c.peek(), Token::InterpOpen)
        && matches!(c.peek_at(1), Token::Punct(Punct::SlashClose))
        && matches!(c.peek_at(2), Token::Keyword(Keyword::If))
}

fn is_endeach(c: &mut Cursor) -> bool {
    matches!(c.peek(), Token::InterpOpen)
        && matches!(c.peek_at(1), Token::Punct(Punct::SlashClose))
        && matches!(c.peek_at(2), Token::Keyword(Keyword::Each))
}

fn consume_interp_hash_or_colon(c: &mut Cursor) {
    c.advance(); // InterpOpen
    c.advance(); // `:`
}

fn consume_endif(c: &mut Cursor) {
    if is_endif(c) {
        c.advance(); // InterpOpen
        c.advance(); // SlashClose
        c.advance(); // `if`
        close_interp(c);
    }
}

fn consume_endeach(c: &mut Cursor) {
    if is_endeach(c) {
        c.advance();
        c.advance();
        c.advance();
        close_interp(c);
    }
}

/// After `{#each`, parses `xs as x (key?)} body {/each}`.
fn parse_each_tail(c: &mut Cursor, start: crate::span::Span) -> Option<EachNode> {
    let iterable = parse_expr(c);
    if !matches!(c.peek(), Token::Keyword(Keyword::As)) {
        c.push_error(Diagnostic::error(
            DiagnosticCode::ParseError,
            "expected `as` in `{#each ...}`",
        ));
        return None;
    }
    c.advance();
    let item_span = c.current_span();
    let item_binding = match c.peek().clone() {
        Token::Ident(name) => {
            c.advance();
            Ident {
                name,
                span: item_span,
            }
        }
        _ => {
            c.push_error(Diagnostic::error(
                DiagnosticCode::ParseError,
                "expected item binding identifier in `{#each ...}`",
            ));
            return None;
        }
    };
    let key_expr = if matches!(c.peek(), Token::Punct(Punct::LParen)) {
        c.advance();
        let key = parse_expr(c);
        if matches!(c.peek(), Token::Punct(Punct::RParen)) {
            c.advance();
        }
        Some(key)
    } else {
        None
    };
    close_interp(c);
    let body = parse_nodes(c, &mut |c| is_endeach(c));
    consume_endeach(c);
    let end = c.current_span();
    Some(EachNode {
        iterable,
        item_binding,
        key_expr,
        body,
        span: start.merge(end),
    })
}

fn parse_element_or_component(c: &mut Cursor) -> Option<TemplateNode> {
    let start = c.current_span();
    c.advance(); // `<`
    let tag = match c.peek().clone() {
        Token::Ident(name) => {
            c.advance();
            name
        }
        Token::Keyword(Keyword::Slot) => {
            c.advance();
            "slot".to_string()
        }
        other => {
            c.push_error(Diagnostic::error(
                DiagnosticCode::ParseError,
                format!("expected tag name after `<`, found {other:?}"),
            ));
            return None;
        }
    };

    if tag == "slot" {
        return parse_slot_tail(c, start);
    }

    let is_component = tag.chars().next().is_some_and(|ch| ch.is_uppercase());

    let mut attrs = Vec::new();
    let mut events = Vec::new();
    let mut two_way_binding = None;
    let mut self_closed = false;
    c.skip_newlines();
    loop {
        match c.peek().clone() {
            Token::Punct(Punct::RAngle) => {
                c.advance();
                break;
            }
            Token::Punct(Punct::Slash) => {
                c.advance();
                self_closed = true;
            }
            Token::Punct(Punct::LAngleTilde) => {
                c.advance();
                two_way_binding = Some(parse_expr(c));
            }
            Token::Punct(Punct::At) => {
                c.advance();
                let name = expect_ident_string(c)?;
                expect_eq(c)?;
                let handler = parse_attr_value_expr(c)?;
                events.push(EventBinding { name, handler });
            }
            Token::Ident(name) => {
                c.advance();
                if matches!(c.peek(), Token::Punct(Punct::Colon)) {
                    c.advance();
                    let prop = expect_ident_string(c)?;
                    expect_eq(c)?;
                    let value = parse_attr_value_expr(c)?;
                    attrs.push(Attr::Style { prop, value });
                } else if matches!(c.peek(), Token::Punct(Punct::Assign)) {
                    c.advance();
                    match c.peek().clone() {
                        Token::Str(s) => {
                            c.advance();
                            attrs.push(Attr::Static { name, value: s });
                        }
                        Token::InterpOpen => {
                            let value = parse_attr_value_expr_from_interp(c)?;
                            attrs.push(Attr::Dynamic { name, value });
                        }
                        _ => {
                            c.push_error(Diagnostic::error(
                                DiagnosticCode::ParseError,
                                "expected string or `{expr}` attribute value",
                            ));
                            return None;
                        }
                    }
                } else {
                    attrs.push(Attr::Static {
                        name,
                        value: String::new(),
                    });
                }
            }
            Token::Newline => {
                c.advance();
            }
            other => {
                c.push_error(Diagnostic::error(
                    DiagnosticCode::ParseError,
                    format!("unexpected token in tag: {other:?}"),
                ));
                return None;
            }
        }
        c.skip_newlines();
    }

    let mut children = Vec::new();
    if !self_closed {
        children = parse_nodes(c, &mut |c| is_closing_tag(c, &tag));
        consume_closing_tag(c, &tag);
    }
    let end = c.current_span();
    let span = start.merge(end);

    if is_component {
        Some(TemplateNode::ComponentInstance(ComponentInstanceNode {
            name: tag,
            props: attrs,
            children,
            span,
        }))
    } else {
        Some(TemplateNode::Element(ElementNode {
            tag,
            attrs,
            events,
            two_way_binding,
            children,
            span,
        }))
    }
}

fn parse_slot_tail(c: &mut Cursor, start: crate::span::Span) -> Option<TemplateNode> {
    let mut name = None;
    loop {
        match c.peek().clone() {
            Token::Punct(Punct::RAngle) => {
                c.advance();
                break;
            }
            Token::Punct(Punct::Slash) => {
                c.advance();
            }
            Token::Ident(attr_name) if attr_name == "name" => {
                c.advance();
                expect_eq(c)?;
                match c.peek().clone() {
                    Token::Str(s) => {
                        c.advance();
                        name = Some(s);
                    }
                    _ => {
                        c.push_error(Diagnostic::error(
                            DiagnosticCode::ParseError,
                            "expected string literal for slot name",
                        ));
                        return None;
                    }
                }
            }
            Token::Newline => {
                c.advance();
            }
            other => {
                c.push_error(Diagnostic::error(
                    DiagnosticCode::ParseError,
                    format!("unexpected token in <slot>: {other:?}"),
                ));
                return None;
            }
        }
    }
    let end = c.current_span();
    Some(TemplateNode::Slot(SlotNode {
        name,
        span: start.merge(end),
    }))
}

fn is_closing_tag(c: &mut Cursor, tag: &str) -> bool {
    matches!(c.peek(), Token::Punct(Punct::LAngle))
        && matches!(c.peek_at(1), Token::Punct(Punct::SlashClose))
        && matches!(c.peek_at(2), Token::Ident(name) if name == tag)
}

fn consume_closing_tag(c: &mut Cursor, tag: &str) {
    if is_closing_tag(c, tag) {
        c.advance(); // `<`
        c.advance(); // `/`
        c.advance(); // tag name
        if matches!(c.peek(), Token::Punct(Punct::RAngle)) {
            c.advance();
        }
    }
}

fn expect_ident_string(c: &mut Cursor) -> Option<String> {
    match c.peek().clone() {
        Token::Ident(name) => {
            c.advance();
            Some(name)
        }
        other => {
            c.push_error(Diagnostic::error(
                DiagnosticCode::ParseError,
                format!("expected identifier, found {other:?}"),
            ));
            None
        }
    }
}

fn expect_eq(c: &mut Cursor) -> Option<()> {
    if matches!(c.peek(), Token::Punct(Punct::Assign)) {
        c.advance();
        Some(())
    } else {
        c.push_error(Diagnostic::error(
            DiagnosticCode::ParseError,
            format!("expected `=`, found {:?}", c.peek()),
        ));
        None
    }
}

fn parse_attr_value_expr(c: &mut Cursor) -> Option<crate::ast::Expr> {
    match c.peek().clone() {
        Token::InterpOpen => parse_attr_value_expr_from_interp(c),
        _ => Some(parse_expr(c)),
    }
}

fn parse_attr_value_expr_from_interp(c: &mut Cursor) -> Option<crate::ast::Expr> {
    if matches!(c.peek(), Token::InterpOpen) {
        c.advance();
    }
    let expr = parse_expr(c);
    close_interp(c);
    Some(expr)
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_component;
    use crate::source_store::SourcePath;

    #[test]
    fn single_root_element_is_kept_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("one.egh");
        let src = "<template><div>hi</div></template>";
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (ast, diags) = parse_component(path, "one", src).unwrap();
        assert!(diags.is_empty());
        assert!(matches!(
            ast.template.root,
            Some(crate::ast::TemplateNode::Element(_))
        ));
    }

    #[test]
    fn multiple_top_level_siblings_become_a_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("two.egh");
        let src = "<template><div>one</div><div>two</div></template>";
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (ast, diags) = parse_component(path, "two", src).unwrap();
        assert!(diags.is_empty());
        match ast.template.root {
            Some(crate::ast::TemplateNode::Fragment(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected Fragment, got {other:?}"),
        }
    }
}
