//! `<script>` block parsing: reactive bindings, deriveds, effects,
//! functions, imports (spec §4.3, §6.3).

use super::expr::parse_expr;
use super::Cursor;
use crate::ast::{
    BindingDecl, Block, Decl, DerivedDecl, EffectDecl, FunctionDecl, Ident, ImportSpec, ScriptAst,
    Stmt,
};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::lexer::{Keyword, Punct, Token};

pub fn parse_script_block(c: &mut Cursor) -> ScriptAst {
    let mut decls = Vec::new();
    c.skip_newlines();
    while !matches!(c.peek(), Token::ScriptClose | Token::Eof) {
        match parse_decl(c) {
            Some(decl) => decls.push(decl),
            None => c.recover_to_boundary(),
        }
        c.skip_newlines();
    }
    if matches!(c.peek(), Token::ScriptClose) {
        c.advance();
    }
    ScriptAst { decls }
}

fn parse_decl(c: &mut Cursor) -> Option<Decl> {
    match c.peek().clone() {
        Token::Punct(Punct::Tilde) => parse_binding(c).map(Decl::Binding),
        Token::Keyword(Keyword::Fn) => parse_function(c).map(Decl::Function),
        Token::Keyword(Keyword::Import) => parse_import(c).map(Decl::Import),
        Token::Ident(_) => {
            // Disambiguate `name => expr` (derived) from `name :: { body }`
            // (effect) by looking ahead past the identifier.
            match c.peek_at(1) {
                Token::Punct(Punct::FatArrow) => parse_derived(c).map(Decl::Derived),
                Token::Punct(Punct::ColonColon) => parse_effect(c).map(Decl::Effect),
                _ => {
                    c.push_error(Diagnostic::error(
                        DiagnosticCode::ParseError,
                        "expected `~name = expr`, `name => expr`, `name :: { ... }`, `fn`, or `import`",
                    ).with_span(wrap_span(c)));
                    None
                }
            }
        }
        _ => {
            c.push_error(
                Diagnostic::error(DiagnosticCode::ParseError, "expected a script declaration")
                    .with_span(wrap_span(c)),
            );
            None
        }
    }
}

fn wrap_span(c: &mut Cursor) -> crate::diagnostics::Span {
    crate::diagnostics::Span::new(c.path().clone(), c.current_span())
}

/// `~name = expr`
fn parse_binding(c: &mut Cursor) -> Option<BindingDecl> {
    let start = c.current_span();
    c.advance(); // `~`
    let name = expect_ident(c)?;
    expect_punct(c, Punct::Assign)?;
    let initializer = parse_expr(c);
    let span = start.merge(initializer.span());
    Some(BindingDecl {
        name,
        initializer,
        reactive: true,
        span,
    })
}

/// `name => expr`
fn parse_derived(c: &mut Cursor) -> Option<DerivedDecl> {
    let name = expect_ident(c)?;
    expect_punct(c, Punct::FatArrow)?;
    let expr = parse_expr(c);
    let span = name.span.merge(expr.span());
    Some(DerivedDecl {
        name,
        expr,
        deps: Vec::new(),
        span,
    })
}

/// `name :: { body }`
fn parse_effect(c: &mut Cursor) -> Option<EffectDecl> {
    let name = expect_ident(c)?;
    expect_punct(c, Punct::ColonColon)?;
    let (body, span) = parse_block(c)?;
    Some(EffectDecl {
        span: name.span.merge(span),
        name,
        deps: Vec::new(),
        body,
    })
}

/// `fn name(args) { body }`
fn parse_function(c: &mut Cursor) -> Option<FunctionDecl> {
    let start = c.current_span();
    c.advance(); // `fn`
    let name = expect_ident(c)?;
    expect_punct(c, Punct::LParen)?;
    let mut params = Vec::new();
    while !matches!(c.peek(), Token::Punct(Punct::RParen) | Token::Eof) {
        params.push(expect_ident(c)?);
        if matches!(c.peek(), Token::Punct(Punct::Comma)) {
            c.advance();
        } else {
            break;
        }
    }
    expect_punct(c, Punct::RParen)?;
    let (body, body_span) = parse_block(c)?;
    Some(FunctionDecl {
        name,
        params,
        body,
        span: start.merge(body_span),
    })
}

/// `import a, b from "path"`
fn parse_import(c: &mut Cursor) -> Option<ImportSpec> {
    let start = c.current_span();
    c.advance(); // `import`
    let mut bindings = vec![expect_ident(c)?];
    while matches!(c.peek(), Token::Punct(Punct::Comma)) {
        c.advance();
        bindings.push(expect_ident(c)?);
    }
    if !matches!(c.peek(), Token::Keyword(Keyword::From)) {
        c.push_error(
            Diagnostic::error(DiagnosticCode::ParseError, "expected `from` in import")
                .with_span(wrap_span(c)),
        );
        return None;
    }
    c.advance();
    let source = match c.peek().clone() {
        Token::Str(s) => {
            c.advance();
            s
        }
        _ => {
            c.push_error(
                Diagnostic::error(DiagnosticCode::ParseError, "expected string module path")
                    .with_span(wrap_span(c)),
            );
            return None;
        }
    };
    let end = c.current_span();
    Some(ImportSpec {
        bindings,
        source,
        span: start.merge(end),
    })
}

fn parse_block(c: &mut Cursor) -> Option<(Block, crate::span::Span)> {
    let start = c.current_span();
    expect_punct(c, Punct::LBrace)?;
    c.skip_newlines();
    let mut stmts = Vec::new();
    while !matches!(c.peek(), Token::Punct(Punct::RBrace) | Token::Eof) {
        stmts.push(parse_stmt(c)?);
        c.skip_newlines();
    }
    let end = c.current_span();
    expect_punct(c, Punct::RBrace)?;
    Some((Block { stmts }, start.merge(end)))
}

fn parse_stmt(c: &mut Cursor) -> Option<Stmt> {
    match c.peek().clone() {
        Token::Ident(_) if matches!(c.peek_at(1), Token::Punct(Punct::Assign)) => {
            let name = expect_ident(c)?;
            c.advance(); // `=`
            let value = parse_expr(c);
            Some(Stmt::Assign {
                target: name,
                value,
            })
        }
        Token::Keyword(Keyword::If) => {
            c.advance();
            let cond = parse_expr(c);
            let (then_branch, _) = parse_block(c)?;
            let else_branch = if matches!(c.peek(), Token::Keyword(Keyword::Else)) {
                c.advance();
                Some(parse_block(c)?.0)
            } else {
                None
            };
            Some(Stmt::If {
                cond,
                then_branch,
                else_branch,
            })
        }
        _ => Some(Stmt::Expr(parse_expr(c))),
    }
}

fn expect_ident(c: &mut Cursor) -> Option<Ident> {
    let span = c.current_span();
    match c.peek().clone() {
        Token::Ident(name) => {
            c.advance();
            Some(Ident { name, span })
        }
        other => {
            c.push_error(
                Diagnostic::error(
                    DiagnosticCode::ParseError,
                    format!("expected identifier, found {other:?}"),
                )
                .with_span(crate::diagnostics::Span::new(c.path().clone(), span)),
            );
            None
        }
    }
}

fn expect_punct(c: &mut Cursor, p: Punct) -> Option<()> {
    if *c.peek() == Token::Punct(p) {
        c.advance();
        Some(())
    } else {
        let span = c.current_span();
        c.push_error(
            Diagnostic::error(
                DiagnosticCode::ParseError,
                format!("expected {p:?}, found {:?}", c.peek()),
            )
            .with_span(crate::diagnostics::Span::new(c.path().clone(), span)),
        );
        None
    }
}
