//! Expression grammar shared by script declarations and template
//! interpolations, with explicit precedence climbing (spec §4.3).

use super::Cursor;
use crate::ast::{BinOp, Expr, Ident, UnOp};
use crate::lexer::{Keyword, Punct, Token};

/// `||` binds loosest, then `&&`, comparisons, additive, multiplicative,
/// unary, then primary/postfix.
pub fn parse_expr(c: &mut Cursor) -> Expr {
    parse_or(c)
}

fn parse_or(c: &mut Cursor) -> Expr {
    let mut lhs = parse_and(c);
    while matches!(c.peek(), Token::Punct(Punct::OrOr)) {
        let start = c.current_span();
        c.advance();
        let rhs = parse_and(c);
        lhs = Expr::Binary {
            op: BinOp::Or,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_and(c: &mut Cursor) -> Expr {
    let mut lhs = parse_equality(c);
    while matches!(c.peek(), Token::Punct(Punct::AndAnd)) {
        let start = c.current_span();
        c.advance();
        let rhs = parse_equality(c);
        lhs = Expr::Binary {
            op: BinOp::And,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_equality(c: &mut Cursor) -> Expr {
    let mut lhs = parse_comparison(c);
    loop {
        let op = match c.peek() {
            Token::Punct(Punct::EqEq) => BinOp::Eq,
            Token::Punct(Punct::Ne) => BinOp::Ne,
            _ => break,
        };
        let start = c.current_span();
        c.advance();
        let rhs = parse_comparison(c);
        lhs = Expr::Binary {
            op,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_comparison(c: &mut Cursor) -> Expr {
    let mut lhs = parse_additive(c);
    loop {
        let op = match c.peek() {
            Token::Punct(Punct::LAngle) => BinOp::Lt,
            Token::Punct(Punct::Le) => BinOp::Le,
            Token::Punct(Punct::RAngle) => BinOp::Gt,
            Token::Punct(Punct::Ge) => BinOp::Ge,
            _ => break,
        };
        let start = c.current_span();
        c.advance();
        let rhs = parse_additive(c);
        lhs = Expr::Binary {
            op,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_additive(c: &mut Cursor) -> Expr {
    let mut lhs = parse_multiplicative(c);
    loop {
        let op = match c.peek() {
            Token::Punct(Punct::Plus) => BinOp::Add,
            Token::Punct(Punct::Minus) => BinOp::Sub,
            _ => break,
        };
        let start = c.current_span();
        c.advance();
        let rhs = parse_multiplicative(c);
        lhs = Expr::Binary {
            op,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_multiplicative(c: &mut Cursor) -> Expr {
    let mut lhs = parse_unary(c);
    loop {
        let op = match c.peek() {
            Token::Punct(Punct::Star) => BinOp::Mul,
            Token::Punct(Punct::Slash) => BinOp::Div,
            Token::Punct(Punct::Percent) => BinOp::Mod,
            _ => break,
        };
        let start = c.current_span();
        c.advance();
        let rhs = parse_unary(c);
        lhs = Expr::Binary {
            op,
            span: start.merge(rhs.span()),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    lhs
}

fn parse_unary(c: &mut Cursor) -> Expr {
    match c.peek() {
        Token::Punct(Punct::Minus) => {
            let start = c.current_span();
            c.advance();
            let expr = parse_unary(c);
            Expr::Unary {
                op: UnOp::Neg,
                span: start.merge(expr.span()),
                expr: Box::new(expr),
            }
        }
        Token::Punct(Punct::Bang) => {
            let start = c.current_span();
            c.advance();
            let expr = parse_unary(c);
            Expr::Unary {
                op: UnOp::Not,
                span: start.merge(expr.span()),
                expr: Box::new(expr),
            }
        }
        _ => parse_postfix(c),
    }
}

fn parse_postfix(c: &mut Cursor) -> Expr {
    let mut expr = parse_primary(c);
    loop {
        match c.peek() {
            Token::Punct(Punct::Dot) => {
                c.advance();
                let field = match c.peek().clone() {
                    Token::Ident(name) => {
                        c.advance();
                        name
                    }
                    _ => String::new(),
                };
                let span = expr.span().merge(c.current_span());
                expr = Expr::FieldAccess {
                    base: Box::new(expr),
                    field,
                    span,
                };
            }
            Token::Punct(Punct::LParen) => {
                let open = c.current_span();
                c.advance();
                let mut args = Vec::new();
                while !matches!(c.peek(), Token::Punct(Punct::RParen) | Token::Eof) {
                    args.push(parse_expr(c));
                    if matches!(c.peek(), Token::Punct(Punct::Comma)) {
                        c.advance();
                    } else {
                        break;
                    }
                }
                let close = c.current_span();
                if matches!(c.peek(), Token::Punct(Punct::RParen)) {
                    c.advance();
                }
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: open.merge(close),
                };
            }
            _ => break,
        }
    }
    expr
}

fn parse_primary(c: &mut Cursor) -> Expr {
    let span = c.current_span();
    match c.peek().clone() {
        Token::Ident(name) => {
            c.advance();
            Expr::Ident(Ident { name, span })
        }
        Token::Keyword(Keyword::Html) => {
            c.advance();
            Expr::Ident(Ident {
                name: "html".to_string(),
                span,
            })
        }
        Token::Number(n) => {
            c.advance();
            Expr::Number(n, span)
        }
        Token::Str(s) => {
            c.advance();
            Expr::Str(s, span)
        }
        Token::Punct(Punct::LParen) => {
            c.advance();
            let inner = parse_expr(c);
            if matches!(c.peek(), Token::Punct(Punct::RParen)) {
                c.advance();
            }
            inner
        }
        _ => {
            c.push_error(crate::diagnostics::Diagnostic::error(
                crate::diagnostics::DiagnosticCode::ParseError,
                format!("expected expression, found {:?}", c.peek()),
            ));
            Expr::Ident(Ident {
                name: String::new(),
                span,
            })
        }
    }
}
