//! Recursive-descent parser for `.egh` source (spec §4.3).
//!
//! Three cooperating sub-parsers share one token cursor: [`script`] for the
//! `<script>` block's declarations, [`template`] for the `<template>`
//! block's node tree, and [`style`] for the `<style>` block's rules.
//! [`expr`] is shared by all three, since interpolations and script
//! expressions use one grammar.

mod expr;
mod script;
mod style;
mod template;

use crate::ast::{ComponentAst, ImportSpec, ScriptAst, StyleAst, TemplateAst};
use crate::diagnostics::Diagnostic;
use crate::lexer::{Lexer, Token, TokenWithSpan};
use crate::source_store::SourcePath;

pub struct Cursor<'a> {
    tokens: &'a [TokenWithSpan],
    pos: usize,
    pub diagnostics: Vec<Diagnostic>,
    path: SourcePath,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [TokenWithSpan], path: SourcePath) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            path,
        }
    }

    pub fn path(&self) -> &SourcePath {
        &self.path
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    pub fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    pub fn current_span(&self) -> crate::span::Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    pub fn advance(&mut self) -> &TokenWithSpan {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Sync-recovery: skip forward to the next top-level declaration
    /// boundary or closing block delimiter, never re-entering a partially
    /// consumed interpolation (spec §4.3 parse-error recovery rule).
    pub fn recover_to_boundary(&mut self) {
        let mut interp_depth: i32 = 0;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::InterpOpen => {
                    interp_depth += 1;
                    self.advance();
                }
                Token::InterpClose => {
                    if interp_depth > 0 {
                        interp_depth -= 1;
                        self.advance();
                        if interp_depth == 0 {
                            return;
                        }
                    } else {
                        self.advance();
                    }
                }
                Token::Newline if interp_depth == 0 => {
                    self.advance();
                    return;
                }
                Token::ScriptClose | Token::TemplateClose | Token::StyleClose
                    if interp_depth == 0 =>
                {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub fn push_error(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}

/// Parse one `.egh` source file into a `ComponentAst` plus accumulated
/// diagnostics. Never returns `Err` for recoverable syntax problems — those
/// become `ParseError` diagnostics and the offending construct is skipped
/// (spec §4.3). Fatal lex errors (`StageError`) abort before a `ComponentAst`
/// can be produced at all.
pub fn parse_component(
    path: SourcePath,
    name: &str,
    source: &str,
) -> Result<(ComponentAst, Vec<Diagnostic>), crate::diagnostics::StageError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut cursor = Cursor::new(&tokens, path);

    let mut script = ScriptAst::default();
    let mut template = TemplateAst::default();
    let mut style = StyleAst::default();
    let mut imports: Vec<ImportSpec> = Vec::new();

    cursor.skip_newlines();
    while !cursor.at_eof() {
        match cursor.peek() {
            Token::ScriptOpen => {
                cursor.advance();
                script = script::parse_script_block(&mut cursor);
                for decl in &script.decls {
                    if let crate::ast::Decl::Import(spec) = decl {
                        imports.push(spec.clone());
                    }
                }
            }
            Token::TemplateOpen => {
                cursor.advance();
                template = template::parse_template_block(&mut cursor);
            }
            Token::StyleOpen => {
                cursor.advance();
                style = style::parse_style_block(&mut cursor);
            }
            Token::Newline => {
                cursor.advance();
            }
            Token::Eof => break,
            _ => {
                cursor.push_error(Diagnostic::error(
                    crate::diagnostics::DiagnosticCode::ParseError,
                    "expected <template>, <script>, or <style>",
                ));
                cursor.recover_to_boundary();
            }
        }
        cursor.skip_newlines();
    }

    let component = ComponentAst {
        name: crate::ast::Ident {
            name: name.to_string(),
            span: crate::span::Span::new(0, 0, 1, 1),
        },
        imports,
        script,
        template,
        style,
    };
    let diags = std::mem::take(&mut cursor.diagnostics);
    Ok((component, diags))
}
