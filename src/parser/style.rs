//! `<style>` block parsing: a flat list of `selector { body }` rules
//! (spec §3, §6.3). The lexer hands the whole block back as one `Text`
//! token; this module splits it into rules so the code generator can
//! rewrite each selector with the component's scope class.

use super::Cursor;
use crate::ast::StyleRule;
use crate::lexer::Token;

pub fn parse_style_block(c: &mut Cursor) -> crate::ast::StyleAst {
    let mut rules = Vec::new();
    let span = c.current_span();
    if let Token::Text(raw) = c.peek().clone() {
        c.advance();
        rules.extend(split_rules(&raw, span));
    }
    if matches!(c.peek(), Token::StyleClose) {
        c.advance();
    }
    crate::ast::StyleAst { rules }
}

fn split_rules(raw: &str, span: crate::span::Span) -> Vec<StyleRule> {
    let mut rules = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        let selector = rest[..open].trim();
        if selector.is_empty() {
            break;
        }
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let body = rest[open + 1..open + close].trim().to_string();
        rules.push(StyleRule {
            selector: selector.to_string(),
            body,
            span,
        });
        rest = &rest[open + close + 1..];
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_rules() {
        let span = crate::span::Span::new(0, 0, 1, 1);
        let rules = split_rules(".a { color: red; } .b { color: blue; }", span);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selector, ".a");
        assert_eq!(rules[1].body, "color: blue;");
    }
}
