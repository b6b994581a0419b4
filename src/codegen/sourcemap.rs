//! Source Map V3-shaped output accompanying every emitted module
//! (spec §4.2/§4.5), grounded structurally on the teacher's
//! `source_map.rs`/`source_map_cache.rs` span-translation machinery,
//! generalized from Rust output positions to JS output positions.

use crate::span::Span;
use serde::Serialize;

/// One `(generated_line, generated_col) -> source_span` mapping. Kept as a
/// flat list rather than VLQ-encoded segments — the bundler re-encodes on
/// emit, so the intermediate form favors clarity over wire size.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_col: u32,
    pub source_span: Span,
}

#[derive(Default)]
pub struct SourceMapBuilder {
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, generated_line: u32, generated_col: u32, source_span: Span) {
        self.mappings.push(Mapping {
            generated_line,
            generated_col,
            source_span,
        });
    }

    pub fn build(self, source_path: &str, source_content: &str) -> SourceMapV3 {
        let segments = self
            .mappings
            .iter()
            .map(|m| MappingSegment {
                generated_line: m.generated_line,
                generated_col: m.generated_col,
                source_line: m.source_span.line,
                source_col: m.source_span.col,
            })
            .collect();
        SourceMapV3 {
            version: 3,
            sources: vec![source_path.to_string()],
            sources_content: vec![source_content.to_string()],
            names: Vec::new(),
            mappings: segments,
        }
    }
}

/// A simplified Source Map V3 document: instead of the standard VLQ
/// `mappings` string, segments are kept structured. Still JSON-equivalent
/// per spec §6.2 ("suitable for any JSON-equivalent encoding").
#[derive(Debug, Clone, Serialize)]
pub struct SourceMapV3 {
    pub version: u8,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent")]
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: Vec<MappingSegment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingSegment {
    #[serde(rename = "generatedLine")]
    pub generated_line: u32,
    #[serde(rename = "generatedColumn")]
    pub generated_col: u32,
    #[serde(rename = "sourceLine")]
    pub source_line: u32,
    #[serde(rename = "sourceColumn")]
    pub source_col: u32,
}

impl SourceMapV3 {
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("SourceMapV3 always serializes")
    }
}
