//! Java source parsing via tree-sitter.
//!
//! [`parse_file`] turns one `.java` file into a [`SyntaxNode`] tree whose
//! declarations carry qualified names and whose invocations carry resolved
//! targets where the file alone is enough to tell.

mod java;

pub use java::CONSTRUCTOR;

use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use tree_sitter::Parser;

use crate::ast::SyntaxNode;
use crate::error::{DepmapError, Result};

/// `.java` extension, nothing else.
pub fn is_java_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("java")
}

/// Parse Java `source`, attributing nodes to `path`.
///
/// tree-sitter recovers from syntax errors, so a file with errors still
/// lowers; the broken regions simply contribute fewer nodes.
pub fn parse_file(path: &Path, source: &str) -> Result<SyntaxNode> {
    let parse_error = |message: String| DepmapError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| parse_error(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        warn!(path = %path.display(), "syntax errors, lowering recovered tree");
    }
    let unit = java::Lowering::new(source.as_bytes(), path).lower_program(root);
    debug!(path = %path.display(), nodes = unit.size(), "file lowered");
    Ok(unit)
}

/// Read and parse a file from disk.
pub fn read_and_parse(path: &Path) -> Result<SyntaxNode> {
    let source = fs::read_to_string(path)?;
    parse_file(path, &source)
}
