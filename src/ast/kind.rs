//! The finite universe of AST node kinds.
//!
//! Each kind has a dense integer code, assigned by declaration order and
//! stable for the lifetime of the process. Codes index the stop set and the
//! visitor registry directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a node in a source AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstKind {
    /// Root of a parsed source file.
    CompilationUnit,
    PackageDeclaration,
    ImportDeclaration,
    /// A class or interface declaration.
    TypeDeclaration,
    EnumDeclaration,
    AnnotationTypeDeclaration,
    AnonymousClassDeclaration,
    FieldDeclaration,
    /// A method or constructor declaration.
    MethodDeclaration,
    Block,
    /// A call `receiver.name(args)` or `name(args)`.
    MethodInvocation,
    SuperMethodInvocation,
    ClassInstanceCreation,
    LambdaExpression,
    Javadoc,
    /// Anything the producer does not classify further.
    Other,
}

impl AstKind {
    /// Number of kinds in the universe.
    pub const COUNT: usize = 16;

    /// Every kind, in code order.
    pub const ALL: [AstKind; AstKind::COUNT] = [
        AstKind::CompilationUnit,
        AstKind::PackageDeclaration,
        AstKind::ImportDeclaration,
        AstKind::TypeDeclaration,
        AstKind::EnumDeclaration,
        AstKind::AnnotationTypeDeclaration,
        AstKind::AnonymousClassDeclaration,
        AstKind::FieldDeclaration,
        AstKind::MethodDeclaration,
        AstKind::Block,
        AstKind::MethodInvocation,
        AstKind::SuperMethodInvocation,
        AstKind::ClassInstanceCreation,
        AstKind::LambdaExpression,
        AstKind::Javadoc,
        AstKind::Other,
    ];

    /// Dense code in `0..COUNT`.
    pub fn code(self) -> usize {
        self as usize
    }

    pub fn from_code(code: usize) -> Option<Self> {
        Self::ALL.get(code).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AstKind::CompilationUnit => "compilation_unit",
            AstKind::PackageDeclaration => "package_declaration",
            AstKind::ImportDeclaration => "import_declaration",
            AstKind::TypeDeclaration => "type_declaration",
            AstKind::EnumDeclaration => "enum_declaration",
            AstKind::AnnotationTypeDeclaration => "annotation_type_declaration",
            AstKind::AnonymousClassDeclaration => "anonymous_class_declaration",
            AstKind::FieldDeclaration => "field_declaration",
            AstKind::MethodDeclaration => "method_declaration",
            AstKind::Block => "block",
            AstKind::MethodInvocation => "method_invocation",
            AstKind::SuperMethodInvocation => "super_method_invocation",
            AstKind::ClassInstanceCreation => "class_instance_creation",
            AstKind::LambdaExpression => "lambda_expression",
            AstKind::Javadoc => "javadoc",
            AstKind::Other => "other",
        }
    }
}

impl fmt::Display for AstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AstKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown AST node kind: {s}"))
    }
}
