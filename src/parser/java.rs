//! Lowering of tree-sitter-java trees into [`SyntaxNode`]s.
//!
//! Only nodes the pipeline can classify are kept; everything else is
//! transparent and its classified descendants attach to the nearest kept
//! ancestor. Names are resolved on a best-effort basis from the file alone:
//! imports, types declared in the file, `java.lang`, then the file's own
//! package. Invocation targets resolve through `this`, `super`, static
//! receivers, and the declared types of fields, parameters and locals.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tree_sitter::Node;

use crate::ast::{AstKind, SyntaxNode};

/// Simple name given to constructors.
pub const CONSTRUCTOR: &str = "<init>";

const JAVA_LANG: &[&str] = &[
    "AutoCloseable",
    "Boolean",
    "Byte",
    "Character",
    "Class",
    "Cloneable",
    "Comparable",
    "Double",
    "Enum",
    "Error",
    "Exception",
    "Float",
    "IllegalArgumentException",
    "IllegalStateException",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "NullPointerException",
    "Number",
    "Object",
    "Override",
    "Record",
    "Runnable",
    "RuntimeException",
    "Short",
    "String",
    "StringBuilder",
    "System",
    "Thread",
    "Throwable",
    "UnsupportedOperationException",
    "Void",
];

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "record_declaration"
            | "enum_declaration"
            | "annotation_type_declaration"
    )
}

fn starts_upper(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Drop type arguments and whitespace: `Map.Entry<K, V>` -> `Map.Entry`.
fn strip_generics(text: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Type references directly under `superclass`, `super_interfaces`, or
/// `extends_interfaces`.
fn type_refs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    for child in children(node) {
        match child.kind() {
            "type_identifier" | "scoped_type_identifier" | "generic_type" => out.push(child),
            "type_list" => type_refs(child, out),
            _ => {}
        }
    }
}

struct TypeScope {
    qualified: String,
    superclass: Option<String>,
    /// Field name -> declared type.
    fields: HashMap<String, String>,
    anonymous: usize,
}

pub(crate) struct Lowering<'s> {
    source: &'s [u8],
    file: PathBuf,
    package: String,
    /// Simple name -> qualified name, from single-type imports.
    imports: HashMap<String, String>,
    /// Member name -> owning type, from static imports.
    static_imports: HashMap<String, String>,
    /// Simple name -> qualified name, for types declared in this file.
    declared: HashMap<String, String>,
    /// Qualified type -> names of methods it declares.
    methods: HashMap<String, HashSet<String>>,
    types: Vec<TypeScope>,
    method: Option<String>,
    /// Parameter and local variable name -> declared type.
    locals: HashMap<String, String>,
}

impl<'s> Lowering<'s> {
    pub(crate) fn new(source: &'s [u8], file: &Path) -> Self {
        Self {
            source,
            file: file.to_path_buf(),
            package: String::new(),
            imports: HashMap::new(),
            static_imports: HashMap::new(),
            declared: HashMap::new(),
            methods: HashMap::new(),
            types: Vec::new(),
            method: None,
            locals: HashMap::new(),
        }
    }

    /// Lower a `program` node.
    pub(crate) fn lower_program(mut self, root: Node<'_>) -> SyntaxNode {
        for child in children(root) {
            match child.kind() {
                "package_declaration" => self.package = self.package_name(child),
                "import_declaration" => self.record_import(child),
                _ => {}
            }
        }
        let package = self.package.clone();
        self.collect_declared(root, &package, None);

        let mut unit = SyntaxNode::new(AstKind::CompilationUnit)
            .at_line(1)
            .in_file(self.file.clone());
        if !self.package.is_empty() {
            unit = unit.with_qualified_name(self.package.clone());
        }
        self.lower_children(root, &mut unit.children);
        unit
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'s str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn located(&self, kind: AstKind, node: Node<'_>) -> SyntaxNode {
        SyntaxNode::new(kind)
            .at_line(line_of(node))
            .in_file(self.file.clone())
    }

    fn current_type(&self) -> Option<String> {
        self.types.last().map(|t| t.qualified.clone())
    }

    // ─── Header and Declarations ────────────────────────────────

    fn package_name(&self, node: Node<'_>) -> String {
        children(node)
            .into_iter()
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
            .map(|c| strip_generics(self.text(c)))
            .unwrap_or_default()
    }

    fn record_import(&mut self, node: Node<'_>) {
        let text = self.text(node).trim();
        let text = text
            .strip_prefix("import")
            .unwrap_or(text)
            .trim_end_matches(';')
            .trim();
        let (is_static, path) = match text.strip_prefix("static") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
            _ => (false, text),
        };
        let path: String = path.split_whitespace().collect();
        if path.ends_with(".*") {
            return;
        }
        let Some((owner, simple)) = path.rsplit_once('.') else {
            return;
        };
        if is_static {
            self.static_imports
                .insert(simple.to_string(), owner.to_string());
        } else {
            self.imports.insert(simple.to_string(), path.clone());
        }
    }

    /// Pre-pass: every named type in the file, and the methods each declares.
    fn collect_declared(&mut self, node: Node<'_>, prefix: &str, owner: Option<&str>) {
        for child in children(node) {
            let kind = child.kind();
            if is_type_declaration(kind) {
                if let Some(name) = self.field_text(child, "name") {
                    let qualified = join(prefix, name);
                    self.declared
                        .entry(name.to_string())
                        .or_insert_with(|| qualified.clone());
                    self.methods.entry(qualified.clone()).or_default();
                    self.collect_declared(child, &qualified, Some(&qualified));
                    continue;
                }
            }
            if kind == "method_declaration" {
                if let (Some(owner), Some(name)) = (owner, self.field_text(child, "name")) {
                    self.methods
                        .entry(owner.to_string())
                        .or_default()
                        .insert(name.to_string());
                }
            }
            if kind == "class_body"
                && node.kind() == "object_creation_expression"
            {
                self.collect_declared(child, prefix, None);
                continue;
            }
            self.collect_declared(child, prefix, owner);
        }
    }

    // ─── Type Resolution ────────────────────────────────────────

    fn resolve_simple(&self, name: &str) -> String {
        if let Some(qualified) = self.imports.get(name) {
            return qualified.clone();
        }
        if let Some(qualified) = self.declared.get(name) {
            return qualified.clone();
        }
        if JAVA_LANG.contains(&name) {
            return format!("java.lang.{name}");
        }
        join(&self.package, name)
    }

    /// Resolve dotted text: a leading capitalized segment is a type to
    /// resolve, otherwise the text is already package-qualified.
    fn resolve_dotted(&self, text: &str) -> String {
        let text = strip_generics(text);
        match text.split_once('.') {
            Some((head, rest)) if starts_upper(head) => {
                format!("{}.{rest}", self.resolve_simple(head))
            }
            Some(_) => text,
            None => self.resolve_simple(&text),
        }
    }

    /// Qualified name of a type node, `None` for primitives, arrays, `var`.
    fn type_name(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "type_identifier" => {
                let text = self.text(node);
                (text != "var").then(|| self.resolve_simple(text))
            }
            "scoped_type_identifier" => Some(self.resolve_dotted(self.text(node))),
            "generic_type" => children(node)
                .into_iter()
                .find(|c| matches!(c.kind(), "type_identifier" | "scoped_type_identifier"))
                .and_then(|c| self.type_name(c)),
            _ => None,
        }
    }

    /// Declared type of each `variable_declarator` under `node`.
    fn declarators(&self, node: Node<'_>) -> Vec<(String, String)> {
        let Some(ty) = node.child_by_field_name("type").and_then(|t| self.type_name(t)) else {
            return Vec::new();
        };
        children(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .filter_map(|c| self.field_text(c, "name"))
            .map(|name| (name.to_string(), ty.clone()))
            .collect()
    }

    fn field_types(&self, body: Node<'_>) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        for child in children(body) {
            match child.kind() {
                "field_declaration" | "constant_declaration" => {
                    fields.extend(self.declarators(child));
                }
                "enum_body_declarations" => fields.extend(self.field_types(child)),
                _ => {}
            }
        }
        fields
    }

    fn lookup_variable(&self, name: &str) -> Option<String> {
        if let Some(ty) = self.locals.get(name) {
            return Some(ty.clone());
        }
        self.types
            .iter()
            .rev()
            .find_map(|t| t.fields.get(name).cloned())
    }

    /// Static type of an invocation receiver, when it can be told.
    fn receiver_type(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                self.lookup_variable(name)
                    .or_else(|| starts_upper(name).then(|| self.resolve_simple(name)))
            }
            "field_access" => {
                let object = node.child_by_field_name("object")?;
                if object.kind() == "this" {
                    let field = self.field_text(node, "field")?;
                    return self
                        .types
                        .last()
                        .and_then(|t| t.fields.get(field).cloned());
                }
                let text = self.text(node);
                let last = text.rsplit('.').next().unwrap_or(text);
                starts_upper(last.trim()).then(|| self.resolve_dotted(text))
            }
            "scoped_identifier" => Some(self.resolve_dotted(self.text(node))),
            "object_creation_expression" => node
                .child_by_field_name("type")
                .and_then(|t| self.type_name(t)),
            "string_literal" => Some("java.lang.String".to_string()),
            "parenthesized_expression" => children(node)
                .into_iter()
                .find(|c| c.is_named())
                .and_then(|c| self.receiver_type(c)),
            _ => None,
        }
    }

    /// Owner of an unqualified call: the innermost enclosing type that
    /// declares the method, else a static import, else the innermost type.
    fn unqualified_owner(&self, method: &str) -> Option<String> {
        if let Some(scope) = self
            .types
            .iter()
            .rev()
            .find(|t| self.methods.get(&t.qualified).is_some_and(|m| m.contains(method)))
        {
            return Some(scope.qualified.clone());
        }
        if let Some(owner) = self.static_imports.get(method) {
            return Some(owner.clone());
        }
        self.current_type()
    }

    // ─── Lowering ───────────────────────────────────────────────

    fn lower_children(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        for child in children(node) {
            self.lower(child, out);
        }
    }

    fn lower(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        match node.kind() {
            "package_declaration" => {
                let name = self.package_name(node);
                out.push(
                    self.located(AstKind::PackageDeclaration, node)
                        .with_qualified_name(name),
                );
            }
            "import_declaration" => {
                let text = self.text(node).trim_end_matches(';').trim().to_string();
                out.push(self.located(AstKind::ImportDeclaration, node).with_name(text));
            }
            "class_declaration" | "interface_declaration" | "record_declaration" => {
                self.type_declaration(node, AstKind::TypeDeclaration, out)
            }
            "enum_declaration" => self.type_declaration(node, AstKind::EnumDeclaration, out),
            "annotation_type_declaration" => {
                self.type_declaration(node, AstKind::AnnotationTypeDeclaration, out)
            }
            "field_declaration" | "constant_declaration" => {
                let mut field = self.located(AstKind::FieldDeclaration, node);
                if let Some((name, _)) = self.declarators(node).into_iter().next() {
                    field = field.with_name(name);
                }
                if let Some(owner) = self.current_type() {
                    field = field.with_declaring_type(owner);
                }
                self.lower_children(node, &mut field.children);
                out.push(field);
            }
            "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                self.method_declaration(node, out)
            }
            "block" | "constructor_body" => {
                let mut block = self.located(AstKind::Block, node);
                self.lower_children(node, &mut block.children);
                out.push(block);
            }
            "method_invocation" => self.method_invocation(node, out),
            "explicit_constructor_invocation" => self.constructor_invocation(node, out),
            "object_creation_expression" => self.instance_creation(node, out),
            "lambda_expression" => {
                let mut lambda = self.located(AstKind::LambdaExpression, node);
                self.lower_children(node, &mut lambda.children);
                out.push(lambda);
            }
            "local_variable_declaration" => {
                let locals = self.declarators(node);
                self.locals.extend(locals);
                self.lower_children(node, out);
            }
            "enhanced_for_statement" => {
                let ty = node.child_by_field_name("type").and_then(|t| self.type_name(t));
                if let (Some(ty), Some(name)) = (ty, self.field_text(node, "name")) {
                    self.locals.insert(name.to_string(), ty);
                }
                self.lower_children(node, out);
            }
            "static_initializer" => {
                let mut other = self.located(AstKind::Other, node).with_name("static");
                self.lower_children(node, &mut other.children);
                out.push(other);
            }
            "block_comment" if self.text(node).starts_with("/**") => {
                out.push(self.located(AstKind::Javadoc, node));
            }
            _ => self.lower_children(node, out),
        }
    }

    fn type_declaration(&mut self, node: Node<'_>, kind: AstKind, out: &mut Vec<SyntaxNode>) {
        let Some(name) = self.field_text(node, "name") else {
            self.lower_children(node, out);
            return;
        };
        let qualified = match self.types.last() {
            Some(outer) => join(&outer.qualified, name),
            None => join(&self.package, name),
        };

        let mut decl = self
            .located(kind, node)
            .with_name(name)
            .with_qualified_name(qualified.clone());
        if let Some(outer) = self.current_type() {
            decl = decl.with_declaring_type(outer);
        }

        let mut superclass = None;
        for child in children(node) {
            let is_interface = match child.kind() {
                "superclass" => false,
                "super_interfaces" | "extends_interfaces" => true,
                _ => continue,
            };
            let mut refs = Vec::new();
            type_refs(child, &mut refs);
            for r in refs {
                if let Some(ty) = self.type_name(r) {
                    if !is_interface {
                        superclass = Some(ty.clone());
                    }
                    decl = decl.with_super_type(ty, is_interface);
                }
            }
        }

        let body = node.child_by_field_name("body");
        let scope = TypeScope {
            qualified,
            superclass,
            fields: body.map(|b| self.field_types(b)).unwrap_or_default(),
            anonymous: 0,
        };
        if let Some(body) = body {
            self.within_type(scope, body, &mut decl.children);
        }
        out.push(decl);
    }

    /// Lower `body` with `scope` as the innermost type.
    fn within_type(&mut self, scope: TypeScope, body: Node<'_>, out: &mut Vec<SyntaxNode>) {
        let saved_method = self.method.take();
        let saved_locals = std::mem::take(&mut self.locals);
        self.types.push(scope);
        self.lower_children(body, out);
        self.types.pop();
        self.method = saved_method;
        self.locals = saved_locals;
    }

    fn method_declaration(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        let Some(owner) = self.current_type() else {
            self.lower_children(node, out);
            return;
        };
        let name = if node.kind() == "method_declaration" {
            match self.field_text(node, "name") {
                Some(name) => name,
                None => return self.lower_children(node, out),
            }
        } else {
            CONSTRUCTOR
        };
        let qualified = format!("{owner}.{name}");
        let mut decl = self
            .located(AstKind::MethodDeclaration, node)
            .with_name(name)
            .with_qualified_name(qualified.clone())
            .with_declaring_type(owner);

        let saved_method = self.method.replace(qualified);
        let saved_locals = std::mem::take(&mut self.locals);
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in children(params) {
                if param.kind() != "formal_parameter" {
                    continue;
                }
                let ty = param.child_by_field_name("type").and_then(|t| self.type_name(t));
                if let (Some(ty), Some(name)) = (ty, self.field_text(param, "name")) {
                    self.locals.insert(name.to_string(), ty);
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.lower(body, &mut decl.children);
        }
        self.method = saved_method;
        self.locals = saved_locals;
        out.push(decl);
    }

    fn invocation_node(&self, kind: AstKind, node: Node<'_>, name: &str) -> SyntaxNode {
        let mut call = self.located(kind, node).with_name(name);
        if let Some(method) = &self.method {
            call = call.with_enclosing_method(method.clone());
        }
        if let Some(owner) = self.current_type() {
            call = call.with_declaring_type(owner);
        }
        call
    }

    fn method_invocation(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        let Some(name) = self.field_text(node, "name") else {
            self.lower_children(node, out);
            return;
        };
        let (kind, owner) = match node.child_by_field_name("object") {
            None => (AstKind::MethodInvocation, self.unqualified_owner(name)),
            Some(object) => match object.kind() {
                "this" => (AstKind::MethodInvocation, self.current_type()),
                "super" => (
                    AstKind::SuperMethodInvocation,
                    self.types.last().and_then(|t| t.superclass.clone()),
                ),
                _ => (AstKind::MethodInvocation, self.receiver_type(object)),
            },
        };

        let mut call = self.invocation_node(kind, node, name);
        if let Some(owner) = owner {
            call = call.with_target(format!("{owner}.{name}"));
        }
        self.lower_children(node, &mut call.children);
        out.push(call);
    }

    /// `this(...)` or `super(...)` inside a constructor.
    fn constructor_invocation(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        let is_super = node
            .child_by_field_name("constructor")
            .is_some_and(|c| c.kind() == "super");
        let (kind, owner) = if is_super {
            (
                AstKind::SuperMethodInvocation,
                self.types.last().and_then(|t| t.superclass.clone()),
            )
        } else {
            (AstKind::MethodInvocation, self.current_type())
        };
        let mut call = self.invocation_node(kind, node, CONSTRUCTOR);
        if let Some(owner) = owner {
            call = call.with_target(format!("{owner}.{CONSTRUCTOR}"));
        }
        self.lower_children(node, &mut call.children);
        out.push(call);
    }

    /// `new T(...)`, with an optional anonymous class body.
    fn instance_creation(&mut self, node: Node<'_>, out: &mut Vec<SyntaxNode>) {
        let type_node = node.child_by_field_name("type");
        let created = type_node.and_then(|t| self.type_name(t));
        let simple = type_node
            .map(|t| strip_generics(self.text(t)))
            .unwrap_or_default();

        let mut creation = self.invocation_node(AstKind::ClassInstanceCreation, node, &simple);
        if let Some(created) = &created {
            creation = creation.with_target(format!("{created}.{CONSTRUCTOR}"));
        }

        for child in children(node) {
            if child.kind() != "class_body" {
                self.lower(child, &mut creation.children);
                continue;
            }
            let Some(outer) = self.types.last_mut() else {
                self.lower_children(child, &mut creation.children);
                continue;
            };
            outer.anonymous += 1;
            let qualified = format!("{}${}", outer.qualified, outer.anonymous);
            let declaring = outer.qualified.clone();

            let mut anonymous = self
                .located(AstKind::AnonymousClassDeclaration, child)
                .with_name(simple.clone())
                .with_qualified_name(qualified.clone())
                .with_declaring_type(declaring);
            let scope = TypeScope {
                qualified,
                superclass: created.clone(),
                fields: self.field_types(child),
                anonymous: 0,
            };
            self.within_type(scope, child, &mut anonymous.children);
            creation.children.push(anonymous);
        }
        out.push(creation);
    }
}
