use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tree_sitter::Node;

use crate::index::Modifiers;
use crate::syntax::{
    self, SourceTree, cursor_in_javadoc, is_statement_kind, is_type_declaration_kind,
};

/// A local variable or parameter visible at the cursor.
#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: Arc<str>,
    /// Declared type: qualified name, primitive, array form, or `var`
    /// until the initializer has been resolved.
    pub ty: Arc<str>,
    /// Start byte of the declaration, for before-cursor filtering.
    pub declared_at: usize,
    /// Raw initializer text for `var` declarations, resolved lazily.
    pub init_expr: Option<String>,
}

/// Coarse classification of where the token sits, delivered to the
/// requestor once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenLocation {
    StartOfImport,
    StartOfStatement,
    StartOfMember,
    ConstructorTypePosition,
    Unclassified,
}

/// Cursor-relative facts shared by every completion branch: the token
/// being completed, its ranges, the node to complete, and the enclosing
/// declarations. Immutable after derivation.
pub struct CompletionContext<'t> {
    pub source: &'t str,
    pub offset: usize,
    pub tree: &'t SourceTree,
    pub parse_offset: usize,
    /// Node the completion targets; `None` when even the recovery parse
    /// gave nothing usable at the cursor.
    pub node: Option<Node<'t>>,
    /// Partial identifier before the cursor. `None` suppresses completion
    /// (cursor right after a closed string literal).
    pub token: Option<String>,
    /// Start of the token in original-buffer coordinates.
    pub token_start: usize,
    pub location: TokenLocation,
    pub in_javadoc: bool,
    pub package: Option<Arc<str>>,
    pub imports: Vec<Arc<str>>,
    pub static_imports: Vec<Arc<str>>,
    /// Dot-qualified name of the innermost enclosing type declaration.
    pub enclosing_type: Option<Arc<str>>,
    pub enclosing_type_node: Option<Node<'t>>,
    pub enclosing_method: Option<Node<'t>>,
    pub in_static_context: bool,
    pub char_after_cursor: Option<char>,
}

impl<'t> CompletionContext<'t> {
    pub fn derive(tree: &'t SourceTree, source: &'t str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let parse_offset = tree.to_parse_offset(offset);
        let (token, token_start) = scan_token(source, offset, tree, parse_offset);
        let node = select_node(tree, parse_offset);
        let location = node
            .map(|n| classify_location(tree, n, token_start))
            .unwrap_or(TokenLocation::Unclassified);
        let (package, imports, static_imports) = scan_header(tree);
        let enclosing_type_node = node.and_then(enclosing_type_decl);
        let enclosing_type =
            enclosing_type_node.and_then(|decl| qualified_type_name(tree, decl, package.as_deref()));
        let enclosing_method = node.and_then(|n| {
            syntax::find_ancestor(n, "method_declaration")
                .or_else(|| syntax::find_ancestor(n, "constructor_declaration"))
        });
        let in_static_context = node.is_some_and(|n| static_context(tree, n));
        let char_after_cursor = source[offset..].chars().next();

        Self {
            source,
            offset,
            tree,
            parse_offset,
            node,
            token,
            token_start,
            location,
            in_javadoc: cursor_in_javadoc(source, offset),
            package,
            imports,
            static_imports,
            enclosing_type,
            enclosing_type_node,
            enclosing_method,
            in_static_context,
            char_after_cursor,
        }
    }

    pub fn token_str(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }

    /// Byte range in the original buffer a proposal replaces.
    pub fn replace_range(&self) -> Range<usize> {
        self.token_start..self.offset
    }

    pub fn token_range(&self) -> Range<usize> {
        self.token_start..self.offset
    }

    /// The cursor is immediately followed by `(`; method completions must
    /// not append their own parenthesis.
    pub fn has_paren_after_cursor(&self) -> bool {
        self.char_after_cursor == Some('(')
    }

    /// Whether an import (exact or wildcard) already covers `qualified`.
    pub fn is_imported(&self, qualified: &str) -> bool {
        self.imports.iter().any(|imp| {
            imp.as_ref() == qualified
                || imp
                    .strip_suffix(".*")
                    .is_some_and(|pkg| crate::index::package_of(qualified) == Some(pkg))
        })
    }
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Scan the partial identifier immediately before the cursor. Returns
/// `(None, offset)` when the cursor sits right after a closed string
/// literal, which is not a completion point.
fn scan_token(
    source: &str,
    offset: usize,
    tree: &SourceTree,
    parse_offset: usize,
) -> (Option<String>, usize) {
    if let Some(node) = tree.node_before(parse_offset)
        && let Some(s) = syntax::ancestor_or_self(node, "string_literal")
        && parse_offset >= s.end_byte()
    {
        return (None, offset);
    }
    let before = &source[..offset];
    let start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(offset);
    (Some(before[start..].to_string()), start)
}

/// Pick the node to complete: the node at the cursor, or, when the cursor
/// trails whitespace, the last non-whitespace node before it, unless that
/// node is a name or literal the user may still be typing.
fn select_node<'t>(tree: &'t SourceTree, parse_offset: usize) -> Option<Node<'t>> {
    let direct = tree.node_before(parse_offset);
    let text = tree.text();
    let trailing_ws = text[..parse_offset.min(text.len())]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_whitespace());
    if !trailing_ws {
        return direct;
    }
    let last_non_ws = text[..parse_offset.min(text.len())]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i);
    let Some(pos) = last_non_ws else {
        return direct;
    };
    let walked = tree.node_before(pos + 1);
    match walked {
        Some(n) if is_name_or_literal(n.kind()) => direct.or(walked),
        Some(n) => Some(n),
        None => direct,
    }
}

fn is_name_or_literal(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "type_identifier"
            | "string_literal"
            | "character_literal"
            | "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal"
            | "decimal_floating_point_literal"
            | "true"
            | "false"
            | "null_literal"
    )
}

/// Walk upward until something fixes the token's coarse location.
fn classify_location(tree: &SourceTree, node: Node, token_start: usize) -> TokenLocation {
    let token_parse_start = tree.to_parse_offset(token_start);
    let mut child = node;
    let mut current = Some(node);
    while let Some(n) = current {
        match n.kind() {
            "import_declaration" => return TokenLocation::StartOfImport,
            "object_creation_expression" => {
                if let Some(ty) = n.child_by_field_name("type")
                    && ty.start_byte() <= token_parse_start
                    && token_parse_start <= ty.end_byte()
                {
                    return TokenLocation::ConstructorTypePosition;
                }
            }
            "class_body" | "interface_body" | "enum_body" | "annotation_type_body" => {
                // Only a member-boundary position counts, not somewhere
                // deep inside an existing member.
                if child == n || child.start_byte() == token_parse_start || child.kind() == "{" {
                    return TokenLocation::StartOfMember;
                }
                return TokenLocation::Unclassified;
            }
            "block" | "constructor_body" => {
                if child == n || child.start_byte() == token_parse_start || child.kind() == "{" {
                    return TokenLocation::StartOfStatement;
                }
                return TokenLocation::Unclassified;
            }
            "method_declaration" | "field_declaration" => {
                if n.start_byte() == token_parse_start
                    && n.parent().is_some_and(|p| {
                        matches!(p.kind(), "class_body" | "interface_body" | "enum_body")
                    })
                {
                    return TokenLocation::StartOfMember;
                }
            }
            kind if is_statement_kind(kind) => {
                if n.start_byte() == token_parse_start {
                    return TokenLocation::StartOfStatement;
                }
            }
            kind if is_type_declaration_kind(kind) => {
                if n.start_byte() == token_parse_start
                    && n.parent().is_some_and(|p| {
                        matches!(p.kind(), "class_body" | "interface_body" | "enum_body")
                    })
                {
                    return TokenLocation::StartOfMember;
                }
            }
            _ => {}
        }
        child = n;
        current = n.parent();
    }
    TokenLocation::Unclassified
}

/// Package declaration and import lists from the compilation-unit header.
fn scan_header(tree: &SourceTree) -> (Option<Arc<str>>, Vec<Arc<str>>, Vec<Arc<str>>) {
    let root = tree.root();
    let mut package = None;
    let mut imports = Vec::new();
    let mut static_imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => {
                let mut pc = child.walk();
                for part in child.children(&mut pc) {
                    if matches!(part.kind(), "identifier" | "scoped_identifier") {
                        package = Some(Arc::from(tree.clean_node_text(part).as_str()));
                    }
                }
            }
            "import_declaration" => {
                let text = tree.clean_node_text(child);
                let is_static = text.contains("static ");
                let path: String = text
                    .trim_start_matches("import")
                    .trim_start()
                    .trim_start_matches("static")
                    .trim()
                    .trim_end_matches(';')
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                if path.is_empty() {
                    continue;
                }
                if is_static {
                    static_imports.push(Arc::from(path.as_str()));
                } else {
                    imports.push(Arc::from(path.as_str()));
                }
            }
            _ => {}
        }
    }
    (package, imports, static_imports)
}

fn enclosing_type_decl(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        current = current.parent()?;
        if is_type_declaration_kind(current.kind()) {
            return Some(current);
        }
    }
}

/// Dot-qualified name of a (possibly nested) type declaration.
pub(crate) fn qualified_type_name(
    tree: &SourceTree,
    decl: Node,
    package: Option<&str>,
) -> Option<Arc<str>> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(decl);
    while let Some(n) = current {
        if is_type_declaration_kind(n.kind())
            && let Some(name) = n.child_by_field_name("name")
            && let Some(text) = syntax::identifier_text(name, tree.text())
        {
            segments.push(text.to_string());
        }
        current = n.parent();
    }
    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    let nested = segments.join(".");
    Some(match package {
        Some(pkg) => Arc::from(format!("{pkg}.{nested}").as_str()),
        None => Arc::from(nested.as_str()),
    })
}

/// Static method, static field initializer, or static initializer block.
fn static_context(tree: &SourceTree, node: Node) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        match n.kind() {
            "static_initializer" => return true,
            "method_declaration" | "field_declaration" => {
                return declared_modifiers(tree, n).contains(Modifiers::STATIC);
            }
            "constructor_declaration" => return false,
            kind if is_type_declaration_kind(kind) => return false,
            _ => {}
        }
        current = n.parent();
    }
    false
}

pub(crate) fn declared_modifiers(tree: &SourceTree, decl: Node) -> Modifiers {
    let mut cursor = decl.walk();
    decl.children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
        .map(|m| Modifiers::parse(tree.node_text(m)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn ctx_at<'t>(tree: &'t SourceTree, source: &'t str, offset: usize) -> CompletionContext<'t> {
        CompletionContext::derive(tree, source, offset)
    }

    #[test]
    fn test_token_scan_back() {
        let src = "class Foo { void bar() { int count = 0; cou } }";
        let offset = src.find("cou }").unwrap() + 3;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert_eq!(ctx.token.as_deref(), Some("cou"));
        assert_eq!(ctx.replace_range(), offset - 3..offset);
    }

    #[test]
    fn test_token_suppressed_after_closed_string() {
        let src = r#"class Foo { String s = "abc"; }"#;
        let offset = src.find(r#""abc""#).unwrap() + 5;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert_eq!(ctx.token, None);
    }

    #[test]
    fn test_header_scan() {
        let src = indoc! {r#"
            package com.example.app;

            import java.util.List;
            import static java.lang.Math.max;

            class Foo { }
        "#};
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, src.find("{ }").unwrap() + 1);
        assert_eq!(ctx.package.as_deref(), Some("com.example.app"));
        assert_eq!(ctx.imports, vec![Arc::from("java.util.List")]);
        assert_eq!(ctx.static_imports, vec![Arc::from("java.lang.Math.max")]);
        assert!(ctx.is_imported("java.util.List"));
        assert!(!ctx.is_imported("java.util.Map"));
    }

    #[test]
    fn test_wildcard_import_covers_package() {
        let src = "import java.util.*;\nclass Foo { }";
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, src.len() - 1);
        assert!(ctx.is_imported("java.util.Map"));
        assert!(!ctx.is_imported("java.io.File"));
    }

    #[test]
    fn test_enclosing_type_nested() {
        let src = indoc! {r#"
            package com.example;
            class Outer {
                class Inner {
                    void f() { int x = 0; }
                }
            }
        "#};
        let offset = src.find("int x").unwrap() + 3;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert_eq!(ctx.enclosing_type.as_deref(), Some("com.example.Outer.Inner"));
    }

    #[test]
    fn test_static_context_detection() {
        let src = indoc! {r#"
            class Foo {
                static void s() { int a = 0; }
                void i() { int b = 0; }
            }
        "#};
        let tree = SourceTree::parse(src).unwrap();
        let in_static = ctx_at(&tree, src, src.find("int a").unwrap() + 3);
        assert!(in_static.in_static_context);
        let in_instance = ctx_at(&tree, src, src.find("int b").unwrap() + 3);
        assert!(!in_instance.in_static_context);
    }

    #[test]
    fn test_location_start_of_import() {
        let src = "import java.ut\nclass Foo { }";
        let offset = src.find("java.ut").unwrap() + 7;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert_eq!(ctx.location, TokenLocation::StartOfImport);
    }

    #[test]
    fn test_location_constructor_type_position() {
        let src = "class Foo { void f() { Object o = new Str } }";
        let offset = src.find("new Str").unwrap() + 7;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert_eq!(ctx.location, TokenLocation::ConstructorTypePosition);
    }

    #[test]
    fn test_javadoc_mode() {
        let src = "class Foo { /** @par */ void f() {} }";
        let offset = src.find("@par").unwrap() + 4;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert!(ctx.in_javadoc);
    }

    #[test]
    fn test_paren_after_cursor() {
        let src = "class Foo { void f() { g(); } void g() {} }";
        let offset = src.find("g()").unwrap() + 1;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = ctx_at(&tree, src, offset);
        assert!(ctx.has_paren_after_cursor());
    }
}
