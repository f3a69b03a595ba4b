use tree_sitter::Node;

use crate::syntax;

pub const PRIMITIVE_TYPES: &[&str] = &[
    "boolean", "byte", "char", "double", "float", "int", "long", "short",
];

/// Modifiers legal on a class member declaration.
pub const MEMBER_MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "native",
    "synchronized",
    "transient",
    "volatile",
    "strictfp",
    "sealed",
    "non-sealed",
];

/// Keywords that can open a statement anywhere in a body.
const BASE_STATEMENT_KEYWORDS: &[&str] = &[
    "assert", "return", "super", "this", "new", "if", "for", "while", "do", "switch", "try",
    "throw", "synchronized", "final", "var",
];

pub fn is_modifier_keyword(word: &str) -> bool {
    MEMBER_MODIFIERS.contains(&word)
}

/// Statement-position keywords: the base set, `break`/`continue` inside a
/// loop, and `else` when an `if` just closed at the same block level.
pub fn statement_keywords(in_loop: bool, after_unclosed_if: bool) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = BASE_STATEMENT_KEYWORDS.to_vec();
    if in_loop {
        out.push("break");
        out.push("continue");
    }
    if after_unclosed_if {
        out.push("else");
    }
    out
}

/// Whether any ancestor of `node` is a loop body (gates `break`/`continue`).
pub fn inside_loop(node: Node) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        match n.kind() {
            "for_statement" | "enhanced_for_statement" | "while_statement" | "do_statement" => {
                return true;
            }
            kind if syntax::is_type_declaration_kind(kind) => return false,
            "method_declaration" | "lambda_expression" => return false,
            _ => {}
        }
        current = n.parent();
    }
    false
}

/// `else` is only worth offering when the statement immediately before
/// the cursor at the same block level is a completed `if` without an
/// `else` branch.
pub fn follows_unclosed_if(node: Node, parse_offset: usize) -> bool {
    let Some(block) = syntax::ancestor_or_self(node, "block") else {
        return false;
    };
    let mut prev: Option<Node> = None;
    let mut cursor = block.walk();
    for stmt in block.named_children(&mut cursor) {
        // The statement the token itself sits in does not count.
        if stmt.end_byte() >= parse_offset {
            break;
        }
        prev = Some(stmt);
    }
    prev.is_some_and(|s| {
        s.kind() == "if_statement" && s.child_by_field_name("alternative").is_none()
    })
}

/// Keywords opening a member declaration in a type body.
pub fn member_keywords(in_interface: bool) -> Vec<&'static str> {
    let mut out = vec![
        "public", "protected", "private", "static", "final", "abstract", "void", "class",
        "interface", "enum", "record",
    ];
    if in_interface {
        out.push("default");
    }
    out
}
