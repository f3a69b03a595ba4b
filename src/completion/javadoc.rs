use std::sync::Arc;

use tree_sitter::Node;

use crate::syntax::SourceTree;

pub const BLOCK_TAGS: &[&str] = &[
    "@author",
    "@deprecated",
    "@exception",
    "@hidden",
    "@param",
    "@provides",
    "@return",
    "@see",
    "@serial",
    "@serialData",
    "@serialField",
    "@since",
    "@throws",
    "@uses",
    "@version",
];

pub const INLINE_TAGS: &[&str] = &[
    "@code",
    "@docRoot",
    "@index",
    "@inheritDoc",
    "@link",
    "@linkplain",
    "@literal",
    "@snippet",
    "@summary",
    "@value",
];

/// Where in a javadoc comment the cursor sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavadocPosition {
    /// Typing a tag name; `inline` when opened with `{@`.
    TagName { prefix: String, inline: bool },
    /// Name position after `@param`.
    ParamName { prefix: String },
    /// Type position after `@throws`/`@exception`.
    ThrowsType { prefix: String },
    /// Reference after `@see`, `{@link}`, `{@linkplain}`, or `{@value}`:
    /// `Type#member(...)` split at the hash.
    Reference {
        type_part: Option<String>,
        member_prefix: Option<String>,
    },
    Other,
}

/// Classify the cursor position inside a javadoc comment by scanning the
/// current line. Javadoc is one opaque comment token in the tree, so this
/// works on raw text.
pub fn classify_javadoc(source: &str, offset: usize) -> JavadocPosition {
    let before = &source[..offset.min(source.len())];
    let comment_start = match before.rfind("/**") {
        Some(p) => p,
        None => return JavadocPosition::Other,
    };
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(comment_start);
    let line = before[line_start.max(comment_start)..]
        .trim_start()
        .trim_start_matches('*')
        .trim_start();

    // Typing the tag name itself: the trailing word begins with `@`.
    let last_word_start = line
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '@' || *c == '{')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    let last_word = &line[last_word_start..];
    if let Some(tag) = last_word.strip_prefix("{@") {
        return JavadocPosition::TagName {
            prefix: format!("@{tag}"),
            inline: true,
        };
    }
    if last_word.starts_with('@') && !line[..last_word_start].trim_end().ends_with('}') {
        return JavadocPosition::TagName {
            prefix: last_word.to_string(),
            inline: false,
        };
    }

    // Inside an unclosed inline reference tag?
    if let Some(open) = line.rfind("{@") {
        let after = &line[open + 1..];
        if !after.contains('}')
            && let Some(rest) = after
                .strip_prefix("@link")
                .map(|r| r.strip_prefix("plain").unwrap_or(r))
                .or_else(|| after.strip_prefix("@value"))
            && rest.starts_with([' ', '\t'])
        {
            return parse_reference(rest.trim_start());
        }
    }

    let mut words = line.split_whitespace();
    match words.next() {
        Some("@param") => JavadocPosition::ParamName {
            prefix: words.next_back().filter(|_| !line.ends_with(' ')).unwrap_or("").to_string(),
        },
        Some("@throws") | Some("@exception") => JavadocPosition::ThrowsType {
            prefix: words.next_back().filter(|_| !line.ends_with(' ')).unwrap_or("").to_string(),
        },
        Some("@see") => parse_reference(line.strip_prefix("@see").unwrap_or("").trim_start()),
        _ => JavadocPosition::Other,
    }
}

/// Split a `Type#member` reference at the hash.
fn parse_reference(text: &str) -> JavadocPosition {
    match text.split_once('#') {
        Some((ty, member)) => JavadocPosition::Reference {
            type_part: (!ty.is_empty()).then(|| ty.to_string()),
            member_prefix: Some(member.split('(').next().unwrap_or(member).to_string()),
        },
        None => JavadocPosition::Reference {
            type_part: (!text.is_empty()).then(|| text.to_string()),
            member_prefix: None,
        },
    }
}

/// Minimum arity implied by a javadoc method reference's argument text.
///
/// `text` starts at the opening parenthesis. Counts comma-separated
/// slots: an all-whitespace list is zero, a trailing comma opens one
/// more (still-empty) slot. An unclosed list counts what is visible.
pub fn method_ref_min_arity(text: &str) -> usize {
    let Some(rest) = text.strip_prefix('(') else {
        return 0;
    };
    let mut depth = 0usize;
    let mut slots = 0usize;
    let mut saw_content = false;
    for ch in rest.chars() {
        match ch {
            ')' if depth == 0 => break,
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                slots += 1;
                saw_content = false;
            }
            c if !c.is_whitespace() => saw_content = true,
            _ => {}
        }
    }
    if slots == 0 {
        if saw_content { 1 } else { 0 }
    } else {
        // `a,` means at least two arguments even before the second is typed.
        slots + 1
    }
}

/// Parameter and type-parameter names of the enclosing declaration that
/// the javadoc does not document yet.
pub fn undocumented_params(
    tree: &SourceTree,
    method: Node,
    comment_text: &str,
) -> Vec<Arc<str>> {
    let mut names: Vec<Arc<str>> = Vec::new();
    if let Some(params) = method.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            if matches!(p.kind(), "formal_parameter" | "spread_parameter")
                && let Some(name) = p.child_by_field_name("name").or_else(|| {
                    let mut pc = p.walk();
                    p.named_children(&mut pc).filter(|c| c.kind() == "identifier").last()
                })
            {
                let text = tree.clean_node_text(name);
                if !text.is_empty() {
                    names.push(Arc::from(text.as_str()));
                }
            }
        }
    }
    if let Some(tps) = method.child_by_field_name("type_parameters") {
        let mut cursor = tps.walk();
        for tp in tps.named_children(&mut cursor) {
            if tp.kind() == "type_parameter" {
                let mut pc = tp.walk();
                if let Some(name) = tp
                    .named_children(&mut pc)
                    .find(|c| matches!(c.kind(), "identifier" | "type_identifier"))
                {
                    let text = tree.clean_node_text(name);
                    if !text.is_empty() {
                        names.push(Arc::from(format!("<{text}>").as_str()));
                    }
                }
            }
        }
    }

    let documented: Vec<String> = comment_text
        .lines()
        .filter_map(|line| {
            let line = line.trim_start().trim_start_matches('*').trim_start();
            let rest = line.strip_prefix("@param")?;
            rest.split_whitespace().next().map(|w| w.to_string())
        })
        .collect();

    names
        .into_iter()
        .filter(|n| !documented.iter().any(|d| d == n.as_ref()))
        .collect()
}

/// The javadoc comment block the cursor sits in, up to the cursor.
pub fn enclosing_comment_text(source: &str, offset: usize) -> Option<&str> {
    let before = &source[..offset.min(source.len())];
    let start = before.rfind("/**")?;
    Some(&source[start..offset])
}
