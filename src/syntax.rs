use tree_sitter::{Node, Parser, Tree};

/// Identifier spliced into the buffer when the cursor sits in a region the
/// parser could not recover on its own. Never leaks into results: name
/// access goes through [`identifier_text`], which reports it as absent.
pub(crate) const SENTINEL: &str = "__cursor__";

/// A parsed buffer plus the bookkeeping needed to map positions in the
/// (possibly amended) parse text back to the caller's original buffer.
pub struct SourceTree {
    text: String,
    original_len: usize,
    sentinel_at: Option<usize>,
    tree: Tree,
}

impl SourceTree {
    /// Parse the buffer as-is.
    pub fn parse(source: &str) -> Option<SourceTree> {
        let tree = raw_parse(source)?;
        Some(SourceTree {
            text: source.to_string(),
            original_len: source.len(),
            sentinel_at: None,
            tree,
        })
    }

    /// Recovery parse: splice a sentinel identifier at the cursor and close
    /// any brackets left open before it, then reparse. Used when the plain
    /// tree puts the cursor somewhere unusable (inside ERROR, after a
    /// dangling dot).
    pub fn parse_with_sentinel(source: &str, offset: usize) -> Option<SourceTree> {
        let offset = offset.min(source.len());
        let mut amended = String::with_capacity(source.len() + SENTINEL.len() + 8);
        amended.push_str(&source[..offset]);
        amended.push_str(SENTINEL);
        amended.push_str(&source[offset..]);
        amended.push_str(&close_open_brackets(&amended));
        let tree = raw_parse(&amended)?;
        Some(SourceTree {
            text: amended,
            original_len: source.len(),
            sentinel_at: Some(offset),
            tree,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The text the parser actually saw (sentinel and closers included).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn has_sentinel(&self) -> bool {
        self.sentinel_at.is_some()
    }

    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }

    /// Node text with any sentinel occurrence removed.
    pub fn clean_node_text(&self, node: Node) -> String {
        strip_sentinel(self.node_text(node))
    }

    /// Map a cursor offset in the original buffer into parse-text
    /// coordinates. The sentinel is inserted at the cursor, so offsets at
    /// or before it are unchanged.
    pub fn to_parse_offset(&self, original: usize) -> usize {
        match self.sentinel_at {
            Some(at) if original > at => original + SENTINEL.len(),
            _ => original,
        }
    }

    /// Map a parse-text position back into the original buffer. Positions
    /// inside the sentinel collapse onto the insertion point; positions in
    /// the appended closer tail clamp to the buffer end.
    pub fn to_original_offset(&self, pos: usize) -> usize {
        let pos = match self.sentinel_at {
            Some(at) if pos > at + SENTINEL.len() => pos - SENTINEL.len(),
            Some(at) if pos > at => at,
            _ => pos,
        };
        pos.min(self.original_len)
    }

    /// Smallest node covering the character immediately before the cursor.
    pub fn node_before(&self, parse_offset: usize) -> Option<Node<'_>> {
        let end = parse_offset.min(self.text.len());
        let start = end.saturating_sub(1);
        self.root().descendant_for_byte_range(start, end)
    }

    /// Smallest named node covering the character immediately before the
    /// cursor, skipping over pure punctuation tokens.
    pub fn named_node_before(&self, parse_offset: usize) -> Option<Node<'_>> {
        let end = parse_offset.min(self.text.len());
        let start = end.saturating_sub(1);
        self.root().named_descendant_for_byte_range(start, end)
    }
}

fn raw_parse(text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .ok()?;
    parser.parse(text, None)
}

/// Declared name of an identifier-bearing node; `None` when the node is a
/// recovery artifact (parser-missing or the spliced sentinel).
pub fn identifier_text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    if node.is_missing() {
        return None;
    }
    let text = node.utf8_text(source.as_bytes()).ok()?;
    if text.is_empty() || text.contains(SENTINEL) {
        return None;
    }
    Some(text)
}

pub fn strip_sentinel(s: &str) -> String {
    s.replace(SENTINEL, "")
}

pub fn find_ancestor<'a>(mut node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    loop {
        node = node.parent()?;
        if node.kind() == kind {
            return Some(node);
        }
    }
}

pub fn ancestor_or_self<'a>(mut node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    loop {
        if node.kind() == kind {
            return Some(node);
        }
        node = node.parent()?;
    }
}

pub fn has_error_ancestor(mut node: Node) -> bool {
    loop {
        if node.is_error() {
            return true;
        }
        match node.parent() {
            Some(p) => node = p,
            None => return false,
        }
    }
}

pub fn is_comment_kind(kind: &str) -> bool {
    kind == "line_comment" || kind == "block_comment"
}

pub fn is_type_declaration_kind(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

pub fn is_statement_kind(kind: &str) -> bool {
    matches!(
        kind,
        "expression_statement"
            | "local_variable_declaration"
            | "if_statement"
            | "while_statement"
            | "do_statement"
            | "for_statement"
            | "enhanced_for_statement"
            | "return_statement"
            | "throw_statement"
            | "try_statement"
            | "switch_expression"
            | "assert_statement"
            | "break_statement"
            | "continue_statement"
            | "yield_statement"
            | "synchronized_statement"
            | "labeled_statement"
            | "block"
    )
}

/// Count unmatched `{` and `(` outside strings/comments and return the
/// closing text to append so the parser sees balanced brackets.
pub fn close_open_brackets(src: &str) -> String {
    let mut braces: i32 = 0;
    let mut parens: i32 = 0;
    let mut in_string = false;
    let mut in_char = false;
    let mut escaped = false;
    let mut it = src.chars().peekable();
    while let Some(c) = it.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            _ if in_string || in_char => {}
            '/' if it.peek() == Some(&'/') => {
                for nc in it.by_ref() {
                    if nc == '\n' {
                        break;
                    }
                }
            }
            '/' if it.peek() == Some(&'*') => {
                it.next();
                let mut prev = ' ';
                for nc in it.by_ref() {
                    if prev == '*' && nc == '/' {
                        break;
                    }
                    prev = nc;
                }
            }
            '{' => braces += 1,
            '}' => {
                if braces > 0 {
                    braces -= 1;
                }
            }
            '(' => parens += 1,
            ')' => {
                if parens > 0 {
                    parens -= 1;
                }
            }
            _ => {}
        }
    }
    let mut tail = String::new();
    for _ in 0..parens {
        tail.push(')');
    }
    tail.push(';');
    for _ in 0..braces {
        tail.push('}');
    }
    tail
}

/// Whether the cursor sits inside a `//` or `/* */` comment. Works on raw
/// text so it stays reliable even when the tree around the cursor is an
/// ERROR region.
pub fn cursor_in_comment(source: &str, offset: usize) -> bool {
    let before = &source[..offset.min(source.len())];
    if let Some(open) = before.rfind("/*") {
        match before.rfind("*/") {
            None => return true,
            Some(close) if open > close => return true,
            _ => {}
        }
    }
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    is_in_line_comment(&before[line_start..])
}

fn is_in_line_comment(line: &str) -> bool {
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    let mut in_char = false;
    let mut escaped = false;
    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            '/' if !in_string && !in_char => {
                if chars.peek() == Some(&'/') {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Whether the comment at the cursor is a javadoc comment (`/** ... */`).
pub fn cursor_in_javadoc(source: &str, offset: usize) -> bool {
    let before = &source[..offset.min(source.len())];
    let Some(open) = before.rfind("/*") else {
        return false;
    };
    if let Some(close) = before.rfind("*/")
        && close > open
    {
        return false;
    }
    source[open..].starts_with("/**")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_open_brackets() {
        assert_eq!(close_open_brackets("class A { void f() {"), ";}}");
        assert_eq!(close_open_brackets("foo(a, b"), ");");
        assert_eq!(close_open_brackets("class A { void f() { foo("), ");}}");
        assert_eq!(close_open_brackets("class A {}"), ";");
        assert_eq!(close_open_brackets("}}}}"), ";");
        assert_eq!(close_open_brackets("\"{ (\""), ";");
    }

    #[test]
    fn test_sentinel_offset_mapping() {
        let src = "class A { void f() { x. } }";
        let offset = src.find("x.").unwrap() + 2;
        let parsed = SourceTree::parse_with_sentinel(src, offset).unwrap();
        assert!(parsed.text().contains(SENTINEL));
        // Positions before the cursor are unchanged.
        assert_eq!(parsed.to_original_offset(offset), offset);
        // Positions inside the sentinel collapse onto the cursor.
        assert_eq!(parsed.to_original_offset(offset + 3), offset);
        // Positions after the sentinel shift back.
        assert_eq!(
            parsed.to_original_offset(offset + SENTINEL.len() + 1),
            offset + 1
        );
        assert_eq!(parsed.to_parse_offset(offset), offset);
        assert_eq!(parsed.to_parse_offset(offset + 1), offset + SENTINEL.len() + 1);
    }

    #[test]
    fn test_node_before_finds_identifier() {
        let src = "class A { void f() { count } }";
        let parsed = SourceTree::parse(src).unwrap();
        let offset = src.find("count").unwrap() + 5;
        let node = parsed.node_before(offset).unwrap();
        assert_eq!(node.kind(), "identifier");
        assert_eq!(parsed.node_text(node), "count");
    }

    #[test]
    fn test_identifier_text_hides_sentinel() {
        let src = "class A { void f() { x. } }";
        let offset = src.find("x.").unwrap() + 2;
        let parsed = SourceTree::parse_with_sentinel(src, offset).unwrap();
        let node = parsed.node_before(offset + 1).unwrap();
        if node.kind() == "identifier" {
            assert_eq!(identifier_text(node, parsed.text()), None);
        }
    }

    #[test]
    fn test_cursor_in_comment() {
        let src = "class A { // hi\n }";
        assert!(cursor_in_comment(src, src.find("hi").unwrap() + 1));
        assert!(!cursor_in_comment(src, 3));
        let src2 = "class A { /* block";
        assert!(cursor_in_comment(src2, src2.len()));
    }

    #[test]
    fn test_cursor_in_javadoc() {
        let src = "/** doc */ class A { /** tag\n * @p\n */ void f() {} }";
        let offset = src.find("@p").unwrap() + 2;
        assert!(cursor_in_javadoc(src, offset));
        assert!(!cursor_in_javadoc(src, src.find("class").unwrap()));
        let plain = "class A { /* x\n";
        assert!(!cursor_in_javadoc(plain, plain.len()));
    }
}
