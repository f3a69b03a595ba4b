use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tree_sitter::Node;

use super::context::CompletionContext;
use super::scope::{collect_locals, resolve_local_types};
use super::thrown::{catch_clause_types, find_thrown_exceptions};
use super::type_resolver::{ResolveScope, TypeResolver};
use crate::index::{JAVA_LANG_OBJECT, JAVA_LANG_STRING, TypeIndex, is_primitive};
use crate::syntax;

/// Widening ladder used for arithmetic operand positions.
const NUMERIC_LADDER: &[&str] = &["short", "int", "long", "float", "double", "char", "byte"];
const INTEGRAL_TYPES: &[&str] = &["int", "long", "short", "char", "byte"];
const ARRAY_INDEX_TYPES: &[&str] = &["short", "int", "long"];

/// How a candidate type relates to the expectation at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedMatch {
    Exact,
    Compatible,
    /// Compatible, but the expectation marked this type as second-rate
    /// (already handled by an inner catch clause).
    Discouraged,
    None,
}

/// The computed expectation: which types a value at the cursor should
/// satisfy, and whether sub-/supertypes of them still count.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    pub types: Vec<Arc<str>>,
    pub discouraged: Vec<Arc<str>>,
    pub allows_subtypes: bool,
    pub allows_supertypes: bool,
}

impl Expectation {
    fn none() -> Self {
        Self {
            allows_subtypes: true,
            ..Self::default()
        }
    }

    fn of(types: Vec<Arc<str>>) -> Self {
        Self {
            types,
            discouraged: Vec::new(),
            allows_subtypes: true,
            allows_supertypes: false,
        }
    }

    fn of_names(names: &[&str]) -> Self {
        Self::of(names.iter().map(|n| Arc::from(*n)).collect())
    }

    fn both_directions(mut self) -> Self {
        self.allows_subtypes = true;
        self.allows_supertypes = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.discouraged.is_empty()
    }

    pub fn match_for(&self, candidate: &str, index: &TypeIndex) -> ExpectedMatch {
        if self.is_empty() {
            return ExpectedMatch::None;
        }
        for expected in &self.types {
            if expected.as_ref() == candidate {
                return ExpectedMatch::Exact;
            }
        }
        for expected in &self.discouraged {
            if expected.as_ref() == candidate
                || self.compatible(candidate, expected, index)
            {
                return ExpectedMatch::Discouraged;
            }
        }
        for expected in &self.types {
            if self.compatible(candidate, expected, index) {
                return ExpectedMatch::Compatible;
            }
        }
        ExpectedMatch::None
    }

    fn compatible(&self, candidate: &str, expected: &str, index: &TypeIndex) -> bool {
        if is_primitive(candidate) || is_primitive(expected) {
            return self.allows_subtypes && primitive_widens(candidate, expected)
                || self.allows_supertypes && primitive_widens(expected, candidate);
        }
        (self.allows_subtypes && index.is_subtype_of(candidate, expected))
            || (self.allows_supertypes && index.is_subtype_of(expected, candidate))
    }
}

/// Assignment-compatible primitive widening.
fn primitive_widens(from: &str, to: &str) -> bool {
    let rank = |t: &str| match t {
        "byte" => Some(1),
        "short" | "char" => Some(2),
        "int" => Some(3),
        "long" => Some(4),
        "float" => Some(5),
        "double" => Some(6),
        _ => None,
    };
    match (rank(from), rank(to)) {
        (Some(f), Some(t)) => f <= t,
        _ => false,
    }
}

/// Lazily-computed expected types for one request: constructed once,
/// computed on first read, immutable after that.
#[derive(Default)]
pub struct ExpectedTypes {
    cell: OnceCell<Expectation>,
}

impl ExpectedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ctx: &CompletionContext<'_>, index: &TypeIndex) -> &Expectation {
        self.cell.get_or_init(|| compute(ctx, index))
    }
}

/// Walk from the node being completed upward until an ancestor fixes the
/// expected type, or a reset boundary ends the scan. Operator and
/// assignment chains may sit between the cursor and the slot that
/// actually fixes the type, which is why the scan keeps climbing until
/// one classification fires.
pub fn compute(ctx: &CompletionContext<'_>, index: &TypeIndex) -> Expectation {
    let Some(node) = ctx.node else {
        return Expectation::none();
    };
    let locals = resolve_local_types(collect_locals(ctx), ctx, index);
    let scope = ResolveScope {
        locals: &locals,
        enclosing_type: ctx.enclosing_type.as_deref(),
        package: ctx.package.as_deref(),
        imports: &ctx.imports,
    };
    let resolver = TypeResolver::new(index);

    let mut child = node;
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(expectation) = classify(parent, child, ctx, index, &resolver, &scope) {
            return expectation;
        }
        if is_reset_boundary(parent.kind()) {
            break;
        }
        child = parent;
        current = parent.parent();
    }
    Expectation::none()
}

/// Boundaries that end the upward scan when they themselves fix nothing.
fn is_reset_boundary(kind: &str) -> bool {
    matches!(
        kind,
        "block"
            | "constructor_body"
            | "class_body"
            | "interface_body"
            | "enum_body"
            | "return_statement"
            | "expression_statement"
            | "program"
    )
}

fn classify(
    parent: Node,
    child: Node,
    ctx: &CompletionContext<'_>,
    index: &TypeIndex,
    resolver: &TypeResolver,
    scope: &ResolveScope,
) -> Option<Expectation> {
    let tree = ctx.tree;
    match parent.kind() {
        "variable_declarator" => {
            // Only the initializer side carries an expectation; the cursor
            // resting on the `=` itself counts too.
            let value = parent.child_by_field_name("value")?;
            if value != child && !covers(value, child) && child.kind() != "=" {
                return None;
            }
            let decl = parent.parent()?;
            let ty = decl.child_by_field_name("type")?;
            let resolved = resolver.resolve_type_text(&tree.clean_node_text(ty), scope)?;
            Some(Expectation::of(vec![resolved]))
        }
        "assignment_expression" => {
            let right = parent.child_by_field_name("right")?;
            if right != child && !covers(right, child) && child.kind() != "=" {
                return None;
            }
            let left = parent.child_by_field_name("left")?;
            let resolved = resolver.resolve_expr(left, scope, tree)?;
            Some(Expectation::of(vec![resolved]))
        }
        "cast_expression" => {
            let value = parent.child_by_field_name("value")?;
            if value != child && !covers(value, child) {
                return None;
            }
            let ty = parent.child_by_field_name("type")?;
            let resolved = resolver.resolve_type_text(&tree.clean_node_text(ty), scope)?;
            // A cast can widen or narrow.
            Some(Expectation::of(vec![resolved]).both_directions())
        }
        "instanceof_expression" => {
            // Completing the tested type: expected is the left operand's
            // static type, in either direction.
            let left = parent.child_by_field_name("left")?;
            if left == child || covers(left, child) {
                return None;
            }
            let resolved = resolver.resolve_expr(left, scope, tree)?;
            Some(Expectation::of(vec![resolved]).both_directions())
        }
        "argument_list" => {
            let call = parent.parent()?;
            let arg_index = argument_index(parent, child, ctx.parse_offset);
            match call.kind() {
                "method_invocation" => {
                    method_argument_expectation(call, arg_index, tree, resolver, scope, index)
                }
                "object_creation_expression" => {
                    constructor_argument_expectation(call, arg_index, tree, resolver, scope, index)
                }
                "explicit_constructor_invocation" => None,
                _ => None,
            }
        }
        "if_statement" | "while_statement" | "do_statement" => {
            let cond = parent.child_by_field_name("condition")?;
            (cond == child || covers(cond, child))
                .then(|| Expectation::of_names(&["boolean"]))
        }
        "for_statement" => {
            let cond = parent.child_by_field_name("condition")?;
            (cond == child || covers(cond, child))
                .then(|| Expectation::of_names(&["boolean"]))
        }
        "assert_statement" => Some(Expectation::of_names(&["boolean"])),
        "ternary_expression" => {
            let cond = parent.child_by_field_name("condition")?;
            if cond == child || covers(cond, child) {
                return Some(Expectation::of_names(&["boolean"]));
            }
            // Non-condition branch: the ternary's own type, when it
            // resolves to something real.
            let resolved = resolver.resolve_expr(parent, scope, tree)?;
            Some(Expectation::of(vec![resolved]))
        }
        "binary_expression" => {
            let op = parent.child_by_field_name("operator")?.kind().to_string();
            let other = {
                let left = parent.child_by_field_name("left")?;
                let right = parent.child_by_field_name("right")?;
                if left == child || covers(left, child) { right } else { left }
            };
            match op.as_str() {
                "==" | "!=" | "<" | ">" | "<=" | ">=" => {
                    let resolved = resolver.resolve_expr(other, scope, tree)?;
                    Some(Expectation::of(vec![resolved]).both_directions())
                }
                "+" => {
                    let mut expectation = Expectation::of_names(NUMERIC_LADDER);
                    expectation.types.push(Arc::from(JAVA_LANG_STRING));
                    Some(expectation)
                }
                "&&" | "||" => Some(Expectation::of_names(&["boolean"])),
                "&" | "|" | "^" | "%" | "-" | "*" | "/" | "<<" | ">>" | ">>>" => {
                    Some(Expectation::of_names(NUMERIC_LADDER))
                }
                _ => None,
            }
        }
        "unary_expression" => {
            let text = tree.node_text(parent);
            if text.starts_with('!') {
                Some(Expectation::of_names(&["boolean"]))
            } else if text.starts_with('~') {
                Some(Expectation::of_names(INTEGRAL_TYPES))
            } else {
                Some(Expectation::of_names(NUMERIC_LADDER))
            }
        }
        "update_expression" => Some(Expectation::of_names(NUMERIC_LADDER)),
        "array_access" => {
            let idx_node = parent.child_by_field_name("index")?;
            (idx_node == child || covers(idx_node, child))
                .then(|| Expectation::of_names(ARRAY_INDEX_TYPES))
        }
        "switch_label" => {
            let switch = syntax::find_ancestor(parent, "switch_expression")?;
            let cond = switch.child_by_field_name("condition")?;
            let resolved = resolver.resolve_expr(unwrap_parens(cond), scope, tree)?;
            Some(Expectation::of(vec![resolved]))
        }
        "type_arguments" => {
            let generic = parent.parent()?;
            let base = generic.named_child(0)?;
            let base_name = resolver.resolve_type_text(&tree.clean_node_text(base), scope)?;
            let meta = index.get(&base_name)?;
            let slot = argument_index(parent, child, ctx.parse_offset);
            let bound = meta
                .type_parameters
                .get(slot)
                .and_then(|tp| tp.bound.clone())
                .unwrap_or_else(|| Arc::from(JAVA_LANG_OBJECT));
            Some(Expectation::of(vec![bound]))
        }
        "lambda_expression" => {
            let body = parent.child_by_field_name("body")?;
            if body != child && !covers(body, child) {
                return None;
            }
            let sam_return = lambda_sam_return(parent, tree, resolver, scope, index)?;
            Some(Expectation::of(vec![sam_return]))
        }
        "catch_type" | "catch_formal_parameter" | "catch_clause" => {
            catch_expectation(parent, ctx, index, resolver, scope)
        }
        _ => None,
    }
}

fn covers(outer: Node, inner: Node) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

fn unwrap_parens(node: Node) -> Node {
    if node.kind() == "parenthesized_expression"
        && let Some(inner) = node.named_child(0)
    {
        return inner;
    }
    node
}

/// Which argument slot the cursor occupies: the position of the child
/// among named arguments, or the number of commas before the cursor when
/// the slot is still empty.
fn argument_index(list: Node, child: Node, parse_offset: usize) -> usize {
    let mut cursor = list.walk();
    if let Some(pos) = list.named_children(&mut cursor).position(|c| c == child) {
        return pos;
    }
    let mut commas = 0;
    let mut cursor = list.walk();
    for c in list.children(&mut cursor) {
        if c.kind() == "," && c.end_byte() <= parse_offset {
            commas += 1;
        }
    }
    commas
}

/// Formal parameter type at `arg_index` of the invoked method. All
/// same-name overloads contribute; with varargs the last parameter type
/// absorbs trailing positions.
fn method_argument_expectation(
    call: Node,
    arg_index: usize,
    tree: &crate::syntax::SourceTree,
    resolver: &TypeResolver,
    scope: &ResolveScope,
    index: &TypeIndex,
) -> Option<Expectation> {
    let name_node = call.child_by_field_name("name")?;
    let name = tree.clean_node_text(name_node);
    let receiver = match call.child_by_field_name("object") {
        Some(obj) => resolver.resolve_expr(obj, scope, tree)?,
        None => Arc::from(scope.enclosing_type?),
    };
    let mut types: Vec<Arc<str>> = Vec::new();
    for meta in index.supertype_chain(&receiver) {
        for m in meta.methods.iter().filter(|m| !m.is_constructor) {
            if m.name.as_ref() != name.as_str() {
                continue;
            }
            let ty = if arg_index < m.parameters.len() {
                Some(Arc::clone(&m.parameters[arg_index].ty))
            } else if m.is_varargs && !m.parameters.is_empty() {
                let last = &m.parameters[m.parameters.len() - 1].ty;
                super::type_resolver::element_type_of_array(last)
                    .or_else(|| Some(Arc::clone(last)))
            } else {
                None
            };
            if let Some(ty) = ty
                && !types.iter().any(|t| t.as_ref() == ty.as_ref())
            {
                types.push(ty);
            }
        }
    }
    if types.is_empty() {
        return None;
    }
    Some(Expectation::of(types))
}

/// Parameter type at `arg_index` across every constructor whose earlier,
/// already-written arguments still type-check. Ambiguity across overloads
/// is tolerated: the union is returned.
fn constructor_argument_expectation(
    call: Node,
    arg_index: usize,
    tree: &crate::syntax::SourceTree,
    resolver: &TypeResolver,
    scope: &ResolveScope,
    index: &TypeIndex,
) -> Option<Expectation> {
    let ty = call.child_by_field_name("type")?;
    let type_name = resolver.resolve_type_text(&tree.clean_node_text(ty), scope)?;
    let meta = index.get(&type_name)?;

    // Types of arguments already written before the one being completed.
    let written: Vec<Option<Arc<str>>> = call
        .child_by_field_name("arguments")
        .map(|args| {
            let mut cursor = args.walk();
            args.named_children(&mut cursor)
                .take(arg_index)
                .map(|a| resolver.resolve_expr(a, scope, tree))
                .collect()
        })
        .unwrap_or_default();

    let mut types: Vec<Arc<str>> = Vec::new();
    for ctor in meta.constructors() {
        if ctor.parameters.len() <= arg_index && !ctor.is_varargs {
            continue;
        }
        let earlier_ok = written.iter().enumerate().all(|(i, w)| match w {
            Some(ty) => ctor
                .parameters
                .get(i)
                .is_none_or(|p| p.ty.as_ref() == ty.as_ref()),
            None => true,
        });
        if !earlier_ok {
            continue;
        }
        let ty = if arg_index < ctor.parameters.len() {
            Arc::clone(&ctor.parameters[arg_index].ty)
        } else {
            let last = &ctor.parameters[ctor.parameters.len() - 1].ty;
            super::type_resolver::element_type_of_array(last)
                .unwrap_or_else(|| Arc::clone(last))
        };
        if !types.iter().any(|t| t.as_ref() == ty.as_ref()) {
            types.push(ty);
        }
    }
    if types.is_empty() {
        return None;
    }
    Some(Expectation::of(types))
}

/// Return type of the single abstract method of the lambda's target
/// functional interface, when the target is recoverable from the
/// surrounding declaration or argument position.
fn lambda_sam_return(
    lambda: Node,
    tree: &crate::syntax::SourceTree,
    resolver: &TypeResolver,
    scope: &ResolveScope,
    index: &TypeIndex,
) -> Option<Arc<str>> {
    let target = lambda_target_type(lambda, tree, resolver, scope)?;
    let meta = index.get(super::type_resolver::strip_generics(&target))?;
    let sam = meta
        .methods
        .iter()
        .find(|m| m.modifiers.contains(crate::index::Modifiers::ABSTRACT) && !m.is_constructor)?;
    Some(Arc::clone(&sam.return_type))
}

fn lambda_target_type(
    lambda: Node,
    tree: &crate::syntax::SourceTree,
    resolver: &TypeResolver,
    scope: &ResolveScope,
) -> Option<Arc<str>> {
    let parent = lambda.parent()?;
    match parent.kind() {
        "variable_declarator" => {
            let decl = parent.parent()?;
            let ty = decl.child_by_field_name("type")?;
            resolver.resolve_type_text(&tree.clean_node_text(ty), scope)
        }
        "assignment_expression" => {
            let left = parent.child_by_field_name("left")?;
            resolver.resolve_expr(left, scope, tree)
        }
        _ => None,
    }
}

/// Completing a catch clause's type: everything the try body provably
/// throws and the sibling catches do not already handle. Broader catches
/// are legal, so the filter accepts supertypes.
fn catch_expectation(
    node: Node,
    ctx: &CompletionContext<'_>,
    index: &TypeIndex,
    resolver: &TypeResolver,
    scope: &ResolveScope,
) -> Option<Expectation> {
    let catch_clause = syntax::ancestor_or_self(node, "catch_clause")?;
    let try_node = catch_clause.parent()?;
    if !matches!(
        try_node.kind(),
        "try_statement" | "try_with_resources_statement"
    ) {
        return None;
    }
    let body = try_node.child_by_field_name("body")?;
    let mut found = find_thrown_exceptions(body, ctx.tree, index, scope);

    // Sibling catches of this same try already handle their types.
    let completing_types: Vec<Arc<str>> =
        catch_clause_types_of_clause(catch_clause, ctx, resolver, scope);
    let mut sibling_caught = catch_clause_types(try_node, ctx.tree, resolver, scope);
    sibling_caught.retain(|c| !completing_types.iter().any(|t| t.as_ref() == c.as_ref()));
    found.discard_caught(&sibling_caught, index);

    Some(Expectation {
        types: found.thrown,
        discouraged: found.discouraged,
        allows_subtypes: false,
        allows_supertypes: true,
    })
}

fn catch_clause_types_of_clause(
    clause: Node,
    ctx: &CompletionContext<'_>,
    resolver: &TypeResolver,
    scope: &ResolveScope,
) -> Vec<Arc<str>> {
    let mut out = Vec::new();
    let mut cursor = clause.walk();
    for part in clause.named_children(&mut cursor) {
        if part.kind() != "catch_formal_parameter" {
            continue;
        }
        let mut pc = part.walk();
        for ty in part.named_children(&mut pc) {
            if ty.kind() == "catch_type" {
                for alt in ctx.tree.clean_node_text(ty).split('|') {
                    if let Some(resolved) = resolver.resolve_type_text(alt.trim(), scope) {
                        out.push(resolved);
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MethodMetadata, Modifiers, Parameter, TypeKind, TypeMetadata};
    use crate::syntax::SourceTree;
    use indoc::indoc;

    fn expectation_at(src: &str, marker: &str, idx: &TypeIndex) -> Expectation {
        let offset = src.find(marker).map(|p| p + marker.len()).unwrap();
        let tree = SourceTree::parse(src).unwrap();
        let ctx = CompletionContext::derive(&tree, src, offset);
        compute(&ctx, idx)
    }

    fn expectation_with_sentinel(src: &str, marker: &str, idx: &TypeIndex) -> Expectation {
        let offset = src.find(marker).map(|p| p + marker.len()).unwrap();
        let tree = SourceTree::parse_with_sentinel(src, offset).unwrap();
        let ctx = CompletionContext::derive(&tree, src, offset);
        compute(&ctx, idx)
    }

    #[test]
    fn test_variable_initializer_expects_declared_type() {
        let idx = TypeIndex::new();
        let src = "class A { void f() { int x = y; } }";
        let expectation = expectation_at(src, "int x = y", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from("int")]);
        assert!(expectation.allows_subtypes);
        assert!(!expectation.allows_supertypes);
    }

    #[test]
    fn test_empty_initializer_expects_declared_type() {
        // `int x = |;` with nothing typed yet: the sentinel parse carries it.
        let idx = TypeIndex::new();
        let src = "class A { void f() { int x = ; } }";
        let expectation = expectation_with_sentinel(src, "int x = ", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from("int")]);
        assert!(expectation.allows_subtypes);
    }

    #[test]
    fn test_cast_allows_both_directions() {
        let mut idx = TypeIndex::new();
        idx.add_type(TypeMetadata::new(JAVA_LANG_STRING, TypeKind::Class));
        let src = "class A { void f(Object o) { Object r = (String) o; } }";
        let expectation = expectation_at(src, "(String) o", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from(JAVA_LANG_STRING)]);
        assert!(expectation.allows_subtypes);
        assert!(expectation.allows_supertypes);
    }

    #[test]
    fn test_assignment_rhs_through_method_argument() {
        // `x = g(|)` must infer g's parameter type, not x's type.
        let mut idx = TypeIndex::new();
        let mut main = TypeMetadata::new("Main", TypeKind::Class);
        main.methods = vec![Arc::new(MethodMetadata {
            name: Arc::from("g"),
            modifiers: Modifiers::PUBLIC,
            type_parameters: vec![],
            parameters: vec![Parameter {
                name: Some(Arc::from("s")),
                ty: Arc::from(JAVA_LANG_STRING),
            }],
            return_type: Arc::from("int"),
            thrown: vec![],
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })];
        idx.add_type(main);
        let src = "class Main { void f() { int x; x = g(y); } }";
        let expectation = expectation_at(src, "x = g(y", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from(JAVA_LANG_STRING)]);
    }

    #[test]
    fn test_condition_positions_expect_boolean() {
        let idx = TypeIndex::new();
        let src = "class A { void f(boolean b) { if (b) {} while (b) {} } }";
        let if_expect = expectation_at(src, "if (b", &idx);
        assert_eq!(if_expect.types, vec![Arc::<str>::from("boolean")]);
        let while_expect = expectation_at(src, "while (b", &idx);
        assert_eq!(while_expect.types, vec![Arc::<str>::from("boolean")]);
    }

    #[test]
    fn test_equality_operand_both_directions() {
        let mut idx = TypeIndex::new();
        idx.add_type(TypeMetadata::new(JAVA_LANG_STRING, TypeKind::Class));
        let src = "class A { void f(String s, Object o) { boolean b = s == o; } }";
        let expectation = expectation_at(src, "s == o", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from(JAVA_LANG_STRING)]);
        assert!(expectation.allows_supertypes);
    }

    #[test]
    fn test_plus_includes_string_and_ladder() {
        let idx = TypeIndex::new();
        let src = "class A { void f(int i) { int x = i + j; } }";
        let expectation = expectation_at(src, "i + j", &idx);
        assert!(expectation.types.iter().any(|t| t.as_ref() == "int"));
        assert!(expectation.types.iter().any(|t| t.as_ref() == JAVA_LANG_STRING));
    }

    #[test]
    fn test_bang_expects_boolean() {
        let idx = TypeIndex::new();
        let src = "class A { void f() { boolean b = !c; } }";
        let expectation = expectation_at(src, "= !c", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from("boolean")]);
    }

    #[test]
    fn test_array_index_integral() {
        let idx = TypeIndex::new();
        let src = "class A { void f(int[] a) { int x = a[i]; } }";
        let expectation = expectation_at(src, "a[i", &idx);
        assert_eq!(
            expectation.types,
            ARRAY_INDEX_TYPES
                .iter()
                .map(|t| Arc::<str>::from(*t))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_switch_case_expects_governing_type() {
        let mut idx = TypeIndex::new();
        idx.add_type(TypeMetadata::new("p.Color", TypeKind::Enum));
        let src = indoc! {r#"
            package p;
            class A {
                void f(Color c) {
                    switch (c) {
                        case R:
                            break;
                    }
                }
            }
        "#};
        let expectation = expectation_at(src, "case R", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from("p.Color")]);
    }

    #[test]
    fn test_method_argument_union_of_overloads() {
        let mut idx = TypeIndex::new();
        let mut main = TypeMetadata::new("Main", TypeKind::Class);
        let mk = |ty: &str| {
            Arc::new(MethodMetadata {
                name: Arc::from("g"),
                modifiers: Modifiers::PUBLIC,
                type_parameters: vec![],
                parameters: vec![Parameter {
                    name: None,
                    ty: Arc::from(ty),
                }],
                return_type: Arc::from("void"),
                thrown: vec![],
                is_constructor: false,
                is_varargs: false,
                deprecated: false,
            })
        };
        main.methods = vec![mk("int"), mk(JAVA_LANG_STRING)];
        idx.add_type(main);
        let src = "class Main { void f() { g(a); } }";
        let expectation = expectation_at(src, "g(a", &idx);
        assert!(expectation.types.iter().any(|t| t.as_ref() == "int"));
        assert!(expectation.types.iter().any(|t| t.as_ref() == JAVA_LANG_STRING));
    }

    #[test]
    fn test_catch_expectation_supertypes_only() {
        let mut idx = TypeIndex::new();
        let mut ioe = TypeMetadata::new("java.io.IOException", TypeKind::Class);
        ioe.superclass = Some(Arc::from("java.lang.Exception"));
        let mut main = TypeMetadata::new("p.Main", TypeKind::Class);
        main.methods = vec![Arc::new(MethodMetadata {
            name: Arc::from("m"),
            modifiers: Modifiers::PUBLIC,
            type_parameters: vec![],
            parameters: vec![],
            return_type: Arc::from("void"),
            thrown: vec![Arc::from("java.io.IOException")],
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })];
        idx.add_types([
            ioe,
            TypeMetadata::new("java.lang.Exception", TypeKind::Class),
            main,
        ]);
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        m();
                    } catch (IOEx e) {
                    }
                }
            }
        "#};
        let expectation = expectation_at(src, "catch (IOEx", &idx);
        assert_eq!(expectation.types, vec![Arc::<str>::from("java.io.IOException")]);
        assert!(!expectation.allows_subtypes);
        assert!(expectation.allows_supertypes);
        // A broader catch still matches.
        assert_eq!(
            expectation.match_for("java.lang.Exception", &idx),
            ExpectedMatch::Compatible
        );
    }

    #[test]
    fn test_match_for_primitive_widening() {
        let idx = TypeIndex::new();
        let expectation = Expectation::of_names(&["long"]);
        assert_eq!(expectation.match_for("long", &idx), ExpectedMatch::Exact);
        assert_eq!(expectation.match_for("int", &idx), ExpectedMatch::Compatible);
        assert_eq!(expectation.match_for("double", &idx), ExpectedMatch::None);
    }

    #[test]
    fn test_expected_types_memoized() {
        let idx = TypeIndex::new();
        let src = "class A { void f() { int x = y; } }";
        let offset = src.find("= y").unwrap() + 3;
        let tree = SourceTree::parse(src).unwrap();
        let ctx = CompletionContext::derive(&tree, src, offset);
        let expected = ExpectedTypes::new();
        let first = expected.get(&ctx, &idx) as *const Expectation;
        let second = expected.get(&ctx, &idx) as *const Expectation;
        assert_eq!(first, second);
    }
}
