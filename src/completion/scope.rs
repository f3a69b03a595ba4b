use std::sync::Arc;

use indexmap::IndexMap;
use tree_sitter::Node;

use super::context::{CompletionContext, LocalVar};
use super::members::{MemberContext, MemberPolicy, VisibilityMemo, process_members};
use super::type_resolver::{ResolveScope, TypeResolver};
use crate::index::{FieldMetadata, MethodMetadata, TypeIndex, TypeMetadata};
use crate::syntax::{self, SourceTree, is_type_declaration_kind};

/// A named entity visible at the cursor.
#[derive(Debug, Clone)]
pub enum Binding {
    Local(LocalVar),
    Field {
        declaring: Arc<str>,
        field: Arc<FieldMetadata>,
    },
    Method {
        declaring: Arc<str>,
        method: Arc<MethodMetadata>,
    },
    Type(Arc<TypeMetadata>),
    TypeParameter {
        name: Arc<str>,
        bound: Option<Arc<str>>,
    },
    Package(Arc<str>),
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Binding::Local(lv) => &lv.name,
            Binding::Field { field, .. } => &field.name,
            Binding::Method { method, .. } => &method.name,
            Binding::Type(meta) => &meta.name,
            Binding::TypeParameter { name, .. } => name,
            Binding::Package(name) => name,
        }
    }

    /// Stable identity: two independently-built bindings for the same
    /// semantic entity compare equal through this key.
    pub fn key(&self) -> String {
        match self {
            Binding::Local(lv) => format!("local:{}", lv.name),
            Binding::Field { declaring, field } => format!("field:{declaring}#{}", field.name),
            Binding::Method { declaring, method } => {
                format!("method:{declaring}#{}", method.signature())
            }
            Binding::Type(meta) => format!("type:{}", meta.qualified),
            Binding::TypeParameter { name, .. } => format!("typeparam:{name}"),
            Binding::Package(name) => format!("package:{name}"),
        }
    }

    /// Type of the binding's value, when it has one.
    pub fn value_type(&self) -> Option<Arc<str>> {
        match self {
            Binding::Local(lv) => Some(Arc::clone(&lv.ty)),
            Binding::Field { field, .. } => Some(Arc::clone(&field.ty)),
            Binding::Method { method, .. } => Some(Arc::clone(&method.return_type)),
            Binding::Type(meta) => Some(Arc::clone(&meta.qualified)),
            Binding::TypeParameter { bound, .. } => bound.clone(),
            Binding::Package(_) => None,
        }
    }
}

/// Insertion-ordered, deduplicated set of visible bindings.
///
/// Invariants: variables (locals and fields) iterate before methods;
/// adding a method that overrides an already-present one keeps only the
/// most-derived of the two, in the earlier one's position; name-keyed
/// variable/type entries give shadowing first-in-wins semantics.
pub struct Bindings<'a> {
    index: &'a TypeIndex,
    variables: IndexMap<String, Binding>,
    methods: IndexMap<String, Binding>,
    types: IndexMap<String, Binding>,
}

impl<'a> Bindings<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        Self {
            index,
            variables: IndexMap::new(),
            methods: IndexMap::new(),
            types: IndexMap::new(),
        }
    }

    pub fn add(&mut self, binding: Binding) {
        match &binding {
            Binding::Local(_) | Binding::Field { .. } => {
                let name = binding.name().to_string();
                // Shadowing: the innermost declaration was added first.
                self.variables.entry(name).or_insert(binding);
            }
            Binding::Method { declaring, method } => {
                let sig = method.signature();
                // Keep only the most-derived override. `insert` on an
                // existing key preserves its position.
                let keep_new = match self.methods.get(&sig) {
                    None => true,
                    Some(Binding::Method {
                        declaring: existing, ..
                    }) => {
                        declaring.as_ref() != existing.as_ref()
                            && self.index.is_subtype_of(declaring, existing)
                    }
                    Some(_) => false,
                };
                if keep_new {
                    self.methods.insert(sig, binding);
                }
            }
            Binding::Type(_) | Binding::TypeParameter { .. } => {
                let name = binding.name().to_string();
                self.types.entry(name).or_insert(binding);
            }
            Binding::Package(_) => {
                let key = binding.key();
                self.types.entry(key).or_insert(binding);
            }
        }
    }

    /// Fields/locals first, then methods, then types.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.variables
            .values()
            .chain(self.methods.values())
            .chain(self.types.values())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.types.contains_key(name)
            || self.methods.values().any(|b| b.name() == name)
    }

    pub fn contains_type(&self, qualified: &str) -> bool {
        self.types
            .values()
            .any(|b| matches!(b, Binding::Type(meta) if meta.qualified.as_ref() == qualified))
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.methods.is_empty() && self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.methods.len() + self.types.len()
    }
}

/// Walk outward from the cursor and gather every visible binding: locals
/// and parameters, pattern variables, members of the enclosing type chain
/// (inherited included), enclosing type names, type parameters, and the
/// compilation unit's top-level types.
pub fn scrape_accessible_bindings<'a>(
    ctx: &CompletionContext<'_>,
    index: &'a TypeIndex,
) -> Bindings<'a> {
    let mut out = Bindings::new(index);
    let locals = resolve_local_types(collect_locals(ctx), ctx, index);
    for lv in locals {
        out.add(Binding::Local(lv));
    }

    if let Some(node) = ctx.node {
        for tp in collect_type_parameters(ctx.tree, node) {
            out.add(tp);
        }
    }

    if let Some(enclosing) = ctx.enclosing_type.as_deref() {
        let member_ctx = MemberContext {
            completing_type: Some(enclosing),
            completing_package: ctx.package.as_deref(),
            in_static_method: ctx.in_static_context,
        };
        let policy = MemberPolicy {
            field_init_limit: field_init_limit(ctx),
            ..MemberPolicy::instance_access()
        };
        let mut memo = VisibilityMemo::new();
        process_members(index, enclosing, &member_ctx, &policy, &mut memo, &mut out);

        // The enclosing types themselves, innermost outward.
        let mut current = index.get(enclosing).map(Arc::clone);
        while let Some(meta) = current {
            current = meta.enclosing.as_deref().and_then(|e| index.get(e)).map(Arc::clone);
            out.add(Binding::Type(meta));
        }
    }

    // Top-level types of this compilation unit.
    let root = ctx.tree.root();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if is_type_declaration_kind(child.kind())
            && let Some(qualified) =
                super::context::qualified_type_name(ctx.tree, child, ctx.package.as_deref())
            && let Some(meta) = index.get(&qualified)
        {
            out.add(Binding::Type(Arc::clone(meta)));
        }
    }

    out
}

/// Resolve the raw declared type texts collected from the tree into
/// qualified names, including `var` initializer inference.
pub fn resolve_local_types(
    locals: Vec<LocalVar>,
    ctx: &CompletionContext<'_>,
    index: &TypeIndex,
) -> Vec<LocalVar> {
    let resolver = TypeResolver::new(index);
    // Two passes so a `var` initializer can reference other locals.
    let snapshot = locals.clone();
    locals
        .into_iter()
        .map(|mut lv| {
            let scope = ResolveScope {
                locals: &snapshot,
                enclosing_type: ctx.enclosing_type.as_deref(),
                package: ctx.package.as_deref(),
                imports: &ctx.imports,
            };
            if lv.ty.as_ref() == "var" {
                if let Some(init) = lv.init_expr.clone()
                    && let Some(resolved) = resolver.resolve_init_expr(&init, &scope)
                {
                    lv.ty = resolved;
                }
            } else if let Some(resolved) = resolver.resolve_type_text(&lv.ty, &scope) {
                lv.ty = resolved;
            }
            lv
        })
        .collect()
}

/// Locals, parameters, and pattern variables in scope at the cursor,
/// innermost first.
pub fn collect_locals(ctx: &CompletionContext<'_>) -> Vec<LocalVar> {
    let Some(node) = ctx.node else {
        return Vec::new();
    };
    let tree = ctx.tree;
    let cursor_pos = ctx.parse_offset;
    let mut vars: Vec<LocalVar> = Vec::new();
    let mut child = node;
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "block" | "constructor_body" | "switch_block_statement_group" => {
                let mut tc = n.walk();
                for stmt in n.named_children(&mut tc) {
                    if stmt.end_byte() > cursor_pos {
                        continue;
                    }
                    match stmt.kind() {
                        "local_variable_declaration" => {
                            collect_declarators(tree, stmt, &mut vars);
                        }
                        // Past an else-less if, control only continues when
                        // the condition was false.
                        "if_statement" => {
                            if stmt.child_by_field_name("alternative").is_none()
                                && let Some(cond) = stmt.child_by_field_name("condition")
                            {
                                let (_, false_set) = collect_true_false_bindings(tree, cond);
                                vars.extend(false_set);
                            }
                        }
                        "for_statement" => {
                            if let Some(cond) = stmt.child_by_field_name("condition") {
                                let (_, false_set) = collect_true_false_bindings(tree, cond);
                                vars.extend(false_set);
                            }
                        }
                        _ => {}
                    }
                }
                if n.kind() == "switch_block_statement_group" {
                    collect_switch_label_patterns(tree, n, cursor_pos, &mut vars);
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(params) = n.child_by_field_name("parameters") {
                    collect_formal_parameters(tree, params, &mut vars);
                }
            }
            "lambda_expression" => {
                if let Some(params) = n.child_by_field_name("parameters") {
                    collect_lambda_parameters(tree, params, &mut vars);
                }
            }
            "for_statement" => {
                if let Some(init) = n.child_by_field_name("init")
                    && init.kind() == "local_variable_declaration"
                {
                    collect_declarators(tree, init, &mut vars);
                }
                if Some(child) == n.child_by_field_name("body")
                    && let Some(cond) = n.child_by_field_name("condition")
                {
                    let (true_set, _) = collect_true_false_bindings(tree, cond);
                    vars.extend(true_set);
                }
            }
            "enhanced_for_statement" => {
                if let (Some(name), Some(ty)) =
                    (n.child_by_field_name("name"), n.child_by_field_name("type"))
                    && let Some(text) = syntax::identifier_text(name, tree.text())
                {
                    vars.push(LocalVar {
                        name: Arc::from(text),
                        ty: Arc::from(tree.clean_node_text(ty).as_str()),
                        declared_at: name.start_byte(),
                        init_expr: None,
                    });
                }
            }
            "while_statement" => {
                if Some(child) == n.child_by_field_name("body")
                    && let Some(cond) = n.child_by_field_name("condition")
                {
                    let (true_set, _) = collect_true_false_bindings(tree, cond);
                    vars.extend(true_set);
                }
            }
            "if_statement" => {
                if let Some(cond) = n.child_by_field_name("condition") {
                    if Some(child) == n.child_by_field_name("consequence") {
                        let (true_set, _) = collect_true_false_bindings(tree, cond);
                        vars.extend(true_set);
                    } else if Some(child) == n.child_by_field_name("alternative") {
                        let (_, false_set) = collect_true_false_bindings(tree, cond);
                        vars.extend(false_set);
                    }
                }
            }
            "catch_clause" => {
                let mut cc = n.walk();
                for c in n.named_children(&mut cc) {
                    if c.kind() == "catch_formal_parameter" {
                        let name = c.child_by_field_name("name").or_else(|| {
                            let mut pc = c.walk();
                            c.named_children(&mut pc).find(|x| x.kind() == "identifier")
                        });
                        let ty = {
                            let mut pc = c.walk();
                            c.named_children(&mut pc).find(|x| x.kind() == "catch_type")
                        };
                        if let (Some(name), Some(ty)) = (name, ty)
                            && let Some(text) = syntax::identifier_text(name, tree.text())
                        {
                            vars.push(LocalVar {
                                name: Arc::from(text),
                                // A multi-catch keeps only its first alternative.
                                ty: Arc::from(
                                    tree.clean_node_text(ty)
                                        .split('|')
                                        .next()
                                        .unwrap_or("")
                                        .trim(),
                                ),
                                declared_at: name.start_byte(),
                                init_expr: None,
                            });
                        }
                    }
                }
            }
            "try_with_resources_statement" => {
                if let Some(resources) = n.child_by_field_name("resources") {
                    let mut rc = resources.walk();
                    for r in resources.named_children(&mut rc) {
                        if r.kind() == "resource"
                            && let (Some(name), Some(ty)) =
                                (r.child_by_field_name("name"), r.child_by_field_name("type"))
                            && let Some(text) = syntax::identifier_text(name, tree.text())
                        {
                            vars.push(LocalVar {
                                name: Arc::from(text),
                                ty: Arc::from(tree.clean_node_text(ty).as_str()),
                                declared_at: name.start_byte(),
                                init_expr: None,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        child = n;
        current = n.parent();
    }
    vars
}

fn collect_declarators(tree: &SourceTree, decl: Node, out: &mut Vec<LocalVar>) {
    let ty_text = decl
        .child_by_field_name("type")
        .map(|t| tree.clean_node_text(t))
        .unwrap_or_default();
    if ty_text.is_empty() {
        return;
    }
    let mut cursor = decl.walk();
    for declarator in decl.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let Some(name) = syntax::identifier_text(name_node, tree.text()) else {
            continue;
        };
        let init_expr = (ty_text == "var")
            .then(|| {
                declarator
                    .child_by_field_name("value")
                    .map(|v| tree.clean_node_text(v))
            })
            .flatten();
        out.push(LocalVar {
            name: Arc::from(name),
            ty: Arc::from(ty_text.as_str()),
            declared_at: name_node.start_byte(),
            init_expr,
        });
    }
}

fn collect_formal_parameters(tree: &SourceTree, params: Node, out: &mut Vec<LocalVar>) {
    let mut cursor = params.walk();
    for p in params.named_children(&mut cursor) {
        if !matches!(p.kind(), "formal_parameter" | "spread_parameter") {
            continue;
        }
        let name = p.child_by_field_name("name").or_else(|| {
            let mut pc = p.walk();
            p.named_children(&mut pc).filter(|c| c.kind() == "identifier").last()
        });
        let ty = p.child_by_field_name("type").or_else(|| {
            let mut pc = p.walk();
            p.named_children(&mut pc).find(|c| c.kind() != "identifier" && c.kind() != "modifiers")
        });
        if let (Some(name_node), Some(ty_node)) = (name, ty)
            && let Some(name) = syntax::identifier_text(name_node, tree.text())
        {
            let mut ty_text = tree.clean_node_text(ty_node);
            if p.kind() == "spread_parameter" {
                ty_text.push_str("[]");
            }
            out.push(LocalVar {
                name: Arc::from(name),
                ty: Arc::from(ty_text.as_str()),
                declared_at: name_node.start_byte(),
                init_expr: None,
            });
        }
    }
}

fn collect_lambda_parameters(tree: &SourceTree, params: Node, out: &mut Vec<LocalVar>) {
    match params.kind() {
        "identifier" => {
            if let Some(name) = syntax::identifier_text(params, tree.text()) {
                out.push(LocalVar {
                    name: Arc::from(name),
                    ty: Arc::from("var"),
                    declared_at: params.start_byte(),
                    init_expr: None,
                });
            }
        }
        "formal_parameters" => collect_formal_parameters(tree, params, out),
        "inferred_parameters" => {
            let mut cursor = params.walk();
            for p in params.named_children(&mut cursor) {
                if p.kind() == "identifier"
                    && let Some(name) = syntax::identifier_text(p, tree.text())
                {
                    out.push(LocalVar {
                        name: Arc::from(name),
                        ty: Arc::from("var"),
                        declared_at: p.start_byte(),
                        init_expr: None,
                    });
                }
            }
        }
        _ => {}
    }
}

/// Pattern variables bound by `case` labels textually before the cursor.
fn collect_switch_label_patterns(
    tree: &SourceTree,
    group: Node,
    cursor_pos: usize,
    out: &mut Vec<LocalVar>,
) {
    let mut cursor = group.walk();
    for label in group.named_children(&mut cursor) {
        if label.kind() == "switch_label" && label.end_byte() <= cursor_pos {
            collect_instanceof_patterns(tree, label, out);
            collect_type_patterns(tree, label, out);
        }
    }
}

/// `case Shape s ->` style type patterns inside a switch label.
fn collect_type_patterns(tree: &SourceTree, node: Node, out: &mut Vec<LocalVar>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_pattern" || child.kind() == "pattern" {
            let mut pc = child.walk();
            let parts: Vec<Node> = child.named_children(&mut pc).collect();
            if let [ty, name] = parts.as_slice()
                && let Some(text) = syntax::identifier_text(*name, tree.text())
            {
                out.push(LocalVar {
                    name: Arc::from(text),
                    ty: Arc::from(tree.clean_node_text(*ty).as_str()),
                    declared_at: name.start_byte(),
                    init_expr: None,
                });
            }
        } else {
            collect_type_patterns(tree, child, out);
        }
    }
}

/// Decompose a boolean expression into the pattern variables definitely
/// bound when it evaluates true vs. false.
///
/// `!` swaps the sets. `&&` merges the true-sets and empties the
/// false-set (a false conjunction guarantees nothing). `||` is the
/// mirror image. Any other expression contributes its `instanceof`
/// pattern variables to the true-set only.
pub fn collect_true_false_bindings(
    tree: &SourceTree,
    cond: Node,
) -> (Vec<LocalVar>, Vec<LocalVar>) {
    match cond.kind() {
        "parenthesized_expression" => match cond.named_child(0) {
            Some(inner) => collect_true_false_bindings(tree, inner),
            None => (Vec::new(), Vec::new()),
        },
        "unary_expression" if tree.node_text(cond).starts_with('!') => {
            match cond.child_by_field_name("operand") {
                Some(op) => {
                    let (t, f) = collect_true_false_bindings(tree, op);
                    (f, t)
                }
                None => (Vec::new(), Vec::new()),
            }
        }
        "binary_expression" => {
            let op = cond
                .child_by_field_name("operator")
                .map(|o| o.kind().to_string())
                .unwrap_or_default();
            let left = cond.child_by_field_name("left");
            let right = cond.child_by_field_name("right");
            match (op.as_str(), left, right) {
                ("&&", Some(l), Some(r)) => {
                    let (mut lt, _) = collect_true_false_bindings(tree, l);
                    let (rt, _) = collect_true_false_bindings(tree, r);
                    lt.extend(rt);
                    (lt, Vec::new())
                }
                ("||", Some(l), Some(r)) => {
                    let (_, mut lf) = collect_true_false_bindings(tree, l);
                    let (_, rf) = collect_true_false_bindings(tree, r);
                    lf.extend(rf);
                    (Vec::new(), lf)
                }
                _ => {
                    let mut trues = Vec::new();
                    collect_instanceof_patterns(tree, cond, &mut trues);
                    (trues, Vec::new())
                }
            }
        }
        _ => {
            let mut trues = Vec::new();
            collect_instanceof_patterns(tree, cond, &mut trues);
            (trues, Vec::new())
        }
    }
}

/// All `instanceof` pattern variables in a subtree, not descending into
/// nested lambdas or type declarations.
fn collect_instanceof_patterns(tree: &SourceTree, node: Node, out: &mut Vec<LocalVar>) {
    if node.kind() == "lambda_expression" || is_type_declaration_kind(node.kind()) {
        return;
    }
    if node.kind() == "instanceof_expression" {
        let name = node.child_by_field_name("name").or_else(|| {
            // Older grammar shape: the pattern identifier trails the type.
            let mut cursor = node.walk();
            node.children(&mut cursor)
                .filter(|c| c.kind() == "identifier")
                .last()
                .filter(|c| Some(*c) != node.child_by_field_name("left"))
        });
        if let (Some(name_node), Some(ty)) = (name, node.child_by_field_name("right"))
            && let Some(text) = syntax::identifier_text(name_node, tree.text())
        {
            out.push(LocalVar {
                name: Arc::from(text),
                ty: Arc::from(tree.clean_node_text(ty).as_str()),
                declared_at: name_node.start_byte(),
                init_expr: None,
            });
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_instanceof_patterns(tree, child, out);
    }
}

/// Type parameters declared by enclosing methods and types.
fn collect_type_parameters(tree: &SourceTree, node: Node) -> Vec<Binding> {
    let mut out = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if is_type_declaration_kind(n.kind()) || n.kind() == "method_declaration" {
            let tps = n.child_by_field_name("type_parameters").or_else(|| {
                let mut cursor = n.walk();
                n.children(&mut cursor).find(|c| c.kind() == "type_parameters")
            });
            if let Some(tps) = tps {
                let mut cursor = tps.walk();
                for tp in tps.named_children(&mut cursor) {
                    if tp.kind() != "type_parameter" {
                        continue;
                    }
                    let mut pc = tp.walk();
                    let name = tp
                        .named_children(&mut pc)
                        .find(|c| matches!(c.kind(), "identifier" | "type_identifier"));
                    let bound = {
                        let mut bc = tp.walk();
                        tp.named_children(&mut bc)
                            .find(|c| c.kind() == "type_bound")
                            .map(|b| {
                                tree.clean_node_text(b)
                                    .trim_start_matches("extends")
                                    .trim()
                                    .to_string()
                            })
                    };
                    if let Some(name_node) = name
                        && let Some(text) = syntax::identifier_text(name_node, tree.text())
                    {
                        out.push(Binding::TypeParameter {
                            name: Arc::from(text),
                            bound: bound.map(|b| Arc::from(b.as_str())),
                        });
                    }
                }
            }
        }
        current = n.parent();
    }
    out
}

/// If the cursor sits in a field initializer of the enclosing class, the
/// name of that field (forward references beyond it are illegal).
pub fn field_init_limit(ctx: &CompletionContext<'_>) -> Option<Arc<str>> {
    let node = ctx.node?;
    let field_decl = syntax::find_ancestor(node, "field_declaration")?;
    let mut cursor = field_decl.walk();
    for declarator in field_decl.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        if let Some(value) = declarator.child_by_field_name("value")
            && value.start_byte() <= ctx.parse_offset
            && ctx.parse_offset <= value.end_byte()
            && let Some(name) = declarator.child_by_field_name("name")
            && let Some(text) = syntax::identifier_text(name, ctx.tree.text())
        {
            return Some(Arc::from(text));
        }
    }
    None
}
