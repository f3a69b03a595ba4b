use std::sync::Arc;

use tree_sitter::Node;

use super::context::LocalVar;
use crate::index::{JAVA_LANG_STRING, MethodMetadata, TypeIndex, is_primitive};
use crate::syntax::SourceTree;

/// Name-resolution inputs for one completion request.
pub struct ResolveScope<'a> {
    pub locals: &'a [LocalVar],
    pub enclosing_type: Option<&'a str>,
    pub package: Option<&'a str>,
    pub imports: &'a [Arc<str>],
}

/// One step of a dotted receiver chain: a variable/field read, or a call
/// with its argument texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegment {
    pub name: String,
    pub arg_count: Option<i32>,
    pub arg_texts: Vec<String>,
}

impl ChainSegment {
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_count: None,
            arg_texts: Vec::new(),
        }
    }

    pub fn method(name: impl Into<String>, arg_count: i32, arg_texts: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arg_count: Some(arg_count),
            arg_texts,
        }
    }
}

/// Resolves the static type of expressions against locals, the enclosing
/// class, imports, and the index. Every lookup is best-effort: a `None`
/// simply narrows the completion result, it never aborts the request.
pub struct TypeResolver<'a> {
    index: &'a TypeIndex,
}

impl<'a> TypeResolver<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        Self { index }
    }

    /// Type of an expression node, as a qualified name, primitive, or
    /// array form.
    pub fn resolve_expr(
        &self,
        node: Node,
        scope: &ResolveScope,
        tree: &SourceTree,
    ) -> Option<Arc<str>> {
        match node.kind() {
            "identifier" => {
                let name = tree.clean_node_text(node);
                if name.is_empty() {
                    return None;
                }
                self.resolve_name(&name, scope)
            }
            "this" => scope.enclosing_type.map(Arc::from),
            "super" => {
                let enclosing = scope.enclosing_type?;
                self.index
                    .get(enclosing)
                    .and_then(|m| m.superclass.clone())
            }
            "string_literal" => Some(Arc::from(JAVA_LANG_STRING)),
            "character_literal" => Some(Arc::from("char")),
            "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
            | "binary_integer_literal" => {
                let text = tree.node_text(node);
                if text.ends_with('l') || text.ends_with('L') {
                    Some(Arc::from("long"))
                } else {
                    Some(Arc::from("int"))
                }
            }
            "decimal_floating_point_literal" => {
                let text = tree.node_text(node);
                if text.ends_with('f') || text.ends_with('F') {
                    Some(Arc::from("float"))
                } else {
                    Some(Arc::from("double"))
                }
            }
            "true" | "false" => Some(Arc::from("boolean")),
            "null_literal" => None,
            "parenthesized_expression" => {
                let inner = node.named_child(0)?;
                self.resolve_expr(inner, scope, tree)
            }
            "cast_expression" => {
                let ty = node.child_by_field_name("type")?;
                self.resolve_type_text(&tree.clean_node_text(ty), scope)
            }
            "object_creation_expression" => {
                let ty = node.child_by_field_name("type")?;
                self.resolve_type_text(&tree.clean_node_text(ty), scope)
            }
            "array_creation_expression" => {
                let ty = node.child_by_field_name("type")?;
                let base = self.resolve_type_text(&tree.clean_node_text(ty), scope)?;
                Some(Arc::from(format!("{base}[]").as_str()))
            }
            "method_invocation" => {
                let name_node = node.child_by_field_name("name")?;
                let name = tree.clean_node_text(name_node);
                let receiver = match node.child_by_field_name("object") {
                    Some(obj) => self.resolve_expr(obj, scope, tree)?,
                    None => Arc::from(scope.enclosing_type?),
                };
                let (count, types) = self.argument_types(node, scope, tree);
                self.resolve_method_return(&receiver, &name, count, &types)
            }
            "field_access" => {
                let obj = node.child_by_field_name("object")?;
                let field = node.child_by_field_name("field")?;
                let receiver = self.resolve_expr(obj, scope, tree)?;
                self.field_type(&receiver, &tree.clean_node_text(field))
            }
            "array_access" => {
                let array = node.child_by_field_name("array")?;
                let array_ty = self.resolve_expr(array, scope, tree)?;
                element_type_of_array(&array_ty)
            }
            "binary_expression" => {
                let op_kind = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind().to_string())
                    .unwrap_or_default();
                match op_kind.as_str() {
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "instanceof" => {
                        Some(Arc::from("boolean"))
                    }
                    "+" => {
                        let left = node
                            .child_by_field_name("left")
                            .and_then(|n| self.resolve_expr(n, scope, tree));
                        let right = node
                            .child_by_field_name("right")
                            .and_then(|n| self.resolve_expr(n, scope, tree));
                        if left.as_deref() == Some(JAVA_LANG_STRING)
                            || right.as_deref() == Some(JAVA_LANG_STRING)
                        {
                            Some(Arc::from(JAVA_LANG_STRING))
                        } else {
                            left.or(right)
                        }
                    }
                    _ => node
                        .child_by_field_name("left")
                        .and_then(|n| self.resolve_expr(n, scope, tree))
                        .or_else(|| {
                            node.child_by_field_name("right")
                                .and_then(|n| self.resolve_expr(n, scope, tree))
                        }),
                }
            }
            "unary_expression" => {
                let text = tree.node_text(node);
                if text.starts_with('!') {
                    return Some(Arc::from("boolean"));
                }
                let operand = node.child_by_field_name("operand")?;
                self.resolve_expr(operand, scope, tree)
            }
            "update_expression" => {
                let operand = node.named_child(0)?;
                self.resolve_expr(operand, scope, tree)
            }
            "ternary_expression" => {
                let cons = node.child_by_field_name("consequence")?;
                self.resolve_expr(cons, scope, tree).or_else(|| {
                    node.child_by_field_name("alternative")
                        .and_then(|alt| self.resolve_expr(alt, scope, tree))
                })
            }
            "assignment_expression" => {
                let left = node.child_by_field_name("left")?;
                self.resolve_expr(left, scope, tree)
            }
            "instanceof_expression" => Some(Arc::from("boolean")),
            "scoped_identifier" | "scoped_type_identifier" => {
                let text = tree.clean_node_text(node);
                if self.index.get(&text).is_some() {
                    return Some(Arc::from(text.as_str()));
                }
                // Possibly `Receiver.field` misparsed as a scoped name.
                let (head, tail) = text.rsplit_once('.')?;
                let receiver = self.resolve_name(head, scope)?;
                self.field_type(&receiver, tail)
            }
            "type_identifier" => self.resolve_type_text(&tree.clean_node_text(node), scope),
            _ => None,
        }
    }

    /// A bare name: local, field of the enclosing class chain, or type.
    pub fn resolve_name(&self, name: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        if name == "this" {
            return scope.enclosing_type.map(Arc::from);
        }
        if let Some(lv) = scope.locals.iter().find(|lv| lv.name.as_ref() == name) {
            if lv.ty.as_ref() != "var" {
                return Some(Arc::clone(&lv.ty));
            }
            if let Some(init) = &lv.init_expr {
                return self.resolve_init_expr(init, scope);
            }
            return None;
        }
        if let Some(enclosing) = scope.enclosing_type
            && let Some(ty) = self.field_type(enclosing, name)
        {
            return Some(ty);
        }
        self.resolve_simple_type(name, scope)
    }

    /// Declared field type, searched through the supertype chain.
    pub fn field_type(&self, receiver: &str, field: &str) -> Option<Arc<str>> {
        let receiver = strip_generics(receiver);
        for meta in self.index.supertype_chain(receiver) {
            if let Some(f) = meta.fields.iter().find(|f| f.name.as_ref() == field) {
                return Some(Arc::clone(&f.ty));
            }
        }
        None
    }

    /// The method a call resolves to, walking the supertype chain and
    /// picking the overload by arity first, then by argument types.
    pub fn resolve_method(
        &self,
        receiver: &str,
        method_name: &str,
        arg_count: i32,
        arg_types: &[Arc<str>],
    ) -> Option<Arc<MethodMetadata>> {
        let receiver = strip_generics(receiver);
        for meta in self.index.supertype_chain(receiver) {
            let candidates: Vec<&Arc<MethodMetadata>> = meta
                .methods
                .iter()
                .filter(|m| !m.is_constructor && m.name.as_ref() == method_name)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            return Some(Arc::clone(select_overload(&candidates, arg_count, arg_types)));
        }
        None
    }

    pub fn resolve_method_return(
        &self,
        receiver: &str,
        method_name: &str,
        arg_count: i32,
        arg_types: &[Arc<str>],
    ) -> Option<Arc<str>> {
        self.resolve_method(receiver, method_name, arg_count, arg_types)
            .map(|m| Arc::clone(&m.return_type))
    }

    /// Constructor overload of `type_name` matching the argument shape.
    pub fn resolve_constructor(
        &self,
        type_name: &str,
        arg_count: i32,
        arg_types: &[Arc<str>],
    ) -> Option<Arc<MethodMetadata>> {
        let meta = self.index.get(strip_generics(type_name))?;
        let candidates: Vec<&Arc<MethodMetadata>> = meta.constructors().collect();
        if candidates.is_empty() {
            return None;
        }
        Some(Arc::clone(select_overload(&candidates, arg_count, arg_types)))
    }

    /// Normalize a declared type reference: drop type arguments, keep
    /// array suffixes, pass primitives through, qualify simple names.
    pub fn resolve_type_text(&self, text: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let dims = text.matches("[]").count();
        let base = text.split('<').next().unwrap_or(text).trim_end_matches("[]").trim();
        if base.is_empty() {
            return None;
        }
        let resolved: Arc<str> = if is_primitive(base) {
            Arc::from(base)
        } else if base.contains('.') {
            Arc::from(base)
        } else {
            self.resolve_simple_type(base, scope)?
        };
        if dims == 0 {
            Some(resolved)
        } else {
            Some(Arc::from(format!("{}{}", resolved, "[]".repeat(dims)).as_str()))
        }
    }

    /// Simple type name -> qualified name: the enclosing type, explicit
    /// imports, same package, wildcard imports, `java.lang`, then a unique
    /// index match.
    pub fn resolve_simple_type(&self, simple: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        if let Some(enclosing) = scope.enclosing_type
            && crate::index::simple_name_of(enclosing) == simple
        {
            return Some(Arc::from(enclosing));
        }
        for imp in scope.imports {
            if imp.strip_suffix(".*").is_none()
                && crate::index::simple_name_of(imp) == simple
            {
                return Some(Arc::clone(imp));
            }
        }
        if let Some(pkg) = scope.package {
            let candidate = format!("{pkg}.{simple}");
            if self.index.get(&candidate).is_some() {
                return Some(Arc::from(candidate.as_str()));
            }
        }
        for imp in scope.imports {
            if let Some(pkg) = imp.strip_suffix(".*") {
                let candidate = format!("{pkg}.{simple}");
                if self.index.get(&candidate).is_some() {
                    return Some(Arc::from(candidate.as_str()));
                }
            }
        }
        let candidate = format!("java.lang.{simple}");
        if self.index.get(&candidate).is_some() {
            return Some(Arc::from(candidate.as_str()));
        }
        let matches = self.index.by_simple_name(simple);
        match matches.as_slice() {
            [only] => Some(Arc::clone(&only.qualified)),
            _ => None,
        }
    }

    /// Resolve a `var` initializer from its raw text: `new T(...)`, an
    /// array read, or a dotted receiver chain.
    pub fn resolve_init_expr(&self, expr: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix("new ") {
            let class_name = rest.split('(').next()?.split('<').next()?.trim();
            return self.resolve_type_text(class_name, scope);
        }
        if let Some(bracket) = expr.rfind('[')
            && expr.ends_with(']')
        {
            let array_expr = expr[..bracket].trim();
            if !array_expr.is_empty()
                && let Some(array_ty) = self.resolve_chain_text(array_expr, scope)
            {
                return element_type_of_array(&array_ty);
            }
        }
        self.resolve_chain_text(expr, scope)
    }

    /// Evaluate a dotted chain of field reads and calls left to right.
    pub fn resolve_chain_text(&self, expr: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        let chain = parse_chain(expr);
        if chain.is_empty() {
            return None;
        }
        let mut current: Option<Arc<str>> = None;
        for (i, seg) in chain.iter().enumerate() {
            if i == 0 {
                current = match seg.arg_count {
                    Some(count) => {
                        let receiver = scope.enclosing_type?;
                        let types = self.resolve_arg_texts(&seg.arg_texts, scope);
                        self.resolve_method_return(receiver, &seg.name, count, &types)
                    }
                    None => self.resolve_name(&seg.name, scope),
                };
            } else {
                let receiver = current.as_deref()?.to_string();
                current = match seg.arg_count {
                    Some(count) => {
                        let types = self.resolve_arg_texts(&seg.arg_texts, scope);
                        self.resolve_method_return(&receiver, &seg.name, count, &types)
                    }
                    None => self.field_type(&receiver, &seg.name),
                };
            }
            current.as_ref()?;
        }
        current
    }

    fn resolve_arg_texts(&self, texts: &[String], scope: &ResolveScope) -> Vec<Arc<str>> {
        let resolved: Vec<Arc<str>> = texts
            .iter()
            .filter_map(|t| self.resolve_value_text(t.trim(), scope))
            .collect();
        // Partial resolution is useless for overload matching.
        if resolved.len() == texts.len() { resolved } else { Vec::new() }
    }

    /// Literal or name text, used for overload matching of chain arguments.
    fn resolve_value_text(&self, text: &str, scope: &ResolveScope) -> Option<Arc<str>> {
        if text.starts_with('"') {
            return Some(Arc::from(JAVA_LANG_STRING));
        }
        if text.parse::<i64>().is_ok() {
            return Some(Arc::from("int"));
        }
        if let Some(prefix) = text.strip_suffix(['l', 'L'])
            && !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_digit())
        {
            return Some(Arc::from("long"));
        }
        if let Some(prefix) = text.strip_suffix(['f', 'F'])
            && !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            return Some(Arc::from("float"));
        }
        if let Some(prefix) = text.strip_suffix(['d', 'D'])
            && !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            return Some(Arc::from("double"));
        }
        if text.contains('.')
            && text.chars().all(|c| c.is_ascii_digit() || c == '.')
            && !text.starts_with('.')
            && !text.ends_with('.')
        {
            return Some(Arc::from("double"));
        }
        if text == "true" || text == "false" {
            return Some(Arc::from("boolean"));
        }
        self.resolve_name(text, scope)
    }

    /// Argument count and (fully) resolved argument types of a call node.
    pub fn argument_types(
        &self,
        invocation: Node,
        scope: &ResolveScope,
        tree: &SourceTree,
    ) -> (i32, Vec<Arc<str>>) {
        let Some(args) = invocation.child_by_field_name("arguments") else {
            return (-1, Vec::new());
        };
        let mut cursor = args.walk();
        let nodes: Vec<Node> = args.named_children(&mut cursor).collect();
        let count = nodes.len() as i32;
        let types: Vec<Arc<str>> = nodes
            .iter()
            .filter_map(|n| self.resolve_expr(*n, scope, tree))
            .collect();
        if types.len() == nodes.len() {
            (count, types)
        } else {
            (count, Vec::new())
        }
    }
}

pub fn select_overload<'m>(
    candidates: &[&'m Arc<MethodMetadata>],
    arg_count: i32,
    arg_types: &[Arc<str>],
) -> &'m Arc<MethodMetadata> {
    match candidates.len() {
        1 => candidates[0],
        _ => {
            if arg_count >= 0 {
                let by_count: Vec<&Arc<MethodMetadata>> = candidates
                    .iter()
                    .copied()
                    .filter(|m| m.parameters.len() == arg_count as usize)
                    .collect();
                match by_count.len() {
                    0 => candidates[0],
                    1 => by_count[0],
                    _ if !arg_types.is_empty() => by_count
                        .iter()
                        .copied()
                        .find(|m| {
                            m.parameters
                                .iter()
                                .zip(arg_types)
                                .all(|(p, a)| p.ty.as_ref() == a.as_ref())
                        })
                        .unwrap_or(by_count[0]),
                    _ => by_count[0],
                }
            } else {
                candidates[0]
            }
        }
    }
}

pub fn element_type_of_array(array_ty: &str) -> Option<Arc<str>> {
    let base = array_ty.strip_suffix("[]")?.trim();
    if base.is_empty() {
        return None;
    }
    Some(Arc::from(base))
}

pub fn strip_generics(ty: &str) -> &str {
    ty.split('<').next().unwrap_or(ty)
}

/// Split a dotted receiver expression into chain segments, tracking call
/// argument texts at depth one.
pub fn parse_chain(expr: &str) -> Vec<ChainSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_method = false;
    let mut arg_start = 0usize;
    let mut arg_texts: Vec<String> = Vec::new();

    for (char_pos, ch) in expr.char_indices() {
        match ch {
            '(' => {
                depth += 1;
                if depth == 1 {
                    in_method = true;
                    arg_start = char_pos + 1;
                    arg_texts = Vec::new();
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 && in_method {
                    let arg = expr[arg_start..char_pos].trim();
                    if !arg.is_empty() {
                        arg_texts.push(arg.to_string());
                    }
                    let arg_count = arg_texts.len() as i32;
                    segments.push(ChainSegment::method(
                        current.trim(),
                        arg_count,
                        std::mem::take(&mut arg_texts),
                    ));
                    current = String::new();
                    in_method = false;
                }
            }
            ',' if depth == 1 => {
                arg_texts.push(expr[arg_start..char_pos].trim().to_string());
                arg_start = char_pos + 1;
            }
            '.' if depth == 0 => {
                let trimmed = current.trim().to_string();
                if !trimmed.is_empty() && !in_method {
                    segments.push(ChainSegment::variable(trimmed));
                }
                current = String::new();
            }
            c => {
                if depth == 0 {
                    current.push(c);
                }
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() && depth == 0 && !in_method {
        segments.push(ChainSegment::variable(trimmed));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldMetadata, Modifiers, Parameter, TypeKind, TypeMetadata};

    fn method(name: &str, params: &[&str], ret: &str) -> Arc<MethodMetadata> {
        Arc::new(MethodMetadata {
            name: Arc::from(name),
            modifiers: Modifiers::PUBLIC,
            type_parameters: vec![],
            parameters: params
                .iter()
                .map(|p| Parameter {
                    name: None,
                    ty: Arc::from(*p),
                })
                .collect(),
            return_type: Arc::from(ret),
            thrown: vec![],
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })
    }

    fn field(name: &str, ty: &str) -> Arc<FieldMetadata> {
        Arc::new(FieldMetadata {
            name: Arc::from(name),
            modifiers: Modifiers::PUBLIC,
            ty: Arc::from(ty),
            is_enum_constant: false,
            has_constant_value: false,
            deprecated: false,
        })
    }

    fn empty_scope<'a>() -> ResolveScope<'a> {
        ResolveScope {
            locals: &[],
            enclosing_type: None,
            package: None,
            imports: &[],
        }
    }

    #[test]
    fn test_parse_chain_shapes() {
        let names = |expr: &str| -> Vec<(String, Option<i32>)> {
            parse_chain(expr)
                .into_iter()
                .map(|s| (s.name, s.arg_count))
                .collect()
        };
        assert_eq!(
            names("list.ge"),
            vec![("list".into(), None), ("ge".into(), None)]
        );
        assert_eq!(
            names("list.stream().fi"),
            vec![
                ("list".into(), None),
                ("stream".into(), Some(0)),
                ("fi".into(), None)
            ]
        );
        assert_eq!(
            names("a.b().c(x, y).d"),
            vec![
                ("a".into(), None),
                ("b".into(), Some(0)),
                ("c".into(), Some(2)),
                ("d".into(), None)
            ]
        );
        assert_eq!(
            names("list.get(map.size()).toStr"),
            vec![
                ("list".into(), None),
                ("get".into(), Some(1)),
                ("toStr".into(), None)
            ]
        );
    }

    #[test]
    fn test_overload_selection_by_arg_types() {
        let m1 = method("f", &["java.lang.String", "int"], "a.A");
        let m2 = method("f", &["java.lang.String", "long"], "b.B");
        let candidates = vec![&m1, &m2];
        let chosen = select_overload(
            &candidates,
            2,
            &[Arc::from("java.lang.String"), Arc::from("long")],
        );
        assert_eq!(chosen.return_type.as_ref(), "b.B");
    }

    #[test]
    fn test_method_return_walks_supertypes() {
        let mut idx = TypeIndex::new();
        let mut parent = TypeMetadata::new("p.Parent", TypeKind::Class);
        parent.methods = vec![method("getValue", &[], JAVA_LANG_STRING)];
        let mut child = TypeMetadata::new("p.Child", TypeKind::Class);
        child.superclass = Some(Arc::from("p.Parent"));
        idx.add_types([parent, child]);
        let resolver = TypeResolver::new(&idx);
        assert_eq!(
            resolver
                .resolve_method_return("p.Child", "getValue", 0, &[])
                .as_deref(),
            Some(JAVA_LANG_STRING)
        );
    }

    #[test]
    fn test_chain_through_field_and_call() {
        let mut idx = TypeIndex::new();
        let mut system = TypeMetadata::new("java.lang.System", TypeKind::Class);
        system.fields = vec![field("out", "java.io.PrintStream")];
        idx.add_types([system, TypeMetadata::new("java.io.PrintStream", TypeKind::Class)]);
        let resolver = TypeResolver::new(&idx);
        let imports = [Arc::from("java.lang.System")];
        let scope = ResolveScope {
            locals: &[],
            enclosing_type: None,
            package: None,
            imports: &imports,
        };
        assert_eq!(
            resolver.resolve_chain_text("System.out", &scope).as_deref(),
            Some("java.io.PrintStream")
        );
    }

    #[test]
    fn test_var_init_new_expression() {
        let mut idx = TypeIndex::new();
        idx.add_type(TypeMetadata::new("java.util.ArrayList", TypeKind::Class));
        let resolver = TypeResolver::new(&idx);
        let imports = [Arc::from("java.util.ArrayList")];
        let scope = ResolveScope {
            locals: &[],
            enclosing_type: None,
            package: None,
            imports: &imports,
        };
        assert_eq!(
            resolver
                .resolve_init_expr("new ArrayList<>()", &scope)
                .as_deref(),
            Some("java.util.ArrayList")
        );
    }

    #[test]
    fn test_array_element_type() {
        assert_eq!(element_type_of_array("java.lang.String[]").as_deref(), Some("java.lang.String"));
        assert_eq!(element_type_of_array("int[]").as_deref(), Some("int"));
        assert_eq!(element_type_of_array("int").as_deref(), None);
    }

    #[test]
    fn test_simple_type_resolution_order() {
        let mut idx = TypeIndex::new();
        idx.add_types([
            TypeMetadata::new("com.example.Foo", TypeKind::Class),
            TypeMetadata::new("other.Foo", TypeKind::Class),
        ]);
        let resolver = TypeResolver::new(&idx);
        // Same package wins over a unique-match fallback that is ambiguous.
        let scope = ResolveScope {
            locals: &[],
            enclosing_type: None,
            package: Some("com.example"),
            imports: &[],
        };
        assert_eq!(
            resolver.resolve_simple_type("Foo", &scope).as_deref(),
            Some("com.example.Foo")
        );
        // Ambiguous with no package context resolves to nothing.
        assert_eq!(resolver.resolve_simple_type("Foo", &empty_scope()), None);
    }

    #[test]
    fn test_expr_literals() {
        let idx = TypeIndex::new();
        let resolver = TypeResolver::new(&idx);
        let src = r#"class A { void f() { g("x", 1L, 2.0f); } }"#;
        let tree = SourceTree::parse(src).unwrap();
        let root = tree.root();
        let call_pos = src.find("g(").unwrap();
        let call = root
            .descendant_for_byte_range(call_pos, call_pos + 1)
            .and_then(|n| crate::syntax::ancestor_or_self(n, "method_invocation"))
            .unwrap();
        let args = call.child_by_field_name("arguments").unwrap();
        let mut cursor = args.walk();
        let nodes: Vec<Node> = args.named_children(&mut cursor).collect();
        let scope = empty_scope();
        assert_eq!(
            resolver.resolve_expr(nodes[0], &scope, &tree).as_deref(),
            Some(JAVA_LANG_STRING)
        );
        assert_eq!(resolver.resolve_expr(nodes[1], &scope, &tree).as_deref(), Some("long"));
        assert_eq!(resolver.resolve_expr(nodes[2], &scope, &tree).as_deref(), Some("float"));
    }
}
