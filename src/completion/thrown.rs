use std::sync::Arc;

use tree_sitter::Node;

use super::type_resolver::{ResolveScope, TypeResolver};
use crate::index::TypeIndex;
use crate::syntax::{SourceTree, is_type_declaration_kind};

/// Exceptions a region of code can raise, split into normal candidates
/// and ones already handled by an inner catch (worth ranking lower, but
/// not hiding; the user may still want a broader outer catch).
#[derive(Debug, Default)]
pub struct ThrownExceptions {
    pub thrown: Vec<Arc<str>>,
    pub discouraged: Vec<Arc<str>>,
}

impl ThrownExceptions {
    fn add(&mut self, exc: Arc<str>, caught_inner: bool, index: &TypeIndex) {
        // Unchecked exceptions are never discouraged.
        let discourage = caught_inner && !index.is_unchecked_exception(&exc);
        let list = if discourage {
            &mut self.discouraged
        } else {
            &mut self.thrown
        };
        if !list.iter().any(|e| e.as_ref() == exc.as_ref()) {
            list.push(exc);
        }
    }

    /// Drop every candidate already handled by one of the existing catch
    /// clauses: an exact match or a catch of a supertype both remove it.
    pub fn discard_caught(&mut self, caught: &[Arc<str>], index: &TypeIndex) {
        let handled = |exc: &Arc<str>| {
            caught
                .iter()
                .any(|c| c.as_ref() == exc.as_ref() || index.is_subtype_of(exc, c))
        };
        self.thrown.retain(|e| !handled(e));
        self.discouraged.retain(|e| !handled(e));
    }
}

/// Collect the exception types provably thrown inside `body`: explicit
/// `throw` statements plus the declared `throws` lists of every call and
/// constructor invocation. Nested `try` scopes are tracked on a stack so
/// exceptions their own catches already handle come back discouraged
/// instead of dropped. Nested type declarations are not entered.
pub fn find_thrown_exceptions(
    body: Node,
    tree: &SourceTree,
    index: &TypeIndex,
    scope: &ResolveScope,
) -> ThrownExceptions {
    let resolver = TypeResolver::new(index);
    let mut finder = Finder {
        tree,
        index,
        resolver,
        scope,
        catch_stack: Vec::new(),
        result: ThrownExceptions::default(),
    };
    finder.visit(body);
    finder.result
}

struct Finder<'a, 't> {
    tree: &'t SourceTree,
    index: &'a TypeIndex,
    resolver: TypeResolver<'a>,
    scope: &'a ResolveScope<'a>,
    /// Catch types of every `try` entered between `body` and the current
    /// node. One frame per try, so leaving a try pops exactly its catches.
    catch_stack: Vec<Vec<Arc<str>>>,
    result: ThrownExceptions,
}

impl Finder<'_, '_> {
    fn visit(&mut self, node: Node) {
        if is_type_declaration_kind(node.kind()) {
            return;
        }
        match node.kind() {
            "throw_statement" => {
                if let Some(expr) = node.named_child(0)
                    && let Some(ty) = self.resolver.resolve_expr(expr, self.scope, self.tree)
                {
                    self.record(ty);
                }
                self.visit_children(node);
            }
            "method_invocation" => {
                self.record_invocation(node);
                self.visit_children(node);
            }
            "object_creation_expression" => {
                self.record_construction(node);
                self.visit_children(node);
            }
            "try_statement" | "try_with_resources_statement" => {
                let caught = catch_clause_types(node, self.tree, &self.resolver, self.scope);
                if let Some(body) = node.child_by_field_name("body") {
                    self.catch_stack.push(caught);
                    self.visit(body);
                    self.catch_stack.pop();
                }
                // Catch bodies and finalizers throw past this try's own
                // catches, so they are visited outside the frame.
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if matches!(child.kind(), "catch_clause" | "finally_clause") {
                        self.visit(child);
                    }
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn record_invocation(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.tree.clean_node_text(name_node);
        let receiver = match node.child_by_field_name("object") {
            Some(obj) => self.resolver.resolve_expr(obj, self.scope, self.tree),
            None => self.scope.enclosing_type.map(Arc::from),
        };
        let Some(receiver) = receiver else { return };
        let (count, types) = self.resolver.argument_types(node, self.scope, self.tree);
        if let Some(method) = self.resolver.resolve_method(&receiver, &name, count, &types) {
            for exc in &method.thrown {
                self.record(Arc::clone(exc));
            }
        }
    }

    fn record_construction(&mut self, node: Node) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let Some(type_name) = self
            .resolver
            .resolve_type_text(&self.tree.clean_node_text(ty), self.scope)
        else {
            return;
        };
        let (count, types) = self.resolver.argument_types(node, self.scope, self.tree);
        if let Some(ctor) = self.resolver.resolve_constructor(&type_name, count, &types) {
            for exc in &ctor.thrown {
                self.record(Arc::clone(exc));
            }
        }
    }

    fn record(&mut self, exc: Arc<str>) {
        let caught_inner = self.catch_stack.iter().flatten().any(|c| {
            c.as_ref() == exc.as_ref() || self.index.is_subtype_of(&exc, c)
        });
        self.result.add(exc, caught_inner, self.index);
    }
}

/// Resolved types of every catch clause of a try statement, multi-catch
/// alternatives included.
pub fn catch_clause_types(
    try_node: Node,
    tree: &SourceTree,
    resolver: &TypeResolver,
    scope: &ResolveScope,
) -> Vec<Arc<str>> {
    let mut out = Vec::new();
    let mut cursor = try_node.walk();
    for child in try_node.named_children(&mut cursor) {
        if child.kind() != "catch_clause" {
            continue;
        }
        let mut cc = child.walk();
        for part in child.named_children(&mut cc) {
            if part.kind() != "catch_formal_parameter" {
                continue;
            }
            let mut pc = part.walk();
            for ty in part.named_children(&mut pc) {
                if ty.kind() != "catch_type" {
                    continue;
                }
                for alt in tree.clean_node_text(ty).split('|') {
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
    use crate::index::{MethodMetadata, Modifiers, TypeKind, TypeMetadata};
    use crate::syntax;
    use indoc::indoc;

    fn throwing_method(name: &str, thrown: &[&str]) -> Arc<MethodMetadata> {
        Arc::new(MethodMetadata {
            name: Arc::from(name),
            modifiers: Modifiers::PUBLIC,
            type_parameters: vec![],
            parameters: vec![],
            return_type: Arc::from("void"),
            thrown: thrown.iter().map(|t| Arc::from(*t)).collect(),
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })
    }

    fn exception_index() -> TypeIndex {
        let mut idx = TypeIndex::new();
        let mut exc = TypeMetadata::new("java.lang.Exception", TypeKind::Class);
        exc.superclass = Some(Arc::from("java.lang.Throwable"));
        let mut ioe = TypeMetadata::new("java.io.IOException", TypeKind::Class);
        ioe.superclass = Some(Arc::from("java.lang.Exception"));
        let mut fnf = TypeMetadata::new("java.io.FileNotFoundException", TypeKind::Class);
        fnf.superclass = Some(Arc::from("java.io.IOException"));
        let mut rte = TypeMetadata::new("java.lang.RuntimeException", TypeKind::Class);
        rte.superclass = Some(Arc::from("java.lang.Exception"));
        let mut main = TypeMetadata::new("p.Main", TypeKind::Class);
        main.methods = vec![
            throwing_method("m", &["java.io.IOException"]),
            throwing_method("n", &["java.io.FileNotFoundException"]),
        ];
        idx.add_types([
            TypeMetadata::new("java.lang.Throwable", TypeKind::Class),
            exc,
            ioe,
            fnf,
            rte,
            main,
        ]);
        idx
    }

    fn thrown_in_try(src: &str, idx: &TypeIndex) -> ThrownExceptions {
        let tree = SourceTree::parse(src).unwrap();
        let root = tree.root();
        let try_pos = src.find("try").unwrap();
        let try_node = root
            .descendant_for_byte_range(try_pos, try_pos + 3)
            .and_then(|n| syntax::ancestor_or_self(n, "try_statement"))
            .unwrap();
        let body = try_node.child_by_field_name("body").unwrap();
        let scope = ResolveScope {
            locals: &[],
            enclosing_type: Some("p.Main"),
            package: Some("p"),
            imports: &[],
        };
        find_thrown_exceptions(body, &tree, idx, &scope)
    }

    #[test]
    fn test_call_throws_collected() {
        let idx = exception_index();
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        m();
                    } catch (Exception ignored) {}
                }
                void m() throws java.io.IOException {}
            }
        "#};
        let result = thrown_in_try(src, &idx);
        assert_eq!(
            result.thrown,
            vec![Arc::<str>::from("java.io.IOException")]
        );
        assert!(result.discouraged.is_empty());
    }

    #[test]
    fn test_inner_catch_discourages_but_keeps() {
        let idx = exception_index();
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        m();
                        try {
                            n();
                        } catch (java.io.FileNotFoundException e) {
                        }
                    } catch (Exception ignored) {}
                }
            }
        "#};
        let result = thrown_in_try(src, &idx);
        assert_eq!(result.thrown, vec![Arc::<str>::from("java.io.IOException")]);
        assert_eq!(
            result.discouraged,
            vec![Arc::<str>::from("java.io.FileNotFoundException")]
        );
    }

    #[test]
    fn test_unchecked_never_discouraged() {
        let idx = exception_index();
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        try {
                            throw new RuntimeException();
                        } catch (RuntimeException e) {
                        }
                    } catch (Exception ignored) {}
                }
            }
        "#};
        let result = thrown_in_try(src, &idx);
        assert!(
            result
                .thrown
                .iter()
                .any(|t| t.as_ref() == "java.lang.RuntimeException"),
            "{result:?}"
        );
        assert!(result.discouraged.is_empty());
    }

    #[test]
    fn test_throw_statement_type_collected() {
        let idx = exception_index();
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        throw new java.io.IOException();
                    } catch (Exception ignored) {}
                }
            }
        "#};
        let result = thrown_in_try(src, &idx);
        assert!(result.thrown.iter().any(|t| t.as_ref() == "java.io.IOException"));
    }

    #[test]
    fn test_discard_caught_removes_subtypes() {
        let idx = exception_index();
        let mut result = ThrownExceptions {
            thrown: vec![
                Arc::from("java.io.FileNotFoundException"),
                Arc::from("java.lang.RuntimeException"),
            ],
            discouraged: vec![],
        };
        // Catching IOException removes its subtype FileNotFoundException.
        result.discard_caught(&[Arc::from("java.io.IOException")], &idx);
        assert_eq!(
            result.thrown,
            vec![Arc::<str>::from("java.lang.RuntimeException")]
        );
    }

    #[test]
    fn test_nested_type_declarations_not_entered() {
        let idx = exception_index();
        let src = indoc! {r#"
            package p;
            class Main {
                void f() {
                    try {
                        class Local {
                            void g() throws Exception { m(); }
                        }
                    } catch (Exception ignored) {}
                }
            }
        "#};
        let result = thrown_in_try(src, &idx);
        assert!(result.thrown.is_empty(), "{result:?}");
    }
}
