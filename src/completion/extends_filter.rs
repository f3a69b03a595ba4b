use std::sync::Arc;

use tree_sitter::Node;

use super::context::CompletionContext;
use super::type_resolver::{ResolveScope, TypeResolver};
use crate::index::{Modifiers, TypeIndex, TypeKind, TypeMetadata};
use crate::syntax;

/// The cursor sits in an `extends`/`implements` clause; type-reference
/// candidates must be structurally legal supertypes. Computed once per
/// request when applicable.
#[derive(Debug)]
pub struct ExtendsOrImplementsInfo {
    pub is_implements: bool,
    /// Kind of the declaration owning the clause.
    pub declaring_kind: TypeKind,
    /// Qualified name of the type being declared, when derivable.
    pub declared_type: Option<Arc<str>>,
    /// Qualified names of the declared type's enclosing types.
    pub enclosing_types: Vec<Arc<str>>,
    /// Types already listed in the clause.
    pub existing: Vec<Arc<str>>,
}

/// Detect an extends/implements clause around the cursor.
pub fn extends_or_implements_info(
    ctx: &CompletionContext<'_>,
    index: &TypeIndex,
) -> Option<ExtendsOrImplementsInfo> {
    let node = ctx.node?;
    let clause = find_clause(node)?;
    let decl = clause.parent()?;
    let declaring_kind = match decl.kind() {
        "class_declaration" => TypeKind::Class,
        "interface_declaration" => TypeKind::Interface,
        "enum_declaration" => TypeKind::Enum,
        "record_declaration" => TypeKind::Record,
        _ => return None,
    };
    let is_implements = clause.kind() == "super_interfaces";

    let declared_type = super::context::qualified_type_name(ctx.tree, decl, ctx.package.as_deref());
    let mut enclosing_types = Vec::new();
    let mut current = decl.parent();
    while let Some(n) = current {
        if syntax::is_type_declaration_kind(n.kind())
            && let Some(q) = super::context::qualified_type_name(ctx.tree, n, ctx.package.as_deref())
        {
            enclosing_types.push(q);
        }
        current = n.parent();
    }

    let resolver = TypeResolver::new(index);
    let scope = ResolveScope {
        locals: &[],
        enclosing_type: declared_type.as_deref(),
        package: ctx.package.as_deref(),
        imports: &ctx.imports,
    };
    let mut existing = Vec::new();
    collect_listed_types(ctx, clause, &resolver, &scope, &mut existing);
    // An `implements` list may follow the `extends` clause and vice versa;
    // everything already named on the declaration is excluded.
    let mut cursor = decl.walk();
    for sibling in decl.children(&mut cursor) {
        if sibling != clause
            && matches!(
                sibling.kind(),
                "superclass" | "super_interfaces" | "extends_interfaces"
            )
        {
            collect_listed_types(ctx, sibling, &resolver, &scope, &mut existing);
        }
    }

    Some(ExtendsOrImplementsInfo {
        is_implements,
        declaring_kind,
        declared_type,
        enclosing_types,
        existing,
    })
}

fn find_clause(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        if matches!(
            current.kind(),
            "superclass" | "super_interfaces" | "extends_interfaces"
        ) {
            return Some(current);
        }
        current = current.parent()?;
    }
}

fn collect_listed_types(
    ctx: &CompletionContext<'_>,
    clause: Node,
    resolver: &TypeResolver,
    scope: &ResolveScope,
    out: &mut Vec<Arc<str>>,
) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "type_list" => collect_listed_types(ctx, child, resolver, scope, out),
            "type_identifier" | "scoped_type_identifier" | "generic_type" => {
                if let Some(resolved) =
                    resolver.resolve_type_text(&ctx.tree.clean_node_text(child), scope)
                {
                    out.push(resolved);
                }
            }
            _ => {}
        }
    }
}

impl ExtendsOrImplementsInfo {
    /// The full legality predicate: any failing clause filters the
    /// candidate out of the proposal set.
    pub fn allows(&self, candidate: &TypeMetadata, index: &TypeIndex) -> bool {
        if candidate.modifiers.contains(Modifiers::FINAL) {
            return false;
        }
        if matches!(
            candidate.kind,
            TypeKind::Enum | TypeKind::Record | TypeKind::Annotation
        ) {
            return false;
        }
        // Never the declared type itself, nor any type it nests in.
        if let Some(declared) = &self.declared_type {
            if candidate.qualified.as_ref() == declared.as_ref() {
                return false;
            }
            // Supertype cycles through the declared type are equally out.
            if index.is_subtype_of(&candidate.qualified, declared) {
                return false;
            }
        }
        if self
            .enclosing_types
            .iter()
            .any(|e| e.as_ref() == candidate.qualified.as_ref())
        {
            return false;
        }
        if candidate.is_sealed() {
            let permitted = self
                .declared_type
                .as_deref()
                .is_some_and(|d| candidate.permitted.iter().any(|p| p.as_ref() == d));
            if !permitted {
                return false;
            }
        }
        let kind_ok = if self.is_implements {
            candidate.kind == TypeKind::Interface
        } else {
            match self.declaring_kind {
                // `extends` on an interface names interfaces.
                TypeKind::Interface => candidate.kind == TypeKind::Interface,
                _ => candidate.kind == TypeKind::Class,
            }
        };
        if !kind_ok {
            return false;
        }
        !self
            .existing
            .iter()
            .any(|e| e.as_ref() == candidate.qualified.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::context::CompletionContext;
    use crate::syntax::SourceTree;

    fn info_at(src: &str, marker: &str, idx: &TypeIndex) -> Option<ExtendsOrImplementsInfo> {
        let offset = src.find(marker).map(|p| p + marker.len()).unwrap();
        let tree = SourceTree::parse(src).unwrap();
        let ctx = CompletionContext::derive(&tree, src, offset);
        extends_or_implements_info(&ctx, idx)
    }

    fn meta(qualified: &str, kind: TypeKind) -> TypeMetadata {
        TypeMetadata::new(qualified, kind)
    }

    #[test]
    fn test_implements_clause_detected() {
        let idx = TypeIndex::new();
        let src = "class Foo implements Runna { }";
        let info = info_at(src, "implements Runna", &idx).unwrap();
        assert!(info.is_implements);
        assert_eq!(info.declaring_kind, TypeKind::Class);
        assert_eq!(info.declared_type.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_extends_clause_detected() {
        let idx = TypeIndex::new();
        let src = "class Foo extends Ba { }";
        let info = info_at(src, "extends Ba", &idx).unwrap();
        assert!(!info.is_implements);
    }

    #[test]
    fn test_implements_requires_interfaces() {
        let idx = TypeIndex::new();
        let src = "class Foo implements Xx { }";
        let info = info_at(src, "implements Xx", &idx).unwrap();
        assert!(info.allows(&meta("p.SomeInterface", TypeKind::Interface), &idx));
        assert!(!info.allows(&meta("p.SomeClass", TypeKind::Class), &idx));
        assert!(!info.allows(&meta("p.SomeEnum", TypeKind::Enum), &idx));
        assert!(!info.allows(&meta("p.SomeRecord", TypeKind::Record), &idx));
    }

    #[test]
    fn test_extends_on_class_requires_classes() {
        let idx = TypeIndex::new();
        let src = "class Foo extends Xx { }";
        let info = info_at(src, "extends Xx", &idx).unwrap();
        assert!(info.allows(&meta("p.Base", TypeKind::Class), &idx));
        assert!(!info.allows(&meta("p.SomeInterface", TypeKind::Interface), &idx));
    }

    #[test]
    fn test_extends_on_interface_requires_interfaces() {
        let idx = TypeIndex::new();
        let src = "interface Foo extends Xx { }";
        let info = info_at(src, "extends Xx", &idx).unwrap();
        assert!(info.allows(&meta("p.Other", TypeKind::Interface), &idx));
        assert!(!info.allows(&meta("p.Base", TypeKind::Class), &idx));
    }

    #[test]
    fn test_final_and_self_excluded() {
        let idx = TypeIndex::new();
        let src = "class Foo extends Xx { }";
        let info = info_at(src, "extends Xx", &idx).unwrap();
        let mut fin = meta("p.Sealed", TypeKind::Class);
        fin.modifiers |= Modifiers::FINAL;
        assert!(!info.allows(&fin, &idx));
        assert!(!info.allows(&meta("Foo", TypeKind::Class), &idx));
    }

    #[test]
    fn test_sealed_requires_permit() {
        let idx = TypeIndex::new();
        let src = "class Foo extends Xx { }";
        let info = info_at(src, "extends Xx", &idx).unwrap();
        let mut sealed = meta("p.Shape", TypeKind::Class);
        sealed.modifiers |= Modifiers::SEALED;
        sealed.permitted = vec![Arc::from("p.Circle")];
        assert!(!info.allows(&sealed, &idx));
        sealed.permitted = vec![Arc::from("Foo")];
        assert!(info.allows(&sealed, &idx));
    }

    #[test]
    fn test_existing_supertype_excluded() {
        let idx = TypeIndex::new();
        let src = "class Foo implements java.io.Serializable, Xx { }";
        let info = info_at(src, "Serializable, Xx", &idx).unwrap();
        assert!(!info.allows(&meta("java.io.Serializable", TypeKind::Interface), &idx));
        assert!(info.allows(&meta("java.lang.Runnable", TypeKind::Interface), &idx));
    }
}
