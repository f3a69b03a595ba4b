use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::scope::{Binding, Bindings};
use crate::index::{Modifiers, TypeIndex, TypeMetadata};

/// Named member-enumeration policy. Replaces positional boolean threading:
/// every combination the engine needs has a constructor here.
#[derive(Debug, Clone, Default)]
pub struct MemberPolicy {
    /// Completion sits in a static reference (`Type.|`); exclude instance
    /// members. Nested types are always included regardless.
    pub statics_only: bool,
    /// Allow abstract methods (interface members proposed for overriding,
    /// not for invocation).
    pub can_use_abstract: bool,
    /// Restrict methods only (method-name position of an invocation).
    pub methods_only: bool,
    /// Name of the field whose initializer is being completed; fields
    /// declared after it in the same class are forward references and
    /// stay hidden.
    pub field_init_limit: Option<Arc<str>>,
}

impl MemberPolicy {
    /// `expr.|` instance access.
    pub fn instance_access() -> Self {
        Self::default()
    }

    /// `Type.|` static access.
    pub fn static_access() -> Self {
        Self {
            statics_only: true,
            ..Self::default()
        }
    }

    /// Method-name span of an invocation: methods only.
    pub fn invocation_name() -> Self {
        Self {
            methods_only: true,
            ..Self::default()
        }
    }

    /// Override-stub collection: abstract members are the point.
    pub fn overridable() -> Self {
        Self {
            can_use_abstract: true,
            ..Self::default()
        }
    }
}

/// Where the completion originates from, for access checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberContext<'a> {
    pub completing_type: Option<&'a str>,
    pub completing_package: Option<&'a str>,
    /// Completion happens inside a static method body.
    pub in_static_method: bool,
}

impl<'a> MemberContext<'a> {
    /// The completing type is the declaring type or nested inside it.
    fn inside_declaring(&self, declaring: &str) -> bool {
        match self.completing_type {
            Some(ct) => {
                ct == declaring
                    || ct.starts_with(declaring)
                        && ct.as_bytes().get(declaring.len()) == Some(&b'.')
            }
            None => false,
        }
    }
}

/// Negative cache for visibility decisions, keyed by (type, member name).
/// One instance per request; never shared.
#[derive(Debug, Default)]
pub struct VisibilityMemo {
    decided: FxHashMap<(Arc<str>, Arc<str>), bool>,
}

impl VisibilityMemo {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(
        &mut self,
        type_key: &Arc<str>,
        name: &Arc<str>,
        decide: impl FnOnce() -> bool,
    ) -> bool {
        *self
            .decided
            .entry((Arc::clone(type_key), Arc::clone(name)))
            .or_insert_with(decide)
    }
}

/// Enumerate the accessible members of `target` and everything it
/// inherits, in deterministic order, into `out`.
///
/// Fields come before methods per type; methods are pre-sorted by
/// normalized signature, descending, so equal-relevance proposals keep a
/// stable order. Override shadowing is handled by the `Bindings`
/// accumulator itself.
pub fn process_members(
    index: &TypeIndex,
    target: &str,
    ctx: &MemberContext,
    policy: &MemberPolicy,
    memo: &mut VisibilityMemo,
    out: &mut Bindings<'_>,
) {
    for meta in index.supertype_chain(target) {
        contribute_type_members(index, &meta, ctx, policy, memo, out);
    }
}

fn contribute_type_members(
    index: &TypeIndex,
    meta: &Arc<TypeMetadata>,
    ctx: &MemberContext,
    policy: &MemberPolicy,
    memo: &mut VisibilityMemo,
    out: &mut Bindings<'_>,
) {
    if !policy.methods_only {
        let mut limit_reached = false;
        for f in &meta.fields {
            // Forward references are only restricted in the class whose
            // initializer list the cursor sits in.
            if policy.field_init_limit.is_some()
                && ctx.completing_type == Some(meta.qualified.as_ref())
            {
                if limit_reached {
                    continue;
                }
                if Some(&f.name) == policy.field_init_limit.as_ref() {
                    limit_reached = true;
                }
            }
            let visible = memo.check(&meta.qualified, &f.name, || {
                member_visible(index, meta, f.modifiers, ctx, false)
            });
            if !visible {
                continue;
            }
            if policy.statics_only && !f.modifiers.contains(Modifiers::STATIC) {
                continue;
            }
            if ctx.in_static_method
                && ctx.completing_type == Some(meta.qualified.as_ref())
                && !f.modifiers.contains(Modifiers::STATIC)
                && !policy.statics_only
            {
                // Instance fields of the own class are not reachable from
                // a static body without a receiver.
                continue;
            }
            out.add(Binding::Field {
                declaring: Arc::clone(&meta.qualified),
                field: Arc::clone(f),
            });
        }
    }

    let mut methods: Vec<_> = meta.methods.iter().filter(|m| !m.is_constructor).collect();
    methods.sort_by(|a, b| b.signature().cmp(&a.signature()));
    for m in methods {
        let visible = memo.check(&meta.qualified, &m.name, || {
            member_visible(index, meta, m.modifiers, ctx, false)
        });
        if !visible {
            continue;
        }
        if policy.statics_only && !m.modifiers.contains(Modifiers::STATIC) {
            continue;
        }
        if ctx.in_static_method
            && ctx.completing_type == Some(meta.qualified.as_ref())
            && !m.modifiers.contains(Modifiers::STATIC)
            && !policy.statics_only
        {
            continue;
        }
        if m.modifiers.contains(Modifiers::ABSTRACT) && !policy.can_use_abstract {
            continue;
        }
        out.add(Binding::Method {
            declaring: Arc::clone(&meta.qualified),
            method: Arc::clone(m),
        });
    }

    if !policy.methods_only {
        // Nested types ignore the static/instance split entirely.
        for nested in &meta.nested_types {
            if let Some(nested_meta) = index.get(nested) {
                let visible = memo.check(&meta.qualified, &nested_meta.name, || {
                    member_visible(index, meta, nested_meta.modifiers, ctx, true)
                });
                if visible {
                    out.add(Binding::Type(Arc::clone(nested_meta)));
                }
            }
        }
    }
}

/// The access-modifier rules, evaluated per candidate.
fn member_visible(
    index: &TypeIndex,
    declaring: &TypeMetadata,
    modifiers: Modifiers,
    ctx: &MemberContext,
    is_nested_type: bool,
) -> bool {
    if modifiers.contains(Modifiers::PRIVATE) {
        return ctx.inside_declaring(&declaring.qualified);
    }
    if modifiers.contains(Modifiers::PROTECTED) {
        if ctx.inside_declaring(&declaring.qualified) {
            return true;
        }
        let from_subtype = ctx
            .completing_type
            .is_some_and(|ct| index.is_subtype_of(ct, &declaring.qualified));
        if !from_subtype {
            return ctx.completing_package.is_some()
                && ctx.completing_package == declaring.package.as_deref();
        }
        // Inherited protected members are unusable from a static method
        // unless declared in the completing class itself.
        if ctx.in_static_method
            && !is_nested_type
            && ctx.completing_type != Some(declaring.qualified.as_ref())
        {
            return false;
        }
        return true;
    }
    if modifiers.is_package_private() {
        return ctx.completing_package == declaring.package.as_deref();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldMetadata, MethodMetadata, TypeKind};

    fn field(name: &str, modifiers: Modifiers) -> Arc<FieldMetadata> {
        Arc::new(FieldMetadata {
            name: Arc::from(name),
            modifiers,
            ty: Arc::from("int"),
            is_enum_constant: false,
            has_constant_value: false,
            deprecated: false,
        })
    }

    fn method(name: &str, modifiers: Modifiers) -> Arc<MethodMetadata> {
        Arc::new(MethodMetadata {
            name: Arc::from(name),
            modifiers,
            type_parameters: vec![],
            parameters: vec![],
            return_type: Arc::from("void"),
            thrown: vec![],
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })
    }

    fn build_hierarchy() -> TypeIndex {
        let mut idx = TypeIndex::new();
        let mut a = TypeMetadata::new("p.A", TypeKind::Class);
        a.fields = vec![
            field("secret", Modifiers::PRIVATE),
            field("guarded", Modifiers::PROTECTED),
            field("plain", Modifiers::empty()),
            field("open", Modifiers::PUBLIC),
        ];
        a.methods = vec![method("run", Modifiers::PUBLIC)];
        let mut b = TypeMetadata::new("q.B", TypeKind::Class);
        b.superclass = Some(Arc::from("p.A"));
        b.methods = vec![method("run", Modifiers::PUBLIC)];
        idx.add_types([a, b]);
        idx
    }

    fn names(bindings: &Bindings) -> Vec<String> {
        bindings.iter().map(|b| b.name().to_string()).collect()
    }

    #[test]
    fn test_private_member_hidden_from_subtype() {
        let idx = build_hierarchy();
        let ctx = MemberContext {
            completing_type: Some("q.B"),
            completing_package: Some("q"),
            in_static_method: false,
        };
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "q.B", &ctx, &MemberPolicy::instance_access(), &mut memo, &mut out);
        let names = names(&out);
        assert!(!names.contains(&"secret".to_string()), "{names:?}");
        assert!(names.contains(&"guarded".to_string()));
        assert!(names.contains(&"open".to_string()));
        // Different package: package-private stays hidden.
        assert!(!names.contains(&"plain".to_string()));
    }

    #[test]
    fn test_private_member_visible_in_own_class() {
        let idx = build_hierarchy();
        let ctx = MemberContext {
            completing_type: Some("p.A"),
            completing_package: Some("p"),
            in_static_method: false,
        };
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "p.A", &ctx, &MemberPolicy::instance_access(), &mut memo, &mut out);
        assert!(names(&out).contains(&"secret".to_string()));
    }

    #[test]
    fn test_override_collapses_to_single_entry() {
        let idx = build_hierarchy();
        let ctx = MemberContext {
            completing_type: Some("q.B"),
            completing_package: Some("q"),
            in_static_method: false,
        };
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "q.B", &ctx, &MemberPolicy::instance_access(), &mut memo, &mut out);
        let runs: Vec<_> = out
            .iter()
            .filter(|b| b.name() == "run")
            .map(|b| match b {
                Binding::Method { declaring, .. } => declaring.to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(runs, vec!["q.B".to_string()], "only the override survives");
    }

    #[test]
    fn test_static_access_filters_instance_members() {
        let mut idx = TypeIndex::new();
        let mut a = TypeMetadata::new("p.A", TypeKind::Class);
        a.fields = vec![field("instance", Modifiers::PUBLIC)];
        a.methods = vec![
            method("stat", Modifiers::PUBLIC | Modifiers::STATIC),
            method("inst", Modifiers::PUBLIC),
        ];
        idx.add_types([a]);
        let ctx = MemberContext::default();
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "p.A", &ctx, &MemberPolicy::static_access(), &mut memo, &mut out);
        let names = names(&out);
        assert!(names.contains(&"stat".to_string()));
        assert!(!names.contains(&"inst".to_string()));
        assert!(!names.contains(&"instance".to_string()));
    }

    #[test]
    fn test_abstract_excluded_unless_permitted() {
        let mut idx = TypeIndex::new();
        let mut itf = TypeMetadata::new("p.Itf", TypeKind::Interface);
        itf.methods = vec![method("doIt", Modifiers::PUBLIC | Modifiers::ABSTRACT)];
        idx.add_types([itf]);
        let ctx = MemberContext::default();
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "p.Itf", &ctx, &MemberPolicy::instance_access(), &mut memo, &mut out);
        assert!(names(&out).is_empty());
        let mut out2 = Bindings::new(&idx);
        process_members(&idx, "p.Itf", &ctx, &MemberPolicy::overridable(), &mut memo, &mut out2);
        assert_eq!(names(&out2), vec!["doIt".to_string()]);
    }

    #[test]
    fn test_field_init_limit_hides_forward_references() {
        let mut idx = TypeIndex::new();
        let mut a = TypeMetadata::new("p.A", TypeKind::Class);
        a.fields = vec![
            field("first", Modifiers::empty()),
            field("second", Modifiers::empty()),
            field("third", Modifiers::empty()),
        ];
        idx.add_types([a]);
        let ctx = MemberContext {
            completing_type: Some("p.A"),
            completing_package: Some("p"),
            in_static_method: false,
        };
        let policy = MemberPolicy {
            field_init_limit: Some(Arc::from("second")),
            ..MemberPolicy::instance_access()
        };
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "p.A", &ctx, &policy, &mut memo, &mut out);
        let names = names(&out);
        assert!(names.contains(&"first".to_string()));
        assert!(names.contains(&"second".to_string()));
        assert!(!names.contains(&"third".to_string()));
    }

    #[test]
    fn test_fields_precede_methods() {
        let idx = build_hierarchy();
        let ctx = MemberContext {
            completing_type: Some("p.A"),
            completing_package: Some("p"),
            in_static_method: false,
        };
        let mut memo = VisibilityMemo::new();
        let mut out = Bindings::new(&idx);
        process_members(&idx, "p.A", &ctx, &MemberPolicy::instance_access(), &mut memo, &mut out);
        let names = names(&out);
        let first_method = names.iter().position(|n| n == "run").unwrap();
        let last_field = names.iter().position(|n| n == "open").unwrap();
        assert!(last_field < first_method);
    }
}
