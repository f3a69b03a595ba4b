use std::sync::Arc;

use super::proposal::{CompletionProposal, ProposalKind};
use crate::index::{MethodMetadata, Modifiers, TypeIndex, TypeMetadata, is_primitive, package_of, simple_name_of};

/// Everything qualifier elision needs to know about the file the
/// completion text is generated into.
pub struct RenderContext<'a> {
    pub index: &'a TypeIndex,
    pub package: Option<&'a str>,
    pub imports: &'a [Arc<str>],
    /// The type declaration the text lands in, for inherited member-type
    /// lookup.
    pub generating_type: Option<&'a str>,
}

impl RenderContext<'_> {
    fn is_imported(&self, qualified: &str) -> bool {
        self.imports.iter().any(|imp| {
            imp.as_ref() == qualified
                || imp
                    .strip_suffix(".*")
                    .is_some_and(|pkg| package_of(qualified) == Some(pkg))
        })
    }
}

/// Shortest legal display form of a type name inside generated text.
///
/// The qualifier is dropped when the type is `java.lang.*`, its package
/// is a prefix of the generating package, it is imported, or it is an
/// inherited member type of the class being generated into.
pub fn type_display_name(qualified: &str, rctx: &RenderContext<'_>) -> String {
    let dims = qualified.matches("[]").count();
    let base = qualified.trim_end_matches("[]");
    let rendered = base_display_name(base, rctx);
    format!("{}{}", rendered, "[]".repeat(dims))
}

fn base_display_name(qualified: &str, rctx: &RenderContext<'_>) -> String {
    if is_primitive(qualified) || !qualified.contains('.') {
        return qualified.to_string();
    }
    let simple = simple_name_of(qualified);
    if let Some(pkg) = package_of(qualified) {
        if pkg == "java.lang" {
            return simple.to_string();
        }
        if let Some(own) = rctx.package
            && (own == pkg || own.starts_with(pkg) && own.as_bytes().get(pkg.len()) == Some(&b'.'))
        {
            return simple.to_string();
        }
    }
    if rctx.is_imported(qualified) {
        return simple.to_string();
    }
    if let Some(generating) = rctx.generating_type
        && is_inherited_member_type(generating, simple, rctx.index)
    {
        return simple.to_string();
    }
    qualified.to_string()
}

/// First matching inherited member type by simple name wins, searched
/// with decreasing privilege up the superclass chain.
fn is_inherited_member_type(generating: &str, simple: &str, index: &TypeIndex) -> bool {
    for meta in index.supertype_chain(generating) {
        for nested in &meta.nested_types {
            if simple_name_of(nested) == simple {
                return true;
            }
        }
    }
    false
}

/// `Type name` pairs for a parameter list, using declared names and a
/// positional placeholder when a name is unavailable.
pub fn parameter_list(method: &MethodMetadata, rctx: &RenderContext<'_>) -> String {
    method
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let ty = type_display_name(&p.ty, rctx);
            match &p.name {
                Some(name) => format!("{ty} {name}"),
                None => format!("{ty} arg{i}"),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Normalized signature shown as proposal detail: `name(Type, Type)`.
pub fn display_signature(method: &MethodMetadata, rctx: &RenderContext<'_>) -> String {
    let params = method
        .parameters
        .iter()
        .map(|p| type_display_name(&p.ty, rctx))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({params})", method.name)
}

/// A full override-style method stub: annotation, printable modifiers,
/// type parameters with bounds, return type, parameters with names, and
/// a `throws` clause only when exceptions are declared.
pub fn method_stub(method: &MethodMetadata, rctx: &RenderContext<'_>) -> String {
    let mut out = String::from("@Override\n");
    let printable = method.modifiers & !(Modifiers::NATIVE | Modifiers::ABSTRACT);
    let mods = modifiers_text(printable);
    if !mods.is_empty() {
        out.push_str(&mods);
        out.push(' ');
    }
    if !method.type_parameters.is_empty() {
        out.push('<');
        for (i, tp) in method.type_parameters.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&tp.name);
            if let Some(bound) = &tp.bound {
                out.push_str(" extends ");
                out.push_str(&type_display_name(bound, rctx));
            }
        }
        out.push_str("> ");
    }
    out.push_str(&type_display_name(&method.return_type, rctx));
    out.push(' ');
    out.push_str(&method.name);
    out.push('(');
    out.push_str(&parameter_list(method, rctx));
    out.push(')');
    if !method.thrown.is_empty() {
        out.push_str(" throws ");
        let thrown = method
            .thrown
            .iter()
            .map(|t| type_display_name(t, rctx))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&thrown);
    }
    out
}

fn modifiers_text(modifiers: Modifiers) -> String {
    let mut words: Vec<&str> = Vec::new();
    for (flag, word) in [
        (Modifiers::PUBLIC, "public"),
        (Modifiers::PROTECTED, "protected"),
        (Modifiers::PRIVATE, "private"),
        (Modifiers::STATIC, "static"),
        (Modifiers::FINAL, "final"),
        (Modifiers::SYNCHRONIZED, "synchronized"),
        (Modifiers::DEFAULT, "default"),
        (Modifiers::STRICTFP, "strictfp"),
    ] {
        if modifiers.contains(flag) {
            words.push(word);
        }
    }
    words.join(" ")
}

/// Invocation completion text. The opening parenthesis is suppressed when
/// the cursor already sits before one.
pub fn invocation_text(method: &MethodMetadata, paren_after_cursor: bool) -> String {
    if paren_after_cursor {
        method.name.to_string()
    } else if method.parameters.is_empty() {
        format!("{}()", method.name)
    } else {
        format!("{}(", method.name)
    }
}

pub fn constructor_text(meta: &TypeMetadata, paren_after_cursor: bool) -> String {
    if paren_after_cursor {
        meta.name.to_string()
    } else {
        format!("{}(", meta.name)
    }
}

/// The required side-effect proposal importing a type.
pub fn type_import_proposal(qualified: &str) -> CompletionProposal {
    CompletionProposal::new(
        ProposalKind::TypeImport,
        simple_name_of(qualified),
        format!("import {qualified};\n"),
    )
    .with_type_name(qualified)
    .with_package_name(package_of(qualified).unwrap_or_default())
}

/// The required side-effect proposal statically importing one member.
pub fn static_import_proposal(declaring: &str, member: &str) -> CompletionProposal {
    CompletionProposal::new(
        ProposalKind::StaticImport,
        member,
        format!("import static {declaring}.{member};\n"),
    )
    .with_declaring_type(declaring)
}

/// How a static member reached from outside its declaring class gets
/// usable: a static import, or a class-name qualification prefix when the
/// user is already typing a qualified reference. Never both.
pub enum StaticAccessFix {
    StaticImport(CompletionProposal),
    QualifyWith(String),
}

pub fn static_access_fix(
    declaring: &str,
    member: &str,
    qualification_in_progress: bool,
    rctx: &RenderContext<'_>,
) -> StaticAccessFix {
    if qualification_in_progress {
        StaticAccessFix::QualifyWith(format!("{}.", type_display_name(declaring, rctx)))
    } else {
        StaticAccessFix::StaticImport(static_import_proposal(declaring, member))
    }
}
