use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

pub const JAVA_LANG_OBJECT: &str = "java.lang.Object";
pub const JAVA_LANG_STRING: &str = "java.lang.String";
pub const JAVA_LANG_RUNTIME_EXCEPTION: &str = "java.lang.RuntimeException";
pub const JAVA_LANG_ERROR: &str = "java.lang.Error";

bitflags! {
    /// Source-level modifier set for types and members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Modifiers: u32 {
        const PUBLIC    = 1 << 0;
        const PRIVATE   = 1 << 1;
        const PROTECTED = 1 << 2;
        const STATIC    = 1 << 3;
        const FINAL     = 1 << 4;
        const ABSTRACT  = 1 << 5;
        const NATIVE    = 1 << 6;
        const SEALED    = 1 << 7;
        const DEFAULT   = 1 << 8;
        const SYNCHRONIZED = 1 << 9;
        const TRANSIENT = 1 << 10;
        const VOLATILE  = 1 << 11;
        const STRICTFP  = 1 << 12;
    }
}

impl Modifiers {
    /// No explicit access modifier means package-private.
    pub fn is_package_private(self) -> bool {
        !self.intersects(Self::PUBLIC | Self::PRIVATE | Self::PROTECTED)
    }

    pub fn parse(text: &str) -> Self {
        let mut flags = Self::empty();
        for word in text.split_whitespace() {
            flags |= match word {
                "public" => Self::PUBLIC,
                "private" => Self::PRIVATE,
                "protected" => Self::PROTECTED,
                "static" => Self::STATIC,
                "final" => Self::FINAL,
                "abstract" => Self::ABSTRACT,
                "native" => Self::NATIVE,
                "sealed" => Self::SEALED,
                "default" => Self::DEFAULT,
                "synchronized" => Self::SYNCHRONIZED,
                "transient" => Self::TRANSIENT,
                "volatile" => Self::VOLATILE,
                "strictfp" => Self::STRICTFP,
                _ => Self::empty(),
            };
        }
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

/// Syntactic positions an annotation type may target, mirroring
/// `java.lang.annotation.ElementType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationTarget {
    Type,
    Field,
    Method,
    Parameter,
    Constructor,
    LocalVariable,
    Module,
    Package,
    TypeParameter,
    TypeUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: Arc<str>,
    /// Declared upper bound; `None` means `java.lang.Object`.
    pub bound: Option<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// `None` when the declaration carries no usable name (binary-only
    /// metadata without debug info, or a recovered declaration).
    pub name: Option<Arc<str>>,
    /// Qualified type name, `int`, or an array form like `java.lang.String[]`.
    pub ty: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMetadata {
    pub name: Arc<str>,
    pub modifiers: Modifiers,
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<Parameter>,
    /// `void` for void methods; constructors carry the declaring type here.
    pub return_type: Arc<str>,
    pub thrown: Vec<Arc<str>>,
    pub is_constructor: bool,
    pub is_varargs: bool,
    pub deprecated: bool,
}

impl MethodMetadata {
    /// Normalized `name(paramTy,paramTy)` form. Override equality and the
    /// deterministic member sort both key on this.
    pub fn signature(&self) -> String {
        let mut sig = String::with_capacity(self.name.len() + 2 + 16 * self.parameters.len());
        sig.push_str(&self.name);
        sig.push('(');
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                sig.push(',');
            }
            sig.push_str(&p.ty);
        }
        sig.push(')');
        sig
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: Arc<str>,
    pub modifiers: Modifiers,
    pub ty: Arc<str>,
    pub is_enum_constant: bool,
    /// `static final` with a compile-time constant initializer. Case-label
    /// completion boosts these.
    pub has_constant_value: bool,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub package: Option<Arc<str>>,
    /// Simple name; nested types use their own simple name.
    pub name: Arc<str>,
    /// Dot-qualified name, e.g. `java.util.Map.Entry`.
    pub qualified: Arc<str>,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub superclass: Option<Arc<str>>,
    pub interfaces: Vec<Arc<str>>,
    /// `permits` clause of a sealed type; empty when not sealed.
    pub permitted: Vec<Arc<str>>,
    pub type_parameters: Vec<TypeParameter>,
    pub methods: Vec<Arc<MethodMetadata>>,
    pub fields: Vec<Arc<FieldMetadata>>,
    /// Qualified names of member types.
    pub nested_types: Vec<Arc<str>>,
    pub enclosing: Option<Arc<str>>,
    /// `None` means no `@Target` meta-annotation: usable anywhere.
    pub annotation_targets: Option<Vec<AnnotationTarget>>,
    pub deprecated: bool,
}

impl TypeMetadata {
    pub fn new(qualified: &str, kind: TypeKind) -> Self {
        let (package, name) = split_qualified(qualified);
        Self {
            package: package.map(Arc::from),
            name: Arc::from(name),
            qualified: Arc::from(qualified),
            kind,
            modifiers: Modifiers::PUBLIC,
            superclass: None,
            interfaces: Vec::new(),
            permitted: Vec::new(),
            type_parameters: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            nested_types: Vec::new(),
            enclosing: None,
            annotation_targets: None,
            deprecated: false,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_sealed(&self) -> bool {
        self.modifiers.contains(Modifiers::SEALED) || !self.permitted.is_empty()
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Arc<MethodMetadata>> {
        self.methods.iter().filter(|m| m.is_constructor)
    }
}

/// Splits off the last dotted segment: `java.util.List` -> (`Some("java.util")`, `List`).
fn split_qualified(qualified: &str) -> (Option<&str>, &str) {
    match qualified.rsplit_once('.') {
        Some((head, tail)) => (Some(head), tail),
        None => (None, qualified),
    }
}

pub fn simple_name_of(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

pub fn package_of(qualified: &str) -> Option<&str> {
    qualified.rsplit_once('.').map(|(head, _)| head)
}

pub fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "boolean" | "byte" | "short" | "int" | "long" | "char" | "float" | "double" | "void"
    )
}

/// The project-wide type universe the engine completes against.
///
/// Populated by the embedder (source indexer, jar scanner, test fixture);
/// the engine only reads it. Lookups are by dot-qualified name.
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: FxHashMap<Arc<str>, Arc<TypeMetadata>>,
    by_simple: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    packages: FxHashSet<Arc<str>>,
    /// Named modules on the module path, e.g. `java.base`.
    modules: Vec<Arc<str>>,
    /// Insertion order, for deterministic search output.
    order: Vec<Arc<str>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, meta: TypeMetadata) {
        self.add_types(std::iter::once(meta));
    }

    pub fn add_types(&mut self, metas: impl IntoIterator<Item = TypeMetadata>) {
        for meta in metas {
            let meta = Arc::new(meta);
            if let Some(pkg) = &meta.package {
                // Register the package and every ancestor package.
                let mut p = pkg.as_ref();
                loop {
                    self.packages.insert(Arc::from(p));
                    match p.rsplit_once('.') {
                        Some((head, _)) => p = head,
                        None => break,
                    }
                }
            }
            self.by_simple
                .entry(Arc::clone(&meta.name))
                .or_default()
                .push(Arc::clone(&meta.qualified));
            if !self.types.contains_key(&meta.qualified) {
                self.order.push(Arc::clone(&meta.qualified));
            }
            self.types.insert(Arc::clone(&meta.qualified), meta);
        }
    }

    pub fn get(&self, qualified: &str) -> Option<&Arc<TypeMetadata>> {
        self.types.get(qualified)
    }

    pub fn by_simple_name(&self, simple: &str) -> Vec<&Arc<TypeMetadata>> {
        self.by_simple
            .get(simple)
            .map(|names| names.iter().filter_map(|q| self.types.get(q)).collect())
            .unwrap_or_default()
    }

    pub fn add_module(&mut self, name: &str) {
        if !self.modules.iter().any(|m| m.as_ref() == name) {
            self.modules.push(Arc::from(name));
        }
    }

    pub fn modules_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.modules
            .iter()
            .map(|m| m.as_ref())
            .filter(move |m| m.starts_with(prefix))
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    pub fn packages_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.packages
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| p.starts_with(prefix))
    }

    /// Linearized supertype walk: the type itself, then superclasses and
    /// interfaces, deduplicated. Missing links are skipped, never an
    /// error, since the index may be partial.
    pub fn supertype_chain(&self, qualified: &str) -> Vec<Arc<TypeMetadata>> {
        let mut out: Vec<Arc<TypeMetadata>> = Vec::new();
        let mut seen: FxHashSet<Arc<str>> = FxHashSet::default();
        let mut queue: std::collections::VecDeque<Arc<str>> =
            std::collections::VecDeque::from([Arc::from(qualified)]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(Arc::clone(&name)) {
                continue;
            }
            let Some(meta) = self.types.get(name.as_ref()) else {
                continue;
            };
            out.push(Arc::clone(meta));
            if let Some(sup) = &meta.superclass {
                queue.push_back(Arc::clone(sup));
            }
            for itf in &meta.interfaces {
                queue.push_back(Arc::clone(itf));
            }
        }
        // Reach Object's members even when no declaration names it.
        if !seen.contains(JAVA_LANG_OBJECT)
            && !out.is_empty()
            && let Some(obj) = self.types.get(JAVA_LANG_OBJECT)
        {
            out.push(Arc::clone(obj));
        }
        out
    }

    /// `true` when `sub` is `sup` or reaches it through its supertype chain.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.supertype_chain(sub)
            .iter()
            .any(|m| m.qualified.as_ref() == sup)
    }

    /// Type-hierarchy query: every indexed type reaching `qualified`
    /// through its supertype chain, excluding the type itself.
    pub fn subtypes_of(&self, qualified: &str) -> Vec<Arc<TypeMetadata>> {
        self.order
            .iter()
            .filter(|q| q.as_ref() != qualified)
            .filter_map(|q| self.types.get(q.as_ref()))
            .filter(|m| self.is_subtype_of(&m.qualified, qualified))
            .map(Arc::clone)
            .collect()
    }

    /// The search oracle: every type whose simple name satisfies the
    /// caller's match predicate, in deterministic insertion order.
    pub fn search_types<'a>(
        &'a self,
        mut pred: impl FnMut(&str) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Arc<TypeMetadata>> + 'a {
        self.order
            .iter()
            .filter_map(|q| self.types.get(q.as_ref()))
            .filter(move |m| pred(&m.name))
    }

    pub fn types_in_package<'a>(
        &'a self,
        package: &'a str,
    ) -> impl Iterator<Item = &'a Arc<TypeMetadata>> + 'a {
        self.order
            .iter()
            .filter_map(|q| self.types.get(q.as_ref()))
            .filter(move |m| m.package.as_deref() == Some(package))
    }

    /// An exception type is unchecked when it descends from
    /// `RuntimeException` or `Error`; those are never discouraged.
    pub fn is_unchecked_exception(&self, qualified: &str) -> bool {
        self.is_subtype_of(qualified, JAVA_LANG_RUNTIME_EXCEPTION)
            || self.is_subtype_of(qualified, JAVA_LANG_ERROR)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
