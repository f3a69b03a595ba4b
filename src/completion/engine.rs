use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;
use tree_sitter::Node;

use super::context::{CompletionContext, LocalVar, TokenLocation};
use super::expected_types::{ExpectedMatch, ExpectedTypes};
use super::extends_filter::{ExtendsOrImplementsInfo, extends_or_implements_info};
use super::javadoc::{self, JavadocPosition};
use super::keywords;
use super::matching::match_name;
use super::members::{MemberContext, MemberPolicy, VisibilityMemo, process_members};
use super::proposal::{CompletionContextInfo, CompletionProposal, ProposalKind};
use super::relevance::{self, name_match_bonus, qualification_bonus};
use super::render::{self, RenderContext, StaticAccessFix};
use super::scope::{self, Binding, Bindings};
use super::thrown::find_thrown_exceptions;
use super::type_resolver::{ResolveScope, TypeResolver};
use super::{CancellationToken, CompletionError, CompletionOptions, CompletionRequestor};
use crate::index::{Modifiers, TypeIndex, TypeKind, TypeMetadata, is_primitive, simple_name_of};
use crate::syntax::{self, cursor_in_comment};

/// Normalized syntactic category of the completion point. Many node kinds
/// funnel into one category; the closed set keeps the dispatch exhaustive.
enum ContextCategory<'t> {
    /// `expr.prefix|`, including chained calls (`foo().|`) and qualified
    /// names whose qualifier parses as an expression.
    MemberAccess { receiver: Node<'t> },
    /// Cursor within the method-name span of an invocation.
    InvocationName { invocation: Node<'t> },
    /// Cursor inside an argument list, not on a specific argument token.
    ArgumentList { invocation: Node<'t> },
    /// Cursor exactly on a name being declared: not a completion point.
    DeclaredName,
    Import { static_import: bool },
    PackageDecl,
    ConstructorCall { creation: Node<'t> },
    /// `class X extends |` / `implements |`.
    ExtendsImplements,
    /// New-member position inside a type body.
    TypeBody { decl: Node<'t> },
    AnnotationName,
    AnnotationAttribute { annotation: Node<'t> },
    SwitchCaseLabel,
    ThrowsClause,
    CatchType,
    /// Type-declaration header after the name: `extends`/`implements`
    /// keyword position.
    TypeHeader { decl: Node<'t> },
    /// Method header before the name: modifier / return-type position.
    MethodHeader { decl: Node<'t> },
    /// Between parameter list and body: `throws` keyword position.
    AfterParameters { decl: Node<'t> },
    Bare,
}

pub struct CompletionEngine<'a, 't> {
    ctx: &'a CompletionContext<'t>,
    index: &'a TypeIndex,
    options: &'a CompletionOptions,
    requestor: &'a mut dyn CompletionRequestor,
    cancel: &'a CancellationToken,
    expected: ExpectedTypes,
    locals: Vec<LocalVar>,
    extends_info: Option<ExtendsOrImplementsInfo>,
    /// Qualified names already proposed as type references.
    seen_types: FxHashSet<Arc<str>>,
}

impl<'a, 't> CompletionEngine<'a, 't> {
    pub fn new(
        ctx: &'a CompletionContext<'t>,
        index: &'a TypeIndex,
        options: &'a CompletionOptions,
        requestor: &'a mut dyn CompletionRequestor,
        cancel: &'a CancellationToken,
    ) -> Self {
        let locals = scope::resolve_local_types(scope::collect_locals(ctx), ctx, index);
        let extends_info = extends_or_implements_info(ctx, index);
        Self {
            ctx,
            index,
            options,
            requestor,
            cancel,
            expected: ExpectedTypes::new(),
            locals,
            extends_info,
            seen_types: FxHashSet::default(),
        }
    }

    pub fn run(&mut self) -> Result<(), CompletionError> {
        let info = CompletionContextInfo {
            token: self.ctx.token.clone(),
            token_range: self.ctx.token_range(),
            in_javadoc: self.ctx.in_javadoc,
            expected_types: self.expected.get(self.ctx, self.index).types.clone(),
            location: self.ctx.location,
        };
        self.requestor.accept_context(&info);

        if self.ctx.token.is_none() {
            return Ok(());
        }
        if cursor_in_comment(self.ctx.source, self.ctx.offset) && !self.ctx.in_javadoc {
            return Ok(());
        }
        if self.in_literal() {
            return Ok(());
        }
        if self.ctx.in_javadoc {
            return self.complete_javadoc();
        }

        let category = self.categorize();
        let suggest_default = match category {
            ContextCategory::MemberAccess { receiver } => self.complete_member_access(receiver)?,
            ContextCategory::InvocationName { invocation } => {
                self.complete_invocation_name(invocation)?
            }
            ContextCategory::ArgumentList { invocation } => {
                self.complete_argument_list(invocation)?
            }
            ContextCategory::DeclaredName => false,
            ContextCategory::Import { static_import } => {
                self.complete_import(static_import)?;
                false
            }
            ContextCategory::PackageDecl => {
                self.complete_package_decl()?;
                false
            }
            ContextCategory::ConstructorCall { creation } => {
                self.complete_constructor_call(creation)?;
                false
            }
            ContextCategory::ExtendsImplements => {
                self.complete_extends_implements()?;
                false
            }
            ContextCategory::TypeBody { decl } => {
                self.complete_type_body(decl)?;
                false
            }
            ContextCategory::AnnotationName => {
                self.complete_annotation_name()?;
                false
            }
            ContextCategory::AnnotationAttribute { annotation } => {
                self.complete_annotation_attribute(annotation)?;
                false
            }
            ContextCategory::SwitchCaseLabel => {
                self.complete_switch_case()?;
                false
            }
            ContextCategory::ThrowsClause => {
                self.complete_throws_clause()?;
                false
            }
            ContextCategory::CatchType => {
                self.complete_catch_type()?;
                false
            }
            ContextCategory::TypeHeader { decl } => {
                self.complete_type_header(decl)?;
                false
            }
            ContextCategory::MethodHeader { decl } => {
                self.complete_method_header(decl)?;
                false
            }
            ContextCategory::AfterParameters { decl } => {
                self.complete_after_parameters(decl)?;
                false
            }
            ContextCategory::Bare => true,
        };

        if suggest_default {
            self.default_completions()?;
        }
        Ok(())
    }

    /// String/char/number literal interiors never complete.
    fn in_literal(&self) -> bool {
        let Some(node) = self.ctx.node else {
            return false;
        };
        for kind in ["string_literal", "character_literal"] {
            if let Some(lit) = syntax::ancestor_or_self(node, kind) {
                return self.ctx.parse_offset > lit.start_byte()
                    && self.ctx.parse_offset < lit.end_byte();
            }
        }
        matches!(
            node.kind(),
            "decimal_integer_literal"
                | "hex_integer_literal"
                | "octal_integer_literal"
                | "binary_integer_literal"
                | "decimal_floating_point_literal"
        )
    }

    fn categorize(&self) -> ContextCategory<'t> {
        let Some(node) = self.ctx.node else {
            return ContextCategory::Bare;
        };
        let mut child = node;
        let mut current = Some(node);
        while let Some(n) = current {
            match n.kind() {
                "import_declaration" => {
                    let static_import = self.ctx.tree.node_text(n).contains("static ");
                    return ContextCategory::Import { static_import };
                }
                "package_declaration" => return ContextCategory::PackageDecl,
                "field_access" => {
                    if let Some(object) = n.child_by_field_name("object")
                        && !covers(object, child)
                    {
                        return ContextCategory::MemberAccess { receiver: object };
                    }
                }
                "scoped_identifier" | "scoped_type_identifier" => {
                    // Qualified name: the scope part is the receiver unless
                    // the cursor is still inside it. Import and package
                    // paths are handled by their own ancestors.
                    if syntax::find_ancestor(n, "import_declaration").is_none()
                        && syntax::find_ancestor(n, "package_declaration").is_none()
                        && let Some(scope_part) = n.named_child(0)
                        && !covers(scope_part, child)
                        && self.ctx.parse_offset > scope_part.end_byte()
                    {
                        return ContextCategory::MemberAccess {
                            receiver: scope_part,
                        };
                    }
                }
                "method_invocation" => {
                    if let Some(name) = n.child_by_field_name("name")
                        && (name == child
                            || name.start_byte() <= self.ctx.parse_offset
                                && self.ctx.parse_offset <= name.end_byte())
                    {
                        if n.child_by_field_name("object").is_some() {
                            return ContextCategory::InvocationName { invocation: n };
                        }
                        return ContextCategory::Bare;
                    }
                }
                "method_reference" => {
                    // `Type::member` / `expr::member`: member completion on
                    // the qualifier.
                    if let Some(receiver) = n.named_child(0)
                        && !covers(receiver, child)
                    {
                        return ContextCategory::MemberAccess { receiver };
                    }
                }
                "argument_list" => {
                    let on_argument = child != n && child.is_named();
                    if !on_argument
                        && let Some(call) = n.parent()
                        && call.kind() == "method_invocation"
                    {
                        return ContextCategory::ArgumentList { invocation: call };
                    }
                }
                "variable_declarator" => {
                    if let Some(name) = n.child_by_field_name("name")
                        && name == child
                        && !self.ctx.tree.has_sentinel()
                    {
                        return ContextCategory::DeclaredName;
                    }
                }
                "object_creation_expression" => {
                    if let Some(ty) = n.child_by_field_name("type")
                        && (ty == child || covers(ty, child))
                    {
                        return ContextCategory::ConstructorCall { creation: n };
                    }
                }
                "superclass" | "super_interfaces" | "extends_interfaces" => {
                    return ContextCategory::ExtendsImplements;
                }
                "marker_annotation" | "annotation" => {
                    if let Some(name) = n.child_by_field_name("name")
                        && (name == child || covers(name, child))
                    {
                        return ContextCategory::AnnotationName;
                    }
                    if n.kind() == "annotation" {
                        return ContextCategory::AnnotationAttribute { annotation: n };
                    }
                }
                "annotation_argument_list" => {
                    if let Some(annotation) = n.parent() {
                        return ContextCategory::AnnotationAttribute { annotation };
                    }
                }
                "switch_label" => return ContextCategory::SwitchCaseLabel,
                "throws" => return ContextCategory::ThrowsClause,
                // The catch body breaks at its block first; anything else
                // inside the clause is the exception-type position.
                "catch_type" | "catch_formal_parameter" | "catch_clause" => {
                    return ContextCategory::CatchType;
                }
                "method_declaration" => {
                    if let Some(name) = n.child_by_field_name("name")
                        && self.ctx.parse_offset <= name.start_byte()
                    {
                        return ContextCategory::MethodHeader { decl: n };
                    }
                    if let Some(params) = n.child_by_field_name("parameters")
                        && self.ctx.parse_offset > params.end_byte()
                        && n.child_by_field_name("body")
                            .is_none_or(|b| self.ctx.parse_offset <= b.start_byte())
                    {
                        return ContextCategory::AfterParameters { decl: n };
                    }
                }
                "class_body" | "interface_body" | "enum_body" => {
                    if child.kind() == "identifier"
                        || child.kind() == "type_identifier"
                        || child == n
                        || child.is_error()
                    {
                        if let Some(decl) = n.parent() {
                            return ContextCategory::TypeBody { decl };
                        }
                    }
                }
                "block" | "constructor_body" | "program" => break,
                kind if syntax::is_type_declaration_kind(kind) => {
                    if let Some(name) = n.child_by_field_name("name")
                        && self.ctx.parse_offset > name.end_byte()
                        && n.child_by_field_name("body")
                            .is_none_or(|b| self.ctx.parse_offset <= b.start_byte())
                    {
                        return ContextCategory::TypeHeader { decl: n };
                    }
                }
                _ => {}
            }
            child = n;
            current = n.parent();
        }
        ContextCategory::Bare
    }

    // ---- branch implementations -------------------------------------

    /// Member completion on a receiver expression. Returns whether the
    /// generic fallback should still run.
    fn complete_member_access(&mut self, receiver: Node<'t>) -> Result<bool, CompletionError> {
        let resolver = TypeResolver::new(self.index);
        let resolve_scope = self.resolve_scope();
        let receiver_text = self.ctx.tree.clean_node_text(receiver);
        debug!(receiver = %receiver_text, token = %self.ctx.token_str(), "member access");

        // `this.` / `super.` member completion keeps private members.
        let receiver_type = resolver.resolve_expr(receiver, &resolve_scope, self.ctx.tree);

        if let Some(ty) = receiver_type {
            if is_primitive(&ty) {
                return Ok(false);
            }
            let statics_only = self.receiver_is_type_reference(receiver, &receiver_text);
            let policy = if statics_only {
                MemberPolicy::static_access()
            } else {
                MemberPolicy::instance_access()
            };
            self.propose_members(&ty, &policy, !statics_only)?;
            // `Type.|` also reaches `this`, `super`, `.class` where legal,
            // and the type's nested types double as constructor targets.
            if statics_only {
                self.propose_type_literal_keywords(&ty);
            }
            return Ok(false);
        }

        // Unresolvable receiver that is not a call: maybe a package or
        // type prefix.
        if receiver.kind() != "method_invocation" {
            let normalized = receiver_text.trim();
            if self.index.has_package(normalized) {
                self.complete_in_package(normalized)?;
                return Ok(false);
            }
            // A not-yet-imported type's simple name: resolve through the
            // search oracle.
            self.cancel.check()?;
            let matches = self.index.by_simple_name(normalized);
            if let [only] = matches.as_slice() {
                let qualified = Arc::clone(&only.qualified);
                self.propose_members(&qualified, &MemberPolicy::static_access(), false)?;
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Whether `Type.member` qualification is by type name rather than by
    /// an instance expression.
    fn receiver_is_type_reference(&self, receiver: Node<'_>, text: &str) -> bool {
        if !matches!(
            receiver.kind(),
            "identifier" | "type_identifier" | "scoped_identifier" | "scoped_type_identifier"
        ) {
            return false;
        }
        let name = text.trim();
        if self.locals.iter().any(|lv| lv.name.as_ref() == name) {
            return false;
        }
        let resolver = TypeResolver::new(self.index);
        if let Some(enclosing) = self.ctx.enclosing_type.as_deref()
            && resolver.field_type(enclosing, name).is_some()
        {
            return false;
        }
        self.index.get(name).is_some()
            || resolver
                .resolve_simple_type(simple_name_of(name), &self.resolve_scope())
                .is_some()
    }

    fn propose_members(
        &mut self,
        receiver_type: &str,
        policy: &MemberPolicy,
        instance_access: bool,
    ) -> Result<(), CompletionError> {
        let receiver_type = super::type_resolver::strip_generics(receiver_type);
        let member_ctx = MemberContext {
            completing_type: self.ctx.enclosing_type.as_deref(),
            completing_package: self.ctx.package.as_deref(),
            in_static_method: self.ctx.in_static_context,
        };
        let mut memo = VisibilityMemo::new();
        let mut bindings = Bindings::new(self.index);
        process_members(
            self.index,
            receiver_type,
            &member_ctx,
            policy,
            &mut memo,
            &mut bindings,
        );
        let token = self.ctx.token_str().to_string();
        for binding in bindings.iter() {
            let Some(quality) = match_name(&token, binding.name(), &self.options.matching) else {
                continue;
            };
            let mut rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + qualification_bonus(true, true)
                + self.expected_bonus(binding.value_type().as_deref());
            if let Binding::Method { declaring, .. } | Binding::Field { declaring, .. } = binding
                && declaring.as_ref() == receiver_type
            {
                rel += relevance::R_EXACT_DECLARING_TYPE;
            }
            if instance_access
                && !self.ctx.in_static_context
                && !binding_modifiers(binding).contains(Modifiers::STATIC)
            {
                rel += relevance::R_NON_STATIC_ACCESS;
            }
            let proposal = self.binding_proposal(binding, rel);
            self.emit(proposal);
        }
        Ok(())
    }

    fn propose_type_literal_keywords(&mut self, receiver_type: &str) {
        let token = self.ctx.token_str().to_string();
        let in_own_hierarchy = self
            .ctx
            .enclosing_type
            .as_deref()
            .is_some_and(|t| self.index.is_subtype_of(t, receiver_type));
        let mut names: Vec<&str> = vec!["class"];
        if in_own_hierarchy {
            names.push("this");
            names.push("super");
        }
        for kw in names {
            if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                let p = CompletionProposal::new(ProposalKind::Keyword, kw, kw).with_relevance(rel);
                self.emit(p);
            }
        }
    }

    fn complete_invocation_name(&mut self, invocation: Node<'t>) -> Result<bool, CompletionError> {
        let resolver = TypeResolver::new(self.index);
        let resolve_scope = self.resolve_scope();
        let Some(object) = invocation.child_by_field_name("object") else {
            return Ok(true);
        };
        let Some(ty) = resolver.resolve_expr(object, &resolve_scope, self.ctx.tree) else {
            return Ok(false);
        };
        let statics_only =
            self.receiver_is_type_reference(object, &self.ctx.tree.clean_node_text(object));
        let policy = MemberPolicy {
            statics_only,
            ..MemberPolicy::invocation_name()
        };
        self.propose_members(&ty, &policy, !statics_only)?;
        Ok(false)
    }

    /// Inside `f(|)`: lambda stubs for functional-interface parameters
    /// plus a placeholder for the call as written. Unresolvable calls get
    /// nothing at all.
    fn complete_argument_list(&mut self, invocation: Node<'t>) -> Result<bool, CompletionError> {
        let resolver = TypeResolver::new(self.index);
        let resolve_scope = self.resolve_scope();
        let name = invocation
            .child_by_field_name("name")
            .map(|n| self.ctx.tree.clean_node_text(n))
            .unwrap_or_default();
        let receiver = match invocation.child_by_field_name("object") {
            Some(obj) => resolver.resolve_expr(obj, &resolve_scope, self.ctx.tree),
            None => self.ctx.enclosing_type.clone(),
        };
        let resolved = receiver
            .as_deref()
            .and_then(|r| resolver.resolve_method(r, &name, -1, &[]));
        let Some(_method) = resolved else {
            return Ok(false);
        };

        let expectation = self.expected.get(self.ctx, self.index).clone();
        for ty in &expectation.types {
            let Some(meta) = self.index.get(super::type_resolver::strip_generics(ty)) else {
                continue;
            };
            if let Some(stub) = lambda_stub(meta) {
                let rel = relevance::baseline_resolved() + relevance::R_EXACT_EXPECTED_TYPE;
                let p = CompletionProposal::new(ProposalKind::LambdaExpression, meta.name.clone(), stub)
                    .with_type_name(Arc::clone(ty))
                    .with_relevance(rel);
                self.emit(p);
            }
        }
        // The call as written, so the list is never silently empty.
        let placeholder = CompletionProposal::new(ProposalKind::MethodRef, name.as_str(), "")
            .with_ranges(self.ctx.offset..self.ctx.offset, self.ctx.offset..self.ctx.offset)
            .with_relevance(relevance::baseline_resolved());
        self.emit(placeholder);
        Ok(true)
    }

    fn complete_import(&mut self, static_import: bool) -> Result<(), CompletionError> {
        self.cancel.check()?;
        // Reconstruct the dotted prefix before the cursor.
        let text_before = &self.ctx.source[..self.ctx.offset];
        let stmt_start = text_before.rfind("import").map(|p| p + "import".len()).unwrap_or(0);
        let raw = text_before[stmt_start..]
            .trim_start()
            .trim_start_matches("static")
            .trim_start();
        let (package_prefix, member) = match raw.rsplit_once('.') {
            Some((head, tail)) => (head.to_string(), tail.to_string()),
            None => (String::new(), raw.to_string()),
        };
        debug!(prefix = %raw, "import completion");

        if static_import && self.index.get(&package_prefix).is_some() {
            // `import static p.Type.|`: static members of the type.
            let ty = package_prefix.clone();
            self.propose_members(&ty, &MemberPolicy::static_access(), false)?;
            return Ok(());
        }

        // Module imports are a preview surface.
        if self.options.module_imports_enabled() && !static_import {
            if raw.is_empty() {
                let p = CompletionProposal::new(ProposalKind::Keyword, "module", "module ")
                    .with_relevance(relevance::baseline_unresolved());
                self.emit(p);
            }
            if let Some(module_prefix) = raw.strip_prefix("module") {
                let module_prefix = module_prefix.trim_start().to_string();
                for name in self
                    .index
                    .modules_with_prefix(&module_prefix)
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                {
                    let p = CompletionProposal::new(
                        ProposalKind::ModuleRef,
                        name.as_str(),
                        name.as_str(),
                    )
                    .with_relevance(relevance::baseline_resolved());
                    self.emit(p);
                }
                return Ok(());
            }
        }

        let prefix_query: &str = if package_prefix.is_empty() {
            ""
        } else {
            package_prefix.as_str()
        };
        for pkg in self
            .index
            .packages_with_prefix(prefix_query)
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
        {
            // Only the next segment under the typed prefix.
            let rest = if package_prefix.is_empty() {
                pkg.as_str()
            } else if let Some(r) = pkg.strip_prefix(&package_prefix) {
                r.trim_start_matches('.')
            } else {
                continue;
            };
            let segment = rest.split('.').next().unwrap_or(rest);
            if segment.is_empty() || !segment.starts_with(&member) {
                continue;
            }
            let full = if package_prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{package_prefix}.{segment}")
            };
            let p = CompletionProposal::new(ProposalKind::PackageRef, full.as_str(), full.as_str())
                .with_package_name(full.as_str())
                .with_relevance(relevance::baseline_unresolved() + relevance::R_QUALIFIED);
            self.emit(p);
        }

        if !package_prefix.is_empty() {
            for meta in self
                .index
                .types_in_package(&package_prefix)
                .map(Arc::clone)
                .collect::<Vec<_>>()
            {
                if let Some(quality) = match_name(&member, &meta.name, &self.options.matching) {
                    let rel = relevance::baseline_resolved()
                        + name_match_bonus(quality)
                        + qualification_bonus(true, true);
                    let p = self.type_proposal(&meta, meta.qualified.to_string(), rel, false);
                    self.emit(p);
                }
            }
        }
        Ok(())
    }

    fn complete_package_decl(&mut self) -> Result<(), CompletionError> {
        self.cancel.check()?;
        let token = self.ctx.token_str().to_string();
        for pkg in self
            .index
            .packages_with_prefix("")
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
        {
            let last = pkg.rsplit('.').next().unwrap_or(&pkg);
            if last.starts_with(&token) {
                let p = CompletionProposal::new(ProposalKind::PackageRef, pkg.as_str(), pkg.as_str())
                    .with_package_name(pkg.as_str())
                    .with_relevance(relevance::baseline_unresolved());
                self.emit(p);
            }
        }
        Ok(())
    }

    /// `new Foo(|` / `new F|`: constructors of the expected type and its
    /// subtypes, the enclosing class (kept for compatibility), or a
    /// name-based search when nothing is expected.
    fn complete_constructor_call(&mut self, creation: Node<'t>) -> Result<(), CompletionError> {
        let _ = creation;
        self.cancel.check()?;
        let token = self.ctx.token_str().to_string();
        let expectation = self.expected.get(self.ctx, self.index).clone();

        let mut targets: Vec<Arc<TypeMetadata>> = Vec::new();
        for expected in &expectation.types {
            let base = super::type_resolver::strip_generics(expected);
            if is_primitive(base) {
                continue;
            }
            if let Some(meta) = self.index.get(base) {
                targets.push(Arc::clone(meta));
                targets.extend(self.index.subtypes_of(base));
            }
        }
        // The enclosing class is always offered as a candidate, even when
        // it is not a legitimate match for the expected type.
        if let Some(enclosing) = self.ctx.enclosing_type.as_deref()
            && let Some(meta) = self.index.get(enclosing)
            && !targets.iter().any(|t| t.qualified == meta.qualified)
        {
            targets.push(Arc::clone(meta));
        }

        if targets.is_empty() {
            // No expectation: search the project by prefix.
            let matching = self.options.matching;
            let found: Vec<Arc<TypeMetadata>> = self
                .index
                .search_types(move |name| match_name(&token, name, &matching).is_some())
                .map(Arc::clone)
                .collect();
            targets.extend(found);
        }

        let token = self.ctx.token_str().to_string();
        for meta in targets {
            if meta.kind == TypeKind::Annotation {
                continue;
            }
            let Some(quality) = match_name(&token, &meta.name, &self.options.matching) else {
                continue;
            };
            let base_rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + relevance::R_CONSTRUCTOR
                + self.expected_bonus(Some(&meta.qualified));
            // Abstract targets instantiate as anonymous subclasses.
            if meta.kind == TypeKind::Interface || meta.modifiers.contains(Modifiers::ABSTRACT) {
                let completion = format!("{}() {{\n}}", meta.name);
                let p = CompletionProposal::new(
                    ProposalKind::AnonymousClassConstructorInvocation,
                    Arc::clone(&meta.name),
                    completion,
                )
                .with_type_name(Arc::clone(&meta.qualified))
                .constructor()
                .with_relevance(base_rel);
                self.emit(p);
                continue;
            }
            let ctors: Vec<_> = meta.constructors().map(Arc::clone).collect();
            if ctors.is_empty() {
                let mut p = self
                    .type_proposal(&meta, render::constructor_text(&meta, self.ctx.has_paren_after_cursor()), base_rel, true)
                    .constructor();
                p.kind = ProposalKind::ConstructorInvocation;
                self.emit(p);
            } else {
                for ctor in ctors {
                    let rctx = self.render_ctx();
                    let signature = render::display_signature(&ctor, &rctx);
                    let mut p = self
                        .type_proposal(&meta, render::constructor_text(&meta, self.ctx.has_paren_after_cursor()), base_rel, true)
                        .constructor()
                        .with_signature(signature);
                    p.kind = ProposalKind::ConstructorInvocation;
                    self.emit(p);
                }
            }
        }
        Ok(())
    }

    fn complete_extends_implements(&mut self) -> Result<(), CompletionError> {
        self.cancel.check()?;
        let Some(info) = self.extends_info.take() else {
            return Ok(());
        };
        let token = self.ctx.token_str().to_string();
        let matching = self.options.matching;
        let candidates: Vec<Arc<TypeMetadata>> = self
            .index
            .search_types(move |name| match_name(&token, name, &matching).is_some())
            .map(Arc::clone)
            .collect();
        let token = self.ctx.token_str().to_string();
        for meta in candidates {
            if !info.allows(&meta, self.index) {
                continue;
            }
            if !self.type_visible(&meta) {
                continue;
            }
            let quality = match_name(&token, &meta.name, &self.options.matching)
                .expect("search candidates matched already");
            let rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + relevance::R_TARGET_KIND
                + self.library_bonus(&meta.qualified);
            let p = self.type_proposal(&meta, meta.name.to_string(), rel, true);
            self.emit(p);
        }
        self.extends_info = Some(info);
        Ok(())
    }

    /// New-member position: overridable method stubs, member keywords, a
    /// synthetic method-declaration proposal, and type references.
    fn complete_type_body(&mut self, decl: Node<'t>) -> Result<(), CompletionError> {
        let token = self.ctx.token_str().to_string();
        let preceded_by_modifier = self.preceding_word_is_modifier();

        // Overridable methods from every supertype.
        if let Some(enclosing) = self.ctx.enclosing_type.clone() {
            let member_ctx = MemberContext {
                completing_type: Some(&enclosing),
                completing_package: self.ctx.package.as_deref(),
                in_static_method: false,
            };
            let mut memo = VisibilityMemo::new();
            let mut bindings = Bindings::new(self.index);
            let chain = self.index.supertype_chain(&enclosing);
            for meta in chain.iter().skip(1) {
                process_members(
                    self.index,
                    &meta.qualified,
                    &member_ctx,
                    &MemberPolicy::overridable(),
                    &mut memo,
                    &mut bindings,
                );
            }
            let rctx = self.render_ctx();
            let mut stubs: Vec<CompletionProposal> = Vec::new();
            for binding in bindings.iter() {
                let Binding::Method { declaring, method } = binding else {
                    continue;
                };
                if method.modifiers.intersects(
                    Modifiers::STATIC | Modifiers::FINAL | Modifiers::PRIVATE,
                ) {
                    continue;
                }
                let Some(quality) = match_name(&token, &method.name, &self.options.matching)
                else {
                    continue;
                };
                let rel = relevance::baseline_resolved()
                    + name_match_bonus(quality)
                    + relevance::R_EXACT_DECLARING_TYPE;
                let stub = render::method_stub(method, &rctx);
                let p = CompletionProposal::new(
                    ProposalKind::MethodDeclaration,
                    Arc::clone(&method.name),
                    stub,
                )
                .with_signature(method.signature())
                .with_declaring_type(Arc::clone(declaring))
                .with_type_name(Arc::clone(&method.return_type))
                .with_modifiers(method.modifiers)
                .with_relevance(rel);
                stubs.push(p);
            }
            for p in stubs {
                self.emit(p);
            }
        }

        // Member keywords not already written on this declaration.
        let written = self.preceding_modifiers_text(decl);
        let in_interface = decl.kind() == "interface_declaration";
        for kw in keywords::member_keywords(in_interface) {
            if written.contains(kw) {
                continue;
            }
            if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                self.emit(CompletionProposal::new(ProposalKind::Keyword, kw, kw).with_relevance(rel));
            }
        }
        for kw in keywords::PRIMITIVE_TYPES.iter().chain(std::iter::once(&"void")) {
            if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                self.emit(CompletionProposal::new(ProposalKind::Keyword, *kw, *kw).with_relevance(rel));
            }
        }

        // The synthetic "declare a method named <token> here" proposal,
        // pointless right after a modifier keyword.
        if !token.is_empty() && !preceded_by_modifier {
            let p = CompletionProposal::new(
                ProposalKind::PotentialMethodDeclaration,
                token.as_str(),
                format!("void {token}()"),
            )
            .with_relevance(relevance::baseline_unresolved());
            self.emit(p);
        }

        self.cancel.check()?;
        self.propose_searched_types()?;
        Ok(())
    }

    fn complete_annotation_name(&mut self) -> Result<(), CompletionError> {
        self.cancel.check()?;
        let token = self.ctx.token_str().to_string();
        let matching = self.options.matching;
        let candidates: Vec<Arc<TypeMetadata>> = self
            .index
            .search_types(move |name| match_name(&token, name, &matching).is_some())
            .filter(|m| m.kind == TypeKind::Annotation)
            .map(Arc::clone)
            .collect();
        let token = self.ctx.token_str().to_string();
        for meta in candidates {
            if !self.type_visible(&meta) {
                continue;
            }
            let quality = match_name(&token, &meta.name, &self.options.matching)
                .expect("search candidates matched already");
            let mut rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + self.library_bonus(&meta.qualified);
            if self.annotation_usable_here(&meta) {
                rel += relevance::R_ANNOTATION_TARGET;
            }
            let p = self.type_proposal(&meta, meta.name.to_string(), rel, true);
            self.emit(p);
        }
        Ok(())
    }

    /// An annotation with no `@Target` is usable anywhere.
    fn annotation_usable_here(&self, meta: &TypeMetadata) -> bool {
        let Some(targets) = &meta.annotation_targets else {
            return true;
        };
        use crate::index::AnnotationTarget as T;
        let node = self.ctx.node;
        let on_member = node
            .and_then(|n| {
                syntax::find_ancestor(n, "method_declaration")
                    .or_else(|| syntax::find_ancestor(n, "field_declaration"))
            })
            .is_some();
        match self.ctx.location {
            TokenLocation::StartOfMember => targets
                .iter()
                .any(|t| matches!(t, T::Method | T::Field | T::Type | T::Constructor)),
            TokenLocation::StartOfStatement => targets
                .iter()
                .any(|t| matches!(t, T::LocalVariable | T::TypeUse)),
            _ if on_member => targets
                .iter()
                .any(|t| matches!(t, T::Method | T::Field | T::Parameter | T::TypeUse)),
            _ => true,
        }
    }

    /// Attribute-name position inside `@Anno(|)`: the annotation type's
    /// declared attributes not yet supplied, rendered with `= `.
    fn complete_annotation_attribute(
        &mut self,
        annotation: Node<'t>,
    ) -> Result<(), CompletionError> {
        let resolver = TypeResolver::new(self.index);
        let resolve_scope = self.resolve_scope();
        let Some(name_node) = annotation.child_by_field_name("name") else {
            return Ok(());
        };
        let Some(qualified) = resolver.resolve_type_text(
            &self.ctx.tree.clean_node_text(name_node),
            &resolve_scope,
        ) else {
            return Ok(());
        };
        let Some(meta) = self.index.get(&qualified).map(Arc::clone) else {
            return Ok(());
        };

        let mut supplied: Vec<String> = Vec::new();
        if let Some(args) = annotation.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for pair in args.named_children(&mut cursor) {
                if pair.kind() == "element_value_pair"
                    && let Some(key) = pair.child_by_field_name("key")
                {
                    supplied.push(self.ctx.tree.clean_node_text(key));
                }
            }
        }

        let token = self.ctx.token_str().to_string();
        for attr in meta.methods.iter().filter(|m| !m.is_constructor) {
            if supplied.iter().any(|s| s == attr.name.as_ref()) {
                continue;
            }
            let Some(quality) = match_name(&token, &attr.name, &self.options.matching) else {
                continue;
            };
            let rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + qualification_bonus(false, false);
            let p = CompletionProposal::new(
                ProposalKind::MethodRef,
                Arc::clone(&attr.name),
                format!("{} = ", attr.name),
            )
            .with_declaring_type(Arc::clone(&meta.qualified))
            .with_type_name(Arc::clone(&attr.return_type))
            .with_relevance(rel);
            self.emit(p);
        }
        Ok(())
    }

    /// `case |`: enum constants of the governing type, else final
    /// constants of a matching type from the scope, boosted.
    fn complete_switch_case(&mut self) -> Result<(), CompletionError> {
        let expectation = self.expected.get(self.ctx, self.index).clone();
        let token = self.ctx.token_str().to_string();
        let mut proposed_any = false;
        for expected in &expectation.types {
            let Some(meta) = self.index.get(super::type_resolver::strip_generics(expected)) else {
                continue;
            };
            if meta.kind != TypeKind::Enum {
                continue;
            }
            for field in meta.fields.iter().filter(|f| f.is_enum_constant) {
                let Some(quality) = match_name(&token, &field.name, &self.options.matching)
                else {
                    continue;
                };
                let rel = relevance::baseline_resolved()
                    + name_match_bonus(quality)
                    + relevance::R_ENUM_CONSTANT
                    + relevance::R_EXACT_EXPECTED_TYPE
                    + qualification_bonus(false, false);
                let p = CompletionProposal::new(
                    ProposalKind::FieldRef,
                    Arc::clone(&field.name),
                    field.name.to_string(),
                )
                .with_declaring_type(Arc::clone(&meta.qualified))
                .with_type_name(Arc::clone(&field.ty))
                .with_modifiers(field.modifiers)
                .with_relevance(rel);
                self.emit(p);
                proposed_any = true;
            }
        }
        if proposed_any {
            return Ok(());
        }
        // No enum constants: fall back to final constants of a matching
        // type, with the documented extra boost.
        let bindings = scope::scrape_accessible_bindings(self.ctx, self.index);
        for binding in bindings.iter() {
            let Binding::Field { field, .. } = binding else {
                continue;
            };
            if !field.has_constant_value || !field.modifiers.contains(Modifiers::FINAL) {
                continue;
            }
            if self
                .expected
                .get(self.ctx, self.index)
                .match_for(&field.ty, self.index)
                == ExpectedMatch::None
            {
                continue;
            }
            let Some(quality) = match_name(&token, &field.name, &self.options.matching) else {
                continue;
            };
            let rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + relevance::R_FINAL
                + self.expected_bonus(Some(&field.ty));
            let p = self.binding_proposal(binding, rel);
            self.emit(p);
        }
        Ok(())
    }

    fn complete_throws_clause(&mut self) -> Result<(), CompletionError> {
        self.cancel.check()?;
        let token = self.ctx.token_str().to_string();
        let matching = self.options.matching;
        let candidates: Vec<Arc<TypeMetadata>> = self
            .index
            .search_types(move |name| match_name(&token, name, &matching).is_some())
            .filter(|m| m.kind == TypeKind::Class)
            .map(Arc::clone)
            .collect();
        let token = self.ctx.token_str().to_string();
        for meta in candidates {
            if !self.type_visible(&meta) {
                continue;
            }
            let quality = match_name(&token, &meta.name, &self.options.matching)
                .expect("search candidates matched already");
            let rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + self.library_bonus(&meta.qualified);
            let p = self.type_proposal(&meta, meta.name.to_string(), rel, true);
            self.emit(p);
        }
        Ok(())
    }

    /// `catch (|`: the still-uncaught exception types of the try body,
    /// the discouraged tier ranked lower but present.
    fn complete_catch_type(&mut self) -> Result<(), CompletionError> {
        let expectation = self.expected.get(self.ctx, self.index).clone();
        let token = self.ctx.token_str().to_string();
        for (tier, types) in [
            (relevance::R_EXACT_EXPECTED_TYPE, &expectation.types),
            (relevance::R_DISCOURAGED_EXPECTED_TYPE, &expectation.discouraged),
        ] {
            for ty in types {
                let Some(meta) = self.index.get(ty.as_ref()).map(Arc::clone) else {
                    continue;
                };
                let Some(quality) = match_name(&token, &meta.name, &self.options.matching)
                else {
                    continue;
                };
                let rel = relevance::baseline_resolved() + name_match_bonus(quality) + tier;
                let p = self.type_proposal(&meta, meta.name.to_string(), rel, true);
                self.emit(p);
            }
        }
        Ok(())
    }

    /// After the declared name, before the body: `extends`/`implements`
    /// keywords legal for this declaration kind and not already written.
    fn complete_type_header(&mut self, decl: Node<'t>) -> Result<(), CompletionError> {
        let has_extends = {
            let mut cursor = decl.walk();
            decl.children(&mut cursor)
                .any(|c| matches!(c.kind(), "superclass" | "extends_interfaces"))
        };
        let has_implements = {
            let mut cursor = decl.walk();
            decl.children(&mut cursor)
                .any(|c| c.kind() == "super_interfaces")
        };
        let (extends_ok, implements_ok) = match decl.kind() {
            "class_declaration" => (!has_extends, !has_implements),
            "interface_declaration" => (!has_extends, false),
            "enum_declaration" | "record_declaration" => (false, !has_implements),
            _ => (false, false),
        };
        let token = self.ctx.token_str().to_string();
        for (ok, kw) in [(extends_ok, "extends"), (implements_ok, "implements")] {
            if !ok {
                continue;
            }
            if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                self.emit(
                    CompletionProposal::new(ProposalKind::Keyword, kw, format!("{kw} "))
                        .with_relevance(rel),
                );
            }
        }
        Ok(())
    }

    /// Method header before the name: missing modifier keywords, plus
    /// type references when no return type is written yet.
    fn complete_method_header(&mut self, decl: Node<'t>) -> Result<(), CompletionError> {
        let token = self.ctx.token_str().to_string();
        let written = self.preceding_modifiers_text(decl);
        for kw in keywords::MEMBER_MODIFIERS {
            if written.contains(kw) {
                continue;
            }
            if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                self.emit(CompletionProposal::new(ProposalKind::Keyword, *kw, *kw).with_relevance(rel));
            }
        }
        let has_type = decl.child_by_field_name("type").is_some_and(|t| {
            t.end_byte() < self.ctx.to_parse_offset_of_token_start()
        });
        if !has_type {
            for kw in keywords::PRIMITIVE_TYPES.iter().chain(std::iter::once(&"void")) {
                if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                    let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                    self.emit(
                        CompletionProposal::new(ProposalKind::Keyword, *kw, *kw).with_relevance(rel),
                    );
                }
            }
            self.cancel.check()?;
            self.propose_searched_types()?;
        }
        Ok(())
    }

    /// Between `)` and the body: `throws`, unless the span already holds
    /// a `throw` prefix (almost always a typo for `throws`).
    fn complete_after_parameters(&mut self, decl: Node<'t>) -> Result<(), CompletionError> {
        let Some(params) = decl.child_by_field_name("parameters") else {
            return Ok(());
        };
        // The unconsumed span between `)` and the token being typed; a
        // `throw` already sitting there is almost always the typo this
        // keyword would fix, so re-suggesting is noise.
        let span_start = self.ctx.tree.to_original_offset(params.end_byte());
        let span_end = self.ctx.token_start.max(span_start).min(self.ctx.source.len());
        if self.ctx.source[span_start..span_end].contains("throw") {
            return Ok(());
        }
        if let Some(quality) = match_name(self.ctx.token_str(), "throws", &self.options.matching) {
            let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
            self.emit(
                CompletionProposal::new(ProposalKind::Keyword, "throws", "throws ")
                    .with_relevance(rel),
            );
        }
        Ok(())
    }

    // ---- javadoc ----------------------------------------------------

    fn complete_javadoc(&mut self) -> Result<(), CompletionError> {
        match javadoc::classify_javadoc(self.ctx.source, self.ctx.offset) {
            JavadocPosition::TagName { prefix, inline } => {
                let tags: &[&str] = if inline {
                    javadoc::INLINE_TAGS
                } else {
                    javadoc::BLOCK_TAGS
                };
                let kind = if inline {
                    ProposalKind::JavadocInlineTag
                } else {
                    ProposalKind::JavadocBlockTag
                };
                for tag in tags {
                    if tag.starts_with(&prefix) {
                        let rel = relevance::baseline_unresolved()
                            + if *tag == prefix {
                                relevance::R_EXACT_CASE
                            } else {
                                relevance::R_CASE_PREFIX
                            };
                        let replace_start = self.ctx.offset - prefix.len();
                        let p = CompletionProposal::new(kind, *tag, *tag)
                            .with_ranges(replace_start..self.ctx.offset, replace_start..self.ctx.offset)
                            .with_relevance(rel);
                        self.requestor.accept(p);
                    }
                }
            }
            JavadocPosition::ParamName { prefix } => {
                let Some(method) = self.ctx.enclosing_method_or_following() else {
                    return Ok(());
                };
                let comment =
                    javadoc::enclosing_comment_text(self.ctx.source, self.ctx.offset)
                        .unwrap_or_default();
                for name in javadoc::undocumented_params(self.ctx.tree, method, comment) {
                    if name.starts_with(&prefix) || prefix.is_empty() {
                        let replace_start = self.ctx.offset - prefix.len();
                        let p = CompletionProposal::new(
                            ProposalKind::JavadocParamRef,
                            Arc::clone(&name),
                            name.to_string(),
                        )
                        .with_ranges(replace_start..self.ctx.offset, replace_start..self.ctx.offset)
                        .with_relevance(relevance::baseline_resolved());
                        self.requestor.accept(p);
                    }
                }
            }
            JavadocPosition::ThrowsType { prefix } => {
                // Reuses the declared and inferred thrown exceptions of
                // the enclosing method.
                let Some(method) = self.ctx.enclosing_method_or_following() else {
                    return Ok(());
                };
                let mut types: Vec<Arc<str>> = Vec::new();
                let resolver = TypeResolver::new(self.index);
                let resolve_scope = self.resolve_scope();
                let mut tc = method.walk();
                for child in method.children(&mut tc) {
                    if child.kind() == "throws" {
                        let mut cc = child.walk();
                        for ty in child.named_children(&mut cc) {
                            if let Some(resolved) = resolver.resolve_type_text(
                                &self.ctx.tree.clean_node_text(ty),
                                &resolve_scope,
                            ) {
                                types.push(resolved);
                            }
                        }
                    }
                }
                if let Some(body) = method.child_by_field_name("body") {
                    let found = find_thrown_exceptions(body, self.ctx.tree, self.index, &resolve_scope);
                    for t in found.thrown {
                        if !types.iter().any(|x| x.as_ref() == t.as_ref()) {
                            types.push(t);
                        }
                    }
                }
                for ty in types {
                    let simple = simple_name_of(&ty).to_string();
                    if simple.starts_with(&prefix) || prefix.is_empty() {
                        let replace_start = self.ctx.offset - prefix.len();
                        let p = CompletionProposal::new(
                            ProposalKind::JavadocTypeRef,
                            simple.as_str(),
                            simple.as_str(),
                        )
                        .with_type_name(Arc::clone(&ty))
                        .with_ranges(replace_start..self.ctx.offset, replace_start..self.ctx.offset)
                        .with_relevance(relevance::baseline_resolved());
                        self.requestor.accept(p);
                    }
                }
            }
            JavadocPosition::Reference {
                type_part,
                member_prefix,
            } => {
                self.complete_javadoc_reference(type_part, member_prefix)?;
            }
            JavadocPosition::Other => {}
        }
        Ok(())
    }

    /// `@see Type#member` completion: resolve the class part, then offer
    /// its members (arity-filtered when an argument list is underway) and
    /// constructors; a bare prefix offers types with unit-local ones first.
    fn complete_javadoc_reference(
        &mut self,
        type_part: Option<String>,
        member_prefix: Option<String>,
    ) -> Result<(), CompletionError> {
        let resolver = TypeResolver::new(self.index);
        let resolve_scope = self.resolve_scope();
        match (type_part, member_prefix) {
            (ty, Some(member)) => {
                let qualified = match ty {
                    Some(t) => resolver.resolve_type_text(&t, &resolve_scope),
                    None => self.ctx.enclosing_type.clone(),
                };
                let Some(qualified) = qualified else {
                    return Ok(());
                };
                // An argument list already underway after the member name
                // constrains the arity of matching methods.
                let before = &self.ctx.source[..self.ctx.offset];
                let (replace_start, replace_end, min_arity) = match before.rfind('#') {
                    Some(hash) => {
                        let after = &before[hash + 1..];
                        let arity = after
                            .find('(')
                            .map(|p| javadoc::method_ref_min_arity(&after[p..]))
                            .unwrap_or(0);
                        (hash + 1, hash + 1 + member.len(), arity)
                    }
                    None => (
                        self.ctx.offset - member.len(),
                        self.ctx.offset,
                        0,
                    ),
                };
                let Some(meta) = self.index.get(&qualified).map(Arc::clone) else {
                    return Ok(());
                };
                for method in &meta.methods {
                    if method.parameters.len() < min_arity {
                        continue;
                    }
                    let shown: Arc<str> = if method.is_constructor {
                        Arc::clone(&meta.name)
                    } else {
                        Arc::clone(&method.name)
                    };
                    if !member.is_empty() && !shown.starts_with(member.as_str()) {
                        continue;
                    }
                    let rctx = self.render_ctx();
                    let p = CompletionProposal::new(
                        ProposalKind::JavadocMethodRef,
                        Arc::clone(&shown),
                        shown.to_string(),
                    )
                        .with_signature(render::display_signature(method, &rctx))
                        .with_declaring_type(Arc::clone(&meta.qualified))
                        .with_ranges(replace_start..replace_end, replace_start..replace_end)
                        .with_relevance(relevance::baseline_resolved());
                    self.requestor.accept(p);
                }
                for field in &meta.fields {
                    if !member.is_empty() && !field.name.starts_with(member.as_str()) {
                        continue;
                    }
                    let p = CompletionProposal::new(
                        ProposalKind::JavadocFieldRef,
                        Arc::clone(&field.name),
                        field.name.to_string(),
                    )
                    .with_declaring_type(Arc::clone(&meta.qualified))
                    .with_ranges(replace_start..replace_end, replace_start..replace_end)
                    .with_relevance(relevance::baseline_resolved());
                    self.requestor.accept(p);
                }
            }
            (Some(prefix), None) => {
                self.cancel.check()?;
                let unit_package = self.ctx.package.clone();
                let matching = self.options.matching;
                let prefix_owned = prefix.clone();
                let candidates: Vec<Arc<TypeMetadata>> = self
                    .index
                    .search_types(move |name| {
                        match_name(&prefix_owned, name, &matching).is_some()
                    })
                    .map(Arc::clone)
                    .collect();
                let replace_start = self.ctx.offset - prefix.len();
                for meta in candidates {
                    // Types of this compilation unit's package rank first.
                    let local = meta.package.as_deref() == unit_package.as_deref();
                    let rel = relevance::baseline_resolved()
                        + if local { relevance::R_UNQUALIFIED } else { 0 }
                        + self.library_bonus(&meta.qualified);
                    let p = CompletionProposal::new(
                        ProposalKind::JavadocTypeRef,
                        Arc::clone(&meta.name),
                        meta.name.to_string(),
                    )
                    .with_type_name(Arc::clone(&meta.qualified))
                    .with_ranges(replace_start..self.ctx.offset, replace_start..self.ctx.offset)
                    .with_relevance(rel);
                    self.requestor.accept(p);
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    // ---- generic fallback -------------------------------------------

    /// The always-on pass: scope bindings, position keywords, unimported
    /// types from the search oracle, inherited `super` constructors.
    fn default_completions(&mut self) -> Result<(), CompletionError> {
        let bindings = scope::scrape_accessible_bindings(self.ctx, self.index);
        let token = self.ctx.token_str().to_string();

        if self.ctx.location == TokenLocation::StartOfStatement {
            let in_loop = self.ctx.node.is_some_and(keywords::inside_loop);
            let after_if = self
                .ctx
                .node
                .is_some_and(|n| keywords::follows_unclosed_if(n, self.ctx.parse_offset));
            for kw in keywords::statement_keywords(in_loop, after_if) {
                if let Some(quality) = match_name(&token, kw, &self.options.matching) {
                    let rel = relevance::baseline_unresolved() + name_match_bonus(quality);
                    self.emit(
                        CompletionProposal::new(ProposalKind::Keyword, kw, kw).with_relevance(rel),
                    );
                }
            }
        }

        for binding in bindings.iter() {
            let Some(quality) = match_name(&token, binding.name(), &self.options.matching) else {
                continue;
            };
            let mut rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + qualification_bonus(false, false)
                + self.expected_bonus(binding.value_type().as_deref());
            if let Binding::Field { field, .. } = binding
                && field.is_enum_constant
            {
                rel += relevance::R_ENUM_CONSTANT;
            }
            rel += match binding {
                Binding::Field { field, .. } => relevance::deprecation_penalty(field.deprecated),
                Binding::Method { method, .. } => {
                    relevance::deprecation_penalty(method.deprecated)
                }
                Binding::Type(meta) => relevance::deprecation_penalty(meta.deprecated),
                _ => 0,
            };
            let proposal = self.binding_proposal(binding, rel);
            self.emit(proposal);
        }

        // Inherited no-argument superclass constructor, when `super` is
        // being typed inside a constructor.
        if "super".starts_with(&token)
            && !token.is_empty()
            && self
                .ctx
                .enclosing_method
                .is_some_and(|m| m.kind() == "constructor_declaration")
            && let Some(enclosing) = self.ctx.enclosing_type.as_deref()
            && let Some(meta) = self.index.get(enclosing)
            && let Some(superclass) = meta.superclass.clone()
            && let Some(super_meta) = self.index.get(&superclass).map(Arc::clone)
            && super_meta.constructors().any(|c| c.parameters.is_empty())
        {
            let p = CompletionProposal::new(ProposalKind::MethodRef, "super", "super()")
                .with_declaring_type(superclass)
                .constructor()
                .with_relevance(relevance::baseline_resolved() + relevance::R_CONSTRUCTOR);
            self.emit(p);
        }

        self.cancel.check()?;
        if !token.is_empty() {
            self.propose_searched_types_excluding(&bindings)?;
        }
        self.cancel.check()?;
        Ok(())
    }

    fn propose_searched_types(&mut self) -> Result<(), CompletionError> {
        let empty = Bindings::new(self.index);
        self.propose_searched_types_excluding(&empty)
    }

    /// Unimported types from the search oracle: visibility-filtered, not
    /// shadowed by a scope binding, legal under an active
    /// extends/implements filter, deduplicated by qualified name.
    fn propose_searched_types_excluding(
        &mut self,
        bindings: &Bindings<'_>,
    ) -> Result<(), CompletionError> {
        let token = self.ctx.token_str().to_string();
        if token.is_empty() {
            return Ok(());
        }
        let matching = self.options.matching;
        let token_for_search = token.clone();
        let candidates: Vec<Arc<TypeMetadata>> = self
            .index
            .search_types(move |name| match_name(&token_for_search, name, &matching).is_some())
            .map(Arc::clone)
            .collect();
        for meta in candidates {
            if self.seen_types.contains(&meta.qualified) {
                continue;
            }
            if bindings.contains_type(&meta.qualified) || bindings.contains_name(&meta.name) {
                continue;
            }
            if !self.type_visible(&meta) {
                continue;
            }
            if let Some(info) = &self.extends_info
                && !info.allows(&meta, self.index)
            {
                continue;
            }
            let quality = match_name(&token, &meta.name, &self.options.matching)
                .expect("search candidates matched already");
            let rel = relevance::baseline_resolved()
                + name_match_bonus(quality)
                + qualification_bonus(false, false)
                + self.expected_bonus(Some(&meta.qualified))
                + self.library_bonus(&meta.qualified)
                + relevance::deprecation_penalty(meta.deprecated);
            let p = self.type_proposal(&meta, meta.name.to_string(), rel, true);
            self.emit(p);
        }
        Ok(())
    }

    // ---- shared helpers ---------------------------------------------

    fn resolve_scope(&self) -> ResolveScope<'_> {
        ResolveScope {
            locals: &self.locals,
            enclosing_type: self.ctx.enclosing_type.as_deref(),
            package: self.ctx.package.as_deref(),
            imports: &self.ctx.imports,
        }
    }

    fn render_ctx(&self) -> RenderContext<'_> {
        RenderContext {
            index: self.index,
            package: self.ctx.package.as_deref(),
            imports: &self.ctx.imports,
            generating_type: self.ctx.enclosing_type.as_deref(),
        }
    }

    fn expected_bonus(&mut self, ty: Option<&str>) -> i32 {
        let expectation = self.expected.get(self.ctx, self.index);
        let Some(ty) = ty else {
            return 0;
        };
        if ty == "void" && !expectation.is_empty() {
            return relevance::R_VOID;
        }
        match expectation.match_for(ty, self.index) {
            ExpectedMatch::Exact => relevance::R_EXACT_EXPECTED_TYPE,
            ExpectedMatch::Compatible => {
                if !ty.contains('.') && !is_primitive(ty) {
                    relevance::R_UNNAMED_PACKAGE_EXPECTED_TYPE
                } else {
                    relevance::R_EXPECTED_TYPE
                }
            }
            ExpectedMatch::Discouraged => relevance::R_DISCOURAGED_EXPECTED_TYPE,
            ExpectedMatch::None => 0,
        }
    }

    fn library_bonus(&self, qualified: &str) -> i32 {
        if qualified.starts_with("java.") {
            relevance::R_JAVA_LIBRARY
        } else {
            0
        }
    }

    /// Public types, or package-private ones from the same package.
    fn type_visible(&self, meta: &TypeMetadata) -> bool {
        if meta.modifiers.contains(Modifiers::PUBLIC) {
            return true;
        }
        if meta.modifiers.contains(Modifiers::PRIVATE) {
            return self
                .ctx
                .enclosing_type
                .as_deref()
                .zip(meta.enclosing.as_deref())
                .is_some_and(|(ct, encl)| ct == encl || ct.starts_with(encl));
        }
        meta.package.as_deref() == self.ctx.package.as_deref()
    }

    fn binding_proposal(&mut self, binding: &Binding, relevance_score: i32) -> CompletionProposal {
        match binding {
            Binding::Local(lv) => CompletionProposal::new(
                ProposalKind::LocalVariableRef,
                Arc::clone(&lv.name),
                lv.name.to_string(),
            )
            .with_type_name(Arc::clone(&lv.ty))
            .with_relevance(relevance_score),
            Binding::Field { declaring, field } => {
                let mut p = CompletionProposal::new(
                    ProposalKind::FieldRef,
                    Arc::clone(&field.name),
                    field.name.to_string(),
                )
                .with_declaring_type(Arc::clone(declaring))
                .with_type_name(Arc::clone(&field.ty))
                .with_modifiers(field.modifiers)
                .with_relevance(relevance_score);
                p = self.attach_static_fix(p, declaring, &field.name, field.modifiers);
                p
            }
            Binding::Method { declaring, method } => {
                let rctx = self.render_ctx();
                let completion =
                    render::invocation_text(method, self.ctx.has_paren_after_cursor());
                let signature = render::display_signature(method, &rctx);
                let mut p = CompletionProposal::new(
                    ProposalKind::MethodRef,
                    Arc::clone(&method.name),
                    completion,
                )
                .with_declaring_type(Arc::clone(declaring))
                .with_type_name(Arc::clone(&method.return_type))
                .with_signature(signature)
                .with_modifiers(method.modifiers)
                .with_relevance(relevance_score);
                p = self.attach_static_fix(p, declaring, &method.name, method.modifiers);
                p
            }
            Binding::Type(meta) => self.type_proposal(meta, meta.name.to_string(), relevance_score, true),
            Binding::TypeParameter { name, bound } => {
                let mut p = CompletionProposal::new(
                    ProposalKind::TypeRef,
                    Arc::clone(name),
                    name.to_string(),
                )
                .with_relevance(relevance_score);
                if let Some(bound) = bound {
                    p = p.with_type_name(Arc::clone(bound));
                }
                p
            }
            Binding::Package(name) => CompletionProposal::new(
                ProposalKind::PackageRef,
                Arc::clone(name),
                name.to_string(),
            )
            .with_relevance(relevance_score),
        }
    }

    /// A static member reached from outside its declaring top-level class
    /// needs a static import, or a qualification prefix when the user is
    /// already qualifying. Never both.
    fn attach_static_fix(
        &self,
        mut proposal: CompletionProposal,
        declaring: &Arc<str>,
        member: &Arc<str>,
        modifiers: Modifiers,
    ) -> CompletionProposal {
        if !modifiers.contains(Modifiers::STATIC) {
            return proposal;
        }
        let inside = self.ctx.enclosing_type.as_deref().is_some_and(|ct| {
            top_level_of(ct) == top_level_of(declaring)
        });
        if inside {
            return proposal;
        }
        let static_import = format!("{declaring}.{member}");
        if self
            .ctx
            .static_imports
            .iter()
            .any(|s| s.as_ref() == static_import || s.as_ref() == format!("{declaring}.*"))
        {
            return proposal;
        }
        let qualification_in_progress = self
            .ctx
            .source[..self.ctx.token_start]
            .ends_with('.');
        match render::static_access_fix(
            declaring,
            member,
            qualification_in_progress,
            &self.render_ctx(),
        ) {
            StaticAccessFix::StaticImport(import) => proposal.with_required(import),
            StaticAccessFix::QualifyWith(prefix) => {
                proposal.completion = format!("{prefix}{}", proposal.completion);
                proposal
            }
        }
    }

    fn type_proposal(
        &mut self,
        meta: &TypeMetadata,
        completion: String,
        relevance_score: i32,
        import_if_needed: bool,
    ) -> CompletionProposal {
        self.seen_types.insert(Arc::clone(&meta.qualified));
        let mut p = CompletionProposal::new(ProposalKind::TypeRef, Arc::clone(&meta.name), completion)
            .with_type_name(Arc::clone(&meta.qualified))
            .with_modifiers(meta.modifiers)
            .with_relevance(relevance_score);
        if let Some(pkg) = &meta.package {
            p = p.with_package_name(Arc::clone(pkg));
        }
        let needs_import = import_if_needed
            && meta.package.as_deref() != self.ctx.package.as_deref()
            && meta.package.as_deref() != Some("java.lang")
            && meta.package.is_some()
            && !self.ctx.is_imported(&meta.qualified);
        if needs_import {
            p = p.with_required(render::type_import_proposal(&meta.qualified));
        }
        p
    }

    /// Packages and types under a known package prefix.
    fn complete_in_package(&mut self, package: &str) -> Result<(), CompletionError> {
        self.cancel.check()?;
        let token = self.ctx.token_str().to_string();
        for meta in self
            .index
            .types_in_package(package)
            .map(Arc::clone)
            .collect::<Vec<_>>()
        {
            if let Some(quality) = match_name(&token, &meta.name, &self.options.matching) {
                let rel = relevance::baseline_resolved()
                    + name_match_bonus(quality)
                    + qualification_bonus(true, true)
                    + self.library_bonus(&meta.qualified);
                // Fully qualified already; no import needed.
                let p = self.type_proposal(&meta, meta.name.to_string(), rel, false);
                self.emit(p);
            }
        }
        let deeper = format!("{package}.");
        for pkg in self
            .index
            .packages_with_prefix(&deeper)
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
        {
            let segment = pkg[deeper.len()..].split('.').next().unwrap_or("");
            if !segment.is_empty() && segment.starts_with(&token) {
                let full = format!("{package}.{segment}");
                let p = CompletionProposal::new(ProposalKind::PackageRef, full.as_str(), segment)
                    .with_package_name(full.as_str())
                    .with_relevance(relevance::baseline_unresolved() + relevance::R_QUALIFIED);
                self.emit(p);
            }
        }
        Ok(())
    }

    fn preceding_word_is_modifier(&self) -> bool {
        let before = self.ctx.source[..self.ctx.token_start].trim_end();
        let word_start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map(|(i, _)| i)
            .unwrap_or(before.len());
        keywords::is_modifier_keyword(&before[word_start..])
    }

    fn preceding_modifiers_text(&self, decl: Node<'_>) -> String {
        let start = self.ctx.tree.to_original_offset(decl.start_byte());
        let end = self.ctx.token_start.max(start).min(self.ctx.source.len());
        self.ctx.source[start..end].to_string()
    }

    fn emit(&mut self, mut proposal: CompletionProposal) {
        if self.requestor.is_ignored(proposal.kind) {
            return;
        }
        if proposal.replace_range == (0..0) {
            proposal.replace_range = self.ctx.replace_range();
        }
        if proposal.token_range == (0..0) {
            proposal.token_range = self.ctx.token_range();
        }
        let parent_relevance = proposal.relevance;
        for required in &mut proposal.required {
            required.relevance = parent_relevance;
        }
        self.requestor.accept(proposal);
    }
}

impl<'t> CompletionContext<'t> {
    /// The method a javadoc comment documents: the enclosing method, or
    /// the first method declaration after the comment.
    fn enclosing_method_or_following(&self) -> Option<Node<'t>> {
        if let Some(m) = self.enclosing_method {
            return Some(m);
        }
        let comment_end = self.source[self.offset..]
            .find("*/")
            .map(|p| self.offset + p + 2)?;
        let parse_pos = self.tree.to_parse_offset(comment_end);
        let mut node = self
            .tree
            .root()
            .descendant_for_byte_range(parse_pos, parse_pos)?;
        loop {
            if node.kind() == "method_declaration" {
                return Some(node);
            }
            match node.next_sibling() {
                Some(next) => node = next,
                None => node = node.parent()?,
            }
            if node.start_byte() > parse_pos + 200 {
                return None;
            }
        }
    }

    fn to_parse_offset_of_token_start(&self) -> usize {
        self.tree.to_parse_offset(self.token_start)
    }
}

fn covers(outer: Node, inner: Node) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

fn binding_modifiers(binding: &Binding) -> Modifiers {
    match binding {
        Binding::Field { field, .. } => field.modifiers,
        Binding::Method { method, .. } => method.modifiers,
        Binding::Type(meta) => meta.modifiers,
        _ => Modifiers::empty(),
    }
}

fn top_level_of(qualified: &str) -> &str {
    // The first segment starting with an uppercase letter ends the
    // package part; everything after the next dot is nested.
    let mut depth = 0;
    for (i, segment) in qualified.split('.').enumerate() {
        if segment.chars().next().is_some_and(|c| c.is_uppercase()) {
            depth = i;
            break;
        }
        depth = i;
    }
    let mut end = 0;
    for (i, segment) in qualified.split('.').enumerate() {
        if i > 0 {
            end += 1;
        }
        end += segment.len();
        if i == depth {
            break;
        }
    }
    &qualified[..end]
}

/// `(a, b) -> ` stub for a functional interface.
fn lambda_stub(meta: &TypeMetadata) -> Option<String> {
    if meta.kind != TypeKind::Interface {
        return None;
    }
    let mut abstracts = meta
        .methods
        .iter()
        .filter(|m| m.modifiers.contains(Modifiers::ABSTRACT) && !m.is_constructor);
    let sam = abstracts.next()?;
    if abstracts.next().is_some() {
        return None;
    }
    let params: Vec<String> = sam
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.name
                .as_deref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("arg{i}"))
        })
        .collect();
    Some(match params.len() {
        0 => "() -> ".to_string(),
        1 => format!("{} -> ", params[0]),
        _ => format!("({}) -> ", params.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_of() {
        assert_eq!(top_level_of("java.util.Map.Entry"), "java.util.Map");
        assert_eq!(top_level_of("java.util.Map"), "java.util.Map");
        assert_eq!(top_level_of("Foo.Bar"), "Foo");
        assert_eq!(top_level_of("Foo"), "Foo");
    }

    #[test]
    fn test_lambda_stub_shapes() {
        use crate::index::{MethodMetadata, Parameter};
        let mut meta = TypeMetadata::new("java.util.function.BiFunction", TypeKind::Interface);
        meta.methods = vec![Arc::new(MethodMetadata {
            name: Arc::from("apply"),
            modifiers: Modifiers::PUBLIC | Modifiers::ABSTRACT,
            type_parameters: vec![],
            parameters: vec![
                Parameter {
                    name: Some(Arc::from("t")),
                    ty: Arc::from("java.lang.Object"),
                },
                Parameter {
                    name: Some(Arc::from("u")),
                    ty: Arc::from("java.lang.Object"),
                },
            ],
            return_type: Arc::from("java.lang.Object"),
            thrown: vec![],
            is_constructor: false,
            is_varargs: false,
            deprecated: false,
        })];
        assert_eq!(lambda_stub(&meta).as_deref(), Some("(t, u) -> "));
        // Two abstract methods: not functional.
        let second = Arc::clone(&meta.methods[0]);
        let mut renamed = (*second).clone();
        renamed.name = Arc::from("other");
        meta.methods.push(Arc::new(renamed));
        assert_eq!(lambda_stub(&meta), None);
    }
}
