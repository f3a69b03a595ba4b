use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::index::Modifiers;

/// What kind of completion a proposal stands for. One closed set; the
/// requestor can filter whole kinds it does not care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProposalKind {
    TypeRef,
    MethodRef,
    FieldRef,
    LocalVariableRef,
    Keyword,
    ConstructorInvocation,
    AnonymousClassConstructorInvocation,
    PackageRef,
    ModuleRef,
    TypeImport,
    StaticImport,
    MethodDeclaration,
    PotentialMethodDeclaration,
    LambdaExpression,
    JavadocBlockTag,
    JavadocInlineTag,
    JavadocParamRef,
    JavadocMethodRef,
    JavadocFieldRef,
    JavadocTypeRef,
}

/// One completion candidate as delivered to the requestor: the text to
/// splice, the exact byte ranges it replaces, and a relevance score for
/// ranking. `required` carries side-effect proposals (an import to add, a
/// qualification to apply) that must be applied together with this one.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionProposal {
    pub kind: ProposalKind,
    /// Text to insert over `replace_range`.
    pub completion: String,
    /// Bare name of the proposed element (no signature decoration).
    pub name: Arc<str>,
    /// Normalized signature for methods/constructors, e.g. `of(int,int)`.
    pub signature: Option<String>,
    pub declaring_type: Option<Arc<str>>,
    /// Qualified type of the proposal's value: field/local type, method
    /// return type, or the type itself for type references.
    pub type_name: Option<Arc<str>>,
    pub package_name: Option<Arc<str>>,
    /// `[start, end)` byte range in the original buffer the completion
    /// replaces.
    #[serde(skip)]
    pub replace_range: Range<usize>,
    /// `[start, end)` byte range of the token that triggered completion.
    #[serde(skip)]
    pub token_range: Range<usize>,
    pub relevance: i32,
    pub modifiers: Modifiers,
    pub is_constructor: bool,
    /// Extra proposals that must be applied alongside this one. They carry
    /// this proposal's relevance so consumers keep the group adjacent.
    pub required: Vec<CompletionProposal>,
}

impl CompletionProposal {
    pub fn new(kind: ProposalKind, name: impl Into<Arc<str>>, completion: impl Into<String>) -> Self {
        Self {
            kind,
            completion: completion.into(),
            name: name.into(),
            signature: None,
            declaring_type: None,
            type_name: None,
            package_name: None,
            replace_range: 0..0,
            token_range: 0..0,
            relevance: 0,
            modifiers: Modifiers::empty(),
            is_constructor: false,
            required: Vec::new(),
        }
    }

    pub fn with_ranges(mut self, replace: Range<usize>, token: Range<usize>) -> Self {
        self.replace_range = replace;
        self.token_range = token;
        self
    }

    pub fn with_relevance(mut self, relevance: i32) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_declaring_type(mut self, declaring: impl Into<Arc<str>>) -> Self {
        self.declaring_type = Some(declaring.into());
        self
    }

    pub fn with_type_name(mut self, ty: impl Into<Arc<str>>) -> Self {
        self.type_name = Some(ty.into());
        self
    }

    pub fn with_package_name(mut self, pkg: impl Into<Arc<str>>) -> Self {
        self.package_name = Some(pkg.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    /// Attach a required side-effect proposal. The child inherits this
    /// proposal's relevance at attach time.
    pub fn with_required(mut self, mut required: CompletionProposal) -> Self {
        required.relevance = self.relevance;
        self.required.push(required);
        self
    }
}

/// The once-per-request context record delivered before any proposal.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionContextInfo {
    pub token: Option<String>,
    #[serde(skip)]
    pub token_range: Range<usize>,
    pub in_javadoc: bool,
    /// Qualified names of the expected types at the cursor, if any.
    pub expected_types: Vec<Arc<str>>,
    pub location: crate::completion::context::TokenLocation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_proposal_inherits_relevance() {
        let import = CompletionProposal::new(ProposalKind::TypeImport, "List", "import java.util.List;\n");
        let main = CompletionProposal::new(ProposalKind::TypeRef, "List", "List")
            .with_relevance(42)
            .with_required(import);
        assert_eq!(main.required.len(), 1);
        assert_eq!(main.required[0].relevance, 42);
    }

    #[test]
    fn test_builder_round_trip() {
        let p = CompletionProposal::new(ProposalKind::MethodRef, "size", "size()")
            .with_ranges(10..14, 10..14)
            .with_signature("size()")
            .with_declaring_type("java.util.List")
            .with_type_name("int")
            .with_relevance(7);
        assert_eq!(p.replace_range, 10..14);
        assert_eq!(p.signature.as_deref(), Some("size()"));
        assert_eq!(p.declaring_type.as_deref(), Some("java.util.List"));
        assert_eq!(p.relevance, 7);
    }
}
