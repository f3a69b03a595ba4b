//! Context-sensitive code completion core for Java sources.
//!
//! Feed it a buffer, a byte offset, and a [`index::TypeIndex`] describing
//! the project's type universe; it classifies the syntactic context at
//! the cursor over a recovering tree-sitter parse, infers the expected
//! types, collects the scope-visible bindings, and streams ranked
//! [`completion::CompletionProposal`]s to a requestor sink.

pub mod completion;
pub mod index;
pub mod syntax;

pub use completion::{
    CancellationToken, CompletionError, CompletionOptions, CompletionProposal,
    CompletionRequestor, ProposalCollector, ProposalKind, collect_completions, complete,
};
pub use index::{TypeIndex, TypeMetadata};
