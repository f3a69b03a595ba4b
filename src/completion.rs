use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

pub mod context;
pub mod engine;
pub mod expected_types;
pub mod extends_filter;
pub mod javadoc;
pub mod keywords;
pub mod matching;
pub mod members;
pub mod proposal;
pub mod relevance;
pub mod render;
pub mod scope;
pub mod thrown;
pub mod type_resolver;

pub use context::{CompletionContext, LocalVar, TokenLocation};
pub use engine::CompletionEngine;
pub use matching::MatchPolicy;
pub use proposal::{CompletionContextInfo, CompletionProposal, ProposalKind};

use crate::index::TypeIndex;
use crate::syntax::SourceTree;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The request was cancelled at a checkpoint. Callers must treat any
    /// proposals already delivered as void.
    #[error("completion request cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag, checked before expensive search steps
/// and at the end of the fallback pass. Cloneable across threads; the
/// engine itself stays single-threaded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), CompletionError> {
        if self.is_cancelled() {
            Err(CompletionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Per-request knobs; everything else comes from the index.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub matching: MatchPolicy,
    /// Java source level the buffer targets.
    pub source_level: u16,
    pub preview_enabled: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            matching: MatchPolicy::default(),
            source_level: 21,
            preview_enabled: false,
        }
    }
}

impl CompletionOptions {
    /// `import module` is gated behind a preview source level.
    pub fn module_imports_enabled(&self) -> bool {
        self.source_level >= 23 && self.preview_enabled
    }
}

/// Sink for one completion request. Proposals arrive as discovered;
/// ordering by relevance is the consumer's concern.
pub trait CompletionRequestor {
    fn begin_reporting(&mut self) {}
    fn end_reporting(&mut self) {}
    /// Delivered once per request, before any proposal.
    fn accept_context(&mut self, _context: &CompletionContextInfo) {}
    fn accept(&mut self, proposal: CompletionProposal);
    /// Kinds the requestor does not want; the engine skips building them.
    fn is_ignored(&self, _kind: ProposalKind) -> bool {
        false
    }
}

/// Requestor collecting everything into a vector, for tests and
/// non-streaming embedders.
#[derive(Debug, Default)]
pub struct ProposalCollector {
    pub proposals: Vec<CompletionProposal>,
    pub context: Option<CompletionContextInfo>,
}

impl ProposalCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proposals sorted by descending relevance, ties kept in delivery
    /// order.
    pub fn sorted(mut self) -> Vec<CompletionProposal> {
        self.proposals.sort_by_key(|p| std::cmp::Reverse(p.relevance));
        self.proposals
    }
}

impl CompletionRequestor for ProposalCollector {
    fn accept_context(&mut self, context: &CompletionContextInfo) {
        self.context = Some(context.clone());
    }

    fn accept(&mut self, proposal: CompletionProposal) {
        self.proposals.push(proposal);
    }
}

/// Run one completion request against `source` at byte `offset`.
///
/// Parses the buffer (with sentinel-identifier recovery when the plain
/// tree is unusable at the cursor), derives the context, and streams
/// proposals to `requestor` between begin/end notifications. A cancelled
/// request returns `Err(Cancelled)` and its partial output is void.
pub fn complete(
    source: &str,
    offset: usize,
    index: &TypeIndex,
    options: &CompletionOptions,
    requestor: &mut dyn CompletionRequestor,
    cancel: &CancellationToken,
) -> Result<(), CompletionError> {
    let offset = offset.min(source.len());
    let Some(plain) = SourceTree::parse(source) else {
        return Ok(());
    };
    let parsed = if needs_recovery(&plain, offset) {
        debug!(offset, "plain tree unusable at cursor, reparsing with sentinel");
        SourceTree::parse_with_sentinel(source, offset).unwrap_or(plain)
    } else {
        plain
    };
    let ctx = CompletionContext::derive(&parsed, source, offset);

    requestor.begin_reporting();
    let result = {
        let mut engine = CompletionEngine::new(&ctx, index, options, requestor, cancel);
        engine.run()
    };
    requestor.end_reporting();
    result
}

/// Convenience wrapper collecting all proposals, sorted by relevance.
pub fn collect_completions(
    source: &str,
    offset: usize,
    index: &TypeIndex,
    options: &CompletionOptions,
) -> Result<Vec<CompletionProposal>, CompletionError> {
    let mut collector = ProposalCollector::new();
    let cancel = CancellationToken::new();
    complete(source, offset, index, options, &mut collector, &cancel)?;
    Ok(collector.sorted())
}

/// Whether the plain tree is unusable at the cursor: nothing there, an
/// ERROR region, or a dangling dot the parser could not attach.
fn needs_recovery(tree: &SourceTree, offset: usize) -> bool {
    let Some(node) = tree.node_before(offset) else {
        return true;
    };
    if node.is_missing() || crate::syntax::has_error_ancestor(node) {
        return true;
    }
    let before = tree.text()[..offset.min(tree.text().len())].trim_end();
    before.ends_with('.') || before.ends_with("new")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_request_propagates() {
        let idx = TypeIndex::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut collector = ProposalCollector::new();
        let src = "class Foo { void f() { cou } }";
        let offset = src.find("cou").unwrap() + 3;
        let result = complete(
            src,
            offset,
            &idx,
            &CompletionOptions::default(),
            &mut collector,
            &cancel,
        );
        assert!(matches!(result, Err(CompletionError::Cancelled)));
    }

    #[test]
    fn test_context_delivered_before_proposals() {
        let idx = TypeIndex::new();
        let mut collector = ProposalCollector::new();
        let cancel = CancellationToken::new();
        let src = "class Foo { void f() { int count = 0; cou } }";
        let offset = src.find("cou }").unwrap() + 3;
        complete(
            src,
            offset,
            &idx,
            &CompletionOptions::default(),
            &mut collector,
            &cancel,
        )
        .unwrap();
        let ctx = collector.context.expect("context record");
        assert_eq!(ctx.token.as_deref(), Some("cou"));
    }

    #[test]
    fn test_needs_recovery_after_dot() {
        let src = "class Foo { void f() { name. } }";
        let tree = SourceTree::parse(src).unwrap();
        let offset = src.find("name.").unwrap() + 5;
        assert!(needs_recovery(&tree, offset));
    }
}
