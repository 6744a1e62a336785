//! Host document seams.
//!
//! The engine never observes a document directly. A host implements
//! [`Document`] to enumerate candidate nodes and read their content, and
//! [`AnnotationSink`] to attach verdicts to them. Duplicate suppression and
//! primary/non-primary classification are the host's job: the engine assumes
//! `list_candidates` returns each node at most once.

pub mod dir;

use crate::error::Result;
use crate::model::{Category, ItemIdentity};

/// Discovery collaborator.
pub trait Document {
    /// Opaque handle to a node in the document.
    type Node: Clone + std::fmt::Debug;

    /// Current candidate nodes, in document order.
    fn list_candidates(&self) -> Result<Vec<Self::Node>>;

    /// Primary text of a node.
    fn extract_content(&self, node: &Self::Node) -> Result<String>;

    /// Comments, nested fragments of an already-counted node, and the like.
    fn is_non_primary(&self, node: &Self::Node) -> bool;

    /// Identity previously attached with [`Document::set_identity_marker`].
    fn identity_marker(&self, node: &Self::Node) -> Option<ItemIdentity>;

    fn set_identity_marker(&mut self, node: &Self::Node, identity: &ItemIdentity);
}

/// Annotation collaborator: where verdicts end up.
pub trait AnnotationSink: Document {
    /// Attach a verdict to a node, replacing any previous one.
    fn annotate(
        &mut self,
        node: &Self::Node,
        identity: &ItemIdentity,
        category: Category,
        raw_result: &str,
    ) -> Result<()>;

    fn has_annotation(&self, node: &Self::Node) -> bool;

    fn clear_annotation(&mut self, node: &Self::Node) -> Result<()>;
}
