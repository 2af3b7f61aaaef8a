use async_trait::async_trait;
use std::fmt;

/// Stable identity of a candidate node for the lifetime of that node.
/// The keyed state store and all apply-back operations go through handles,
/// never through the candidate values themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A text container eligible for translation
#[derive(Debug, Clone)]
pub struct TextCandidate {
    pub handle: NodeHandle,
    pub text: String,
}

/// An image eligible for OCR translation
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub handle: NodeHandle,
    pub source: String,
}

/// Host document contract. The scheduler and pipelines depend only on this
/// trait; how candidates are located is the adapter's business. Apply-back
/// operations on a candidate that has meanwhile left the document are
/// accepted and dropped, like writes to a detached node.
#[async_trait]
pub trait Document: Send + Sync {
    /// Path-like location of the current view, used for detail-page checks
    async fn location(&self) -> String;

    async fn text_candidates(&self) -> Vec<TextCandidate>;

    async fn image_candidates(&self) -> Vec<ImageCandidate>;

    /// Current text of a candidate, or None if it left the document
    async fn text_of(&self, handle: &NodeHandle) -> Option<String>;

    /// Replace a candidate's visible text, keeping the original for display
    async fn replace_text(
        &self,
        handle: &NodeHandle,
        translated: &str,
        original: &str,
    ) -> crate::error::Result<()>;

    /// Enclosing post container of an image, if the image is still present
    async fn enclosing_post(&self, handle: &NodeHandle) -> Option<NodeHandle>;

    /// Attach a translated overlay at the end of a post container
    async fn attach_overlay(&self, post: &NodeHandle, text: &str) -> crate::error::Result<()>;

    /// Fallback placement immediately adjacent to the image itself
    async fn attach_overlay_adjacent(
        &self,
        image: &NodeHandle,
        text: &str,
    ) -> crate::error::Result<()>;
}
