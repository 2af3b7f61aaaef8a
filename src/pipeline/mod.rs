// Modular translation pipeline architecture
//
// Per-candidate state machines make rescans idempotent: a candidate is
// claimed before any backend work starts, so overlapping rescans and change
// notifications never translate the same node twice.

pub mod image;
pub mod text;

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::document::NodeHandle;

pub use image::ImagePipeline;
pub use text::TextPipeline;

/// Lifecycle of one candidate node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateState {
    #[default]
    Untranslated,
    /// Claimed by an in-flight translation
    Pending,
    Translated,
    /// Permanently out of scope (empty, or already in the target language)
    Skip,
}

#[derive(Debug, Default)]
struct Entry {
    state: CandidateState,
    original: Option<String>,
}

/// Tracks candidate states across rescans. All transitions go through one
/// mutex, which is what makes the untranslated-to-pending claim atomic.
#[derive(Default)]
pub struct Ledger {
    entries: Mutex<HashMap<NodeHandle, Entry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state_of(&self, handle: &NodeHandle) -> CandidateState {
        self.entries
            .lock()
            .await
            .get(handle)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    /// Claim a candidate for translation. Returns true only when the
    /// candidate was untranslated; every other state refuses the claim.
    pub async fn begin(&self, handle: &NodeHandle) -> bool {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(handle.clone()).or_default();
        if entry.state == CandidateState::Untranslated {
            entry.state = CandidateState::Pending;
            true
        } else {
            false
        }
    }

    /// Mark a candidate permanently out of scope
    pub async fn skip(&self, handle: &NodeHandle) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(handle.clone()).or_default();
        entry.state = CandidateState::Skip;
    }

    /// Record a successful translation, remembering the original text when
    /// there is one to keep
    pub async fn finish(&self, handle: &NodeHandle, original: Option<String>) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(handle.clone()).or_default();
        entry.state = CandidateState::Translated;
        entry.original = original;
    }

    /// Release a claim after a failure so a later attempt can try again
    pub async fn revert(&self, handle: &NodeHandle) {
        self.entries.lock().await.remove(handle);
    }

    pub async fn original_of(&self, handle: &NodeHandle) -> Option<String> {
        self.entries
            .lock()
            .await
            .get(handle)
            .and_then(|entry| entry.original.clone())
    }
}
