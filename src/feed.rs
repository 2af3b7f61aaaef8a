use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::document::{Document, ImageCandidate, NodeHandle, TextCandidate};
use crate::error::{Result, TsujiError};

/// On-disk feed shape: the live document another process keeps appending to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feed {
    /// Location of the current view, e.g. "/home" or "/status/123"
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: String,
    /// Original text kept when translation replaces `text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    /// Translated overlays attached at post level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<PostImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostImage {
    pub source: String,
    /// Overlay attached adjacent to this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
}

fn text_handle(post_id: &str) -> NodeHandle {
    NodeHandle::new(format!("{}/text", post_id))
}

fn image_handle(post_id: &str, index: usize) -> NodeHandle {
    NodeHandle::new(format!("{}/image/{}", post_id, index))
}

fn text_post_id(handle: &NodeHandle) -> Option<&str> {
    handle.as_str().strip_suffix("/text")
}

fn image_parts(handle: &NodeHandle) -> Option<(&str, usize)> {
    let (id, index) = handle.as_str().rsplit_once("/image/")?;
    Some((id, index.parse().ok()?))
}

/// Host document adapter over a watched JSON feed file. The file is the
/// source of truth; an in-memory copy serves reads, and every apply-back
/// rewrites the file, which in turn raises a change notification that the
/// idempotent candidate states absorb.
pub struct FeedDocument {
    path: PathBuf,
    feed: RwLock<Feed>,
}

impl FeedDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let feed = Self::read_feed(&path)?;
        info!(
            "loaded feed {} with {} posts",
            path.display(),
            feed.posts.len()
        );
        Ok(Self {
            path,
            feed: RwLock::new(feed),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_feed(path: &Path) -> Result<Feed> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Re-read the file. A failed read or parse keeps the previous snapshot;
    /// the writer may have been caught mid-write.
    pub async fn reload(&self) -> Result<()> {
        let feed = Self::read_feed(&self.path)?;
        *self.feed.write().await = feed;
        Ok(())
    }

    fn save(&self, feed: &Feed) -> Result<()> {
        let content = serde_json::to_string_pretty(feed)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Mutate one post and persist. Returns false when the post is gone.
    async fn with_post<F>(&self, id: &str, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Post),
    {
        let mut feed = self.feed.write().await;
        let Some(post) = feed.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        mutate(post);
        self.save(&feed)?;
        Ok(true)
    }
}

#[async_trait]
impl Document for FeedDocument {
    async fn location(&self) -> String {
        self.feed.read().await.path.clone()
    }

    async fn text_candidates(&self) -> Vec<TextCandidate> {
        self.feed
            .read()
            .await
            .posts
            .iter()
            .map(|post| TextCandidate {
                handle: text_handle(&post.id),
                text: post.text.clone(),
            })
            .collect()
    }

    async fn image_candidates(&self) -> Vec<ImageCandidate> {
        self.feed
            .read()
            .await
            .posts
            .iter()
            .flat_map(|post| {
                post.images
                    .iter()
                    .enumerate()
                    .map(move |(index, image)| ImageCandidate {
                        handle: image_handle(&post.id, index),
                        source: image.source.clone(),
                    })
            })
            .collect()
    }

    async fn text_of(&self, handle: &NodeHandle) -> Option<String> {
        let id = text_post_id(handle)?;
        self.feed
            .read()
            .await
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| post.text.clone())
    }

    async fn replace_text(
        &self,
        handle: &NodeHandle,
        translated: &str,
        original: &str,
    ) -> Result<()> {
        let Some(id) = text_post_id(handle) else {
            debug!("ignoring text apply-back for foreign handle {}", handle);
            return Ok(());
        };
        let applied = self
            .with_post(id, |post| {
                post.original_text = Some(original.to_string());
                post.text = translated.to_string();
            })
            .await?;
        if !applied {
            debug!("text candidate {} vanished before apply-back", handle);
        }
        Ok(())
    }

    async fn enclosing_post(&self, handle: &NodeHandle) -> Option<NodeHandle> {
        let (id, index) = image_parts(handle)?;
        let feed = self.feed.read().await;
        let post = feed.posts.iter().find(|post| post.id == id)?;
        if index < post.images.len() {
            Some(NodeHandle::new(id))
        } else {
            None
        }
    }

    async fn attach_overlay(&self, post: &NodeHandle, text: &str) -> Result<()> {
        let applied = self
            .with_post(post.as_str(), |post| {
                post.overlays.push(text.to_string());
            })
            .await?;
        if !applied {
            debug!("post {} vanished before overlay attach", post);
        }
        Ok(())
    }

    async fn attach_overlay_adjacent(&self, image: &NodeHandle, text: &str) -> Result<()> {
        let Some((id, index)) = image_parts(image) else {
            debug!("ignoring overlay for foreign handle {}", image);
            return Ok(());
        };
        let mut feed = self.feed.write().await;
        let target = feed
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .and_then(|post| post.images.get_mut(index));
        match target {
            Some(slot) => {
                slot.overlay = Some(text.to_string());
                self.save(&feed)
            }
            None => {
                debug!("image candidate {} vanished before overlay attach", image);
                Ok(())
            }
        }
    }
}

/// Watch the feed file: reload on every write and forward a structural
/// change notification. The returned watcher must be kept alive.
pub fn watch(
    document: Arc<FeedDocument>,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<()>();
    let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        match event {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                let _ = raw_tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("feed watcher error: {}", e),
        }
    })
    .map_err(|e| TsujiError::Config(format!("Failed to create feed watcher: {}", e)))?;

    watcher
        .watch(document.path(), RecursiveMode::NonRecursive)
        .map_err(|e| TsujiError::Config(format!("Failed to watch feed file: {}", e)))?;

    tokio::spawn(async move {
        while raw_rx.recv().await.is_some() {
            if let Err(e) = document.reload().await {
                warn!("feed reload failed, keeping previous snapshot: {}", e);
            }
            if change_tx.send(()).is_err() {
                break;
            }
        }
        debug!("feed watch task finished");
    });

    Ok((watcher, change_rx))
}
