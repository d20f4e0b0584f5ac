// ============================================================================
// Schema-less document store with live change notifications
// ============================================================================
//
// Each collection is a JSON-lines file under the store root, so
// `whale_signals/abc123/signals` lives at `<root>/whale_signals/abc123/signals.jsonl`.
// Subscribers get a `ChangeEvent` after every successful append and
// re-read the collections they care about.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_EXT: &str = "jsonl";
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Validated collection path: an odd number of non-empty segments
/// (`collection` or `collection/doc/subcollection/...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(Vec<String>);

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let segments: Vec<String> = raw.trim().trim_matches('/').split('/').map(str::to_string).collect();

        let valid_segment = |s: &String| {
            !s.is_empty()
                && s != "."
                && s != ".."
                && !s.contains('\\')
                && s.chars().all(|c| !c.is_control())
        };

        if segments.len() % 2 == 0 || !segments.iter().all(valid_segment) {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }
        Ok(Self(segments))
    }

    /// Last segment, the collection id proper.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    fn file_in(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        if let Some((last, parents)) = self.0.split_last() {
            for segment in parents {
                path.push(segment);
            }
            path.push(format!("{last}.{FILE_EXT}"));
        }
        path
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// What a live subscription listens to. Which one is right for a deployment
/// is configuration: some writers use a flat collection, others nest a
/// subcollection per parent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionQuery {
    Collection(CollectionPath),
    /// Every collection with this name, at any depth.
    Group(String),
}

impl CollectionQuery {
    /// `group:<name>` or a plain collection path.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        match raw.trim().strip_prefix("group:") {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() || name.contains('/') {
                    return Err(StoreError::InvalidPath(raw.to_string()));
                }
                Ok(Self::Group(name.to_string()))
            }
            None => CollectionPath::parse(raw).map(Self::Collection),
        }
    }

    pub fn matches(&self, path: &CollectionPath) -> bool {
        match self {
            Self::Collection(own) => own == path,
            Self::Group(name) => path.name() == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: CollectionPath,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document, returning its generated id.
    async fn add(&self, collection: &CollectionPath, data: Value) -> Result<String, StoreError>;

    /// Current documents matching `query`, in insertion order.
    async fn snapshot(&self, query: &CollectionQuery) -> Result<Vec<Document>, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

// ============================================================================
// JSON-lines implementation
// ============================================================================

pub struct JsonStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_file(&self, file: &Path) -> Result<Vec<Document>, StoreError> {
        let content = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Document>(line) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(file = %file.display(), line = line_no + 1, error = %e, "skipping malformed document"),
            }
        }
        Ok(docs)
    }

    /// Every collection file below the root whose stem is `name`, sorted by path.
    async fn group_files(&self, name: &str) -> Result<Vec<PathBuf>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == FILE_EXT)
                    && path.file_stem().is_some_and(|stem| stem == name)
                {
                    found.push(path);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore for JsonStore {
    async fn add(&self, collection: &CollectionPath, data: Value) -> Result<String, StoreError> {
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            data,
        };
        let mut line = serde_json::to_string(&doc)?;
        line.push('\n');

        let file = collection.file_in(&self.root);
        {
            let _guard = self.write_lock.lock().await;
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut handle = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file)
                .await?;
            handle.write_all(line.as_bytes()).await?;
            handle.flush().await?;
        }

        debug!(collection = %collection, id = %doc.id, "document added");
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent {
            collection: collection.clone(),
        });
        Ok(doc.id)
    }

    async fn snapshot(&self, query: &CollectionQuery) -> Result<Vec<Document>, StoreError> {
        match query {
            CollectionQuery::Collection(path) => self.read_file(&path.file_in(&self.root)).await,
            CollectionQuery::Group(name) => {
                let mut docs = Vec::new();
                for file in self.group_files(name).await? {
                    docs.extend(self.read_file(&file).await?);
                }
                Ok(docs)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
