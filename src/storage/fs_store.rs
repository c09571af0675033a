//! Filesystem-backed conversation store.
//!
//! Each conversation is stored as `{data_dir}/{id}.json`. Writes are atomic
//! (temp file + fsync + rename) so a crash never leaves a torn file.

use super::{ConversationStore, ConversationSummary, SavedConversation};
use crate::error::{PracticeError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FsConversationStore {
    data_dir: PathBuf,
}

impl FsConversationStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            PracticeError::Storage(format!(
                "failed to create conversations directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn conversation_path(&self, id: &str) -> Result<PathBuf> {
        // Ids become file names; refuse anything that could escape the directory.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(PracticeError::Storage(format!("invalid conversation id: {id:?}")));
        }
        Ok(self.data_dir.join(format!("{id}.json")))
    }

    fn read_file(path: &Path) -> Result<SavedConversation> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PracticeError::Storage(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PracticeError::Storage(format!("failed to parse {}: {e}", path.display()))
        })
    }

    fn write_atomic(&self, conversation: &SavedConversation) -> Result<()> {
        let path = self.conversation_path(&conversation.id)?;
        let json = serde_json::to_string_pretty(conversation)
            .map_err(|e| PracticeError::Storage(format!("failed to serialize conversation: {e}")))?;

        let tmp_path = self.data_dir.join(format!(".{}.tmp", conversation.id));
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            PracticeError::Storage(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }

        std::fs::rename(&tmp_path, &path).map_err(|e| {
            PracticeError::Storage(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })?;
        debug!(id = %conversation.id, path = %path.display(), "conversation written");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FsConversationStore {
    async fn save(&self, conversation: &SavedConversation) -> Result<()> {
        self.write_atomic(conversation)
    }

    async fn load(&self, id: &str) -> Result<SavedConversation> {
        let path = self.conversation_path(id)?;
        if !path.exists() {
            return Err(PracticeError::Storage(format!("conversation not found: {id}")));
        }
        Self::read_file(&path)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let entries = std::fs::read_dir(&self.data_dir).map_err(|e| {
            PracticeError::Storage(format!(
                "failed to read conversations directory {}: {e}",
                self.data_dir.display()
            ))
        })?;

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with('.'))
            {
                continue;
            }
            match Self::read_file(&path) {
                Ok(conversation) => summaries.push(conversation.summary()),
                Err(e) => warn!(error = %e, "skipping unreadable conversation file"),
            }
        }
        super::sort_most_recent_first(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.conversation_path(id)?;
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                PracticeError::Storage(format!("failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConversationStore::new(dir.path()).unwrap();
        assert!(store.conversation_path("../etc/passwd").is_err());
        assert!(store.conversation_path("").is_err());
        assert!(store.conversation_path("a1b2-c3").is_ok());
    }
}
