//! Conversation Persistence
//!
//! One pretty-printed JSON file per conversation, named after its id.
//! Unreadable files are skipped with a warning so one bad file never hides
//! the rest of the history.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::hooks::ChatHooks;
use crate::messages::ConversationId;

/// Directory-backed conversation store
#[derive(Clone, Debug)]
pub struct JsonConversationStore {
    dir: PathBuf,
}

impl JsonConversationStore {
    /// Store conversations under `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("{}.json", id.0))
    }

    /// Write a conversation, replacing any previous copy
    ///
    /// Streaming placeholders are saved with `streaming` cleared so a crash
    /// mid-stream does not leave a message that looks live on reload.
    pub async fn save(&self, conversation: &Conversation) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut snapshot = conversation.clone();
        for message in &mut snapshot.messages {
            message.streaming = false;
        }

        let json = serde_json::to_string_pretty(&snapshot)?;
        let path = self.path_for(&conversation.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(conversation = %conversation.id, path = %path.display(), "Saved conversation");
        Ok(())
    }

    /// Load every conversation in the directory, most recently updated first
    pub async fn load_all(&self) -> anyhow::Result<Vec<Conversation>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut conversations = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|text| serde_json::from_str::<Conversation>(&text).map_err(Into::into));

            match parsed {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable conversation file");
                }
            }
        }

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// Delete a stored conversation; missing files are not an error
    pub async fn delete(&self, id: &ConversationId) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Hooks that persist every finished conversation to a [`JsonConversationStore`]
#[derive(Clone, Debug)]
pub struct PersistingHooks {
    store: JsonConversationStore,
}

impl PersistingHooks {
    /// Persist through `store`
    pub fn new(store: JsonConversationStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatHooks for PersistingHooks {
    async fn persist(&self, conversation: &Conversation) -> anyhow::Result<()> {
        self.store.save(conversation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Attachment;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConversationStore::new(dir.path().join("conversations"));

        let mut conversation = Conversation::new();
        conversation.push_user("Hello there", vec![Attachment::document("notes.txt", "hi")]);
        let reply = conversation.push_assistant_placeholder();
        conversation.message_mut(&reply).unwrap().content = "General Kenobi".to_string();

        store.save(&conversation).await.unwrap();
        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, conversation.id);
        assert_eq!(loaded[0].title, "Hello there");
        assert_eq!(loaded[0].messages.len(), 2);
        assert_eq!(loaded[0].messages[1].content, "General Kenobi");
        assert!(!loaded[0].messages[1].streaming);
        assert_eq!(loaded[0].messages[0].attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConversationStore::new(dir.path().join("nope"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConversationStore::new(dir.path());

        store.save(&Conversation::new()).await.unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{not json")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("readme.txt"), "ignored")
            .await
            .unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConversationStore::new(dir.path());
        let conversation = Conversation::new();

        store.save(&conversation).await.unwrap();
        store.delete(&conversation.id).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());

        // Deleting twice is fine
        store.delete(&conversation.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_orders_by_update_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConversationStore::new(dir.path());

        let mut older = Conversation::new();
        older.updated_at = chrono::Utc::now() - chrono::Duration::hours(1);
        let newer = Conversation::new();

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded[0].id, newer.id);
        assert_eq!(loaded[1].id, older.id);
    }
}
