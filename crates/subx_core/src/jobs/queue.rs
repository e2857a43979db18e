//! Batch queue state management with optional persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::{QueueError, QueueItem, QueueItemStatus};
use crate::config::NetworkSettings;
use crate::network::{classify_path, estimate_processing_time};

/// Persistent queue state (saved to queue.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueState {
    /// Queue format version.
    version: u32,
    next_id: u64,
    /// Items in queue order.
    items: Vec<QueueItem>,
}

/// Ordered list of source files for a batch run.
///
/// Edits that would move or remove an item in `Processing`, or shift its
/// index, are rejected with [`QueueError::ItemBusy`].
#[derive(Debug, Default)]
pub struct BatchQueue {
    items: Vec<QueueItem>,
    next_id: u64,
    /// Path to queue.json, empty for an in-memory queue.
    queue_file: PathBuf,
}

impl BatchQueue {
    /// Create a queue persisted to `queue.json` in the given temp folder,
    /// loading any saved state.
    pub fn new(temp_folder: &Path) -> Self {
        let queue_file = temp_folder.join("queue.json");

        let state = if queue_file.exists() {
            match fs::read_to_string(&queue_file) {
                Ok(content) => match serde_json::from_str::<QueueState>(&content) {
                    Ok(state) => {
                        tracing::info!("Loaded {} items from queue.json", state.items.len());
                        Some(state)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse queue.json: {}", e);
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read queue.json: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let (mut items, next_id) = state.map(|s| (s.items, s.next_id)).unwrap_or_default();

        // A crash mid-run leaves an item in Processing.
        for item in items.iter_mut().filter(|i| i.status == QueueItemStatus::Processing) {
            item.reset();
        }

        Self {
            items,
            next_id,
            queue_file,
        }
    }

    /// Create a queue without persistence.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Persist queue to disk. No-op for an in-memory queue.
    pub fn save(&self) -> Result<(), QueueError> {
        if self.queue_file.as_os_str().is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.queue_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = QueueState {
            version: 1,
            next_id: self.next_id,
            items: self.items.clone(),
        };
        let json = serde_json::to_string_pretty(&state)?;

        // Write atomically via temp file
        let temp_file = self.queue_file.with_extension("json.tmp");
        fs::write(&temp_file, &json)?;
        fs::rename(&temp_file, &self.queue_file)?;

        tracing::debug!("Saved {} items to queue.json", self.items.len());
        Ok(())
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut QueueItem> {
        self.items.get_mut(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items with `status`.
    pub fn count(&self, status: QueueItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Whether any item is being processed.
    pub fn is_busy(&self) -> bool {
        self.processing_index().is_some()
    }

    fn processing_index(&self) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.status == QueueItemStatus::Processing)
    }

    /// Append an item, assigning it a fresh id. Returns its index.
    pub fn add(&mut self, mut item: QueueItem) -> usize {
        self.next_id += 1;
        item.id = format!("item-{:04}", self.next_id);
        self.items.push(item);
        self.items.len() - 1
    }

    /// Stat `path`, classify its location and estimate its processing
    /// time, then append it.
    pub fn add_path(&mut self, path: &Path, network: &NetworkSettings) -> Result<usize, QueueError> {
        let size = fs::metadata(path)?.len();
        let location = classify_path(path);
        let estimate = estimate_processing_time(size, location, network);
        Ok(self.add(QueueItem::new(String::new(), path, size, location, estimate)))
    }

    /// Remove every item. Rejected while an item is processing.
    pub fn clear(&mut self) -> Result<(), QueueError> {
        if let Some(index) = self.processing_index() {
            return Err(QueueError::ItemBusy { index });
        }
        self.items.clear();
        Ok(())
    }

    /// Remove completed items. Returns how many were removed.
    pub fn clear_completed(&mut self) -> Result<usize, QueueError> {
        if let Some(index) = self.processing_index() {
            return Err(QueueError::ItemBusy { index });
        }
        let before = self.items.len();
        self.items.retain(|i| i.status != QueueItemStatus::Completed);
        Ok(before - self.items.len())
    }

    /// Remove one item.
    pub fn remove(&mut self, index: usize) -> Result<QueueItem, QueueError> {
        self.check_index(index)?;
        self.check_range(index, self.items.len() - 1)?;
        Ok(self.items.remove(index))
    }

    /// Move an item from one position to another.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }
        self.check_range(from.min(to), from.max(to))?;

        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    pub fn move_to_top(&mut self, index: usize) -> Result<(), QueueError> {
        self.move_item(index, 0)
    }

    pub fn move_to_bottom(&mut self, index: usize) -> Result<(), QueueError> {
        self.check_index(index)?;
        self.move_item(index, self.items.len() - 1)
    }

    /// Swap with the previous item. No-op at the top.
    pub fn move_up(&mut self, index: usize) -> Result<(), QueueError> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(());
        }
        self.move_item(index, index - 1)
    }

    /// Swap with the next item. No-op at the bottom.
    pub fn move_down(&mut self, index: usize) -> Result<(), QueueError> {
        self.check_index(index)?;
        if index + 1 == self.items.len() {
            return Ok(());
        }
        self.move_item(index, index + 1)
    }

    /// Reset items at `from` and after to Pending for a new run.
    pub(crate) fn reset_from(&mut self, from: usize) {
        for item in self.items.iter_mut().skip(from) {
            item.reset();
        }
    }

    fn check_index(&self, index: usize) -> Result<(), QueueError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(QueueError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }

    /// Reject edits whose shifted index range contains a processing item.
    fn check_range(&self, start: usize, end: usize) -> Result<(), QueueError> {
        match self.processing_index() {
            Some(index) if (start..=end).contains(&index) => Err(QueueError::ItemBusy { index }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceLocation;
    use std::time::Duration;
    use tempfile::tempdir;

    fn make_item(name: &str) -> QueueItem {
        QueueItem::new("", format!("/test/{}.mkv", name), 100, SourceLocation::Local, Duration::from_secs(5))
    }

    fn queue_of(names: &[&str]) -> BatchQueue {
        let mut queue = BatchQueue::in_memory();
        for name in names {
            queue.add(make_item(name));
        }
        queue
    }

    fn names(queue: &BatchQueue) -> Vec<String> {
        queue
            .items()
            .iter()
            .map(|i| i.display_name.trim_end_matches(".mkv").to_string())
            .collect()
    }

    #[test]
    fn queue_add_remove() {
        let mut queue = queue_of(&["1", "2"]);
        assert_eq!(queue.len(), 2);
        assert_ne!(queue.get(0).unwrap().id, queue.get(1).unwrap().id);

        queue.remove(0).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(names(&queue), vec!["2"]);
        assert!(matches!(queue.remove(5), Err(QueueError::IndexOutOfRange { index: 5, len: 1 })));
    }

    #[test]
    fn queue_moves() {
        let mut queue = queue_of(&["1", "2", "3", "4"]);

        queue.move_item(0, 2).unwrap();
        assert_eq!(names(&queue), vec!["2", "3", "1", "4"]);

        queue.move_to_top(3).unwrap();
        assert_eq!(names(&queue), vec!["4", "2", "3", "1"]);

        queue.move_to_bottom(0).unwrap();
        assert_eq!(names(&queue), vec!["2", "3", "1", "4"]);

        queue.move_up(2).unwrap();
        queue.move_down(0).unwrap();
        assert_eq!(names(&queue), vec!["1", "2", "3", "4"]);

        queue.move_up(0).unwrap();
        queue.move_down(3).unwrap();
        assert_eq!(names(&queue), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn edits_touching_processing_item_are_rejected() {
        let mut queue = queue_of(&["1", "2", "3", "4"]);
        queue.get_mut(1).unwrap().transition(QueueItemStatus::Processing).unwrap();

        assert!(matches!(queue.remove(1), Err(QueueError::ItemBusy { index: 1 })));
        assert!(matches!(queue.remove(0), Err(QueueError::ItemBusy { .. })));
        assert!(matches!(queue.move_item(0, 3), Err(QueueError::ItemBusy { .. })));
        assert!(matches!(queue.move_to_top(1), Err(QueueError::ItemBusy { .. })));
        assert!(matches!(queue.clear(), Err(QueueError::ItemBusy { .. })));
        assert!(matches!(queue.clear_completed(), Err(QueueError::ItemBusy { .. })));

        // Items past the processing one can still be rearranged.
        queue.move_item(2, 3).unwrap();
        queue.remove(3).unwrap();
        assert_eq!(names(&queue), vec!["1", "2", "4"]);
    }

    #[test]
    fn clear_completed_keeps_the_rest() {
        let mut queue = queue_of(&["1", "2", "3"]);
        for index in [0, 2] {
            let item = queue.get_mut(index).unwrap();
            item.transition(QueueItemStatus::Processing).unwrap();
            item.transition(QueueItemStatus::Completed).unwrap();
        }

        assert_eq!(queue.clear_completed().unwrap(), 2);
        assert_eq!(names(&queue), vec!["2"]);

        queue.clear().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn reset_from_only_touches_later_items() {
        let mut queue = queue_of(&["1", "2", "3"]);
        for index in 0..3 {
            let item = queue.get_mut(index).unwrap();
            item.transition(QueueItemStatus::Processing).unwrap();
            item.transition(QueueItemStatus::Error).unwrap();
        }

        queue.reset_from(1);
        assert_eq!(queue.get(0).unwrap().status, QueueItemStatus::Error);
        assert_eq!(queue.count(QueueItemStatus::Pending), 2);
    }

    #[test]
    fn add_path_estimates_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.mkv");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let mut queue = BatchQueue::in_memory();
        let index = queue.add_path(&path, &NetworkSettings::default()).unwrap();
        let item = queue.get(index).unwrap();

        assert_eq!(item.size_bytes, 2048);
        assert_eq!(item.display_name, "movie.mkv");
        assert!(item.estimated_time >= Duration::from_secs(5));

        assert!(queue.add_path(&dir.path().join("missing.mkv"), &NetworkSettings::default()).is_err());
    }

    #[test]
    fn persists_to_queue_json() {
        let dir = tempdir().unwrap();
        {
            let mut queue = BatchQueue::new(dir.path());
            queue.add(make_item("1"));
            queue.add(make_item("2"));
            queue.get_mut(0).unwrap().transition(QueueItemStatus::Processing).unwrap();
            queue.save().unwrap();
        }
        assert!(dir.path().join("queue.json").exists());
        assert!(!dir.path().join("queue.json.tmp").exists());

        let mut queue = BatchQueue::new(dir.path());
        assert_eq!(names(&queue), vec!["1", "2"]);
        // Interrupted processing comes back as pending.
        assert_eq!(queue.get(0).unwrap().status, QueueItemStatus::Pending);

        let index = queue.add(make_item("3"));
        assert_eq!(queue.get(index).unwrap().id, "item-0003");
    }

    #[test]
    fn in_memory_save_is_noop() {
        let queue = queue_of(&["1"]);
        queue.save().unwrap();
    }
}
