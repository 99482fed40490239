use std::collections::HashSet;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::models::Task;

/// Name of the slot holding the serialized task collection.
pub const TASKS_SLOT: &str = "todos";

/// Synchronous string-keyed storage, one value per slot.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Reads the task collection once at startup.
///
/// A missing slot, malformed JSON, or a value of the wrong shape all yield
/// an empty collection. Only a failing store is reported as an error.
pub fn load_tasks<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<Task>> {
    let Some(raw) = store.get(TASKS_SLOT)? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<Task>>(&raw) {
        Ok(mut tasks) => {
            // A hand-edited slot may repeat ids; each record needs its own.
            let mut seen = HashSet::new();
            for task in &mut tasks {
                if !seen.insert(task.id) {
                    let fresh = Uuid::new_v4();
                    log::warn!("task '{}' reuses id {}; assigned {}", task.text, task.id, fresh);
                    task.id = fresh;
                    seen.insert(fresh);
                }
            }
            log::debug!("loaded {} tasks from slot '{}'", tasks.len(), TASKS_SLOT);
            Ok(tasks)
        }
        Err(e) => {
            log::warn!("ignoring unreadable task list in slot '{}': {}", TASKS_SLOT, e);
            Ok(Vec::new())
        }
    }
}

/// Overwrites the slot with the whole collection.
pub fn save_tasks<S: KeyValueStore + ?Sized>(store: &mut S, tasks: &[Task]) -> Result<()> {
    let payload = serde_json::to_string(tasks).context("Failed to serialize task list")?;
    store.set(TASKS_SLOT, &payload)?;
    log::debug!("saved {} tasks to slot '{}'", tasks.len(), TASKS_SLOT);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    #[test]
    fn missing_slot_is_empty() {
        let store = MemoryStore::new();
        assert!(load_tasks(&store).unwrap().is_empty());
    }

    #[test]
    fn malformed_slot_is_empty() {
        let mut store = MemoryStore::new();
        store.set(TASKS_SLOT, "{not json").unwrap();
        assert!(load_tasks(&store).unwrap().is_empty());

        store.set(TASKS_SLOT, r#"{"text":"an object, not a list"}"#).unwrap();
        assert!(load_tasks(&store).unwrap().is_empty());

        store.set(TASKS_SLOT, r#"[{"completed":false}]"#).unwrap();
        assert!(load_tasks(&store).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_is_identical() {
        let mut done = Task::new("Walk dog", None, Some(Priority::Low));
        done.completed = true;
        let tasks = vec![
            Task::new("Buy milk", Some("2024-03-01".into()), Some(Priority::High)),
            done,
            Task::new("No extras", None, None),
        ];

        let mut store = MemoryStore::new();
        save_tasks(&mut store, &tasks).unwrap();
        assert_eq!(load_tasks(&store).unwrap(), tasks);
    }

    #[test]
    fn repeated_ids_are_made_unique() {
        let mut store = MemoryStore::new();
        let shared = "6f1c3a52-0b8e-4d2e-9a43-1f0e5d7c2b11";
        store
            .set(
                TASKS_SLOT,
                &format!(
                    r#"[{{"id":"{shared}","text":"a","completed":false}},
                        {{"id":"{shared}","text":"b","completed":false}},
                        {{"text":"c","completed":false}}]"#
                ),
            )
            .unwrap();

        let tasks = load_tasks(&store).unwrap();
        let ids: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(tasks[0].id.to_string(), shared);
    }

    #[test]
    fn reads_payloads_written_without_ids() {
        let mut store = MemoryStore::new();
        store
            .set(
                TASKS_SLOT,
                r#"[{"text":"a","completed":false,"dueDate":"","priority":"medium"},
                    {"text":"b","completed":true}]"#,
            )
            .unwrap();
        let tasks = load_tasks(&store).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_ne!(tasks[0].id, tasks[1].id);
        assert_eq!(tasks[0].priority, Some(Priority::Medium));
        assert_eq!(tasks[1].priority, None);
    }
}
