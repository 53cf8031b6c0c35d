//! Task registry: owns every live control token, indexed by task id and batch id

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::control::token::{BatchId, ControlToken};
use crate::error::CommandError;

#[derive(Default)]
struct Entries {
    by_task: HashMap<String, Arc<ControlToken>>,
    by_batch: HashMap<BatchId, String>,
}

/// Registry of running tasks.
///
/// Cheap to clone; all clones share the same tables.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Entries>>,
    poll_interval: Duration,
}

/// Registration of one task; unregisters on drop.
pub struct TaskGuard {
    registry: TaskRegistry,
    task_id: String,
    token: Arc<ControlToken>,
}

impl TaskRegistry {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Entries::default())),
            poll_interval,
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // poisoning only means another holder panicked mid-insert; the maps stay usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a token for `task_id`. A newer task with the same batch id
    /// takes over the batch index; a task id that is still registered is refused.
    pub fn register(
        &self,
        task_id: impl Into<String>,
        batch_id: BatchId,
    ) -> Result<TaskGuard, CommandError> {
        let task_id = task_id.into();
        let token = Arc::new(ControlToken::new(batch_id.clone(), self.poll_interval));
        {
            let mut entries = self.entries();
            if entries.by_task.contains_key(&task_id) {
                return Err(CommandError::TaskAlreadyRunning(task_id));
            }
            entries.by_task.insert(task_id.clone(), Arc::clone(&token));
            entries.by_batch.insert(batch_id.clone(), task_id.clone());
        }
        info!("[TASK {}] registered for batch {}", task_id, batch_id);
        Ok(TaskGuard {
            registry: self.clone(),
            task_id,
            token,
        })
    }

    pub fn lookup(&self, task_id: &str) -> Option<Arc<ControlToken>> {
        self.entries().by_task.get(task_id).cloned()
    }

    pub fn lookup_by_batch(&self, batch_id: &BatchId) -> Option<Arc<ControlToken>> {
        let entries = self.entries();
        entries
            .by_batch
            .get(batch_id)
            .and_then(|task_id| entries.by_task.get(task_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().by_task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every registered task. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let entries = self.entries();
        for token in entries.by_task.values() {
            token.stop();
        }
        entries.by_task.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        entries.by_task.clear();
        entries.by_batch.clear();
    }

    /// Drop the entries of `token`, leaving any other registration alone.
    fn remove(&self, task_id: &str, token: &Arc<ControlToken>) {
        let mut entries = self.entries();
        let owned = entries
            .by_task
            .get(task_id)
            .is_some_and(|current| Arc::ptr_eq(current, token));
        if !owned {
            return;
        }
        entries.by_task.remove(task_id);
        let batch_id = token.batch_id();
        if entries.by_batch.get(batch_id).map(String::as_str) == Some(task_id) {
            entries.by_batch.remove(batch_id);
        }
        debug!("[TASK {}] unregistered", task_id);
    }
}

impl TaskGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn token(&self) -> &Arc<ControlToken> {
        &self.token
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.task_id, &self.token);
    }
}

/// Task id of a long-running action.
pub fn task_id(action: &str, report_id: &str, batch_id: &BatchId) -> String {
    format!("{}_{}_{}", action, report_id, batch_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TaskRegistry {
        TaskRegistry::new(Duration::from_millis(5))
    }

    #[test]
    fn numeric_batch_found_by_string_id() {
        let registry = registry();
        let _guard = registry.register("create_assets_9_42", BatchId::from(42)).unwrap();

        let incoming = BatchId::from_json(&json!("42")).unwrap();
        let token = registry.lookup_by_batch(&incoming).expect("task should be found");
        assert_eq!(token.batch_id().as_str(), "42");
    }

    #[test]
    fn guard_drop_unregisters() {
        let registry = registry();
        {
            let guard = registry.register("t1", BatchId::new("b")).unwrap();
            assert!(registry.lookup(guard.task_id()).is_some());
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
        assert!(registry.lookup_by_batch(&BatchId::new("b")).is_none());
    }

    #[test]
    fn older_guard_does_not_drop_newer_batch_index() {
        let registry = registry();
        let old = registry.register("t1", BatchId::new("b")).unwrap();
        let new = registry.register("t2", BatchId::new("b")).unwrap();
        drop(old);

        let token = registry.lookup_by_batch(&BatchId::new("b")).unwrap();
        assert!(Arc::ptr_eq(&token, new.token()));
    }

    #[test]
    fn duplicate_task_id_is_refused_and_first_stays_reachable() {
        let registry = registry();
        let first = registry.register("grab_macro_ids_55_55", BatchId::from(55)).unwrap();

        let err = registry
            .register("grab_macro_ids_55_55", BatchId::from(55))
            .err()
            .expect("second registration should be refused");
        assert!(matches!(err, CommandError::TaskAlreadyRunning(ref id) if id == "grab_macro_ids_55_55"));

        assert_eq!(registry.stop_all(), 1);
        assert!(first.token().is_stopped());

        drop(first);
        assert!(registry.is_empty());
        assert!(registry.register("grab_macro_ids_55_55", BatchId::from(55)).is_ok());
    }

    #[test]
    fn stale_guard_leaves_a_reused_task_id_alone() {
        let registry = registry();
        let first = registry.register("t1", BatchId::new("b")).unwrap();
        registry.clear();
        let second = registry.register("t1", BatchId::new("b")).unwrap();

        drop(first);
        let token = registry.lookup("t1").expect("second task still registered");
        assert!(Arc::ptr_eq(&token, second.token()));
        assert!(registry.lookup_by_batch(&BatchId::new("b")).is_some());
    }

    #[test]
    fn stop_all_reaches_every_token() {
        let registry = registry();
        let a = registry.register("a", BatchId::new("1")).unwrap();
        let b = registry.register("b", BatchId::new("2")).unwrap();
        assert_eq!(registry.stop_all(), 2);
        assert!(a.token().is_stopped());
        assert!(b.token().is_stopped());
    }

    #[test]
    fn task_ids_combine_action_report_and_batch() {
        assert_eq!(
            task_id("create_assets", "1234", &BatchId::from(7)),
            "create_assets_1234_7"
        );
    }
}
