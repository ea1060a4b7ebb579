//! In-process queue store

use std::collections::HashMap;
use std::ops::Range;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{QueueEntry, QueueStore};
use crate::error::QueueResult;

/// Queue store kept in memory, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    queues: RwLock<HashMap<String, Vec<QueueEntry>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn append(&self, session: &str, entry: &QueueEntry) -> QueueResult<usize> {
        let mut queues = self.queues.write().await;
        let queue = queues.entry(session.to_string()).or_default();
        queue.push(entry.clone());
        Ok(queue.len() - 1)
    }

    async fn range(&self, session: &str, range: Range<usize>) -> QueueResult<Vec<QueueEntry>> {
        let queues = self.queues.read().await;
        let Some(queue) = queues.get(session) else {
            return Ok(Vec::new());
        };
        let end = range.end.min(queue.len());
        let start = range.start.min(end);
        Ok(queue[start..end].to_vec())
    }

    async fn delete_at(&self, session: &str, position: usize) -> QueueResult<bool> {
        let mut queues = self.queues.write().await;
        match queues.get_mut(session) {
            Some(queue) if position < queue.len() => {
                queue.remove(position);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self, session: &str) -> QueueResult<()> {
        self.queues.write().await.remove(session);
        Ok(())
    }

    async fn len(&self, session: &str) -> QueueResult<usize> {
        Ok(self.queues.read().await.get(session).map_or(0, Vec::len))
    }
}
