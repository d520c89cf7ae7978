//! Stream Hub: per-job broadcast fan-out of pipeline events.
//!
//! Each job gets its own bounded broadcast channel, created lazily on
//! first access. The hub is strictly live — observers that connect after
//! an event was sent never see it; they recover state through the
//! `GET /jobs/:id` status endpoint instead. A parallel set of channels,
//! keyed by plan id, carries the same event type for the Universal
//! Expansion Engine's section-by-section runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::pipeline::PipelineEvent;

/// Broadcast-only fan-out keyed by job id (and, separately, by expansion
/// plan id), with a bounded per-channel buffer shared by every observer.
#[derive(Clone)]
pub struct StreamHub {
    buffer: usize,
    jobs: Arc<RwLock<HashMap<String, broadcast::Sender<PipelineEvent>>>>,
    generation: Arc<RwLock<HashMap<String, broadcast::Sender<PipelineEvent>>>>,
}

impl StreamHub {
    /// Creates a hub whose channels hold up to `buffer` unread events per
    /// observer before a lagging subscriber starts missing messages.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the sender for `job_id`, creating its channel if absent.
    pub async fn job_sender(&self, job_id: &str) -> broadcast::Sender<PipelineEvent> {
        if let Some(tx) = self.jobs.read().await.get(job_id) {
            return tx.clone();
        }
        let mut guard = self.jobs.write().await;
        guard
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    /// Subscribes to `job_id`'s event stream, creating its channel if
    /// this is the first observer.
    pub async fn subscribe_job(&self, job_id: &str) -> broadcast::Receiver<PipelineEvent> {
        self.job_sender(job_id).await.subscribe()
    }

    /// Returns the sender for expansion plan `plan_id`, creating its
    /// channel if absent.
    pub async fn generation_sender(&self, plan_id: &str) -> broadcast::Sender<PipelineEvent> {
        if let Some(tx) = self.generation.read().await.get(plan_id) {
            return tx.clone();
        }
        let mut guard = self.generation.write().await;
        guard
            .entry(plan_id.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    /// Subscribes to expansion plan `plan_id`'s event stream.
    pub async fn subscribe_generation(&self, plan_id: &str) -> broadcast::Receiver<PipelineEvent> {
        self.generation_sender(plan_id).await.subscribe()
    }

    /// Drops a job's channel once its run has finished and every observer
    /// has disconnected, so the map does not grow unbounded.
    pub async fn retire_job(&self, job_id: &str) {
        let mut guard = self.jobs.write().await;
        if guard.get(job_id).is_some_and(|tx| tx.receiver_count() == 0) {
            guard.remove(job_id);
        }
    }

    /// Drops an expansion plan's channel under the same condition.
    pub async fn retire_generation(&self, plan_id: &str) {
        let mut guard = self.generation.write().await;
        if guard.get(plan_id).is_some_and(|tx| tx.receiver_count() == 0) {
            guard.remove(plan_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_share_one_channel_per_job() {
        let hub = StreamHub::new(8);
        let mut rx1 = hub.subscribe_job("j1").await;
        let mut rx2 = hub.subscribe_job("j1").await;
        let tx = hub.job_sender("j1").await;
        tx.send(PipelineEvent::Error {
            message: "ping".into(),
        })
        .unwrap();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_jobs_have_distinct_channels() {
        let hub = StreamHub::new(8);
        let mut rx = hub.subscribe_job("j1").await;
        let tx_other = hub.job_sender("j2").await;
        tx_other
            .send(PipelineEvent::Error {
                message: "for j2".into(),
            })
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retire_removes_channel_with_no_observers() {
        let hub = StreamHub::new(8);
        {
            let _rx = hub.subscribe_job("j1").await;
        }
        hub.retire_job("j1").await;
        // A fresh subscribe after retirement gets a brand-new channel with
        // no history, which is the point: retirement is safe because the
        // hub never promises replay.
        let _rx = hub.subscribe_job("j1").await;
    }
}
