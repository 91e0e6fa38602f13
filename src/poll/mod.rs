//! Background task reconciliation.
//!
//! Long-running server-side tasks may finish while the push stream is
//! silent. The poller periodically asks a [`TaskSource`] for the current
//! task states of the watched conversation and republishes them as stream
//! events, so reconciliation flows through the same merger as live pushes.

mod http;

pub use http::HttpTaskSource;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::events::{ComponentKind, EventOp, EventSender, StreamEvent};

/// Default gap between reconciliation fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Server-reported state of one background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Complete,
    Error,
}

/// One task row from a reconciliation fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub item_id: String,
    pub component_type: ComponentKind,
    #[serde(default)]
    pub payload: Value,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Convert into the stream event the merger understands.
    ///
    /// Pending tasks replace whatever partial state the item has; finished
    /// tasks finalize it. Terminal items in the store ignore both, which is
    /// what makes re-delivery safe.
    pub fn into_event(self, conversation_id: &str) -> StreamEvent {
        let op = match self.status {
            TaskStatus::Pending => EventOp::Replace,
            TaskStatus::Complete | TaskStatus::Error => EventOp::Finalize,
        };
        let mut event = StreamEvent::new(
            conversation_id,
            self.item_id,
            self.component_type,
            op,
            self.payload,
        );
        event.sequence = self.sequence;
        if self.status == TaskStatus::Error {
            event.error = Some(
                self.error
                    .unwrap_or_else(|| "task failed".to_string()),
            );
        }
        event
    }
}

/// Where task states come from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch(&self, conversation_id: &str) -> anyhow::Result<Vec<TaskResult>>;
}

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
}

struct PollerInner {
    state: PollerState,
    handle: Option<JoinHandle<()>>,
}

/// Periodic task reconciler for one watched conversation at a time.
///
/// `watch` starts a polling loop, `stop` cancels it. A fetch that is already
/// in flight when `stop` lands gets its results discarded via a generation
/// counter, so a stale response can never publish after the switch.
pub struct TaskPoller {
    source: Arc<dyn TaskSource>,
    sender: EventSender,
    interval: Duration,
    generation: Arc<AtomicU64>,
    inner: Mutex<PollerInner>,
}

impl TaskPoller {
    pub fn new(source: Arc<dyn TaskSource>, sender: EventSender) -> Self {
        Self::with_interval(source, sender, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        source: Arc<dyn TaskSource>,
        sender: EventSender,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sender,
            interval,
            generation: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(PollerInner {
                state: PollerState::Idle,
                handle: None,
            }),
        }
    }

    /// Begin polling task states for a conversation. Replaces any previous
    /// watch.
    pub fn watch(&self, conversation_id: impl Into<String>) {
        let conversation_id = conversation_id.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let interval = self.interval;
        let guard = Arc::clone(&self.generation);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if guard.load(Ordering::SeqCst) != generation {
                    return;
                }
                match source.fetch(&conversation_id).await {
                    Ok(results) => {
                        // Re-check after the await: stop() may have landed
                        // while the fetch was in flight.
                        if guard.load(Ordering::SeqCst) != generation {
                            return;
                        }
                        for result in results {
                            sender.publish(result.into_event(&conversation_id));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            conversation = %conversation_id,
                            "task fetch failed: {e:#}"
                        );
                    }
                }
            }
        });

        let Ok(mut inner) = self.inner.lock() else {
            tracing::error!("poller lock poisoned; watch aborted");
            handle.abort();
            return;
        };
        if let Some(previous) = inner.handle.replace(handle) {
            previous.abort();
        }
        inner.state = PollerState::Polling;
    }

    /// Stop polling. In-flight fetch results are discarded.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Ok(mut inner) = self.inner.lock() else {
            tracing::error!("poller lock poisoned; stop skipped");
            return;
        };
        if let Some(handle) = inner.handle.take() {
            handle.abort();
        }
        inner.state = PollerState::Idle;
    }

    pub fn state(&self) -> PollerState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(PollerState::Idle)
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct FixedSource {
        results: Vec<TaskResult>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(results: Vec<TaskResult>) -> Self {
            Self {
                results,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskSource for FixedSource {
        async fn fetch(&self, _conversation_id: &str) -> anyhow::Result<Vec<TaskResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TaskSource for FailingSource {
        async fn fetch(&self, _conversation_id: &str) -> anyhow::Result<Vec<TaskResult>> {
            anyhow::bail!("connection refused")
        }
    }

    fn pending_task(item_id: &str) -> TaskResult {
        TaskResult {
            item_id: item_id.to_string(),
            component_type: ComponentKind::Markdown,
            payload: json!("working..."),
            status: TaskStatus::Pending,
            sequence: None,
            error: None,
        }
    }

    #[test]
    fn test_pending_task_becomes_replace_event() {
        let event = pending_task("t1").into_event("conv");
        assert_eq!(event.op, EventOp::Replace);
        assert_eq!(event.conversation_id, "conv");
        assert!(event.error.is_none());
    }

    #[test]
    fn test_complete_task_becomes_finalize_event() {
        let mut task = pending_task("t1");
        task.status = TaskStatus::Complete;
        task.payload = json!("final answer");
        let event = task.into_event("conv");
        assert_eq!(event.op, EventOp::Finalize);
        assert!(event.error.is_none());
    }

    #[test]
    fn test_error_task_carries_message() {
        let mut task = pending_task("t1");
        task.status = TaskStatus::Error;
        task.error = Some("worker crashed".to_string());
        let event = task.into_event("conv");
        assert_eq!(event.op, EventOp::Finalize);
        assert_eq!(event.error.as_deref(), Some("worker crashed"));
    }

    #[test]
    fn test_error_task_without_message_gets_default() {
        let mut task = pending_task("t1");
        task.status = TaskStatus::Error;
        let event = task.into_event("conv");
        assert_eq!(event.error.as_deref(), Some("task failed"));
    }

    #[test]
    fn test_task_result_wire_decode() {
        let raw = r#"{
            "item_id": "t9",
            "component_type": "tool_call",
            "payload": {"tool_name": "search", "output": "done"},
            "status": "complete"
        }"#;
        let task: TaskResult = serde_json::from_str(raw).unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.component_type, ComponentKind::ToolCall);
    }

    #[tokio::test]
    async fn test_watch_publishes_fetched_tasks() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let poller = TaskPoller::with_interval(
            Arc::new(FixedSource::new(vec![pending_task("t1")])),
            bus.sender(),
            Duration::from_millis(5),
        );

        poller.watch("conv");
        assert_eq!(poller.state(), PollerState::Polling);

        let event = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("poller should publish within the timeout")
            .unwrap();
        assert_eq!(event.item_id, "t1");
        assert_eq!(event.op, EventOp::Replace);

        poller.stop();
        assert_eq!(poller.state(), PollerState::Idle);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_results() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        struct SlowSource;

        #[async_trait]
        impl TaskSource for SlowSource {
            async fn fetch(&self, _conversation_id: &str) -> anyhow::Result<Vec<TaskResult>> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![TaskResult {
                    item_id: "stale".to_string(),
                    component_type: ComponentKind::Markdown,
                    payload: json!("late"),
                    status: TaskStatus::Pending,
                    sequence: None,
                    error: None,
                }])
            }
        }

        let poller = TaskPoller::with_interval(
            Arc::new(SlowSource),
            bus.sender(),
            Duration::from_millis(1),
        );
        poller.watch("conv");
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_stop_polling() {
        let bus = EventBus::new();
        let _receiver = bus.subscribe();
        let poller = TaskPoller::with_interval(
            Arc::new(FailingSource),
            bus.sender(),
            Duration::from_millis(5),
        );

        poller.watch("conv");
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Failures are logged and swallowed; the loop keeps running.
        assert_eq!(poller.state(), PollerState::Polling);
        poller.stop();
    }

    #[tokio::test]
    async fn test_rewatch_replaces_previous_conversation() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let source = Arc::new(FixedSource::new(vec![pending_task("t1")]));
        let poller =
            TaskPoller::with_interval(source, bus.sender(), Duration::from_millis(5));

        poller.watch("first");
        poller.watch("second");

        // Everything published after the switch belongs to the new watch.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let mut seen = 0;
        while let Ok(Some(event)) = receiver.try_recv() {
            assert_eq!(event.conversation_id, "second");
            seen += 1;
        }
        assert!(seen > 0);
        poller.stop();
    }
}
