use serde::Serialize;
use tokio::sync::broadcast;

/// Status events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    ArticleIngested {
        id: i64,
        title: String,
        source: String,
        is_breaking: bool,
    },
    RefreshCompleted {
        sources: usize,
        inserted: usize,
    },
    CoverCompleted {
        job_id: String,
        image_path: String,
    },
    CoverFailed {
        job_id: String,
        error: String,
    },
}

/// Fan-out handle for status notifications. Slow subscribers lag and skip
/// ahead; events are notifications, not a durable stream.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<StatusEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn send(&self, event: StatusEvent) {
        // Err just means nobody is listening right now.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.send(StatusEvent::RefreshCompleted {
            sources: 3,
            inserted: 12,
        });
        let event = rx.recv().await.unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "refresh_completed");
        assert_eq!(json["inserted"], 12);
    }

    #[test]
    fn send_without_subscribers_is_fine() {
        let notifier = Notifier::new();
        notifier.send(StatusEvent::CoverFailed {
            job_id: "j1".to_string(),
            error: "timeout".to_string(),
        });
    }
}
