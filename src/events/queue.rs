use tokio::sync::mpsc;

/// Reconciliation triggers. Timer loops and gateway handlers both emit
/// these; a single worker consumes them, so per-resource runs never
/// overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RaidPoll,
    RaidMessage { content: String },
    OffnightPoll,
    InventoryPoll,
    InventoryAttachment { file_name: String, url: String },
    CoverImage { key: String, url: String, mime: String },
    MirrorSync,
    RemoteDriftCheck,
    CacheCleanup,
}

impl Event {
    /// Duplicate parameterless triggers collapse to one run.
    pub fn coalesces_with(&self, other: &Event) -> bool {
        match (self, other) {
            (Event::RaidPoll, Event::RaidPoll)
            | (Event::OffnightPoll, Event::OffnightPoll)
            | (Event::InventoryPoll, Event::InventoryPoll)
            | (Event::MirrorSync, Event::MirrorSync)
            | (Event::RemoteDriftCheck, Event::RemoteDriftCheck)
            | (Event::CacheCleanup, Event::CacheCleanup) => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn emit(&self, event: Event) {
        let _ = self.tx.send(event).await;
    }
}
