//! Write-behind persistence for one room.
//!
//! The room actor updates its in-memory state first and then queues the
//! matching store write here. Writes are applied strictly in queue order
//! by a single task; a failed write is logged and the live state is not
//! rolled back.

use std::sync::Arc;

use buzzline_protocol::{PlayerId, RoomCode, RoomStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{BuzzRecord, ResponseRecord, RoomStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    SetStatus(RoomStatus),
    IncrementScore { player_id: PlayerId, delta: i64 },
    RecordResponse(ResponseRecord),
    RecordBuzz(BuzzRecord),
}

impl StoreWrite {
    fn name(&self) -> &'static str {
        match self {
            Self::SetStatus(_) => "set_status",
            Self::IncrementScore { .. } => "increment_score",
            Self::RecordResponse(_) => "record_response",
            Self::RecordBuzz(_) => "record_buzz",
        }
    }

    async fn apply<S: RoomStore>(&self, store: &S, code: &RoomCode) -> Result<(), StoreError> {
        match self {
            Self::SetStatus(status) => store.set_status(code, *status).await,
            Self::IncrementScore { player_id, delta } => store.increment_score(code, *player_id, *delta).await,
            Self::RecordResponse(response) => store.record_response(code, response).await,
            Self::RecordBuzz(buzz) => store.record_buzz(code, buzz).await,
        }
    }
}

/// Queue handle owned by the room actor. Dropping it lets the writer
/// task drain what is queued and exit.
#[derive(Debug)]
pub struct StoreWriter {
    code: RoomCode,
    queue: mpsc::UnboundedSender<StoreWrite>,
}

impl StoreWriter {
    pub fn spawn<S: RoomStore>(code: RoomCode, store: Arc<S>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drain(code.clone(), store, rx));
        (Self { code, queue }, task)
    }

    pub fn enqueue(&self, write: StoreWrite) {
        if self.queue.send(write).is_err() {
            tracing::warn!(room = %self.code, "store writer stopped, dropping write");
        }
    }
}

async fn drain<S: RoomStore>(code: RoomCode, store: Arc<S>, mut rx: mpsc::UnboundedReceiver<StoreWrite>) {
    let mut failures = 0u64;
    while let Some(write) = rx.recv().await {
        if let Err(e) = write.apply(store.as_ref(), &code).await {
            failures += 1;
            tracing::warn!(room = %code, write = write.name(), error = %e, failures, "store write failed");
        }
    }
    tracing::debug!(room = %code, failures, "store writer finished");
}
