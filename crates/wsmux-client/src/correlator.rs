//! Request sequence allocation and reply matching.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use wsmux_frame::ReplyBody;

use crate::error::{ClientError, Result};
use crate::payload::{InitialReply, TopicEvent};
use crate::topic::Topic;
use crate::SubscriptionId;

/// What to do once a request's terminal frame arrives.
#[derive(Debug)]
pub(crate) enum Completion {
    /// Plain request: hand the raw reply back.
    Request(oneshot::Sender<Result<ReplyBody>>),
    /// First subscribe of a handle: route on success, then answer the caller.
    Subscribe {
        id: SubscriptionId,
        topic: Topic,
        sink: mpsc::UnboundedSender<Result<TopicEvent>>,
        interrupted: Arc<AtomicBool>,
        reply: oneshot::Sender<Result<InitialReply>>,
    },
    /// Re-issued subscribe of an existing handle after a reconnect.
    Replay { id: SubscriptionId, topic: Topic },
}

impl Completion {
    /// Fail the waiting caller, if there is one.
    pub(crate) fn reject(self, err: ClientError) {
        match self {
            Completion::Request(tx) => {
                let _ = tx.send(Err(err));
            }
            Completion::Subscribe { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            // The handle stays registered and is replayed on the next link.
            Completion::Replay { .. } => {}
        }
    }
}

#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) sequence: u64,
    pub(crate) created_at: Instant,
    /// Link generation the request was written to.
    pub(crate) generation: u64,
    pub(crate) completion: Completion,
}

/// Outstanding requests keyed by sequence.
///
/// Sequences start at 1 and are never reused for the lifetime of the
/// client, across reconnects included.
#[derive(Debug)]
pub(crate) struct Correlator {
    next_sequence: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            next_sequence: 1,
            pending: HashMap::new(),
        }
    }

    /// Sequence the next registered request will get.
    pub(crate) fn peek_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Consume the next sequence for a request that has been written.
    pub(crate) fn register(&mut self, generation: u64, completion: Completion) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(
            sequence,
            PendingRequest {
                sequence,
                created_at: Instant::now(),
                generation,
                completion,
            },
        );
        sequence
    }

    /// Remove the request a terminal frame answers.
    ///
    /// Returns `None` for unknown or already answered sequences; those frames
    /// are logged and dropped by the caller.
    pub(crate) fn take(&mut self, sequence: u64) -> Option<PendingRequest> {
        let pending = self.pending.remove(&sequence);
        match &pending {
            Some(request) => debug!(
                sequence,
                elapsed_ms = request.created_at.elapsed().as_millis() as u64,
                "request completed"
            ),
            None if sequence < self.next_sequence => {
                warn!(sequence, "terminal frame for a finished request, discarding")
            }
            None => warn!(sequence, "terminal frame for an unknown request, discarding"),
        }
        pending
    }

    /// Remove every outstanding request written to `generation` or earlier.
    pub(crate) fn drain(&mut self, generation: u64) -> Vec<PendingRequest> {
        let sequences: Vec<u64> = self
            .pending
            .values()
            .filter(|request| request.generation <= generation)
            .map(|request| request.sequence)
            .collect();
        let mut drained: Vec<PendingRequest> = sequences
            .into_iter()
            .filter_map(|sequence| self.pending.remove(&sequence))
            .collect();
        drained.sort_by_key(|request| request.sequence);
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
