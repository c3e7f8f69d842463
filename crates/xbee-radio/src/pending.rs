//! Correlation state for requests awaiting a response.

use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::debug;
use xbee_frame::Frame;

use crate::error::{RadioError, Result};

/// How a request completes.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The first response completes the request.
    Single,
    /// Responses accumulate until an empty or failed one arrives.
    Accumulate { frames: Vec<Frame> },
}

impl Completion {
    pub(crate) fn accumulate() -> Self {
        Completion::Accumulate { frames: Vec::new() }
    }
}

/// What a completed request hands back to its caller.
#[derive(Debug)]
pub(crate) enum Reply {
    Single(Frame),
    Accumulated(Vec<Frame>),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    Waiting,
    Done,
}

/// An outstanding request, keyed by correlation id in the radio's table.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    /// Distinguishes this request from a later one reusing the same id.
    pub(crate) token: u64,
    completion: Completion,
    deadline: Instant,
    timeout: Duration,
    tx: Sender<Result<Reply>>,
}

impl PendingRequest {
    pub(crate) fn new(
        token: u64,
        completion: Completion,
        timeout: Duration,
        tx: Sender<Result<Reply>>,
    ) -> Self {
        Self {
            token,
            completion,
            deadline: Instant::now() + timeout,
            timeout,
            tx,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Feed a response carrying this request's id.
    ///
    /// On [`Progress::Done`] the caller has been answered and the entry must
    /// be removed.
    pub(crate) fn on_response(&mut self, frame: Frame) -> Progress {
        match &mut self.completion {
            Completion::Single => {
                self.answer(Ok(Reply::Single(frame)));
                Progress::Done
            }
            Completion::Accumulate { frames } => {
                if let Err(status) = frame.status() {
                    reply(&self.tx, self.token, Err(RadioError::Status(status)));
                    return Progress::Done;
                }
                if frame.data().is_empty() {
                    let frames = std::mem::take(frames);
                    reply(&self.tx, self.token, Ok(Reply::Accumulated(frames)));
                    return Progress::Done;
                }
                frames.push(frame);
                Progress::Waiting
            }
        }
    }

    /// Answer with a failure and consume the entry.
    pub(crate) fn fail(self, err: RadioError) {
        self.answer(Err(err));
    }

    /// Answer with a timeout. Used when a response arrives after the deadline.
    pub(crate) fn expire(self) {
        let timeout = self.timeout;
        self.fail(RadioError::Timeout(timeout));
    }

    fn answer(&self, result: Result<Reply>) {
        reply(&self.tx, self.token, result);
    }
}

fn reply(tx: &Sender<Result<Reply>>, token: u64, result: Result<Reply>) {
    if tx.send(result).is_err() {
        debug!(token, "requester gone before completion");
    }
}
