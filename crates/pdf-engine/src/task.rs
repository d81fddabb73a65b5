//! Cancelable render tasks.
//!
//! A render is split into two halves: the [`RenderTask`] kept by whoever
//! asked for the render, and the [`RenderCompleter`] handed to the code that
//! rasterizes. Both share one cancellation token. A cancelled task reports
//! [`RenderOutcome::Cancelled`] no matter what the completer does afterwards.

use crate::{PdfEngineError, RgbaImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use viewer_scheduler::CancellationToken;

pub type TaskId = u64;

pub type RenderResult = Result<RgbaImage, PdfEngineError>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Terminal state of a render task.
#[derive(Debug)]
pub enum RenderOutcome {
    Completed(RgbaImage),
    Cancelled,
    Failed(PdfEngineError),
}

/// Handle to one in-progress rasterization.
#[derive(Debug)]
pub struct RenderTask {
    id: TaskId,
    page_number: u32,
    token: CancellationToken,
    receiver: Receiver<RenderResult>,
    settled: bool,
}

/// Producer side of a [`RenderTask`].
#[derive(Debug)]
pub struct RenderCompleter {
    id: TaskId,
    token: CancellationToken,
    sender: Sender<RenderResult>,
}

impl RenderTask {
    /// Create a task and the completer that resolves it.
    pub fn channel(page_number: u32) -> (RenderTask, RenderCompleter) {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel();

        let task = RenderTask { id, page_number, token: token.clone(), receiver, settled: false };
        let completer = RenderCompleter { id, token, sender };

        (task, completer)
    }

    /// A task that has already failed, for engines that cannot start a render.
    pub fn failed(page_number: u32, error: PdfEngineError) -> RenderTask {
        let (task, completer) = Self::channel(page_number);
        completer.complete(Err(error));
        task
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Signal cancellation to the rasterizer.
    ///
    /// Returns `true` if this call cancelled the task.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Non-blocking check for a terminal state.
    ///
    /// Yields the outcome once; later calls return `None`.
    pub fn try_outcome(&mut self) -> Option<RenderOutcome> {
        if self.settled {
            return None;
        }

        if self.token.is_cancelled() {
            self.settled = true;
            return Some(RenderOutcome::Cancelled);
        }

        let outcome = match self.receiver.try_recv() {
            Ok(result) => Self::outcome_from(result),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => RenderOutcome::Failed(PdfEngineError::Render(
                "render task dropped before completing".to_string(),
            )),
        };

        self.settled = true;

        // Cancellation may have landed while the result was in flight.
        if self.token.is_cancelled() {
            return Some(RenderOutcome::Cancelled);
        }

        Some(outcome)
    }

    /// Block until the task reaches a terminal state.
    ///
    /// Once the outcome has been taken by [`RenderTask::try_outcome`], this
    /// returns [`PdfEngineError::OutcomeTaken`].
    pub fn wait(&mut self) -> RenderOutcome {
        if self.settled {
            return RenderOutcome::Failed(PdfEngineError::OutcomeTaken);
        }

        loop {
            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }

            match self.receiver.recv_timeout(WAIT_SLICE) {
                Ok(result) => {
                    self.settled = true;
                    if self.token.is_cancelled() {
                        return RenderOutcome::Cancelled;
                    }
                    return Self::outcome_from(result);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => continue,
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    fn outcome_from(result: RenderResult) -> RenderOutcome {
        match result {
            Ok(image) => RenderOutcome::Completed(image),
            Err(error) => RenderOutcome::Failed(error),
        }
    }
}

impl RenderCompleter {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Rasterizers should check this before and after doing work.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deliver the result. Returns `false` if the task was cancelled or its
    /// owner has gone away, in which case the result is discarded.
    pub fn complete(self, result: RenderResult) -> bool {
        if self.token.is_cancelled() {
            return false;
        }

        self.sender.send(result).is_ok()
    }
}
