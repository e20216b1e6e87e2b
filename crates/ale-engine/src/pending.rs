//! Pending operations and completion handles
//!
//! A submitted command becomes a [`PendingOperation`]: the command itself,
//! a fresh [`CancelToken`](crate::cancel::CancelToken) and the sending half
//! of a oneshot channel. The caller keeps the receiving half wrapped in a
//! [`Completion`], which resolves once the worker loop has executed, skipped
//! or dropped the operation.
//!
//! Outputs are type-erased into [`CommandOutput`] so the queue holds a single
//! non-generic operation type; each `Completion<T>` carries the function that
//! maps the erased output back to its typed result.

use crate::cancel::CancelToken;
use crate::command::Command;
use crate::error::EngineError;
use ale_analysis_api::AnalysisResults;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Type-erased output of one executed command
#[derive(Debug)]
pub enum CommandOutput {
    /// Commands without a payload
    Unit,
    /// Output of a run-analysis command
    Analysis(AnalysisResults),
}

pub(crate) type OperationResult = Result<CommandOutput, EngineError>;

/// Sending half of a completion, owned by the queue then the worker
#[derive(Debug)]
pub(crate) struct Completer {
    tx: oneshot::Sender<OperationResult>,
}

impl Completer {
    pub(crate) fn resolve(self, result: OperationResult) {
        // the caller may have dropped its handle; nothing to do then
        let _ = self.tx.send(result);
    }
}

/// One queued or executing unit of work
#[derive(Debug)]
pub(crate) struct PendingOperation {
    /// Monotonic sequence number, assigned at enqueue time
    pub(crate) seq: u64,
    pub(crate) command: Command,
    pub(crate) token: CancelToken,
    pub(crate) completer: Completer,
}

impl PendingOperation {
    /// Mark the token cancelled and resolve the handle as cancelled without
    /// executing the command
    pub(crate) fn resolve_cancelled(self) {
        self.token.cancel();
        self.completer.resolve(Err(EngineError::Cancelled));
    }
}

/// Externally observable completion of one submitted command
///
/// Resolves to the command's typed result, `EngineError::Cancelled` when the
/// operation was skipped or observed cancellation, or
/// `EngineError::Interrupted` when the worker was aborted mid-execution.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<OperationResult>,
    map: fn(CommandOutput) -> T,
}

impl<T> Completion<T> {
    pub(crate) fn new(map: fn(CommandOutput) -> T) -> (Self, Completer) {
        let (tx, rx) = oneshot::channel();
        (Self { rx, map }, Completer { tx })
    }

    /// An already-resolved completion
    pub(crate) fn ready(result: OperationResult, map: fn(CommandOutput) -> T) -> Self {
        let (completion, completer) = Self::new(map);
        completer.resolve(result);
        completion
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(output))) => Poll::Ready(Ok((self.map)(output))),
            Poll::Ready(Ok(Err(err))) => Poll::Ready(Err(err)),
            // sender dropped without resolving: the worker was torn down
            Poll::Ready(Err(_)) => Poll::Ready(Err(EngineError::Interrupted)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Map for completions without a payload
pub(crate) fn map_unit(_: CommandOutput) {}

/// Map for run-analysis completions
pub(crate) fn map_analysis(output: CommandOutput) -> AnalysisResults {
    match output {
        CommandOutput::Analysis(results) => results,
        CommandOutput::Unit => AnalysisResults::empty(),
    }
}

/// Identity map, used by the raw `submit` API
pub(crate) fn map_raw(output: CommandOutput) -> CommandOutput {
    output
}
