//! The FIFO command queue
//!
//! Many producers append through [`CommandQueue::push`]; exactly one consumer
//! (the worker loop) blocks in [`CommandQueue::take`]. The mutex here guards
//! enqueue/dequeue bookkeeping only; everything downstream of a dequeue is
//! single-threaded by construction.
//!
//! Cancellation never reorders or removes entries: [`CommandQueue::cancel_scope`]
//! only marks tokens, and the worker resolves the marked entries as cancelled
//! when it reaches them. Removal happens solely through [`CommandQueue::drain`]
//! (engine stop) and [`CommandQueue::remove_analyses`] (plugin reset), both of
//! which hand the removed operations back so their handles still resolve.

use crate::command::Command;
use crate::pending::PendingOperation;
use ale_analysis_api::ScopeId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct CommandQueue {
    inner: Mutex<VecDeque<PendingOperation>>,
    notify: Notify,
    next_seq: AtomicU64,
}

impl CommandQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an operation, assigning its sequence number; wakes the worker
    pub(crate) fn push(&self, mut operation: PendingOperation) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        operation.seq = seq;
        self.inner.lock().push_back(operation);
        self.notify.notify_one();
        seq
    }

    /// Dequeue the head, waiting while the queue is empty
    pub(crate) async fn take(&self) -> PendingOperation {
        loop {
            // arm the notification before checking, so a push between the
            // check and the await cannot be lost
            let notified = self.notify.notified();
            if let Some(operation) = self.inner.lock().pop_front() {
                return operation;
            }
            notified.await;
        }
    }

    /// Mark every queued operation targeting `scope` as cancelled
    ///
    /// Entries stay in the queue; the worker skips them when it gets there.
    pub(crate) fn cancel_scope(&self, scope: &ScopeId) -> usize {
        // tokens are collected first: their cancel callbacks may re-enter
        // the queue and must not run under its lock
        let tokens: Vec<_> = self
            .inner
            .lock()
            .iter()
            .filter(|operation| operation.command.cancel_scope() == Some(scope))
            .map(|operation| operation.token.clone())
            .collect();
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }

    /// Remove everything still queued (engine stop)
    pub(crate) fn drain(&self) -> Vec<PendingOperation> {
        self.inner.lock().drain(..).collect()
    }

    /// Remove queued-but-not-started analyses only (plugin reset)
    pub(crate) fn remove_analyses(&self) -> Vec<PendingOperation> {
        let mut queue = self.inner.lock();
        let mut kept = VecDeque::with_capacity(queue.len());
        let mut removed = Vec::new();
        for operation in queue.drain(..) {
            if matches!(operation.command, Command::RunAnalysis { .. }) {
                removed.push(operation);
            } else {
                kept.push_back(operation);
            }
        }
        *queue = kept;
        removed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::pending::{map_unit, Completion};
    use ale_analysis_api::{AnalysisConfig, FileEvent, FileEventKind, SourceFile};
    use std::sync::Arc;

    fn pending(command: Command) -> (PendingOperation, Completion<()>) {
        let (completion, completer) = Completion::new(map_unit);
        (
            PendingOperation {
                seq: 0,
                command,
                token: CancelToken::new(),
                completer,
            },
            completion,
        )
    }

    fn analysis_for(scope: Option<&str>) -> Command {
        Command::RunAnalysis {
            scope: scope.map(ScopeId::new),
            config: AnalysisConfig::builder().build(),
            sink: Arc::new(|_| {}),
            progress: None,
        }
    }

    #[tokio::test]
    async fn push_take_is_fifo() {
        let queue = CommandQueue::new();

        let (op_a, _ha) = pending(analysis_for(Some("m1")));
        let (op_b, _hb) = pending(Command::UnregisterScope {
            id: ScopeId::new("m1"),
        });

        assert_eq!(queue.push(op_a), 0);
        assert_eq!(queue.push(op_b), 1);

        assert_eq!(queue.take().await.seq, 0);
        assert_eq!(queue.take().await.seq, 1);
    }

    #[tokio::test]
    async fn take_waits_for_push() {
        let queue = Arc::new(CommandQueue::new());

        let taker = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.take().await.seq })
        };

        tokio::task::yield_now().await;
        let (op, _handle) = pending(analysis_for(None));
        queue.push(op);

        assert_eq!(taker.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancel_scope_marks_without_removing() {
        let queue = CommandQueue::new();

        let (targeted, _h1) = pending(analysis_for(Some("m2")));
        let targeted_token = targeted.token.clone();
        let (other, _h2) = pending(analysis_for(Some("m3")));
        let other_token = other.token.clone();
        let (event, _h3) = pending(Command::NotifyFileEvent {
            id: ScopeId::new("m2"),
            event: FileEvent::new(FileEventKind::Created, SourceFile::new("a.py", "")),
        });

        queue.push(targeted);
        queue.push(other);
        queue.push(event);

        assert_eq!(queue.cancel_scope(&ScopeId::new("m2")), 2);
        assert!(targeted_token.is_cancelled());
        assert!(!other_token.is_cancelled());
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn cancel_callbacks_run_outside_the_queue_lock() {
        let queue = Arc::new(CommandQueue::new());
        let (doomed, _handle) = pending(analysis_for(Some("m2")));
        let token = doomed.token.clone();
        queue.push(doomed);

        // a callback pushing to the same queue deadlocks if cancel_scope
        // still holds the queue mutex while cancelling
        let reentrant = Arc::clone(&queue);
        token.on_cancel(move || {
            let (op, _handle) = pending(analysis_for(None));
            reentrant.push(op);
        });

        assert_eq!(queue.cancel_scope(&ScopeId::new("m2")), 1);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn remove_analyses_keeps_other_commands() {
        let queue = CommandQueue::new();

        let (analysis, _h1) = pending(analysis_for(Some("m1")));
        let (register, _h2) = pending(Command::UnregisterScope {
            id: ScopeId::new("m1"),
        });

        queue.push(analysis);
        queue.push(register);

        let removed = queue.remove_analyses();
        assert_eq!(removed.len(), 1);
        assert_eq!(queue.len(), 1);
        assert!(matches!(
            queue.take().await.command,
            Command::UnregisterScope { .. }
        ));
    }
}
