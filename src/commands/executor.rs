//! Command Executor
//!
//! A single task owns the [`CommandHandler`] (and so the store). Sessions
//! send it whole batches of decoded commands over a bounded channel and
//! wait for the replies on a oneshot.
//!
//! ```text
//!  session A ──┐                       ┌──────────────────────┐
//!  session B ──┼── mpsc<Batch> ──────> │  executor task       │
//!  session C ──┘                       │  CommandHandler      │
//!        ▲                             │   └─ StorageEngine   │
//!        └──────── oneshot<replies> ── └──────────────────────┘
//! ```
//!
//! A batch runs from start to finish without yielding, so commands from
//! different connections never interleave inside one batch and the store
//! needs no locks.

use crate::commands::CommandHandler;
use crate::protocol::{Command, RespValue};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Default capacity of the batch queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// The executor task is gone; no further commands can run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("command executor has shut down")]
pub struct ExecutorClosed;

/// One session's worth of commands and the channel to answer on.
#[derive(Debug)]
struct Batch {
    commands: Vec<Command>,
    reply_tx: oneshot::Sender<Vec<RespValue>>,
}

/// Cloneable handle used by sessions to submit work.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<Batch>,
}

impl ExecutorHandle {
    /// Runs `commands` in order and returns one reply per command.
    pub async fn execute_batch(
        &self,
        commands: Vec<Command>,
    ) -> Result<Vec<RespValue>, ExecutorClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Batch { commands, reply_tx })
            .await
            .map_err(|_| ExecutorClosed)?;
        reply_rx.await.map_err(|_| ExecutorClosed)
    }

    /// Runs a single command.
    pub async fn execute(&self, command: Command) -> Result<RespValue, ExecutorClosed> {
        let replies = self.execute_batch(vec![command]).await?;
        debug_assert_eq!(replies.len(), 1, "executor must reply once per command");
        // `run` answers every command it receives.
        replies.into_iter().next().ok_or(ExecutorClosed)
    }
}

/// Starts the executor task.
///
/// The task stops once every [`ExecutorHandle`] has been dropped and hands
/// the handler back through the returned `JoinHandle`.
pub fn spawn_executor(
    handler: CommandHandler,
    queue_depth: usize,
) -> (ExecutorHandle, JoinHandle<CommandHandler>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(run(handler, rx));
    (ExecutorHandle { tx }, task)
}

async fn run(mut handler: CommandHandler, mut rx: mpsc::Receiver<Batch>) -> CommandHandler {
    info!("Command executor started");

    while let Some(Batch { commands, reply_tx }) = rx.recv().await {
        trace!(commands = commands.len(), "Executing batch");

        let replies: Vec<RespValue> = commands
            .iter()
            .map(|command| handler.execute(command))
            .collect();

        // The session may have gone away while waiting; its replies are dropped.
        if reply_tx.send(replies).is_err() {
            debug!("Batch requester went away before the reply");
        }
    }

    let stats = handler.storage().stats();
    info!(keys = stats.keys, expired = stats.expired, "Command executor stopped");
    handler
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use bytes::Bytes;

    fn make_command(args: &[&str]) -> Command {
        args.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[tokio::test]
    async fn test_batch_replies_in_order() {
        let (executor, _task) = spawn_executor(CommandHandler::default(), 8);

        let replies = executor
            .execute_batch(vec![
                make_command(&["SET", "foo", "bar"]),
                make_command(&["GET", "foo"]),
                make_command(&["INCR", "counter"]),
                make_command(&["INCR", "counter"]),
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                RespValue::ok(),
                RespValue::bulk_string("bar"),
                RespValue::integer(1),
                RespValue::integer(2),
            ]
        );
    }

    #[tokio::test]
    async fn test_handles_share_one_store() {
        let (executor, task) = spawn_executor(CommandHandler::new(StorageEngine::new()), 8);
        let other = executor.clone();

        executor
            .execute(make_command(&["RPUSH", "l", "a"]))
            .await
            .unwrap();
        let reply = other
            .execute(make_command(&["RPUSH", "l", "b"]))
            .await
            .unwrap();
        assert_eq!(reply, RespValue::integer(2));

        drop(executor);
        drop(other);

        let handler = task.await.unwrap();
        assert_eq!(handler.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (executor, _task) = spawn_executor(CommandHandler::default(), 4);

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let executor = executor.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    executor
                        .execute(make_command(&["INCR", "n"]))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let reply = executor.execute(make_command(&["GET", "n"])).await.unwrap();
        assert_eq!(reply, RespValue::bulk_string("500"));
    }

    #[tokio::test]
    async fn test_execute_returns_the_commands_own_reply() {
        let (executor, _task) = spawn_executor(CommandHandler::default(), 8);

        let reply = executor
            .execute(make_command(&["LPOP", "missing"]))
            .await
            .unwrap();
        assert_eq!(reply, RespValue::null());

        let reply = executor.execute(make_command(&["NOPE"])).await.unwrap();
        assert_eq!(reply, RespValue::error("ERR unknown command 'NOPE'"));
    }

    #[tokio::test]
    async fn test_batch_has_one_reply_per_command() {
        let (executor, _task) = spawn_executor(CommandHandler::default(), 8);

        let replies = executor
            .execute_batch(vec![make_command(&["PING"]), make_command(&["GET"])])
            .await
            .unwrap();
        assert_eq!(replies.len(), 2);
        assert!(replies[1].is_error());

        assert!(executor.execute_batch(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_executor() {
        let (executor, task) = spawn_executor(CommandHandler::default(), 1);
        task.abort();
        let _ = task.await;

        let result = executor.execute(make_command(&["PING"])).await;
        assert_eq!(result, Err(ExecutorClosed));
    }
}
