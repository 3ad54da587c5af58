//! Ordered command pump
//!
//! Every profiling command goes through one queue drained by a single task,
//! so commands reach the inspector in the order the coordinator issued them
//! even though the callers that issue them run concurrently.

use crate::error::{CoordinatorError, Result};
use cdp_types::CdpError;
use inspector_session::InspectorSession;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

struct Command {
    method: &'static str,
    params: Option<Value>,
    reply: Option<oneshot::Sender<std::result::Result<Value, CdpError>>>,
}

/// Sender side of the command pump
#[derive(Clone)]
pub(crate) struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandQueue {
    /// Spawn the pump on `runtime`; it runs until every queue handle is dropped
    pub(crate) fn spawn(inspector: Arc<dyn InspectorSession>, runtime: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        runtime.spawn(async move {
            while let Some(command) = rx.recv().await {
                debug!("Posting {}", command.method);
                let result = inspector.post(command.method, command.params).await;
                match command.reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("Inspector command {} failed: {}", command.method, e);
                        }
                    }
                }
            }
            debug!("Command pump stopped");
        });

        Self { tx }
    }

    /// Enqueue a command whose result nobody waits for
    pub(crate) fn post(&self, method: &'static str, params: Option<Value>) {
        let command = Command {
            method,
            params,
            reply: None,
        };
        if self.tx.send(command).is_err() {
            warn!("Command pump gone, dropping {}", method);
        }
    }

    /// Enqueue a command now and return a future resolving to its result
    pub(crate) fn request(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let queued = self
            .tx
            .send(Command {
                method,
                params,
                reply: Some(reply),
            })
            .is_ok();

        async move {
            if !queued {
                return Err(CoordinatorError::ProfilerNotAvailable);
            }
            match rx.await {
                Ok(result) => result.map_err(CoordinatorError::from),
                Err(_) => Err(CoordinatorError::ProfilerNotAvailable),
            }
        }
    }
}
