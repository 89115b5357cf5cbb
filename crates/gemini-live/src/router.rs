//! Routes tool calls from the model to registered handlers.
//!
//! Handlers run as their own tasks so a slow one never stalls the inbound stream.
//! Whether a call gets answered is up to the handler; when it does, the response
//! always carries the id of the call that triggered it.

use crate::{event::LiveEvent, error::ErrorKind, outbound::OutboundHandle};
use async_trait::async_trait;
use gemini_live_types::{FunctionCall, FunctionResponse};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::mpsc, task::AbortHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

impl From<FunctionCall> for ToolCall {
    fn from(call: FunctionCall) -> Self {
        Self {
            id: call.id,
            name: call.name,
            args: call.args,
        }
    }
}

/// What a handler wants sent back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Respond(Value),
    Silent,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("{0}")]
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, call: ToolCall) -> Result<Reply, ToolError>;
}

pub struct ToolRouter {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    in_flight: HashMap<String, AbortHandle>,
}

impl Default for ToolRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Registers one handler under several tool names.
    pub fn register_all<I, S>(&mut self, names: I, handler: Arc<dyn ToolHandler>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.register(name, handler.clone());
        }
    }

    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.values().filter(|h| !h.is_finished()).count()
    }

    /// Starts the matching handler and returns immediately. Unknown names are ignored.
    pub fn dispatch(
        &mut self,
        call: ToolCall,
        outbound: OutboundHandle,
        events: mpsc::UnboundedSender<LiveEvent>,
    ) -> bool {
        self.in_flight.retain(|_, handle| !handle.is_finished());

        let Some(handler) = self.handlers.get(&call.name).cloned() else {
            debug!(tool = %call.name, "No handler registered, ignoring tool call");
            return false;
        };

        let id = call.id.clone();
        let task = tokio::spawn(async move {
            let name = call.name.clone();
            let call_id = call.id.clone();
            match handler.handle(call).await {
                Ok(Reply::Respond(response)) => {
                    let sent = outbound.send_tool_response(FunctionResponse {
                        id: call_id.clone(),
                        name: name.clone(),
                        response,
                    })
                    .await;
                    if !sent {
                        debug!(tool = %name, id = %call_id, "Session closed, tool response not sent");
                    }
                }
                Ok(Reply::Silent) => {}
                Err(e) => {
                    warn!(tool = %name, id = %call_id, error = %e, "Tool handler failed");
                    let _ = events.send(LiveEvent::Error {
                        kind: ErrorKind::ToolDispatchError,
                        message: e.to_string(),
                    });
                }
            }
        });
        if !id.is_empty() {
            self.in_flight.insert(id, task.abort_handle());
        }
        true
    }

    /// Aborts still-running handlers for the given call ids.
    pub fn cancel(&mut self, ids: &[String]) {
        for id in ids {
            if let Some(handle) = self.in_flight.remove(id) {
                handle.abort();
                info!(id = %id, "Tool call cancelled");
            }
        }
    }
}

/// Decodes each element on its own and keeps only the ones that fit `T`.
pub fn filter_valid<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(valid) => Some(valid),
            Err(e) => {
                debug!(error = %e, "Dropping invalid tool argument entry");
                None
            }
        })
        .collect()
}
