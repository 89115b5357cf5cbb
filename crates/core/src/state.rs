//! Studio state and the tool handler that feeds it.

use crate::{
    diagram::Diagram,
    highlight::{HighlightLifetime, Highlights},
    modes::Mode,
    story::StoryStream,
    tools::StudioTool,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gemini_live::{Reply, ToolCall, ToolError, ToolHandler};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Everything the model has drawn, said or set up during a session.
#[derive(Debug, Clone, Serialize)]
pub struct StudioState {
    pub mode: Mode,
    pub highlights: Highlights,
    pub diagram: Diagram,
    pub story: StoryStream,
    /// Plain running transcript for the modes without a story stream.
    pub transcript: String,
}

impl StudioState {
    pub fn new(mode: Mode, lifetime: HighlightLifetime) -> Self {
        Self {
            mode,
            highlights: Highlights::new(lifetime),
            diagram: Diagram::new(),
            story: StoryStream::new(),
            transcript: String::new(),
        }
    }

    /// Applies one decoded tool call. Returns `false` when it changed nothing.
    pub fn apply(&mut self, tool: &StudioTool, now: DateTime<Utc>) -> bool {
        match tool {
            StudioTool::TrackAndHighlight(targets) => {
                self.highlights.prune(now);
                self.highlights.extend(targets, now) > 0
            }
            StudioTool::RenderVisual(args) => {
                self.story.request_visual(args, now);
                true
            }
            StudioTool::AmbientAudio(args) => {
                self.story.push_audio(args, now);
                true
            }
            StudioTool::DefineWorldRule(args) => {
                self.story.push_rule(args, now);
                true
            }
            StudioTool::SegmentStory(args) => {
                self.story.push_chapter(&args.title, now);
                true
            }
            StudioTool::ClearDiagram => {
                self.diagram.clear();
                true
            }
            StudioTool::AddNode(args) => self.diagram.add_node(args),
            StudioTool::AddEdge(args) => self.diagram.add_edge(args),
            StudioTool::DeleteNode(args) => self.diagram.delete_node(&args.id),
            StudioTool::UpdateNode(args) => self.diagram.update_node(args),
            StudioTool::RemoveEdge(args) => self.diagram.remove_edge(&args.id),
        }
    }

    /// Folds finalized model speech into the view of the current mode.
    pub fn push_transcript(&mut self, text: &str, now: DateTime<Utc>) {
        match self.mode {
            Mode::Storyteller => self.story.push_transcript(text, now),
            // Tool invocations occasionally leak into the spoken transcript.
            Mode::ItArchitecture if text.contains("call:") => {}
            _ => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                if !self.transcript.is_empty() {
                    self.transcript.push(' ');
                }
                self.transcript.push_str(text);
            }
        }
    }
}

/// Answers every studio tool by updating the shared [`StudioState`].
pub struct StudioToolHandler {
    /// Shared studio state protected by an async mutex for concurrent access.
    pub state: Arc<tokio::sync::Mutex<StudioState>>,
    /// Optional channel for broadcasting state snapshots to subscribers.
    pub state_tx: Option<mpsc::Sender<StudioState>>,
}

impl StudioToolHandler {
    pub fn new(
        state: Arc<tokio::sync::Mutex<StudioState>>,
        state_tx: Option<mpsc::Sender<StudioState>>,
    ) -> Self {
        Self { state, state_tx }
    }
}

#[async_trait]
impl ToolHandler for StudioToolHandler {
    async fn handle(&self, call: ToolCall) -> Result<Reply, ToolError> {
        info!(tool = %call.name, id = %call.id, "Executing tool");
        let tool = match StudioTool::decode(&call) {
            Ok(Some(tool)) => tool,
            Ok(None) => return Err(ToolError::Failed(format!("Unknown tool '{}'", call.name))),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Rejecting tool call");
                return Ok(Reply::Respond(json!({ "error": e.to_string() })));
            }
        };

        let now = Utc::now();
        let mut state = self.state.lock().await;
        if !state.apply(&tool, now) {
            info!(tool = %call.name, "Tool call changed nothing");
        }

        if let Some(tx) = &self.state_tx {
            if tx.send(state.clone()).await.is_err() {
                warn!("Failed to broadcast state update: receiver dropped.");
            }
        }

        Ok(Reply::Respond(json!({
            "output": { "status": "updated", "timestamp": now.timestamp_millis() }
        })))
    }
}
