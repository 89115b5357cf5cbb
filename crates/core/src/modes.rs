//! Conversation modes: what the model is told, which tools it gets, and how often it sees
//! the camera.

use crate::tools;
use gemini_live::{VideoCadence, types::Tool};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

const SPATIAL_INSTRUCTION: &str = "\
You are a precise spatial assistant watching a live camera feed.

When the user asks about an object:
1. Locate the CENTER POINT of each requested object on a 0-1000 normalized grid and call \
'track_and_highlight' with it. Add a tight 'render_scale' for the visible size of the object.
2. For several objects, pass them all in one call through the 'objects' list.
3. The camera uses a wide-angle lens. Objects near the left or right edge look stretched, so \
size them slightly larger there.
4. Never read coordinates aloud. Say only which object you are tracking.
5. Ignore background clutter and only mark what was asked for.";

const STORYTELLER_INSTRUCTION: &str = "\
You are a creative director and a master storyteller.

Greet the user and ask for a theme. Prefix everything you say as the director with '[DIRECTOR]'.

Once you have a theme:
1. Acknowledge it briefly as the director.
2. Switch to the story. Prefix every story paragraph with '[NARRATIVE]' and open with the title.
3. Tell exactly three paragraphs: the setting and hero, the conflict, the resolution. End the \
third with '[NARRATIVE] The End.'
4. Return to '[DIRECTOR]' and offer to tell another.

Use 'render_visual' for key moments, 'define_world_rule' for laws of the world and \
'segment_story' when a new chapter begins. Keep director chatter apart from the story.";

const IT_ARCHITECTURE_INSTRUCTION: &str = "\
You are an IT solution architect drawing on a live canvas while you talk.

When the user asks for an architecture:
1. Draw first. Call 'clear_diagram' before a brand new design.
2. Use 'add_node' for components and 'add_edge' for connections.
3. Use 'update_node' to move or rename, 'delete_node' and 'remove_edge' to take things away.
4. Explain your choices while the diagram builds.

Layout: clients and the internet at y=0, gateways at y=150, applications at y=300, data stores \
at y=450. Keep at least 300 units between nodes on the x axis and never stack nodes.

Node types: server, database, cloud, internet, mobile, laptop, compute, storage, network.

If you were interrupted, finish any half-drawn diagram. Never narrate tool calls.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Spatial,
    Storyteller,
    ItArchitecture,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Spatial, Mode::Storyteller, Mode::ItArchitecture];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Spatial => "spatial",
            Mode::Storyteller => "storyteller",
            Mode::ItArchitecture => "it-architecture",
        }
    }

    pub fn system_instruction(&self) -> &'static str {
        match self {
            Mode::Spatial => SPATIAL_INSTRUCTION,
            Mode::Storyteller => STORYTELLER_INSTRUCTION,
            Mode::ItArchitecture => IT_ARCHITECTURE_INSTRUCTION,
        }
    }

    /// Names of the tools offered to the model in this mode.
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            Mode::Spatial => &[tools::TRACK_AND_HIGHLIGHT],
            Mode::Storyteller => &[
                tools::RENDER_VISUAL,
                tools::DEFINE_WORLD_RULE,
                tools::SEGMENT_STORY,
                tools::AMBIENT_AUDIO,
            ],
            Mode::ItArchitecture => &[
                tools::CLEAR_DIAGRAM,
                tools::ADD_NODE,
                tools::ADD_EDGE,
                tools::DELETE_NODE,
                tools::UPDATE_NODE,
                tools::REMOVE_EDGE,
            ],
        }
    }

    pub fn tools(&self) -> Vec<Tool> {
        vec![Tool {
            function_declarations: tools::declarations(self.tool_names()),
        }]
    }

    /// Spatial tracking needs fresher frames than narration. Diagrams need none.
    pub fn video_cadence(&self) -> VideoCadence {
        match self {
            Mode::Spatial => VideoCadence::Every(Duration::from_millis(800)),
            Mode::Storyteller => VideoCadence::Every(Duration::from_millis(1000)),
            Mode::ItArchitecture => VideoCadence::Disabled,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown mode '{0}'. Expected spatial, storyteller or it-architecture.")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "spatial" => Ok(Mode::Spatial),
            "storyteller" | "director" => Ok(Mode::Storyteller),
            "it-architecture" | "architecture" => Ok(Mode::ItArchitecture),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}
