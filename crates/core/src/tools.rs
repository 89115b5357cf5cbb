//! The studio's tool catalogue.
//!
//! Every tool the model may call is a variant of [`StudioTool`]. Raw calls are decoded
//! here, at the boundary, so the rest of the crate only sees typed arguments. List
//! arguments are validated element by element and bad entries are dropped.

use gemini_live::{ToolCall, ToolError, filter_valid, types::FunctionDeclaration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

pub const TRACK_AND_HIGHLIGHT: &str = "track_and_highlight";
pub const RENDER_VISUAL: &str = "render_visual";
pub const AMBIENT_AUDIO: &str = "ambient_audio";
pub const DEFINE_WORLD_RULE: &str = "define_world_rule";
pub const SEGMENT_STORY: &str = "segment_story";
pub const CLEAR_DIAGRAM: &str = "clear_diagram";
pub const ADD_NODE: &str = "add_node";
pub const ADD_EDGE: &str = "add_edge";
pub const DELETE_NODE: &str = "delete_node";
pub const UPDATE_NODE: &str = "update_node";
pub const REMOVE_EDGE: &str = "remove_edge";

pub const ALL_TOOLS: &[&str] = &[
    TRACK_AND_HIGHLIGHT,
    RENDER_VISUAL,
    AMBIENT_AUDIO,
    DEFINE_WORLD_RULE,
    SEGMENT_STORY,
    CLEAR_DIAGRAM,
    ADD_NODE,
    ADD_EDGE,
    DELETE_NODE,
    UPDATE_NODE,
    REMOVE_EDGE,
];

// --- Argument types ---

/// One object to circle, given by its center on a 0-1000 grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightTarget {
    /// Short human-readable label, e.g. 'Coffee Cup'.
    #[serde(default = "default_label")]
    pub label: String,
    /// Center X on a 0-1000 normalized grid.
    pub center_x: f64,
    /// Center Y on a 0-1000 normalized grid.
    pub center_y: f64,
    /// Approximate size of the visible object on the same grid. Keep it tight.
    pub render_scale: f64,
}

fn default_label() -> String {
    "Detected Object".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct TrackAndHighlightArgs {
    /// Every object to highlight. Pass several at once instead of calling repeatedly.
    pub objects: Vec<HighlightTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    StillImage,
    Cinemagraph,
    Diagram,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct RenderVisualArgs {
    /// Exactly one of STILL_IMAGE, CINEMAGRAPH or DIAGRAM.
    pub asset_type: AssetType,
    /// What to draw, described precisely. Only use elements the user introduced.
    pub subject: String,
    /// Style and mood from the user's brief, e.g. 'murky blue, bioluminescent'.
    pub visual_context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AudioPreset {
    Ominous,
    Airy,
    Tech,
    Nature,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct AmbientAudioArgs {
    /// One of the listed presets, exactly.
    pub preset: AudioPreset,
    /// The soundscape, e.g. 'low thrum of engines, distant whale song'.
    pub vibe_description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct DefineWorldRuleArgs {
    /// Short name, e.g. 'Low Gravity'.
    pub rule_name: String,
    pub description: String,
    /// How the rule affects the user or the story.
    pub consequence: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct SegmentStoryArgs {
    /// The chapter title to display, short and dramatic.
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct AddNodeArgs {
    /// Unique id, e.g. 'web-server-1'.
    pub id: String,
    /// One of: server, database, cloud, internet, mobile, laptop, compute, storage, network.
    #[serde(rename = "type", default = "default_node_kind")]
    pub kind: String,
    /// Human-readable label, e.g. 'API Gateway'.
    pub label: String,
    /// Horizontal position. Keep nodes at least 250 units apart.
    #[serde(default)]
    pub x: f64,
    /// Vertical position: 0 internet, 150 gateway, 300 application, 450 database.
    #[serde(default)]
    pub y: f64,
}

fn default_node_kind() -> String {
    "server".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct AddEdgeArgs {
    /// Unique id, e.g. 'edge-web-db'.
    pub id: String,
    /// Id of the source node.
    pub source: String,
    /// Id of the target node.
    pub target: String,
    /// Optional text on the arrow, e.g. 'HTTPS'.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct NodeIdArgs {
    /// Id of the existing node.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct EdgeIdArgs {
    /// Id of the existing edge.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct UpdateNodeArgs {
    /// Id of the node to change.
    pub id: String,
    /// New label. Leave out to keep the current one.
    #[serde(default)]
    pub label: Option<String>,
    /// New horizontal position. Leave out to keep the current one.
    #[serde(default)]
    pub x: Option<f64>,
    /// New vertical position. Leave out to keep the current one.
    #[serde(default)]
    pub y: Option<f64>,
}

// --- Decoding ---

#[derive(Debug, Clone, PartialEq)]
pub enum StudioTool {
    TrackAndHighlight(Vec<HighlightTarget>),
    RenderVisual(RenderVisualArgs),
    AmbientAudio(AmbientAudioArgs),
    DefineWorldRule(DefineWorldRuleArgs),
    SegmentStory(SegmentStoryArgs),
    ClearDiagram,
    AddNode(AddNodeArgs),
    AddEdge(AddEdgeArgs),
    DeleteNode(NodeIdArgs),
    UpdateNode(UpdateNodeArgs),
    RemoveEdge(EdgeIdArgs),
}

impl StudioTool {
    /// Decodes one call. Returns `Ok(None)` for names outside the catalogue.
    pub fn decode(call: &ToolCall) -> Result<Option<Self>, ToolError> {
        let tool = match call.name.as_str() {
            TRACK_AND_HIGHLIGHT => Self::TrackAndHighlight(highlight_targets(&call.args)),
            RENDER_VISUAL => Self::RenderVisual(parse(call)?),
            AMBIENT_AUDIO => Self::AmbientAudio(parse(call)?),
            DEFINE_WORLD_RULE => Self::DefineWorldRule(parse(call)?),
            SEGMENT_STORY => Self::SegmentStory(parse(call)?),
            CLEAR_DIAGRAM => Self::ClearDiagram,
            ADD_NODE => Self::AddNode(parse(call)?),
            ADD_EDGE => Self::AddEdge(parse(call)?),
            DELETE_NODE => Self::DeleteNode(parse(call)?),
            UPDATE_NODE => Self::UpdateNode(parse(call)?),
            REMOVE_EDGE => Self::RemoveEdge(parse(call)?),
            _ => return Ok(None),
        };
        Ok(Some(tool))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackAndHighlight(_) => TRACK_AND_HIGHLIGHT,
            Self::RenderVisual(_) => RENDER_VISUAL,
            Self::AmbientAudio(_) => AMBIENT_AUDIO,
            Self::DefineWorldRule(_) => DEFINE_WORLD_RULE,
            Self::SegmentStory(_) => SEGMENT_STORY,
            Self::ClearDiagram => CLEAR_DIAGRAM,
            Self::AddNode(_) => ADD_NODE,
            Self::AddEdge(_) => ADD_EDGE,
            Self::DeleteNode(_) => DELETE_NODE,
            Self::UpdateNode(_) => UPDATE_NODE,
            Self::RemoveEdge(_) => REMOVE_EDGE,
        }
    }
}

/// Accepts either `{ "objects": [..] }` or a single flat target.
fn highlight_targets(args: &Map<String, Value>) -> Vec<HighlightTarget> {
    match args.get("objects") {
        Some(Value::Array(objects)) => filter_valid(objects),
        Some(_) => Vec::new(),
        None => filter_valid(&[Value::Object(args.clone())]),
    }
}

fn parse<T: DeserializeOwned>(call: &ToolCall) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(call.args.clone())).map_err(|e| {
        ToolError::InvalidArguments {
            tool: call.name.clone(),
            reason: e.to_string(),
        }
    })
}

// --- Declarations ---

fn schema<T: JsonSchema>() -> Value {
    let mut value = schemars::schema_for!(T).to_value();
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

/// Declaration for one catalogue entry, `None` for unknown names.
pub fn declaration(name: &str) -> Option<FunctionDeclaration> {
    let (description, parameters) = match name {
        TRACK_AND_HIGHLIGHT => (
            "Required for spatial awareness. Find the center point of each requested object and \
             return normalized coordinates (0-1000) plus a tight render_scale for its size.",
            Some(schema::<TrackAndHighlightArgs>()),
        ),
        RENDER_VISUAL => (
            "Orders a visual asset matching the current theme. Use it for key story moments.",
            Some(schema::<RenderVisualArgs>()),
        ),
        AMBIENT_AUDIO => (
            "Sets the sonic mood from the user's input or the story's progress.",
            Some(schema::<AmbientAudioArgs>()),
        ),
        DEFINE_WORLD_RULE => (
            "Fixes a law of physics or logic for the rest of the session.",
            Some(schema::<DefineWorldRuleArgs>()),
        ),
        SEGMENT_STORY => (
            "Starts a new chapter when an arc ends or the topic changes significantly.",
            Some(schema::<SegmentStoryArgs>()),
        ),
        CLEAR_DIAGRAM => (
            "Clears the architecture diagram. Use before starting a fresh design.",
            None,
        ),
        ADD_NODE => (
            "Adds a component (server, database, cloud, ...) to the architecture diagram.",
            Some(schema::<AddNodeArgs>()),
        ),
        ADD_EDGE => (
            "Connects two nodes in the diagram.",
            Some(schema::<AddEdgeArgs>()),
        ),
        DELETE_NODE => (
            "Deletes a node and every edge attached to it.",
            Some(schema::<NodeIdArgs>()),
        ),
        UPDATE_NODE => (
            "Moves or renames an existing node.",
            Some(schema::<UpdateNodeArgs>()),
        ),
        REMOVE_EDGE => (
            "Removes one edge without touching its nodes.",
            Some(schema::<EdgeIdArgs>()),
        ),
        _ => return None,
    };
    Some(FunctionDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters_json_schema: parameters,
    })
}

pub fn declarations(names: &[&str]) -> Vec<FunctionDeclaration> {
    names.iter().filter_map(|name| declaration(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: "id-1".into(),
            name: name.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_highlight_keeps_only_valid_objects() {
        let tool = StudioTool::decode(&call(
            TRACK_AND_HIGHLIGHT,
            json!({ "objects": [
                { "label": "Mug", "center_x": 500, "center_y": 400, "render_scale": 120 },
                { "label": "Missing center" },
                { "label": "Lamp", "center_x": "far left", "center_y": 10, "render_scale": 5 },
                42,
                { "center_x": 100, "center_y": 100, "render_scale": 50 }
            ]}),
        ))
        .unwrap()
        .unwrap();

        match tool {
            StudioTool::TrackAndHighlight(targets) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[0].label, "Mug");
                assert_eq!(targets[1].label, "Detected Object");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_highlight_accepts_flat_object() {
        let tool = StudioTool::decode(&call(
            TRACK_AND_HIGHLIGHT,
            json!({ "label": "Cup", "center_x": 10.5, "center_y": 20, "render_scale": 30 }),
        ))
        .unwrap();
        assert!(matches!(tool, Some(StudioTool::TrackAndHighlight(t)) if t.len() == 1));
    }

    #[test]
    fn test_unknown_tool_decodes_to_none() {
        assert_eq!(StudioTool::decode(&call("juggle", json!({}))).unwrap(), None);
    }

    #[test]
    fn test_invalid_enum_value_is_rejected() {
        let err = StudioTool::decode(&call(
            RENDER_VISUAL,
            json!({ "asset_type": "OIL_PAINTING", "subject": "x", "visual_context": "y" }),
        ))
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool, .. } if tool == RENDER_VISUAL));
    }

    #[test]
    fn test_add_node_defaults() {
        let tool = StudioTool::decode(&call(ADD_NODE, json!({ "id": "a", "label": "A" })))
            .unwrap()
            .unwrap();
        match tool {
            StudioTool::AddNode(args) => {
                assert_eq!(args.kind, "server");
                assert_eq!((args.x, args.y), (0.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_declarations_carry_object_schemas() {
        for name in ALL_TOOLS {
            let declaration = declaration(name).unwrap();
            assert_eq!(declaration.name, *name);
            if let Some(schema) = declaration.parameters_json_schema {
                assert_eq!(schema["type"], "object");
                assert!(schema.get("$schema").is_none());
            }
        }
        let add_node = declaration(ADD_NODE).unwrap().parameters_json_schema.unwrap();
        assert!(add_node["properties"].get("type").is_some());
        assert!(declaration("nope").is_none());
    }
}
