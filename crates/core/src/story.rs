//! The storyteller's running stream: narration, director chatter and the events the
//! director's tools add between paragraphs.

use crate::tools::{AmbientAudioArgs, AssetType, AudioPreset, DefineWorldRuleArgs, RenderVisualArgs};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const NARRATIVE_TAG: &str = "[NARRATIVE]";
const DIRECTOR_TAG: &str = "[DIRECTOR]";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryContent {
    Text {
        content: String,
        /// Narration when true, director chatter otherwise.
        is_story: bool,
    },
    /// A requested visual. Stays pending until a renderer fills it in.
    Image {
        subject: String,
        asset_type: AssetType,
        visual_context: String,
        pending: bool,
    },
    AudioEvent {
        preset: AudioPreset,
        vibe_description: String,
    },
    RuleEvent {
        rule_name: String,
        description: String,
        consequence: String,
    },
    ChapterBreak {
        title: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: StoryContent,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoryStream {
    items: Vec<StoryItem>,
}

impl StoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[StoryItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Folds a piece of model transcript into the stream.
    ///
    /// A `[NARRATIVE]` or `[DIRECTOR]` tag switches the voice; untagged text keeps the
    /// voice of the trailing text item. Text in the same voice as the trailing item is
    /// appended to it, anything else opens a new item.
    pub fn push_transcript(&mut self, text: &str, now: DateTime<Utc>) {
        let trailing_voice = match self.items.last() {
            Some(StoryItem {
                content: StoryContent::Text { is_story, .. },
                ..
            }) => Some(*is_story),
            _ => None,
        };
        let mut is_story = trailing_voice.unwrap_or(false);
        if text.contains(NARRATIVE_TAG) {
            is_story = true;
        }
        if text.contains(DIRECTOR_TAG) {
            is_story = false;
        }
        let clean = text
            .replacen(NARRATIVE_TAG, "", 1)
            .replacen(DIRECTOR_TAG, "", 1);
        let clean = clean.trim_start();

        if trailing_voice == Some(is_story) {
            if let Some(StoryItem {
                content: StoryContent::Text { content, .. },
                updated_at,
                ..
            }) = self.items.last_mut()
            {
                if needs_space(content, clean) {
                    content.push(' ');
                }
                content.push_str(clean);
                *updated_at = now;
                return;
            }
        }

        if clean.is_empty() {
            return;
        }
        self.push(
            StoryContent::Text {
                content: clean.to_string(),
                is_story,
            },
            now,
        );
    }

    /// Adds a pending image placeholder and returns its id.
    pub fn request_visual(&mut self, args: &RenderVisualArgs, now: DateTime<Utc>) -> Uuid {
        self.push(
            StoryContent::Image {
                subject: args.subject.clone(),
                asset_type: args.asset_type,
                visual_context: args.visual_context.clone(),
                pending: true,
            },
            now,
        )
    }

    /// Marks a pending image as rendered. Returns `false` for unknown ids.
    pub fn complete_visual(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(StoryItem {
                content: StoryContent::Image { pending, .. },
                updated_at,
                ..
            }) => {
                *pending = false;
                *updated_at = now;
                true
            }
            _ => false,
        }
    }

    pub fn push_audio(&mut self, args: &AmbientAudioArgs, now: DateTime<Utc>) -> Uuid {
        self.push(
            StoryContent::AudioEvent {
                preset: args.preset,
                vibe_description: args.vibe_description.clone(),
            },
            now,
        )
    }

    pub fn push_rule(&mut self, args: &DefineWorldRuleArgs, now: DateTime<Utc>) -> Uuid {
        self.push(
            StoryContent::RuleEvent {
                rule_name: args.rule_name.clone(),
                description: args.description.clone(),
                consequence: args.consequence.clone(),
            },
            now,
        )
    }

    pub fn push_chapter(&mut self, title: &str, now: DateTime<Utc>) -> Uuid {
        self.push(
            StoryContent::ChapterBreak {
                title: title.trim().to_string(),
            },
            now,
        )
    }

    fn push(&mut self, content: StoryContent, now: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.items.push(StoryItem {
            id,
            content,
            updated_at: now,
        });
        id
    }
}

fn needs_space(existing: &str, next: &str) -> bool {
    !existing.is_empty()
        && !next.is_empty()
        && !existing.ends_with(' ')
        && !next.starts_with([' ', '.', ','])
}
