//! Musical context model
//!
//! Planning and scene-analysis metadata the server sends alongside the audio
//! stream. Two wire shapes are accepted and normalized into [`MusicalContext`]:
//!
//! - the `session_data` envelope:
//!   `{"type": "session_data", "data": {"master_plan": {...}, "scene_analysis": [...]}}`
//! - the legacy flat shape: `{"global_context": ..., "musical_blocks": [...]}`
//!
//! Every field is optional on the wire; missing values fall back to empty
//! defaults so a partially filled plan still reaches the UI.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn open_end() -> f64 {
    f64::INFINITY
}

/// Half-open `[start, end)` range on the media timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: f64,

    /// Missing end means the range runs to the end of the content
    #[serde(default = "open_end")]
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// True when `time` falls inside `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: open_end(),
        }
    }
}

/// Generation parameters the server used for one musical block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Server-planned segment of generated music
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicalBlock {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub musical_direction: String,
    #[serde(default)]
    pub transition: String,

    /// Older servers name this `lyria_config`
    #[serde(default, alias = "lyria_config")]
    pub generation_config: GenerationConfig,
}

/// Scene analysis entry for a stretch of the video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSegment {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Normalized musical context for one session
///
/// Replaced wholesale on every update; consumers only ever read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicalContext {
    pub global_context: String,
    pub musical_blocks: Vec<MusicalBlock>,
    pub scene_analysis: Vec<SceneSegment>,
}

#[derive(Debug, Default, Deserialize)]
struct MasterPlan {
    #[serde(default)]
    global_context: String,
    #[serde(default)]
    musical_blocks: Vec<MusicalBlock>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(default)]
    master_plan: MasterPlan,
    #[serde(default)]
    scene_analysis: Vec<SceneSegment>,
}

#[derive(Debug, Deserialize)]
struct LegacyContext {
    #[serde(default)]
    global_context: String,
    #[serde(default)]
    musical_blocks: Vec<MusicalBlock>,
    #[serde(default)]
    scene_analysis: Vec<SceneSegment>,
}

impl MusicalContext {
    /// Build from the `data` member of a `session_data` envelope
    pub fn from_session_data(data: serde_json::Value) -> Result<Self> {
        let data: SessionData = serde_json::from_value(data)
            .map_err(|e| Error::Protocol(format!("invalid session_data payload: {}", e)))?;

        Ok(Self {
            global_context: data.master_plan.global_context,
            musical_blocks: data.master_plan.musical_blocks,
            scene_analysis: data.scene_analysis,
        })
    }

    /// Build from the legacy flat shape
    pub fn from_legacy(value: serde_json::Value) -> Result<Self> {
        let legacy: LegacyContext = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("invalid legacy context: {}", e)))?;

        Ok(Self {
            global_context: legacy.global_context,
            musical_blocks: legacy.musical_blocks,
            scene_analysis: legacy.scene_analysis,
        })
    }

    /// Musical block playing at `media_time`, if any
    pub fn active_block(&self, media_time: f64) -> Option<&MusicalBlock> {
        self.musical_blocks
            .iter()
            .find(|block| block.time_range.contains(media_time))
    }

    /// Scene covering `media_time`, if any
    pub fn active_scene(&self, media_time: f64) -> Option<&SceneSegment> {
        self.scene_analysis
            .iter()
            .find(|scene| scene.time_range.contains(media_time))
    }
}
