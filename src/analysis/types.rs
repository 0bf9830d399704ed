use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detected exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    PushUp,
    SitUp,
    Jump,
    Unknown,
}

impl ExerciseType {
    /// Types a rep counter exists for
    pub const COUNTABLE: [ExerciseType; 3] =
        [ExerciseType::PushUp, ExerciseType::SitUp, ExerciseType::Jump];

    pub fn name(&self) -> &'static str {
        match self {
            ExerciseType::PushUp => "Push-up",
            ExerciseType::SitUp => "Sit-up",
            ExerciseType::Jump => "Jump",
            ExerciseType::Unknown => "Unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExerciseType::PushUp => "Push-up counting and form analysis",
            ExerciseType::SitUp => "Sit-up counting and form analysis",
            ExerciseType::Jump => "Jump counting and form analysis",
            ExerciseType::Unknown => "No recognised exercise",
        }
    }
}

/// Supported exercises with their descriptions
pub fn supported_exercises() -> Vec<(ExerciseType, &'static str)> {
    ExerciseType::COUNTABLE
        .iter()
        .map(|&ty| (ty, ty.description()))
        .collect()
}

/// Rep counter phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Extended / lying / grounded
    #[default]
    Primary,
    /// Contracted / sat up / airborne
    Secondary,
}

impl Phase {
    pub fn label(&self, exercise: ExerciseType) -> &'static str {
        match (exercise, self) {
            (ExerciseType::Jump, Phase::Primary) => "ground",
            (ExerciseType::Jump, Phase::Secondary) => "air",
            (ExerciseType::SitUp, Phase::Primary) => "lying",
            (ExerciseType::SitUp, Phase::Secondary) => "up",
            (_, Phase::Primary) => "up",
            (_, Phase::Secondary) => "down",
        }
    }
}

/// Per-frame analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_index: u64,
    pub exercise: Option<ExerciseType>,
    pub count: u32,
    pub feedback: String,
    pub pose_detected: bool,
}

/// Aggregate over a whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub total_frames: u64,
    pub final_counts: BTreeMap<ExerciseType, u32>,
    /// Most recent frame results, oldest first
    pub frame_trace: Vec<FrameResult>,
    pub dominant_exercise: Option<ExerciseType>,
    /// 0–100
    pub form_score: u8,
    /// 0–100
    pub pose_detection_rate: f32,
}

impl SessionResult {
    pub fn count(&self, exercise: ExerciseType) -> u32 {
        self.final_counts.get(&exercise).copied().unwrap_or(0)
    }
}
