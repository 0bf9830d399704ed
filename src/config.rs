use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Every threshold the analysis reads. All sections are optional in the
/// TOML file; missing fields take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("using default config ({:#})", e);
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClassifierConfig {
    /// 体幹の傾きがこれ未満なら水平（度）
    #[serde(default = "default_horizontal_body_angle")]
    pub horizontal_body_angle: f32,
    /// 肘角度がこれ未満なら曲がっている（度）
    #[serde(default = "default_bent_elbow_angle")]
    pub bent_elbow_angle: f32,
    /// 体幹の傾きがこれを超えたら垂直（度）
    #[serde(default = "default_vertical_body_angle")]
    pub vertical_body_angle: f32,
    /// 膝角度がこれ未満なら曲がっている（度）
    #[serde(default = "default_bent_knee_angle")]
    pub bent_knee_angle: f32,
    /// 腰高さの平均からの偏差しきい値（正規化座標）
    #[serde(default = "default_hip_motion_delta")]
    pub hip_motion_delta: f32,
    /// 腰高さ平均を取る直前フレーム数
    #[serde(default = "default_hip_window")]
    pub hip_window: usize,
}

fn default_horizontal_body_angle() -> f32 { 30.0 }
fn default_bent_elbow_angle() -> f32 { 120.0 }
fn default_vertical_body_angle() -> f32 { 60.0 }
fn default_bent_knee_angle() -> f32 { 90.0 }
fn default_hip_motion_delta() -> f32 { 0.05 }
fn default_hip_window() -> usize { 5 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            horizontal_body_angle: default_horizontal_body_angle(),
            bent_elbow_angle: default_bent_elbow_angle(),
            vertical_body_angle: default_vertical_body_angle(),
            bent_knee_angle: default_bent_knee_angle(),
            hip_motion_delta: default_hip_motion_delta(),
            hip_window: default_hip_window(),
        }
    }
}

// ---------------------------------------------------------------------------
// Form rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub pushup: PushUpRules,
    #[serde(default)]
    pub situp: SitUpRules,
    #[serde(default)]
    pub jump: JumpRules,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PushUpRules {
    #[serde(default = "default_min_elbow_angle")]
    pub min_elbow_angle: f32,
    #[serde(default = "default_max_elbow_angle")]
    pub max_elbow_angle: f32,
    /// 肩-腰-膝ラインからの許容偏差（度）
    #[serde(default = "default_body_alignment_tolerance")]
    pub body_alignment_tolerance: f32,
}

fn default_min_elbow_angle() -> f32 { 70.0 }
fn default_max_elbow_angle() -> f32 { 175.0 }
fn default_body_alignment_tolerance() -> f32 { 20.0 }

impl Default for PushUpRules {
    fn default() -> Self {
        Self {
            min_elbow_angle: default_min_elbow_angle(),
            max_elbow_angle: default_max_elbow_angle(),
            body_alignment_tolerance: default_body_alignment_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SitUpRules {
    #[serde(default = "default_min_torso_angle")]
    pub min_torso_angle: f32,
    #[serde(default = "default_max_knee_angle")]
    pub max_knee_angle: f32,
}

fn default_min_torso_angle() -> f32 { 30.0 }
fn default_max_knee_angle() -> f32 { 120.0 }

impl Default for SitUpRules {
    fn default() -> Self {
        Self {
            min_torso_angle: default_min_torso_angle(),
            max_knee_angle: default_max_knee_angle(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JumpRules {
    #[serde(default = "default_min_landing_knee_angle")]
    pub min_landing_knee_angle: f32,
    /// 左右足首の高さ差の許容値（正規化座標）
    #[serde(default = "default_landing_symmetry")]
    pub landing_symmetry: f32,
}

fn default_min_landing_knee_angle() -> f32 { 90.0 }
fn default_landing_symmetry() -> f32 { 0.1 }

impl Default for JumpRules {
    fn default() -> Self {
        Self {
            min_landing_knee_angle: default_min_landing_knee_angle(),
            landing_symmetry: default_landing_symmetry(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rep counter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// ジャンプ判定の窓（現フレームを含む）
    #[serde(default = "default_jump_window")]
    pub jump_window: usize,
    #[serde(default = "default_pushup_down")]
    pub pushup_down: f32,
    #[serde(default = "default_pushup_up")]
    pub pushup_up: f32,
    #[serde(default = "default_situp_down")]
    pub situp_down: f32,
    #[serde(default = "default_situp_up")]
    pub situp_up: f32,
    #[serde(default = "default_jump_motion_delta")]
    pub jump_motion_delta: f32,
}

fn default_history_capacity() -> usize { 10 }
fn default_jump_window() -> usize { 5 }
fn default_pushup_down() -> f32 { 90.0 }
fn default_pushup_up() -> f32 { 150.0 }
fn default_situp_down() -> f32 { 60.0 }
fn default_situp_up() -> f32 { 100.0 }
fn default_jump_motion_delta() -> f32 { 0.05 }

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            jump_window: default_jump_window(),
            pushup_down: default_pushup_down(),
            pushup_up: default_pushup_up(),
            situp_down: default_situp_down(),
            situp_up: default_situp_up(),
            jump_motion_delta: default_jump_motion_delta(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session / job / server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionConfig {
    /// 結果に残す直近フレーム数
    #[serde(default = "default_trace_length")]
    pub trace_length: usize,
    /// 違反率がフォームスコアに与える重み
    #[serde(default = "default_violation_penalty")]
    pub violation_penalty: f32,
}

fn default_trace_length() -> usize { 10 }
fn default_violation_penalty() -> f32 { 1.0 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trace_length: default_trace_length(),
            violation_penalty: default_violation_penalty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// 途中経過を公開する間隔（フレーム数）
    #[serde(default = "default_publish_interval")]
    pub publish_interval: u64,
    /// n フレームごとに1フレーム解析
    #[serde(default = "default_frame_stride")]
    pub frame_stride: u64,
}

fn default_channel_capacity() -> usize { 32 }
fn default_publish_interval() -> u64 { 30 }
fn default_frame_stride() -> u64 { 1 }

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            publish_interval: default_publish_interval(),
            frame_stride: default_frame_stride(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
}

fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }
fn default_max_frame_length() -> usize { crate::protocol::DEFAULT_MAX_FRAME_LENGTH }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_frame_length: default_max_frame_length(),
        }
    }
}
