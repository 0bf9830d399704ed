//! Per-exercise form rules.
//!
//! Checks run in a fixed order: the primary range check, then the alignment
//! check. Each failing check contributes one feedback line.

use crate::analysis::geometry::{angle, line_deviation};
use crate::analysis::types::ExerciseType;
use crate::config::RuleConfig;
use crate::pose::{JointIndex, PoseFrame};

pub const GOOD_FORM: &str = "Good form";
pub const INVALID_POSE: &str = "Invalid pose data";

/// Outcome of a form check
#[derive(Debug, Clone, PartialEq)]
pub struct FormVerdict {
    pub valid: bool,
    pub feedback: Vec<String>,
}

impl FormVerdict {
    fn from_violations(violations: Vec<String>) -> Self {
        if violations.is_empty() {
            Self {
                valid: true,
                feedback: vec![GOOD_FORM.to_string()],
            }
        } else {
            Self {
                valid: false,
                feedback: violations,
            }
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            feedback: vec![reason.to_string()],
        }
    }

    /// Feedback lines joined for display
    pub fn message(&self) -> String {
        self.feedback.join("; ")
    }
}

/// Evaluate `frame` against the rule table for `exercise`
pub fn validate(rules: &RuleConfig, exercise: ExerciseType, frame: &PoseFrame) -> FormVerdict {
    let violations = match exercise {
        ExerciseType::PushUp => push_up_violations(rules, frame),
        ExerciseType::SitUp => sit_up_violations(rules, frame),
        ExerciseType::Jump => jump_violations(rules, frame),
        ExerciseType::Unknown => return FormVerdict::rejected("Unsupported exercise"),
    };
    match violations {
        Some(v) => FormVerdict::from_violations(v),
        None => FormVerdict::rejected(INVALID_POSE),
    }
}

fn push_up_violations(rules: &RuleConfig, frame: &PoseFrame) -> Option<Vec<String>> {
    use JointIndex::*;
    let r = &rules.pushup;
    let (shoulder, elbow, wrist) = frame.triple(LeftShoulder, LeftElbow, LeftWrist)?;
    let (_, hip, knee) = frame.triple(LeftShoulder, LeftHip, LeftKnee)?;

    let mut violations = Vec::new();
    let elbow_angle = angle(shoulder, elbow, wrist);
    if elbow_angle < r.min_elbow_angle {
        violations.push("Go lower - increase elbow bend".to_string());
    } else if elbow_angle > r.max_elbow_angle {
        violations.push("Don't fully lock elbows".to_string());
    }

    if line_deviation(shoulder, hip, knee) > r.body_alignment_tolerance {
        violations.push("Keep body straight".to_string());
    }
    Some(violations)
}

fn sit_up_violations(rules: &RuleConfig, frame: &PoseFrame) -> Option<Vec<String>> {
    use JointIndex::*;
    let r = &rules.situp;
    let (shoulder, hip, knee) = frame.triple(LeftShoulder, LeftHip, LeftKnee)?;
    let ankle = frame.get(LeftAnkle)?;

    let mut violations = Vec::new();
    if angle(shoulder, hip, knee) < r.min_torso_angle {
        violations.push("Sit up higher".to_string());
    }
    if angle(hip, knee, ankle) > r.max_knee_angle {
        violations.push("Keep knees more bent".to_string());
    }
    Some(violations)
}

fn jump_violations(rules: &RuleConfig, frame: &PoseFrame) -> Option<Vec<String>> {
    use JointIndex::*;
    let r = &rules.jump;
    let (hip, knee, left_ankle) = frame.triple(LeftHip, LeftKnee, LeftAnkle)?;
    let right_ankle = frame.get(RightAnkle)?;

    let mut violations = Vec::new();
    if angle(hip, knee, left_ankle) < r.min_landing_knee_angle {
        violations.push("Land softly without collapsing the knees".to_string());
    }
    if (left_ankle.y - right_ankle.y).abs() > r.landing_symmetry {
        violations.push("Land evenly on both feet".to_string());
    }
    Some(violations)
}
