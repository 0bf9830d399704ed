//! Heuristic exercise classifier.
//!
//! Rules are tried in a fixed priority order; the first match wins. All
//! thresholds come from [`ClassifierConfig`].

use std::collections::VecDeque;

use crate::analysis::geometry::{angle, inclination};
use crate::analysis::types::ExerciseType;
use crate::config::ClassifierConfig;
use crate::pose::{JointIndex, PoseFrame};

/// Classify one frame given the frames that preceded it (oldest first)
pub fn classify(
    config: &ClassifierConfig,
    frame: Option<&PoseFrame>,
    history: &VecDeque<PoseFrame>,
) -> ExerciseType {
    let Some(pose) = frame.filter(|p| p.has_required_joints()) else {
        return ExerciseType::Unknown;
    };

    if is_push_up_posture(config, pose) {
        ExerciseType::PushUp
    } else if is_sit_up_posture(config, pose) {
        ExerciseType::SitUp
    } else if is_jump_posture(config, pose, history) {
        ExerciseType::Jump
    } else {
        ExerciseType::Unknown
    }
}

/// Torso inclination from horizontal, shoulder→hip on the left side
pub fn body_line_angle(pose: &PoseFrame) -> Option<f32> {
    let shoulder = pose.get(JointIndex::LeftShoulder)?;
    let hip = pose.get(JointIndex::LeftHip)?;
    Some(inclination(shoulder, hip))
}

/// Body horizontal and at least one elbow bent
pub fn is_push_up_posture(config: &ClassifierConfig, pose: &PoseFrame) -> bool {
    use JointIndex::*;
    let Some(body) = body_line_angle(pose) else {
        return false;
    };
    if body >= config.horizontal_body_angle {
        return false;
    }
    [
        (LeftShoulder, LeftElbow, LeftWrist),
        (RightShoulder, RightElbow, RightWrist),
    ]
    .iter()
    .filter_map(|&(s, e, w)| pose.triple(s, e, w))
    .any(|(s, e, w)| angle(s, e, w) < config.bent_elbow_angle)
}

/// Torso upright and knees bent
pub fn is_sit_up_posture(config: &ClassifierConfig, pose: &PoseFrame) -> bool {
    use JointIndex::*;
    let Some(body) = body_line_angle(pose) else {
        return false;
    };
    let Some((hip, knee, ankle)) = pose.triple(LeftHip, LeftKnee, LeftAnkle) else {
        return false;
    };
    body > config.vertical_body_angle && angle(hip, knee, ankle) < config.bent_knee_angle
}

/// Both feet above the knees, or the hip far from its recent mean height
pub fn is_jump_posture(
    config: &ClassifierConfig,
    pose: &PoseFrame,
    history: &VecDeque<PoseFrame>,
) -> bool {
    use JointIndex::*;
    let feet_up = match (
        pose.get(LeftAnkle),
        pose.get(LeftKnee),
        pose.get(RightAnkle),
        pose.get(RightKnee),
    ) {
        // y grows downward
        (Some(la), Some(lk), Some(ra), Some(rk)) => la.y < lk.y && ra.y < rk.y,
        _ => false,
    };
    if feet_up {
        return true;
    }

    match (pose.hip_height(), mean_hip_height(history, config.hip_window)) {
        (Some(current), Some(mean)) => (current - mean).abs() > config.hip_motion_delta,
        _ => false,
    }
}

/// Mean hip height over the last `window` frames; `None` until the window
/// is full or if any frame in it lacks hips
pub fn mean_hip_height<'a, I>(frames: I, window: usize) -> Option<f32>
where
    I: IntoIterator<Item = &'a PoseFrame>,
    I::IntoIter: DoubleEndedIterator,
{
    if window == 0 {
        return None;
    }
    let heights: Option<Vec<f32>> = frames
        .into_iter()
        .rev()
        .take(window)
        .map(PoseFrame::hip_height)
        .collect();
    let heights = heights?;
    if heights.len() < window {
        return None;
    }
    Some(heights.iter().sum::<f32>() / window as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::*;
    use crate::pose::Joint;

    fn classify_alone(pose: &PoseFrame) -> ExerciseType {
        classify(&ClassifierConfig::default(), Some(pose), &VecDeque::new())
    }

    #[test]
    fn test_missing_frame_is_unknown() {
        let config = ClassifierConfig::default();
        assert_eq!(classify(&config, None, &VecDeque::new()), ExerciseType::Unknown);
        let partial = PoseFrame::from_joints(vec![Joint::default(); 25]);
        assert_eq!(classify_alone(&partial), ExerciseType::Unknown);
    }

    #[test]
    fn test_bent_arm_plank_is_push_up() {
        assert_eq!(classify_alone(&push_up_pose(100.0)), ExerciseType::PushUp);
    }

    #[test]
    fn test_straight_arm_plank_is_unknown() {
        assert_eq!(classify_alone(&push_up_pose(170.0)), ExerciseType::Unknown);
    }

    #[test]
    fn test_curled_torso_is_sit_up() {
        assert_eq!(classify_alone(&sit_up_pose(true)), ExerciseType::SitUp);
    }

    #[test]
    fn test_push_up_rule_wins_over_sit_up() {
        // Horizontal body with bent elbows and bent knees matches push-up first
        let mut pose = push_up_pose(90.0);
        set_joint(&mut pose, JointIndex::LeftKnee, 0.65, 0.3);
        assert_eq!(classify_alone(&pose), ExerciseType::PushUp);
    }

    #[test]
    fn test_feet_above_knees_is_jump() {
        // Tuck jump: thighs raised, feet drawn up above the knees
        let mut pose = standing_pose(0.5);
        set_joint(&mut pose, JointIndex::LeftKnee, 0.6, 0.5);
        set_joint(&mut pose, JointIndex::LeftAnkle, 0.65, 0.45);
        set_joint(&mut pose, JointIndex::RightKnee, 0.7, 0.5);
        set_joint(&mut pose, JointIndex::RightAnkle, 0.75, 0.45);
        assert_eq!(classify_alone(&pose), ExerciseType::Jump);

        // One foot up is not enough
        let mut pose = standing_pose(0.5);
        set_joint(&mut pose, JointIndex::LeftKnee, 0.6, 0.5);
        set_joint(&mut pose, JointIndex::LeftAnkle, 0.65, 0.45);
        assert_eq!(classify_alone(&pose), ExerciseType::Unknown);
    }

    #[test]
    fn test_hip_rise_over_window_is_jump() {
        let config = ClassifierConfig::default();
        let history: VecDeque<PoseFrame> = (0..5).map(|_| standing_pose(0.5)).collect();
        assert_eq!(
            classify(&config, Some(&standing_pose(0.5)), &history),
            ExerciseType::Unknown
        );
        assert_eq!(
            classify(&config, Some(&standing_pose(0.4)), &history),
            ExerciseType::Jump
        );
    }

    #[test]
    fn test_hip_rule_needs_full_window() {
        let config = ClassifierConfig::default();
        let history: VecDeque<PoseFrame> = (0..4).map(|_| standing_pose(0.5)).collect();
        assert_eq!(
            classify(&config, Some(&standing_pose(0.3)), &history),
            ExerciseType::Unknown
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let config = ClassifierConfig {
            bent_elbow_angle: 80.0,
            ..ClassifierConfig::default()
        };
        let pose = push_up_pose(100.0);
        assert_eq!(classify(&config, Some(&pose), &VecDeque::new()), ExerciseType::Unknown);
    }

    #[test]
    fn test_mean_hip_height_uses_latest_frames() {
        let frames = vec![standing_pose(0.9), standing_pose(0.4), standing_pose(0.6)];
        let mean = mean_hip_height(&frames, 2).unwrap();
        assert!((mean - 0.5).abs() < 1e-5);
        assert!(mean_hip_height(&frames, 4).is_none());
    }
}
