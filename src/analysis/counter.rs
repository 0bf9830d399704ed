use std::collections::VecDeque;

use crate::analysis::classifier::mean_hip_height;
use crate::analysis::form::{validate, INVALID_POSE};
use crate::analysis::geometry::angle;
use crate::analysis::types::{ExerciseType, Phase};
use crate::config::{CounterConfig, RuleConfig};
use crate::pose::{JointIndex, PoseFrame};

pub const NO_POSE: &str = "No pose detected";
pub const INSUFFICIENT_DATA: &str = "Insufficient data for jump analysis";

/// Result of feeding one frame to a [`RepCounter`]
#[derive(Debug, Clone, PartialEq)]
pub struct RepUpdate {
    pub count: u32,
    pub feedback: String,
    /// Set when this frame completed a rep (valid or not)
    pub completed: Option<RepOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepOutcome {
    Counted,
    Rejected,
}

/// Driving metric thresholds for one exercise
#[derive(Debug, Clone, Copy, PartialEq)]
enum Band {
    /// Enter Secondary below `down`, leave it above `up`
    Angle { down: f32, up: f32 },
    /// Single threshold on hip motion, both directions
    Motion { delta: f32 },
}

/// Hysteresis rep counter for one exercise type
///
/// Primary → Secondary when the driving metric crosses into the contracted
/// band; Secondary → Primary when it crosses back, at which point the frame
/// is form-checked. The phase flips either way; only valid reps count.
pub struct RepCounter {
    exercise: ExerciseType,
    count: u32,
    rejected: u32,
    phase: Phase,
    history: VecDeque<PoseFrame>,
    capacity: usize,
    jump_window: usize,
    band: Band,
    rules: RuleConfig,
}

impl RepCounter {
    pub fn new(exercise: ExerciseType, counter: &CounterConfig, rules: &RuleConfig) -> Self {
        let band = match exercise {
            ExerciseType::PushUp => Band::Angle {
                down: counter.pushup_down,
                up: counter.pushup_up,
            },
            ExerciseType::SitUp => Band::Angle {
                down: counter.situp_down,
                up: counter.situp_up,
            },
            ExerciseType::Jump | ExerciseType::Unknown => Band::Motion {
                delta: counter.jump_motion_delta,
            },
        };
        let capacity = counter.history_capacity.max(2);
        // 履歴に収まらない窓は永遠に埋まらない
        let jump_window = counter.jump_window.clamp(2, capacity);
        if jump_window != counter.jump_window {
            tracing::warn!(
                "jump_window {} clamped to {} (history_capacity {})",
                counter.jump_window,
                jump_window,
                counter.history_capacity
            );
        }
        Self {
            exercise,
            count: 0,
            rejected: 0,
            phase: Phase::Primary,
            history: VecDeque::with_capacity(capacity),
            capacity,
            jump_window,
            band,
            rules: *rules,
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Reps that completed with invalid form
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Buffered poses, oldest first
    pub fn history(&self) -> &VecDeque<PoseFrame> {
        &self.history
    }

    pub fn process(&mut self, frame: Option<&PoseFrame>) -> RepUpdate {
        let Some(pose) = frame else {
            return self.idle(NO_POSE);
        };

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(pose.clone());

        if self.exercise == ExerciseType::Jump && self.history.len() < self.jump_window {
            return self.idle(INSUFFICIENT_DATA);
        }

        let Some(metric) = self.metric(pose) else {
            return self.idle(INVALID_POSE);
        };

        match (self.phase, self.band) {
            (Phase::Primary, Band::Angle { down, .. }) if metric < down => self.enter_secondary(metric),
            (Phase::Primary, Band::Motion { delta }) if metric > delta => self.enter_secondary(metric),
            (Phase::Secondary, Band::Angle { up, .. }) if metric > up => self.complete_rep(pose, metric),
            (Phase::Secondary, Band::Motion { delta }) if metric < delta => self.complete_rep(pose, metric),
            _ => self.progress(),
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.rejected = 0;
        self.phase = Phase::Primary;
        self.history.clear();
    }

    /// Elbow angle, torso angle, or hip displacement from the rolling baseline
    fn metric(&self, pose: &PoseFrame) -> Option<f32> {
        use JointIndex::*;
        match self.exercise {
            ExerciseType::PushUp => {
                let (s, e, w) = pose.triple(LeftShoulder, LeftElbow, LeftWrist)?;
                Some(angle(s, e, w))
            }
            ExerciseType::SitUp => {
                let (s, h, k) = pose.triple(LeftShoulder, LeftHip, LeftKnee)?;
                Some(angle(s, h, k))
            }
            ExerciseType::Jump | ExerciseType::Unknown => {
                let current = pose.hip_height()?;
                // Baseline: the frames before the current one inside the window
                let preceding = self.history.len().checked_sub(1)?;
                let baseline = mean_hip_height(
                    self.history.range(..preceding),
                    self.jump_window - 1,
                )?;
                Some((current - baseline).abs())
            }
        }
    }

    fn enter_secondary(&mut self, metric: f32) -> RepUpdate {
        self.phase = Phase::Secondary;
        tracing::debug!(
            exercise = ?self.exercise,
            metric,
            "entered {} phase",
            self.phase.label(self.exercise)
        );
        self.progress()
    }

    fn complete_rep(&mut self, pose: &PoseFrame, metric: f32) -> RepUpdate {
        self.phase = Phase::Primary;
        let verdict = validate(&self.rules, self.exercise, pose);
        if verdict.valid {
            self.count += 1;
            tracing::debug!(exercise = ?self.exercise, metric, count = self.count, "rep counted");
            RepUpdate {
                count: self.count,
                feedback: format!("Good rep! {}", verdict.message()),
                completed: Some(RepOutcome::Counted),
            }
        } else {
            self.rejected += 1;
            tracing::debug!(exercise = ?self.exercise, metric, feedback = %verdict.message(), "rep rejected");
            RepUpdate {
                count: self.count,
                feedback: format!("Invalid rep: {}", verdict.message()),
                completed: Some(RepOutcome::Rejected),
            }
        }
    }

    fn progress(&self) -> RepUpdate {
        let text = format!(
            "{} {} - {}",
            self.exercise.name(),
            self.count,
            self.phase.label(self.exercise)
        );
        self.idle(&text)
    }

    fn idle(&self, feedback: &str) -> RepUpdate {
        RepUpdate {
            count: self.count,
            feedback: feedback.to_string(),
            completed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::*;
    use crate::pose::Joint;

    fn counter(exercise: ExerciseType) -> RepCounter {
        RepCounter::new(exercise, &CounterConfig::default(), &RuleConfig::default())
    }

    fn feed(counter: &mut RepCounter, frames: &[PoseFrame]) -> Vec<RepUpdate> {
        frames.iter().map(|f| counter.process(Some(f))).collect()
    }

    #[test]
    fn test_five_push_ups() {
        let mut c = counter(ExerciseType::PushUp);
        for _ in 0..5 {
            feed(&mut c, &push_up_cycle());
        }
        assert_eq!(c.count(), 5);
        assert_eq!(c.rejected(), 0);
        assert_eq!(c.phase(), Phase::Primary);
    }

    #[test]
    fn test_hysteresis_ignores_jitter_inside_band() {
        let mut c = counter(ExerciseType::PushUp);
        // Oscillating between the thresholds never leaves Primary
        let frames: Vec<PoseFrame> = [120.0, 100.0, 140.0, 95.0, 145.0]
            .iter()
            .map(|&a| push_up_pose(a))
            .collect();
        feed(&mut c, &frames);
        assert_eq!(c.phase(), Phase::Primary);

        // Once down, noise above `down` but below `up` does not complete a rep
        c.process(Some(&push_up_pose(80.0)));
        assert_eq!(c.phase(), Phase::Secondary);
        feed(&mut c, &[push_up_pose(100.0), push_up_pose(85.0), push_up_pose(140.0)]);
        assert_eq!(c.phase(), Phase::Secondary);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_invalid_rep_flips_phase_without_counting() {
        let mut c = counter(ExerciseType::PushUp);
        c.process(Some(&push_up_pose(80.0)));
        assert_eq!(c.phase(), Phase::Secondary);

        let mut sagging = push_up_pose(170.0);
        set_joint(&mut sagging, JointIndex::LeftHip, 0.5, 0.9);
        let update = c.process(Some(&sagging));
        assert_eq!(update.count, 0);
        assert_eq!(update.completed, Some(RepOutcome::Rejected));
        assert_eq!(update.feedback, "Invalid rep: Keep body straight");
        assert_eq!(c.phase(), Phase::Primary);
        assert_eq!(c.rejected(), 1);
    }

    #[test]
    fn test_valid_rep_feedback() {
        let mut c = counter(ExerciseType::PushUp);
        let updates = feed(&mut c, &push_up_cycle());
        let last = updates.last().unwrap();
        assert_eq!(last.count, 1);
        assert_eq!(last.feedback, "Good rep! Good form");
        assert_eq!(updates[3].feedback, "Push-up 0 - down");
    }

    #[test]
    fn test_sit_up_cycle() {
        let mut c = counter(ExerciseType::SitUp);
        let updates = feed(&mut c, &[sit_up_pose(false), sit_up_pose(true), sit_up_pose(false)]);
        assert_eq!(updates[0].feedback, "Sit-up 0 - lying");
        assert_eq!(updates[1].feedback, "Sit-up 0 - up");
        assert_eq!(updates[2].feedback, "Good rep! Good form");
        for _ in 0..2 {
            feed(&mut c, &[sit_up_pose(false), sit_up_pose(true), sit_up_pose(false)]);
        }
        assert_eq!(c.count(), 3);
    }

    #[test]
    fn test_range_rules_need_retuned_band() {
        // Defaults complete a push-up above 150°, so the 70° lower bound is
        // only reachable once the band sits below it
        let config = CounterConfig {
            pushup_down: 30.0,
            pushup_up: 50.0,
            ..CounterConfig::default()
        };
        let mut c = RepCounter::new(ExerciseType::PushUp, &config, &RuleConfig::default());
        let updates = feed(&mut c, &[push_up_pose(20.0), push_up_pose(60.0)]);
        assert_eq!(updates[1].feedback, "Invalid rep: Go lower - increase elbow bend");
        assert_eq!(updates[1].completed, Some(RepOutcome::Rejected));
        assert_eq!(c.count(), 0);
        assert_eq!(c.rejected(), 1);
    }

    #[test]
    fn test_jump_window_clamped_to_history() {
        let config = CounterConfig {
            jump_window: 20,
            ..CounterConfig::default()
        };
        let mut c = RepCounter::new(ExerciseType::Jump, &config, &RuleConfig::default());
        let updates = feed(&mut c, &vec![standing_pose(0.5); 10]);
        assert_eq!(updates[8].feedback, INSUFFICIENT_DATA);
        assert_eq!(updates[9].feedback, "Jump 0 - ground");
    }

    #[test]
    fn test_no_pose_guard() {
        let mut c = counter(ExerciseType::PushUp);
        c.process(Some(&push_up_pose(80.0)));
        let update = c.process(None);
        assert_eq!(update.feedback, NO_POSE);
        assert_eq!(update.count, 0);
        assert_eq!(c.phase(), Phase::Secondary);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn test_invalid_pose_guard() {
        let mut c = counter(ExerciseType::PushUp);
        let partial = PoseFrame::from_joints(vec![Joint::default(); 14]);
        let update = c.process(Some(&partial));
        assert_eq!(update.feedback, INVALID_POSE);
        assert_eq!(c.phase(), Phase::Primary);
    }

    #[test]
    fn test_jump_needs_full_window() {
        let mut c = counter(ExerciseType::Jump);
        for _ in 0..4 {
            let update = c.process(Some(&standing_pose(0.5)));
            assert_eq!(update.feedback, INSUFFICIENT_DATA);
        }
        let update = c.process(Some(&standing_pose(0.5)));
        assert_eq!(update.feedback, "Jump 0 - ground");
    }

    #[test]
    fn test_jumps_counted_from_rolling_baseline() {
        let mut c = counter(ExerciseType::Jump);
        let ground: Vec<PoseFrame> = (0..5).map(|_| standing_pose(0.5)).collect();
        feed(&mut c, &ground);

        for expected in 1..=3 {
            feed(&mut c, &[standing_pose(0.35), standing_pose(0.35)]);
            assert_eq!(c.phase(), Phase::Secondary);
            // Baseline catches up after four grounded frames
            feed(&mut c, &ground[..4]);
            assert_eq!(c.count(), expected);
            assert_eq!(c.phase(), Phase::Primary);
            feed(&mut c, &ground[..2]);
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut c = counter(ExerciseType::PushUp);
        for i in 0..25 {
            c.process(Some(&push_up_pose(100.0 + i as f32)));
        }
        assert_eq!(c.history().len(), 10);
        let oldest = c.history().front().unwrap();
        assert_eq!(*oldest, push_up_pose(115.0));
    }

    #[test]
    fn test_reset() {
        let mut c = counter(ExerciseType::PushUp);
        feed(&mut c, &push_up_cycle());
        c.process(Some(&push_up_pose(80.0)));
        c.reset();
        assert_eq!(c.count(), 0);
        assert_eq!(c.rejected(), 0);
        assert_eq!(c.phase(), Phase::Primary);
        assert!(c.history().is_empty());
    }
}
