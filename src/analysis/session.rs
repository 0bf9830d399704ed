use std::collections::{BTreeMap, VecDeque};

use crate::analysis::classifier::classify;
use crate::analysis::counter::RepCounter;
use crate::analysis::types::{ExerciseType, FrameResult, SessionResult};
use crate::config::{ClassifierConfig, Config, CounterConfig, RuleConfig, SessionConfig};
use crate::pose::PoseFrame;

pub const NO_EXERCISE: &str = "No exercise detected";

/// Orchestrates classification and rep counting for one stream of frames.
///
/// Frames must arrive in capture order. One session belongs to one worker;
/// nothing in here is shared across sessions.
pub struct AnalysisSession {
    classifier: ClassifierConfig,
    counter_config: CounterConfig,
    rules: RuleConfig,
    config: SessionConfig,
    counters: BTreeMap<ExerciseType, RepCounter>,
    tracked: Option<ExerciseType>,
    /// 追跡対象がない間の分類用履歴
    recent: VecDeque<PoseFrame>,
    trace: VecDeque<FrameResult>,
    total_frames: u64,
    frames_with_pose: u64,
    attributed: BTreeMap<ExerciseType, u64>,
    dominant: Option<(ExerciseType, u64)>,
}

impl AnalysisSession {
    pub fn new(config: &Config) -> Self {
        Self {
            classifier: config.classifier,
            counter_config: config.counter,
            rules: config.rules,
            config: config.session,
            counters: BTreeMap::new(),
            tracked: None,
            recent: VecDeque::with_capacity(config.counter.history_capacity),
            trace: VecDeque::with_capacity(config.session.trace_length),
            total_frames: 0,
            frames_with_pose: 0,
            attributed: BTreeMap::new(),
            dominant: None,
        }
    }

    /// Currently tracked exercise
    pub fn tracked(&self) -> Option<ExerciseType> {
        self.tracked
    }

    pub fn counter(&self, exercise: ExerciseType) -> Option<&RepCounter> {
        self.counters.get(&exercise)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn process(&mut self, frame: Option<&PoseFrame>, index: u64) -> FrameResult {
        let pose_detected = frame.is_some();
        self.total_frames += 1;
        if pose_detected {
            self.frames_with_pose += 1;
        }

        let history = match self.tracked.and_then(|t| self.counters.get(&t)) {
            Some(counter) => counter.history(),
            None => &self.recent,
        };
        let classified = classify(&self.classifier, frame, history);

        if classified != ExerciseType::Unknown && Some(classified) != self.tracked {
            self.switch_to(classified);
        }

        let result = match self.tracked {
            None => {
                self.remember(frame);
                FrameResult {
                    frame_index: index,
                    exercise: None,
                    count: 0,
                    feedback: NO_EXERCISE.to_string(),
                    pose_detected,
                }
            }
            Some(exercise) => {
                self.attribute(exercise);
                let update = self
                    .counters
                    .entry(exercise)
                    .or_insert_with(|| {
                        RepCounter::new(exercise, &self.counter_config, &self.rules)
                    })
                    .process(frame);
                FrameResult {
                    frame_index: index,
                    exercise: Some(exercise),
                    count: update.count,
                    feedback: update.feedback,
                    pose_detected,
                }
            }
        };

        if self.config.trace_length > 0 {
            if self.trace.len() == self.config.trace_length {
                self.trace.pop_front();
            }
            self.trace.push_back(result.clone());
        }
        result
    }

    /// Aggregate everything seen so far. Does not end the session; callers
    /// may keep processing and finalize again.
    pub fn finalize(&self) -> SessionResult {
        let final_counts = ExerciseType::COUNTABLE
            .iter()
            .map(|&ty| (ty, self.counters.get(&ty).map_or(0, RepCounter::count)))
            .collect();

        let pose_detection_rate = if self.total_frames == 0 {
            0.0
        } else {
            self.frames_with_pose as f32 / self.total_frames as f32 * 100.0
        };

        SessionResult {
            total_frames: self.total_frames,
            final_counts,
            frame_trace: self.trace.iter().cloned().collect(),
            dominant_exercise: self.dominant.map(|(ty, _)| ty),
            form_score: self.form_score(pose_detection_rate),
            pose_detection_rate,
        }
    }

    pub fn reset(&mut self) {
        for counter in self.counters.values_mut() {
            counter.reset();
        }
        self.tracked = None;
        self.recent.clear();
        self.trace.clear();
        self.total_frames = 0;
        self.frames_with_pose = 0;
        self.attributed.clear();
        self.dominant = None;
    }

    fn switch_to(&mut self, exercise: ExerciseType) {
        tracing::debug!(from = ?self.tracked, to = ?exercise, "exercise changed");
        self.tracked = Some(exercise);
        self.counters
            .entry(exercise)
            .or_insert_with(|| RepCounter::new(exercise, &self.counter_config, &self.rules));
    }

    fn remember(&mut self, frame: Option<&PoseFrame>) {
        let Some(pose) = frame else {
            return;
        };
        let capacity = self.counter_config.history_capacity.max(1);
        if self.recent.len() == capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(pose.clone());
    }

    fn attribute(&mut self, exercise: ExerciseType) {
        let frames = self.attributed.entry(exercise).or_insert(0);
        *frames += 1;
        // Ties stay with whoever reached the count first
        match self.dominant {
            Some((_, best)) if *frames <= best => {}
            _ => self.dominant = Some((exercise, *frames)),
        }
    }

    /// Detection rate scaled down by the share of rejected reps
    fn form_score(&self, pose_detection_rate: f32) -> u8 {
        let (accepted, rejected) = self
            .counters
            .values()
            .fold((0u32, 0u32), |(a, r), c| (a + c.count(), r + c.rejected()));
        let attempts = accepted + rejected;
        let violation_rate = if attempts == 0 {
            0.0
        } else {
            rejected as f32 / attempts as f32
        };
        let penalty = (violation_rate * self.config.violation_penalty).clamp(0.0, 1.0);
        (pose_detection_rate * (1.0 - penalty)).clamp(0.0, 100.0).round() as u8
    }
}
