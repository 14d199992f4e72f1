use crate::{
    grader::{ExerciseKind, Grader, GradingResult},
    pose::PoseSnapshot,
    scoring,
};
use std::time::Duration;
use tracing::trace;

/// Totals reported when a session ends.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorkoutSummary {
    pub exercise: ExerciseKind,
    pub reps: u32,
    pub attempts: u32,
    pub frames: u64,
    pub invalid_frames: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub form_score: f64,
    pub points: u8,
    pub last_feedback: Option<String>,
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Aggregates per-frame grading results over one workout.
#[derive(Debug, Clone)]
pub struct WorkoutSession<G> {
    grader: G,
    frames: u64,
    invalid_frames: u64,
    last_feedback: Option<String>,
    first_timestamp: Option<Duration>,
    last_timestamp: Option<Duration>,
}

impl<G: Grader> WorkoutSession<G> {
    pub fn new(grader: G) -> Self {
        Self {
            grader,
            frames: 0,
            invalid_frames: 0,
            last_feedback: None,
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    pub fn grader(&self) -> &G {
        &self.grader
    }

    /// Grade one frame captured at `timestamp` and fold the result into the session totals.
    pub fn process(&mut self, snapshot: &PoseSnapshot, timestamp: Duration) -> GradingResult {
        let result = self.grader.grade_pose(snapshot);

        self.frames += 1;
        self.first_timestamp.get_or_insert(timestamp);
        self.last_timestamp = Some(timestamp);

        match &result {
            GradingResult::RepCompleted => {
                self.last_feedback = Some(format!("Rep counted! ({})", self.grader.rep_count()));
            }
            GradingResult::InvalidPose { reason } => {
                self.invalid_frames += 1;
                self.last_feedback = Some(reason.clone());
            }
            GradingResult::IncorrectForm { feedback } => {
                self.last_feedback = Some(feedback.clone());
            }
            GradingResult::InProgress { .. } | GradingResult::NoChange => {}
        }

        trace!(frame = self.frames, ?timestamp, ?result, "frame graded");
        result
    }

    pub fn reps(&self) -> u32 {
        self.grader.rep_count()
    }

    /// Accepted plus rejected reps.
    pub fn attempts(&self) -> u32 {
        self.reps() + self.grader.rejected_count()
    }

    /// Percentage of attempts that were accepted; 100 before the first attempt.
    pub fn form_score(&self) -> f64 {
        match self.attempts() {
            0 => 100.0,
            attempts => f64::from(self.reps()) / f64::from(attempts) * 100.0,
        }
    }

    pub fn last_feedback(&self) -> Option<&str> {
        self.last_feedback.as_deref()
    }

    pub fn duration(&self) -> Duration {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => Duration::default(),
        }
    }

    pub fn reset(&mut self) {
        self.grader.reset();
        self.frames = 0;
        self.invalid_frames = 0;
        self.last_feedback = None;
        self.first_timestamp = None;
        self.last_timestamp = None;
    }

    pub fn finish(self) -> WorkoutSummary {
        let exercise = self.grader.exercise();
        let reps = self.reps();
        WorkoutSummary {
            exercise,
            reps,
            attempts: self.attempts(),
            frames: self.frames,
            invalid_frames: self.invalid_frames,
            duration: self.duration(),
            form_score: self.form_score(),
            points: scoring::points(exercise, reps),
            last_feedback: self.last_feedback,
        }
    }
}
