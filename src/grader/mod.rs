use crate::pose::PoseSnapshot;
use std::fmt;

pub use pullup::{PullupConfig, PullupGrader};
pub use pushup::{PushupConfig, PushupGrader};
pub use situp::{SitupConfig, SitupGrader};

mod debounce;
mod pullup;
mod pushup;
mod situp;

/// Coarse position within a repetition cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Down,
    Up,
    Between,
    Invalid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Pushup,
    Pullup,
    Situp,
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pushup => "push-up",
            Self::Pullup => "pull-up",
            Self::Situp => "sit-up",
        })
    }
}

/// The outcome of grading one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingResult {
    /// Required joints were not tracked with enough confidence.
    InvalidPose { reason: String },
    /// The pose was tracked but a form rule failed, either mid-rep or when a rep was evaluated.
    IncorrectForm { feedback: String },
    /// A rep was accepted and the grader's rep count was incremented.
    RepCompleted,
    InProgress {
        phase: &'static str,
        feedback: &'static str,
    },
    /// The frame was absorbed by the stability debouncer. Treat like `InProgress`.
    NoChange,
}

impl GradingResult {
    pub fn feedback(&self) -> Option<&str> {
        match self {
            Self::InvalidPose { reason } => Some(reason),
            Self::IncorrectForm { feedback } => Some(feedback),
            Self::InProgress { feedback, .. } => Some(feedback),
            Self::RepCompleted | Self::NoChange => None,
        }
    }
}

pub trait Grader {
    fn exercise(&self) -> ExerciseKind;

    /// Grade one frame. Never fails: untrackable poses are reported as
    /// [`GradingResult::InvalidPose`].
    fn grade_pose(&mut self, snapshot: &PoseSnapshot) -> GradingResult;

    /// Return to the initial state: phase `Starting`, no reps, no partial rep.
    fn reset(&mut self);

    fn phase(&self) -> Phase;

    fn current_phase_description(&self) -> &'static str;

    fn rep_count(&self) -> u32;

    /// Attempts evaluated and rejected since the last reset.
    fn rejected_count(&self) -> u32;
}

/// Exercise selection together with its tuning.
#[derive(Debug, Clone, structopt::StructOpt)]
pub enum Exercise {
    /// Grade push-ups
    Pushup(PushupConfig),
    /// Grade pull-ups
    Pullup(PullupConfig),
    /// Grade sit-ups
    Situp(SitupConfig),
}

impl Exercise {
    pub fn into_grader(self) -> AnyGrader {
        match self {
            Self::Pushup(config) => AnyGrader::Pushup(PushupGrader::new(config)),
            Self::Pullup(config) => AnyGrader::Pullup(PullupGrader::new(config)),
            Self::Situp(config) => AnyGrader::Situp(SitupGrader::new(config)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnyGrader {
    Pushup(PushupGrader),
    Pullup(PullupGrader),
    Situp(SitupGrader),
}

impl Grader for AnyGrader {
    fn exercise(&self) -> ExerciseKind {
        match self {
            Self::Pushup(g) => g.exercise(),
            Self::Pullup(g) => g.exercise(),
            Self::Situp(g) => g.exercise(),
        }
    }

    fn grade_pose(&mut self, snapshot: &PoseSnapshot) -> GradingResult {
        match self {
            Self::Pushup(g) => g.grade_pose(snapshot),
            Self::Pullup(g) => g.grade_pose(snapshot),
            Self::Situp(g) => g.grade_pose(snapshot),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Pushup(g) => g.reset(),
            Self::Pullup(g) => g.reset(),
            Self::Situp(g) => g.reset(),
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Self::Pushup(g) => g.phase(),
            Self::Pullup(g) => g.phase(),
            Self::Situp(g) => g.phase(),
        }
    }

    fn current_phase_description(&self) -> &'static str {
        match self {
            Self::Pushup(g) => g.current_phase_description(),
            Self::Pullup(g) => g.current_phase_description(),
            Self::Situp(g) => g.current_phase_description(),
        }
    }

    fn rep_count(&self) -> u32 {
        match self {
            Self::Pushup(g) => g.rep_count(),
            Self::Pullup(g) => g.rep_count(),
            Self::Situp(g) => g.rep_count(),
        }
    }

    fn rejected_count(&self) -> u32 {
        match self {
            Self::Pushup(g) => g.rejected_count(),
            Self::Pullup(g) => g.rejected_count(),
            Self::Situp(g) => g.rejected_count(),
        }
    }
}
