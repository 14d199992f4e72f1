use crate::{
    geometry::{angle_degrees, average_optional, distance, interpolate, Point},
    grader::{
        debounce::{Debouncer, Transition},
        ExerciseKind, Grader, GradingResult, Phase,
    },
    pose::{JointKind, JointKind::*, PoseSnapshot},
};
use tracing::{debug, info};

const DEFAULT_REQUIRED_CONFIDENCE: &str = "0.4";
const DEFAULT_ELBOW_DOWN_MAX: &str = "90";
const DEFAULT_ELBOW_UP_MIN: &str = "160";
const DEFAULT_SHOULDER_LEVEL_MAX_Y_DIFF: &str = "0.08";
const DEFAULT_HIP_DEVIATION_MAX: &str = "0.15";
const DEFAULT_REQUIRED_STABLE_FRAMES: &str = "2";

/// Below this shoulder-to-ankle distance the body line is too short to judge hip alignment.
const MIN_BODY_LENGTH: f32 = 0.05;

const REQUIRED_JOINTS: [JointKind; 10] = [
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftAnkle,
    RightAnkle,
];

#[derive(Debug, Clone, Copy, structopt::StructOpt)]
pub struct PushupConfig {
    /// Minimum confidence for every required joint.
    #[structopt(long, default_value = DEFAULT_REQUIRED_CONFIDENCE)]
    pub required_confidence: f32,
    /// Elbow angle (degrees) at or below which the body is down.
    #[structopt(long, default_value = DEFAULT_ELBOW_DOWN_MAX)]
    pub elbow_down_max: f32,
    /// Elbow angle (degrees) at or above which the arms are extended.
    #[structopt(long, default_value = DEFAULT_ELBOW_UP_MIN)]
    pub elbow_up_min: f32,
    /// Largest allowed vertical offset between the shoulders.
    #[structopt(long, default_value = DEFAULT_SHOULDER_LEVEL_MAX_Y_DIFF)]
    pub shoulder_level_max_y_diff: f32,
    /// Largest allowed hip offset from the shoulder-ankle line, as a fraction of body length.
    #[structopt(long, default_value = DEFAULT_HIP_DEVIATION_MAX)]
    pub hip_deviation_max: f32,
    /// Consecutive frames a new phase must persist before it is committed.
    #[structopt(long, default_value = DEFAULT_REQUIRED_STABLE_FRAMES)]
    pub required_stable_frames: usize,
}

impl Default for PushupConfig {
    fn default() -> Self {
        Self {
            required_confidence: DEFAULT_REQUIRED_CONFIDENCE.parse().unwrap(),
            elbow_down_max: DEFAULT_ELBOW_DOWN_MAX.parse().unwrap(),
            elbow_up_min: DEFAULT_ELBOW_UP_MIN.parse().unwrap(),
            shoulder_level_max_y_diff: DEFAULT_SHOULDER_LEVEL_MAX_Y_DIFF.parse().unwrap(),
            hip_deviation_max: DEFAULT_HIP_DEVIATION_MAX.parse().unwrap(),
            required_stable_frames: DEFAULT_REQUIRED_STABLE_FRAMES.parse().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RepAccumulator {
    in_progress: bool,
    /// Some frame of the attempt was classified away from `Up`.
    left_rest: bool,
    min_elbow_angle: f32,
}

impl Default for RepAccumulator {
    fn default() -> Self {
        Self {
            in_progress: false,
            left_rest: false,
            min_elbow_angle: 180.0,
        }
    }
}

/// Push-ups rest at the top: a rep starts when the body leaves `Up` and is judged when it
/// returns there.
#[derive(Debug, Clone)]
pub struct PushupGrader {
    config: PushupConfig,
    debouncer: Debouncer,
    rep: RepAccumulator,
    rep_count: u32,
    rejected_count: u32,
}

impl Default for PushupGrader {
    fn default() -> Self {
        Self::new(PushupConfig::default())
    }
}

impl PushupGrader {
    pub fn new(config: PushupConfig) -> Self {
        Self {
            config,
            debouncer: Debouncer::new(config.required_stable_frames),
            rep: RepAccumulator::default(),
            rep_count: 0,
            rejected_count: 0,
        }
    }

    pub fn config(&self) -> &PushupConfig {
        &self.config
    }

    /// Losing the pose while resting at the top still opens an attempt.
    fn invalidate(&mut self, result: GradingResult) -> GradingResult {
        if let Transition::Committed { from: Phase::Up, .. } = self.debouncer.force(Phase::Invalid)
        {
            self.rep.in_progress = true;
        }
        result
    }

    fn classify(&self, elbow_angle: f32) -> Phase {
        if elbow_angle <= self.config.elbow_down_max {
            Phase::Down
        } else if elbow_angle >= self.config.elbow_up_min {
            Phase::Up
        } else {
            Phase::Between
        }
    }

    fn form_issues(
        &self,
        left_shoulder: Point,
        right_shoulder: Point,
        hips: Point,
        ankles: Point,
    ) -> Vec<&'static str> {
        let mut issues = vec![];

        if (left_shoulder.y() - right_shoulder.y()).abs() > self.config.shoulder_level_max_y_diff {
            issues.push("Keep shoulders level.");
        }

        let shoulders = left_shoulder.midpoint(right_shoulder);
        let body_length = distance(shoulders, ankles);
        if body_length > MIN_BODY_LENGTH {
            let line_y = interpolate(shoulders, ankles, hips.x())
                .unwrap_or_else(|| shoulders.midpoint(ankles).y());
            let deviation = (hips.y() - line_y) / body_length;
            if deviation > self.config.hip_deviation_max {
                issues.push("Keep hips from sagging.");
            } else if deviation < -self.config.hip_deviation_max {
                issues.push("Avoid raising hips too high.");
            }
        }

        issues
    }

    fn evaluate(&mut self, attempt: RepAccumulator) -> GradingResult {
        if attempt.min_elbow_angle <= self.config.elbow_down_max {
            self.rep_count += 1;
            info!(
                exercise = %ExerciseKind::Pushup,
                reps = self.rep_count,
                min_elbow_angle = attempt.min_elbow_angle,
                "rep completed"
            );
            GradingResult::RepCompleted
        } else {
            self.rejected_count += 1;
            info!(
                exercise = %ExerciseKind::Pushup,
                min_elbow_angle = attempt.min_elbow_angle,
                "rep rejected"
            );
            GradingResult::IncorrectForm {
                feedback: "Push lower for rep to count.".to_owned(),
            }
        }
    }

    fn phase_feedback(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Up => "Lower body.",
            Phase::Down => "Push up.",
            Phase::Starting => "Begin when ready.",
            Phase::Between => "Keep moving.",
            Phase::Invalid => "Fix pose.",
        }
    }
}

impl Grader for PushupGrader {
    fn exercise(&self) -> ExerciseKind {
        ExerciseKind::Pushup
    }

    fn grade_pose(&mut self, snapshot: &PoseSnapshot) -> GradingResult {
        let [
            left_shoulder,
            right_shoulder,
            left_elbow,
            right_elbow,
            left_wrist,
            right_wrist,
            left_hip,
            right_hip,
            left_ankle,
            right_ankle,
        ] = match snapshot.require(&REQUIRED_JOINTS, self.config.required_confidence) {
            Ok(points) => points,
            Err(missing) => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: format!("Cannot see clearly: {}", missing),
                })
            }
        };

        let elbow_angle = match average_optional(
            angle_degrees(left_wrist, left_elbow, left_shoulder),
            angle_degrees(right_wrist, right_elbow, right_shoulder),
        ) {
            Some(angle) => angle,
            None => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: "Cannot measure elbow angle.".to_owned(),
                })
            }
        };

        let issues = self.form_issues(
            left_shoulder,
            right_shoulder,
            left_hip.midpoint(right_hip),
            left_ankle.midpoint(right_ankle),
        );
        if !issues.is_empty() {
            debug!(?issues, "push-up form check failed");
            return self.invalidate(GradingResult::IncorrectForm {
                feedback: issues.join(" "),
            });
        }

        let candidate = self.classify(elbow_angle);
        let transition = self.debouncer.propose(candidate);
        self.rep.min_elbow_angle = self.rep.min_elbow_angle.min(elbow_angle);
        self.rep.left_rest |= candidate != Phase::Up;

        match transition {
            Transition::Committed { to: Phase::Up, .. } => {
                let attempt = std::mem::take(&mut self.rep);
                // an attempt opened by a dropout that never left the top is discarded
                if attempt.in_progress && attempt.left_rest {
                    return self.evaluate(attempt);
                }
            }
            Transition::Committed { from: Phase::Up, .. }
            | Transition::Committed { to: Phase::Down, .. } => self.rep.in_progress = true,
            Transition::Stayed if self.debouncer.phase() == Phase::Up => {
                self.rep = RepAccumulator::default()
            }
            _ => {}
        }

        if transition == Transition::Held {
            GradingResult::NoChange
        } else {
            GradingResult::InProgress {
                phase: self.current_phase_description(),
                feedback: self.phase_feedback(),
            }
        }
    }

    fn reset(&mut self) {
        self.debouncer.reset();
        self.rep = RepAccumulator::default();
        self.rep_count = 0;
        self.rejected_count = 0;
        debug!(exercise = %ExerciseKind::Pushup, "grader reset");
    }

    fn phase(&self) -> Phase {
        self.debouncer.phase()
    }

    fn current_phase_description(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Up => "Up",
            Phase::Down => "Down",
            Phase::Starting => "Ready",
            Phase::Invalid => "Invalid Pose",
            Phase::Between => "Moving",
        }
    }

    fn rep_count(&self) -> u32 {
        self.rep_count
    }

    fn rejected_count(&self) -> u32 {
        self.rejected_count
    }
}
