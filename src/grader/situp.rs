use crate::{
    geometry::{angle_degrees, average_optional, distance},
    grader::{
        debounce::{Debouncer, Transition},
        ExerciseKind, Grader, GradingResult, Phase,
    },
    pose::{JointKind, JointKind::*, PoseSnapshot},
};
use tracing::{debug, info};

const DEFAULT_REQUIRED_CONFIDENCE: &str = "0.4";
const DEFAULT_HIP_DOWN_MIN: &str = "140";
const DEFAULT_HIP_UP_MAX: &str = "90";
const DEFAULT_ELBOW_KNEE_MAX_Y_DIFF: &str = "0.15";
const DEFAULT_ARMS_CROSSED_MAX_DIST: &str = "0.2";
const DEFAULT_REQUIRED_STABLE_FRAMES: &str = "2";

const REQUIRED_JOINTS: [JointKind; 10] = [
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
];

#[derive(Debug, Clone, Copy, structopt::StructOpt)]
pub struct SitupConfig {
    /// Minimum confidence for every required joint.
    #[structopt(long, default_value = DEFAULT_REQUIRED_CONFIDENCE)]
    pub required_confidence: f32,
    /// Hip angle (degrees) at or above which the back is down.
    #[structopt(long, default_value = DEFAULT_HIP_DOWN_MIN)]
    pub hip_down_min: f32,
    /// Hip angle (degrees) at or below which the torso is up.
    #[structopt(long, default_value = DEFAULT_HIP_UP_MAX)]
    pub hip_up_max: f32,
    /// Largest vertical gap between elbows and knees that still counts as touching.
    #[structopt(long, default_value = DEFAULT_ELBOW_KNEE_MAX_Y_DIFF)]
    pub elbow_knee_max_y_diff: f32,
    /// Largest distance between each wrist and the opposite shoulder for crossed arms.
    #[structopt(long, default_value = DEFAULT_ARMS_CROSSED_MAX_DIST)]
    pub arms_crossed_max_dist: f32,
    /// Consecutive frames a new phase must persist before it is committed.
    #[structopt(long, default_value = DEFAULT_REQUIRED_STABLE_FRAMES)]
    pub required_stable_frames: usize,
}

impl Default for SitupConfig {
    fn default() -> Self {
        Self {
            required_confidence: DEFAULT_REQUIRED_CONFIDENCE.parse().unwrap(),
            hip_down_min: DEFAULT_HIP_DOWN_MIN.parse().unwrap(),
            hip_up_max: DEFAULT_HIP_UP_MAX.parse().unwrap(),
            elbow_knee_max_y_diff: DEFAULT_ELBOW_KNEE_MAX_Y_DIFF.parse().unwrap(),
            arms_crossed_max_dist: DEFAULT_ARMS_CROSSED_MAX_DIST.parse().unwrap(),
            required_stable_frames: DEFAULT_REQUIRED_STABLE_FRAMES.parse().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RepAccumulator {
    in_progress: bool,
    /// Some frame of the attempt was classified away from `Down`.
    left_rest: bool,
    min_hip_angle: f32,
    arms_crossed: bool,
}

impl Default for RepAccumulator {
    fn default() -> Self {
        Self {
            in_progress: false,
            left_rest: false,
            min_hip_angle: 180.0,
            arms_crossed: false,
        }
    }
}

/// Sit-ups rest lying down: a rep starts when the torso leaves `Down` and is judged when the
/// back is down again.
#[derive(Debug, Clone)]
pub struct SitupGrader {
    config: SitupConfig,
    debouncer: Debouncer,
    rep: RepAccumulator,
    rep_count: u32,
    rejected_count: u32,
}

impl Default for SitupGrader {
    fn default() -> Self {
        Self::new(SitupConfig::default())
    }
}

impl SitupGrader {
    pub fn new(config: SitupConfig) -> Self {
        Self {
            config,
            debouncer: Debouncer::new(config.required_stable_frames),
            rep: RepAccumulator::default(),
            rep_count: 0,
            rejected_count: 0,
        }
    }

    pub fn config(&self) -> &SitupConfig {
        &self.config
    }

    /// Losing the pose while lying down still opens an attempt.
    fn invalidate(&mut self, result: GradingResult) -> GradingResult {
        if let Transition::Committed {
            from: Phase::Down, ..
        } = self.debouncer.force(Phase::Invalid)
        {
            self.rep.in_progress = true;
        }
        result
    }

    fn classify(&self, hip_angle: f32, elbows_at_knees: bool) -> Phase {
        if hip_angle >= self.config.hip_down_min {
            Phase::Down
        } else if hip_angle <= self.config.hip_up_max && elbows_at_knees {
            Phase::Up
        } else {
            Phase::Between
        }
    }

    fn evaluate(&mut self, attempt: RepAccumulator) -> GradingResult {
        let mut issues = vec![];

        if attempt.min_hip_angle > self.config.hip_up_max {
            issues.push("Sit up higher.");
        }
        if !attempt.arms_crossed {
            issues.push("Keep arms crossed.");
        }

        if issues.is_empty() {
            self.rep_count += 1;
            info!(exercise = %ExerciseKind::Situp, reps = self.rep_count, "rep completed");
            GradingResult::RepCompleted
        } else {
            self.rejected_count += 1;
            info!(
                exercise = %ExerciseKind::Situp,
                ?issues,
                min_hip_angle = attempt.min_hip_angle,
                "rep rejected"
            );
            GradingResult::IncorrectForm {
                feedback: issues.join(" "),
            }
        }
    }

    fn phase_feedback(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Down => "Sit up.",
            Phase::Up => "Lower down.",
            Phase::Starting => "Begin when ready.",
            Phase::Between => "Keep moving.",
            Phase::Invalid => "Fix pose.",
        }
    }
}

impl Grader for SitupGrader {
    fn exercise(&self) -> ExerciseKind {
        ExerciseKind::Situp
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
            left_knee,
            right_knee,
        ] = match snapshot.require(&REQUIRED_JOINTS, self.config.required_confidence) {
            Ok(points) => points,
            Err(missing) => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: format!("Cannot see clearly: {}", missing),
                })
            }
        };

        let hip_angle = match average_optional(
            angle_degrees(left_shoulder, left_hip, left_knee),
            angle_degrees(right_shoulder, right_hip, right_knee),
        ) {
            Some(angle) => angle,
            None => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: "Cannot measure hip angle.".to_owned(),
                })
            }
        };

        let elbow_knee_y_diff =
            (left_elbow.midpoint(right_elbow).y() - left_knee.midpoint(right_knee).y()).abs();
        let elbows_at_knees = elbow_knee_y_diff <= self.config.elbow_knee_max_y_diff;
        let arms_crossed = distance(left_wrist, right_shoulder) < self.config.arms_crossed_max_dist
            && distance(right_wrist, left_shoulder) < self.config.arms_crossed_max_dist;

        let candidate = self.classify(hip_angle, elbows_at_knees);
        let transition = self.debouncer.propose(candidate);

        self.rep.min_hip_angle = self.rep.min_hip_angle.min(hip_angle);
        self.rep.left_rest |= candidate != Phase::Down;
        // arms count at the top, or on the frame that starts the sit-up
        let rising = transition
            == Transition::Committed {
                from: Phase::Down,
                to: Phase::Between,
            };
        if candidate == Phase::Up || rising {
            self.rep.arms_crossed |= arms_crossed;
        }

        match transition {
            Transition::Committed { to: Phase::Down, .. } => {
                let attempt = std::mem::take(&mut self.rep);
                // an attempt opened by a dropout that never sat up is discarded
                if attempt.in_progress && attempt.left_rest {
                    return self.evaluate(attempt);
                }
            }
            Transition::Committed {
                from: Phase::Down, ..
            } => self.rep.in_progress = true,
            Transition::Stayed if self.debouncer.phase() == Phase::Down => {
                self.rep = RepAccumulator::default()
            }
            _ => {}
        }

        // Coaching only: the arms are judged for real when the rep is evaluated.
        if !arms_crossed && matches!(self.debouncer.phase(), Phase::Up | Phase::Between) {
            return GradingResult::IncorrectForm {
                feedback: "Keep arms crossed over chest.".to_owned(),
            };
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
        debug!(exercise = %ExerciseKind::Situp, "grader reset");
    }

    fn phase(&self) -> Phase {
        self.debouncer.phase()
    }

    fn current_phase_description(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Down => "Down",
            Phase::Up => "Up",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grader::testing::{bend, snapshot};

    const HIP: (f32, f32) = (0.5, 0.7);
    const KNEE: (f32, f32) = (0.65, 0.55);
    const TORSO: f32 = 0.25;

    #[derive(Clone, Copy)]
    struct Frame {
        hip_angle: f32,
        elbows_at_knees: bool,
        arms_crossed: bool,
    }

    fn lying() -> Frame {
        Frame {
            hip_angle: 170.0,
            elbows_at_knees: false,
            arms_crossed: true,
        }
    }

    fn sitting() -> Frame {
        Frame {
            hip_angle: 60.0,
            elbows_at_knees: true,
            arms_crossed: true,
        }
    }

    fn halfway() -> Frame {
        Frame {
            hip_angle: 110.0,
            elbows_at_knees: false,
            arms_crossed: true,
        }
    }

    /// Side-on with both sides overlapping, knees bent.
    fn skeleton(frame: Frame) -> PoseSnapshot {
        let shoulder = bend(KNEE, HIP, TORSO, frame.hip_angle);
        let elbow = if frame.elbows_at_knees {
            (KNEE.0 - 0.05, KNEE.1)
        } else {
            (shoulder.0 + 0.05, shoulder.1 - 0.1)
        };
        let wrist = if frame.arms_crossed {
            (shoulder.0 + 0.05, shoulder.1 + 0.05)
        } else {
            (shoulder.0 + 0.3, shoulder.1 + 0.3)
        };

        snapshot(&[
            (LeftShoulder, shoulder.0, shoulder.1),
            (RightShoulder, shoulder.0, shoulder.1),
            (LeftElbow, elbow.0, elbow.1),
            (RightElbow, elbow.0, elbow.1),
            (LeftWrist, wrist.0, wrist.1),
            (RightWrist, wrist.0, wrist.1),
            (LeftHip, HIP.0, HIP.1),
            (RightHip, HIP.0, HIP.1),
            (LeftKnee, KNEE.0, KNEE.1),
            (RightKnee, KNEE.0, KNEE.1),
        ])
    }

    fn run(grader: &mut SitupGrader, frames: &[Frame]) -> Vec<GradingResult> {
        frames
            .iter()
            .map(|&frame| grader.grade_pose(&skeleton(frame)))
            .collect()
    }

    #[test]
    fn full_rep_is_counted() {
        let mut grader = SitupGrader::default();
        let results = run(
            &mut grader,
            &[lying(), lying(), sitting(), sitting(), lying(), lying()],
        );
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
        assert_eq!(grader.rep_count(), 1);
    }

    #[test]
    fn not_sitting_high_enough_is_rejected() {
        let mut grader = SitupGrader::default();
        let results = run(
            &mut grader,
            &[lying(), lying(), halfway(), halfway(), lying(), lying()],
        );
        assert_eq!(
            results.last(),
            Some(&GradingResult::IncorrectForm {
                feedback: "Sit up higher.".to_owned()
            })
        );
        assert_eq!(grader.rep_count(), 0);
    }

    #[test]
    fn elbows_must_reach_knees_to_be_up() {
        let mut grader = SitupGrader::default();
        let no_touch = Frame {
            elbows_at_knees: false,
            ..sitting()
        };
        run(&mut grader, &[lying(), no_touch, no_touch]);
        assert_eq!(grader.phase(), Phase::Between);
    }

    #[test]
    fn uncrossed_arms_coach_mid_rep_and_reject_the_rep() {
        let mut grader = SitupGrader::default();
        let loose = |frame: Frame| Frame {
            arms_crossed: false,
            ..frame
        };
        let results = run(
            &mut grader,
            &[
                lying(),
                lying(),
                loose(sitting()),
                loose(sitting()),
            ],
        );
        let hint = GradingResult::IncorrectForm {
            feedback: "Keep arms crossed over chest.".to_owned(),
        };
        assert_eq!(results[3], hint);
        // the hint does not invalidate the phase
        assert_eq!(grader.phase(), Phase::Up);

        let results = run(&mut grader, &[loose(lying()), loose(lying())]);
        assert_eq!(results[0], hint);
        assert_eq!(
            results[1],
            GradingResult::IncorrectForm {
                feedback: "Keep arms crossed.".to_owned()
            }
        );
        assert_eq!(grader.rep_count(), 0);
    }

    #[test]
    fn uncrossed_arms_while_lying_are_fine() {
        let mut grader = SitupGrader::default();
        let loose = Frame {
            arms_crossed: false,
            ..lying()
        };
        let results = run(&mut grader, &[loose, loose]);
        assert_eq!(
            results[1],
            GradingResult::InProgress {
                phase: "Down",
                feedback: "Sit up."
            }
        );
    }

    #[test]
    fn arms_crossed_only_while_lowering_do_not_count() {
        let mut grader = SitupGrader::default();
        let loose = Frame {
            arms_crossed: false,
            ..sitting()
        };
        let results = run(
            &mut grader,
            &[
                lying(),
                lying(),
                loose,
                loose,
                halfway(),
                halfway(),
                lying(),
                lying(),
            ],
        );
        assert_eq!(
            results.last(),
            Some(&GradingResult::IncorrectForm {
                feedback: "Keep arms crossed.".to_owned()
            })
        );
        assert_eq!(grader.rep_count(), 0);
        assert_eq!(grader.rejected_count(), 1);
    }

    #[test]
    fn dropout_leaving_the_floor_keeps_the_rep() {
        let mut grader = SitupGrader::default();
        run(&mut grader, &[lying(), lying()]);
        grader.grade_pose(&PoseSnapshot::default());
        let results = run(&mut grader, &[sitting(), sitting(), lying(), lying()]);
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
        assert_eq!(grader.rep_count(), 1);
    }

    #[test]
    fn dropout_while_lying_is_not_an_attempt() {
        let mut grader = SitupGrader::default();
        run(&mut grader, &[lying(), lying()]);
        grader.grade_pose(&PoseSnapshot::default());
        let results = run(&mut grader, &[lying(), lying()]);
        assert!(results
            .iter()
            .all(|r| matches!(r, GradingResult::InProgress { phase: "Down", .. })));
        assert_eq!(grader.rejected_count(), 0);
    }

    #[test]
    fn missing_knee_is_invalid() {
        let mut grader = SitupGrader::default();
        let without_knee = PoseSnapshot::from_joints(
            skeleton(lying())
                .joints()
                .filter(|&(kind, _)| kind != RightKnee),
        );
        assert_eq!(
            grader.grade_pose(&without_knee),
            GradingResult::InvalidPose {
                reason: "Cannot see clearly: right knee".to_owned()
            }
        );
        assert_eq!(grader.phase(), Phase::Invalid);
    }

    #[test]
    fn occlusion_mid_rep_does_not_lose_the_rep() {
        let mut grader = SitupGrader::default();
        run(&mut grader, &[lying(), lying(), sitting(), sitting()]);
        grader.grade_pose(&PoseSnapshot::default());
        assert_eq!(grader.phase(), Phase::Invalid);
        let results = run(&mut grader, &[sitting(), lying(), lying()]);
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let frames = [
            lying(),
            halfway(),
            sitting(),
            sitting(),
            halfway(),
            lying(),
            lying(),
            sitting(),
        ];
        assert_eq!(
            run(&mut SitupGrader::default(), &frames),
            run(&mut SitupGrader::default(), &frames)
        );
    }

    #[test]
    fn reset_twice_is_harmless() {
        let mut grader = SitupGrader::default();
        run(
            &mut grader,
            &[lying(), lying(), sitting(), sitting(), lying(), lying()],
        );
        grader.reset();
        grader.reset();
        assert_eq!(grader.phase(), Phase::Starting);
        assert_eq!(grader.rep_count(), 0);
    }
}
