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
const DEFAULT_ELBOW_DOWN_MIN: &str = "155";
const DEFAULT_ELBOW_UP_MAX: &str = "95";
const DEFAULT_CHIN_ABOVE_BAR_MIN_Y_DIFF: &str = "0.04";
const DEFAULT_KIPPING_MAX_HIP_TRAVEL: &str = "0.15";
const DEFAULT_REQUIRED_STABLE_FRAMES: &str = "2";

/// Torso estimates shorter than this are too unreliable to normalize hip travel with.
const MIN_TORSO_LENGTH: f32 = 0.05;

const REQUIRED_JOINTS: [JointKind; 9] = [
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    Nose,
];

#[derive(Debug, Clone, Copy, structopt::StructOpt)]
pub struct PullupConfig {
    /// Minimum confidence for every required joint.
    #[structopt(long, default_value = DEFAULT_REQUIRED_CONFIDENCE)]
    pub required_confidence: f32,
    /// Elbow angle (degrees) at or above which the arms count as fully extended.
    #[structopt(long, default_value = DEFAULT_ELBOW_DOWN_MIN)]
    pub elbow_down_min: f32,
    /// Elbow angle (degrees) at or below which the arms count as pulled in.
    #[structopt(long, default_value = DEFAULT_ELBOW_UP_MAX)]
    pub elbow_up_max: f32,
    /// How far the nose must be above the wrist line for the chin to clear the bar.
    #[structopt(long, default_value = DEFAULT_CHIN_ABOVE_BAR_MIN_Y_DIFF)]
    pub chin_above_bar_min_y_diff: f32,
    /// Largest allowed hip travel during a rep, as a fraction of torso length.
    #[structopt(long, default_value = DEFAULT_KIPPING_MAX_HIP_TRAVEL)]
    pub kipping_max_hip_travel: f32,
    /// Consecutive frames a new phase must persist before it is committed.
    #[structopt(long, default_value = DEFAULT_REQUIRED_STABLE_FRAMES)]
    pub required_stable_frames: usize,
}

impl Default for PullupConfig {
    fn default() -> Self {
        Self {
            required_confidence: DEFAULT_REQUIRED_CONFIDENCE.parse().unwrap(),
            elbow_down_min: DEFAULT_ELBOW_DOWN_MIN.parse().unwrap(),
            elbow_up_max: DEFAULT_ELBOW_UP_MAX.parse().unwrap(),
            chin_above_bar_min_y_diff: DEFAULT_CHIN_ABOVE_BAR_MIN_Y_DIFF.parse().unwrap(),
            kipping_max_hip_travel: DEFAULT_KIPPING_MAX_HIP_TRAVEL.parse().unwrap(),
            required_stable_frames: DEFAULT_REQUIRED_STABLE_FRAMES.parse().unwrap(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RepAccumulator {
    in_progress: bool,
    /// Some frame of the attempt was classified away from `Down`.
    left_rest: bool,
    max_elbow_angle: f32,
    chin_cleared: bool,
    min_hip_y: f32,
    max_hip_y: f32,
}

impl Default for RepAccumulator {
    fn default() -> Self {
        Self {
            in_progress: false,
            left_rest: false,
            max_elbow_angle: 0.0,
            chin_cleared: false,
            min_hip_y: f32::INFINITY,
            max_hip_y: f32::NEG_INFINITY,
        }
    }
}

impl RepAccumulator {
    fn track(&mut self, elbow_angle: f32, chin_above_bar: bool, hip_y: f32) {
        self.max_elbow_angle = self.max_elbow_angle.max(elbow_angle);
        self.chin_cleared |= chin_above_bar;
        self.min_hip_y = self.min_hip_y.min(hip_y);
        self.max_hip_y = self.max_hip_y.max(hip_y);
    }

    fn hip_travel(&self) -> f32 {
        (self.max_hip_y - self.min_hip_y).max(0.0)
    }
}

/// Pull-ups rest hanging at the bottom: a rep starts when the body leaves `Down` and is judged
/// when it hangs again.
#[derive(Debug, Clone)]
pub struct PullupGrader {
    config: PullupConfig,
    debouncer: Debouncer,
    rep: RepAccumulator,
    rep_count: u32,
    rejected_count: u32,
}

impl Default for PullupGrader {
    fn default() -> Self {
        Self::new(PullupConfig::default())
    }
}

impl PullupGrader {
    pub fn new(config: PullupConfig) -> Self {
        Self {
            config,
            debouncer: Debouncer::new(config.required_stable_frames),
            rep: RepAccumulator::default(),
            rep_count: 0,
            rejected_count: 0,
        }
    }

    pub fn config(&self) -> &PullupConfig {
        &self.config
    }

    /// Losing the pose while hanging still opens an attempt.
    fn invalidate(&mut self, result: GradingResult) -> GradingResult {
        if let Transition::Committed {
            from: Phase::Down, ..
        } = self.debouncer.force(Phase::Invalid)
        {
            self.rep.in_progress = true;
        }
        result
    }

    fn classify(&self, elbow_angle: f32, chin_above_bar: bool) -> Phase {
        if elbow_angle >= self.config.elbow_down_min {
            Phase::Down
        } else if elbow_angle <= self.config.elbow_up_max && chin_above_bar {
            Phase::Up
        } else {
            Phase::Between
        }
    }

    fn evaluate(&mut self, attempt: RepAccumulator, torso_length: f32) -> GradingResult {
        let mut issues = vec![];

        // Only reachable for attempts that never hung before the pull, since a committed
        // `Down` implies full extension.
        if attempt.max_elbow_angle < self.config.elbow_down_min {
            issues.push("Extend arms fully at bottom.");
        }
        if !attempt.chin_cleared {
            issues.push("Chin did not clear bar.");
        }
        if torso_length >= MIN_TORSO_LENGTH
            && attempt.hip_travel() / torso_length > self.config.kipping_max_hip_travel
        {
            issues.push("Excessive hip movement (kipping).");
        }

        if issues.is_empty() {
            self.rep_count += 1;
            info!(exercise = %ExerciseKind::Pullup, reps = self.rep_count, "rep completed");
            GradingResult::RepCompleted
        } else {
            self.rejected_count += 1;
            info!(exercise = %ExerciseKind::Pullup, ?issues, "rep rejected");
            GradingResult::IncorrectForm {
                feedback: issues.join(" "),
            }
        }
    }

    /// Cue for a frame that disagrees with the committed phase.
    fn coaching(&self, elbow_angle: f32, chin_above_bar: bool) -> Option<&'static str> {
        match self.debouncer.phase() {
            Phase::Down if elbow_angle < self.config.elbow_down_min => Some("Extend arms fully."),
            Phase::Up if elbow_angle <= self.config.elbow_up_max && !chin_above_bar => {
                Some("Pull higher!")
            }
            _ => None,
        }
    }

    fn phase_feedback(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Down => "Pull up.",
            Phase::Up => "Lower down slowly.",
            Phase::Starting => "Begin when ready.",
            Phase::Between if self.rep.chin_cleared => "Lowering...",
            Phase::Between if self.rep.in_progress => "Pulling up...",
            Phase::Between => "Keep moving.",
            Phase::Invalid => "Fix pose.",
        }
    }
}

impl Grader for PullupGrader {
    fn exercise(&self) -> ExerciseKind {
        ExerciseKind::Pullup
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
            nose,
        ] = match snapshot.require(&REQUIRED_JOINTS, self.config.required_confidence) {
            Ok(points) => points,
            Err(missing) => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: format!("Cannot see clearly: {}", missing),
                })
            }
        };

        let elbow_angle = match average_optional(
            angle_degrees(left_shoulder, left_elbow, left_wrist),
            angle_degrees(right_shoulder, right_elbow, right_wrist),
        ) {
            Some(angle) => angle,
            None => {
                return self.invalidate(GradingResult::InvalidPose {
                    reason: "Cannot measure elbow angle.".to_owned(),
                })
            }
        };

        let bar_y = left_wrist.midpoint(right_wrist).y();
        let chin_above_bar = nose.y() < bar_y - self.config.chin_above_bar_min_y_diff;
        let hips = left_hip.midpoint(right_hip);
        let torso_length = distance(left_shoulder.midpoint(right_shoulder), hips);

        let candidate = self.classify(elbow_angle, chin_above_bar);
        let transition = self.debouncer.propose(candidate);
        self.rep.track(elbow_angle, chin_above_bar, hips.y());
        self.rep.left_rest |= candidate != Phase::Down;

        match transition {
            Transition::Committed { to: Phase::Down, .. } => {
                let attempt = std::mem::take(&mut self.rep);
                // an attempt opened by a dropout that never left the hang is discarded
                if attempt.in_progress && attempt.left_rest {
                    return self.evaluate(attempt, torso_length);
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

        if let Some(feedback) = self.coaching(elbow_angle, chin_above_bar) {
            return GradingResult::IncorrectForm {
                feedback: feedback.to_owned(),
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
        debug!(exercise = %ExerciseKind::Pullup, "grader reset");
    }

    fn phase(&self) -> Phase {
        self.debouncer.phase()
    }

    fn current_phase_description(&self) -> &'static str {
        match self.debouncer.phase() {
            Phase::Down => "Down (Hang)",
            Phase::Up => "Up (Chin Above)",
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

    const HANG: f32 = 170.0;
    const PULLED: f32 = 80.0;

    #[derive(Clone, Copy)]
    struct Frame {
        elbow_angle: f32,
        chin_over: bool,
        hip_y: f32,
    }

    fn hang() -> Frame {
        Frame {
            elbow_angle: HANG,
            chin_over: false,
            hip_y: 0.7,
        }
    }

    fn pulled(chin_over: bool) -> Frame {
        Frame {
            elbow_angle: PULLED,
            chin_over,
            hip_y: 0.7,
        }
    }

    /// Facing the camera, hanging with elbows above the shoulders.
    fn skeleton(frame: Frame) -> PoseSnapshot {
        let left_shoulder = (0.4, 0.4);
        let right_shoulder = (0.6, 0.4);
        let left_elbow = (0.4, 0.28);
        let right_elbow = (0.6, 0.28);
        let left_wrist = bend(left_shoulder, left_elbow, 0.12, frame.elbow_angle);
        let right_wrist = bend(right_shoulder, right_elbow, 0.12, frame.elbow_angle);
        let bar_y = (left_wrist.1 + right_wrist.1) * 0.5;
        let nose_y = if frame.chin_over {
            bar_y - 0.1
        } else {
            bar_y + 0.1
        };

        snapshot(&[
            (LeftShoulder, left_shoulder.0, left_shoulder.1),
            (RightShoulder, right_shoulder.0, right_shoulder.1),
            (LeftElbow, left_elbow.0, left_elbow.1),
            (RightElbow, right_elbow.0, right_elbow.1),
            (LeftWrist, left_wrist.0, left_wrist.1),
            (RightWrist, right_wrist.0, right_wrist.1),
            (LeftHip, 0.45, frame.hip_y),
            (RightHip, 0.55, frame.hip_y),
            (Nose, 0.5, nose_y),
        ])
    }

    fn run(grader: &mut PullupGrader, frames: &[Frame]) -> Vec<GradingResult> {
        frames
            .iter()
            .map(|&frame| grader.grade_pose(&skeleton(frame)))
            .collect()
    }

    fn full_rep() -> Vec<Frame> {
        vec![
            hang(),
            hang(),
            pulled(true),
            pulled(true),
            hang(),
            hang(),
        ]
    }

    #[test]
    fn full_rep_is_counted() {
        let mut grader = PullupGrader::default();
        let results = run(&mut grader, &full_rep());
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
        assert_eq!(grader.rep_count(), 1);
        assert_eq!(grader.phase(), Phase::Down);
    }

    #[test]
    fn chin_below_bar_is_rejected() {
        let mut grader = PullupGrader::default();
        let frames = [
            hang(),
            hang(),
            pulled(false),
            pulled(false),
            hang(),
            hang(),
        ];
        let results = run(&mut grader, &frames);
        match results.last() {
            Some(GradingResult::IncorrectForm { feedback }) => {
                assert!(feedback.contains("Chin"), "{}", feedback)
            }
            other => panic!("expected rejected rep, got {:?}", other),
        }
        assert!(!results.contains(&GradingResult::RepCompleted));
        assert_eq!(grader.rep_count(), 0);
        assert_eq!(grader.rejected_count(), 1);
    }

    #[test]
    fn bent_arms_without_chin_never_reach_up() {
        let mut grader = PullupGrader::default();
        run(&mut grader, &[hang(), pulled(false), pulled(false)]);
        assert_eq!(grader.phase(), Phase::Between);
    }

    #[test]
    fn kipping_is_rejected() {
        let mut grader = PullupGrader::default();
        let swing = |frame: Frame, hip_y: f32| Frame { hip_y, ..frame };
        let frames = [
            hang(),
            swing(hang(), 0.72),
            swing(pulled(true), 0.6),
            swing(pulled(true), 0.6),
            hang(),
            hang(),
        ];
        let results = run(&mut grader, &frames);
        assert_eq!(
            results.last(),
            Some(&GradingResult::IncorrectForm {
                feedback: "Excessive hip movement (kipping).".to_owned()
            })
        );
        assert_eq!(grader.rep_count(), 0);
    }

    #[test]
    fn swinging_while_hanging_is_not_kipping() {
        let mut grader = PullupGrader::default();
        let swing = |hip_y: f32| Frame { hip_y, ..hang() };
        run(&mut grader, &[hang(), swing(0.55), swing(0.8), hang()]);
        let results = run(&mut grader, &full_rep());
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
    }

    #[test]
    fn lowering_from_an_unobserved_pull_is_not_a_rep() {
        let mut grader = PullupGrader::default();
        let results = run(
            &mut grader,
            &[pulled(true), pulled(true), hang(), hang()],
        );
        assert!(!results.iter().any(|r| matches!(
            r,
            GradingResult::RepCompleted | GradingResult::IncorrectForm { .. }
        )));
        assert_eq!(grader.phase(), Phase::Down);
    }

    #[test]
    fn occlusion_leaving_the_hang_keeps_the_rep() {
        let mut grader = PullupGrader::default();
        let without_nose = PoseSnapshot::from_joints(
            skeleton(hang())
                .joints()
                .filter(|&(kind, _)| kind != Nose),
        );
        run(&mut grader, &[hang(), hang()]);
        assert!(matches!(
            grader.grade_pose(&without_nose),
            GradingResult::InvalidPose { .. }
        ));
        let results = run(
            &mut grader,
            &[pulled(true), pulled(true), hang(), hang()],
        );
        assert_eq!(results.last(), Some(&GradingResult::RepCompleted));
        assert_eq!(grader.rep_count(), 1);
    }

    #[test]
    fn occlusion_while_hanging_is_not_an_attempt() {
        let mut grader = PullupGrader::default();
        run(&mut grader, &[hang(), hang()]);
        grader.grade_pose(&PoseSnapshot::default());
        let results = run(&mut grader, &[hang(), hang()]);
        assert!(!results.iter().any(|r| matches!(
            r,
            GradingResult::RepCompleted | GradingResult::IncorrectForm { .. }
        )));
        assert_eq!(grader.rejected_count(), 0);
    }

    #[test]
    fn bent_arms_while_hanging_are_coached() {
        let mut grader = PullupGrader::default();
        let results = run(&mut grader, &[hang(), hang(), pulled(false)]);
        assert_eq!(
            results[2],
            GradingResult::IncorrectForm {
                feedback: "Extend arms fully.".to_owned()
            }
        );
        assert_eq!(grader.phase(), Phase::Down);
        assert_eq!(grader.rejected_count(), 0);
    }

    #[test]
    fn chin_slipping_at_the_top_is_coached() {
        let mut grader = PullupGrader::default();
        run(&mut grader, &[hang(), hang(), pulled(true), pulled(true)]);
        assert_eq!(grader.phase(), Phase::Up);
        assert_eq!(
            grader.grade_pose(&skeleton(pulled(false))),
            GradingResult::IncorrectForm {
                feedback: "Pull higher!".to_owned()
            }
        );
        // lowering out of the top is not coached
        assert_eq!(
            grader.grade_pose(&skeleton(hang())),
            GradingResult::NoChange
        );
    }

    #[test]
    fn evaluation_reports_every_failed_criterion() {
        let mut grader = PullupGrader::default();
        let attempt = RepAccumulator {
            in_progress: true,
            left_rest: true,
            max_elbow_angle: 140.0,
            chin_cleared: false,
            min_hip_y: 0.6,
            max_hip_y: 0.7,
        };
        assert_eq!(
            grader.evaluate(attempt, 0.3),
            GradingResult::IncorrectForm {
                feedback: "Extend arms fully at bottom. Chin did not clear bar. \
                           Excessive hip movement (kipping)."
                    .to_owned()
            }
        );
        // too short a torso skips the kipping check
        assert_eq!(
            grader.evaluate(attempt, 0.01),
            GradingResult::IncorrectForm {
                feedback: "Extend arms fully at bottom. Chin did not clear bar.".to_owned()
            }
        );
        assert_eq!(grader.rejected_count(), 2);
    }

    #[test]
    fn phase_feedback_follows_the_pull() {
        let mut grader = PullupGrader::default();
        let results = run(&mut grader, &[hang(), pulled(false), pulled(false)]);
        assert_eq!(
            results.last(),
            Some(&GradingResult::InProgress {
                phase: "Moving",
                feedback: "Pulling up..."
            })
        );
    }

    #[test]
    fn missing_nose_is_invalid() {
        let mut grader = PullupGrader::default();
        let without_nose = PoseSnapshot::from_joints(
            skeleton(hang())
                .joints()
                .filter(|&(kind, _)| kind != Nose),
        );
        assert_eq!(
            grader.grade_pose(&without_nose),
            GradingResult::InvalidPose {
                reason: "Cannot see clearly: nose".to_owned()
            }
        );
        assert_eq!(grader.phase(), Phase::Invalid);
        assert_eq!(grader.rep_count(), 0);
    }

    #[test]
    fn reset_mid_rep_behaves_like_a_fresh_grader() {
        let mut grader = PullupGrader::default();
        run(&mut grader, &[hang(), hang(), pulled(true), pulled(true)]);
        grader.reset();
        assert_eq!(grader.phase(), Phase::Starting);
        assert_eq!(grader.rep_count(), 0);
        assert_eq!(
            run(&mut grader, &full_rep()),
            run(&mut PullupGrader::default(), &full_rep())
        );
    }
}
