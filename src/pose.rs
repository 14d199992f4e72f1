use crate::{error::Error, geometry::Point};
use num_traits::FromPrimitive;
use std::fmt;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    num_derive::FromPrimitive,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
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
    LeftAnkle,
    RightAnkle,
}

pub const NUM_JOINTS: usize = 17;

impl JointKind {
    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    /// Map a COCO keypoint index to its joint.
    pub fn from_index(index: usize) -> Result<Self, Error> {
        Self::from_usize(index).ok_or(Error::ConvertUSizeToJointKind(index))
    }

    pub fn name(self) -> &'static str {
        use JointKind::*;

        match self {
            Nose => "nose",
            LeftEye => "left eye",
            RightEye => "right eye",
            LeftEar => "left ear",
            RightEar => "right ear",
            LeftShoulder => "left shoulder",
            RightShoulder => "right shoulder",
            LeftElbow => "left elbow",
            RightElbow => "right elbow",
            LeftWrist => "left wrist",
            RightWrist => "right wrist",
            LeftHip => "left hip",
            RightHip => "right hip",
            LeftKnee => "left knee",
            RightKnee => "right knee",
            LeftAnkle => "left ankle",
            RightAnkle => "right ankle",
        }
    }
}

impl fmt::Display for JointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Joint {
    pub point: Point,
    pub confidence: f32,
}

impl Joint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            point: Point::new(x, y)?,
            confidence,
        })
    }
}

/// Joints that failed the confidence gate, in the order they were required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingJoints(pub Vec<JointKind>);

impl fmt::Display for MissingJoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.name())?;
        }
        Ok(())
    }
}

/// A single frame's worth of joint estimates. An absent joint is equivalent to a joint with zero
/// confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSnapshot {
    joints: [Option<Joint>; NUM_JOINTS],
}

impl PoseSnapshot {
    /// Build a snapshot from `(kind, joint)` pairs. A kind given twice keeps the last joint.
    pub fn from_joints<I>(joints: I) -> Self
    where
        I: IntoIterator<Item = (JointKind, Joint)>,
    {
        let mut snapshot = Self::default();
        for (kind, joint) in joints {
            snapshot.joints[kind.idx()] = Some(joint);
        }
        snapshot
    }

    pub fn joint(&self, kind: JointKind) -> Option<Joint> {
        self.joints[kind.idx()]
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointKind, Joint)> + '_ {
        self.joints.iter().enumerate().filter_map(|(index, joint)| {
            let joint = (*joint)?;
            JointKind::from_usize(index).map(|kind| (kind, joint))
        })
    }

    /// The joint's position if it was seen with at least `min_confidence`.
    pub fn confident_point(&self, kind: JointKind, min_confidence: f32) -> Option<Point> {
        self.joint(kind)
            .filter(|joint| joint.confidence >= min_confidence)
            .map(|joint| joint.point)
    }

    pub fn missing_joints(&self, required: &[JointKind], min_confidence: f32) -> MissingJoints {
        MissingJoints(
            required
                .iter()
                .copied()
                .filter(|&kind| self.confident_point(kind, min_confidence).is_none())
                .collect(),
        )
    }

    /// Confidence gate: either every required joint's position, in the order requested, or the
    /// list of joints that are missing.
    pub fn require<const N: usize>(
        &self,
        required: &[JointKind; N],
        min_confidence: f32,
    ) -> Result<[Point; N], MissingJoints> {
        let mut points = [Point::default(); N];
        let mut missing = Vec::new();

        for (dst, &kind) in points.iter_mut().zip(required.iter()) {
            match self.confident_point(kind, min_confidence) {
                Some(point) => *dst = point,
                None => missing.push(kind),
            }
        }

        if missing.is_empty() {
            Ok(points)
        } else {
            Err(MissingJoints(missing))
        }
    }
}
