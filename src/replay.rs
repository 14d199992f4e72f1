//! JSON-lines pose recordings: one frame per line.
//!
//! ```text
//! {"timestamp_ms": 33, "joints": {"left_shoulder": {"x": 0.4, "y": 0.3, "confidence": 0.9}}}
//! {"joints": [{"x": 0.5, "y": 0.1, "score": 0.8}, null, ...]}
//! ```
//!
//! `joints` is either keyed by joint name or a list in COCO keypoint order, where `null` marks an
//! undetected joint.

use crate::{
    error::Error,
    pose::{Joint, JointKind, PoseSnapshot},
};
use std::{collections::HashMap, io::BufRead, time::Duration};

#[derive(Debug, serde::Deserialize)]
struct RawJoint {
    x: f32,
    y: f32,
    #[serde(alias = "score", alias = "visibility")]
    confidence: f32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawJoints {
    Named(HashMap<JointKind, RawJoint>),
    Indexed(Vec<Option<RawJoint>>),
}

#[derive(Debug, serde::Deserialize)]
struct RawFrame {
    #[serde(default)]
    timestamp_ms: Option<u64>,
    joints: RawJoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Capture time, if the recording carries one.
    pub timestamp: Option<Duration>,
    pub snapshot: PoseSnapshot,
}

impl RawJoint {
    fn into_joint(self) -> Result<Joint, Error> {
        Joint::new(self.x, self.y, self.confidence)
    }
}

impl RawJoints {
    fn into_snapshot(self) -> Result<PoseSnapshot, Error> {
        let joints = match self {
            Self::Named(joints) => joints
                .into_iter()
                .map(|(kind, raw)| Ok((kind, raw.into_joint()?)))
                .collect::<Result<Vec<_>, Error>>()?,
            Self::Indexed(joints) => joints
                .into_iter()
                .enumerate()
                .filter_map(|(index, raw)| raw.map(|raw| (index, raw)))
                .map(|(index, raw)| Ok((JointKind::from_index(index)?, raw.into_joint()?)))
                .collect::<Result<Vec<_>, Error>>()?,
        };
        Ok(PoseSnapshot::from_joints(joints))
    }
}

/// Decode a single recording line. `line_number` is 1-based and only used for errors.
pub fn parse_frame(line_number: usize, line: &str) -> Result<Frame, Error> {
    let raw: RawFrame =
        serde_json::from_str(line).map_err(|e| Error::DecodeSnapshot(line_number, e))?;
    let snapshot = raw
        .joints
        .into_snapshot()
        .map_err(|e| Error::InvalidSnapshot(line_number, Box::new(e)))?;
    Ok(Frame {
        timestamp: raw.timestamp_ms.map(Duration::from_millis),
        snapshot,
    })
}

/// Iterator over the frames of a recording, skipping blank lines.
pub struct FrameReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(parse_frame(self.line_number, &line)),
                Err(e) => return Some(Err(Error::ReadLine(self.line_number, e))),
            }
        }
    }
}
