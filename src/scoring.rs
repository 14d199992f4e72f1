//! APFT point tables for the 17-21 male bracket.

use crate::grader::ExerciseKind;
use std::{convert::TryFrom, time::Duration};

/// Points for 0 through 68 push-ups.
const PUSHUP_POINTS: [u8; 69] = [
    0, 1, 3, 4, 6, 7, 9, 10, 12, 13, //
    15, 16, 18, 19, 21, 22, 24, 25, 26, 28, //
    29, 31, 32, 34, 35, 37, 38, 40, 41, 43, //
    44, 46, 47, 48, 50, 51, 53, 54, 56, 57, //
    59, 60, 62, 63, 65, 66, 68, 69, 71, 72, //
    74, 75, 76, 78, 79, 81, 82, 84, 85, 87, //
    88, 90, 91, 93, 94, 96, 97, 99, 100,
];

const MAX_SITUPS: u32 = 78;
const MAX_PULLUPS: u32 = 25;
const PULLUP_POINTS_PER_REP: u32 = 4;

const FASTEST_RUN_SECS: u64 = 660;
const SLOWEST_RUN_SECS: u64 = 1170;
const RUN_STEP_SECS: u64 = 6;

/// Points for two-mile run times from 11:00 through 19:30 in 6 second steps.
const RUN_POINTS: [u8; 86] = [
    100, 99, 98, 96, 95, 94, 93, 92, 91, 89, //
    88, 87, 86, 85, 84, 82, 81, 80, 79, 78, //
    76, 75, 74, 73, 72, 71, 69, 68, 67, 66, //
    64, 63, 62, 61, 60, 59, 57, 56, 55, 54, //
    53, 51, 50, 49, 48, 47, 45, 44, 43, 42, //
    41, 39, 38, 37, 36, 35, 33, 32, 31, 30, //
    29, 28, 27, 26, 24, 23, 22, 21, 20, 19, //
    18, 16, 15, 14, 13, 12, 11, 10, 9, 8, //
    6, 5, 4, 3, 2, 0,
];

pub fn pushup_points(reps: u32) -> u8 {
    let last = PUSHUP_POINTS.len() - 1;
    let index = usize::try_from(reps).map_or(last, |reps| reps.min(last));
    PUSHUP_POINTS[index]
}

pub fn situp_points(reps: u32) -> u8 {
    let points = match reps.min(MAX_SITUPS) {
        reps @ 0..=50 => reps,
        51 => 52,
        reps @ 52..=68 => 58 + 2 * (reps - 52),
        reps => 91 + (reps - 69),
    };
    u8::try_from(points).unwrap_or(u8::MAX)
}

pub fn pullup_points(reps: u32) -> u8 {
    u8::try_from(reps.min(MAX_PULLUPS) * PULLUP_POINTS_PER_REP).unwrap_or(u8::MAX)
}

/// Points for a two-mile run. Times between table rows score the nearest faster row.
pub fn run_points(time: Duration) -> u8 {
    let secs = time.as_secs();
    if time <= Duration::from_secs(FASTEST_RUN_SECS) {
        return RUN_POINTS[0];
    }
    if secs >= SLOWEST_RUN_SECS {
        return 0;
    }

    usize::try_from((secs - FASTEST_RUN_SECS) / RUN_STEP_SECS)
        .ok()
        .and_then(|index| RUN_POINTS.get(index))
        .copied()
        .unwrap_or(0)
}

pub fn points(exercise: ExerciseKind, reps: u32) -> u8 {
    match exercise {
        ExerciseKind::Pushup => pushup_points(reps),
        ExerciseKind::Pullup => pullup_points(reps),
        ExerciseKind::Situp => situp_points(reps),
    }
}
