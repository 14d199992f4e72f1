use crate::grader::Phase;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    /// The candidate matched the committed phase.
    Stayed,
    /// The candidate differed but has not persisted long enough to commit.
    Held,
    Committed { from: Phase, to: Phase },
}

/// Suppresses single-frame phase flicker by requiring a differing candidate to persist for a
/// number of consecutive frames before it replaces the committed phase.
///
/// Transitions into or out of [`Phase::Invalid`] and out of [`Phase::Starting`] are never held.
#[derive(Debug, Clone)]
pub(crate) struct Debouncer {
    committed: Phase,
    stable_frames: usize,
    pending: Option<(Phase, usize)>,
    required_stable_frames: usize,
}

impl Debouncer {
    pub(crate) fn new(required_stable_frames: usize) -> Self {
        Self {
            committed: Phase::Starting,
            stable_frames: 0,
            pending: None,
            required_stable_frames: required_stable_frames.max(1),
        }
    }

    #[inline]
    pub(crate) fn phase(&self) -> Phase {
        self.committed
    }

    #[cfg(test)]
    pub(crate) fn stable_frames(&self) -> usize {
        self.stable_frames
    }

    pub(crate) fn propose(&mut self, candidate: Phase) -> Transition {
        if candidate == self.committed {
            self.stable_frames += 1;
            self.pending = None;
            return Transition::Stayed;
        }

        let streak = match self.pending {
            Some((pending, streak)) if pending == candidate => streak + 1,
            _ => 1,
        };

        let immediate = matches!(self.committed, Phase::Starting | Phase::Invalid)
            || candidate == Phase::Invalid;

        if immediate || streak >= self.required_stable_frames {
            self.commit(candidate, streak)
        } else {
            self.pending = Some((candidate, streak));
            Transition::Held
        }
    }

    /// Commit `phase` regardless of how long it has been observed.
    pub(crate) fn force(&mut self, phase: Phase) -> Transition {
        if phase == self.committed {
            self.stable_frames += 1;
            self.pending = None;
            Transition::Stayed
        } else {
            self.commit(phase, 1)
        }
    }

    pub(crate) fn reset(&mut self) {
        self.committed = Phase::Starting;
        self.stable_frames = 0;
        self.pending = None;
    }

    fn commit(&mut self, to: Phase, streak: usize) -> Transition {
        let from = std::mem::replace(&mut self.committed, to);
        self.stable_frames = streak;
        self.pending = None;
        debug!(?from, ?to, "phase committed");
        Transition::Committed { from, to }
    }
}
