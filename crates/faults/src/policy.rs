//! Choosing an action for each arriving event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use faultline_events::{ActionType, Event};
use rand::Rng;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Picks the action the dispatcher runs for an arriving event.
pub trait SelectionPolicy: Send + Sync {
    /// Select an action for `event`.
    fn select(&self, event: &Event) -> ActionType;
}

#[derive(Debug)]
struct Modes {
    education: AtomicBool,
    step_by_step: AtomicBool,
    changed: watch::Sender<()>,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            education: AtomicBool::new(false),
            step_by_step: AtomicBool::new(false),
            changed: watch::Sender::new(()),
        }
    }
}

/// Mode toggles shared between the dispatcher and external commands.
///
/// Clones share state. Selection reads the flags on every call.
#[derive(Clone, Debug, Default)]
pub struct ModeFlags {
    inner: Arc<Modes>,
}

impl ModeFlags {
    /// Create flags with the given initial values.
    #[must_use]
    pub fn new(education: bool, step_by_step: bool) -> Self {
        let flags = Self::default();
        flags.set_education(education);
        flags.set_step_by_step(step_by_step);
        flags
    }

    /// Whether education mode is on.
    #[must_use]
    pub fn education(&self) -> bool {
        self.inner.education.load(Ordering::Acquire)
    }

    /// Turn education mode on or off.
    pub fn set_education(&self, enable: bool) {
        if self.inner.education.swap(enable, Ordering::AcqRel) != enable {
            self.inner.changed.send_replace(());
        }
    }

    /// Whether step-by-step mode is on.
    #[must_use]
    pub fn step_by_step(&self) -> bool {
        self.inner.step_by_step.load(Ordering::Acquire)
    }

    /// Turn step-by-step mode on or off.
    pub fn set_step_by_step(&self, enable: bool) {
        if self.inner.step_by_step.swap(enable, Ordering::AcqRel) != enable {
            self.inner.changed.send_replace(());
        }
    }

    /// Notified whenever a flag actually flips.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.inner.changed.subscribe()
    }

    /// True if arriving events should pause the node.
    #[must_use]
    pub fn gating(&self) -> bool {
        self.education() && self.step_by_step()
    }
}

/// Selection driven by external commands.
///
/// Free-running (every event is a no-op) unless education and step-by-step
/// are both on, in which case every event pauses the node until
/// [`next_step`](Self::next_step).
#[derive(Clone, Debug, Default)]
pub struct CommandDriven {
    modes: ModeFlags,
}

impl CommandDriven {
    /// Create a policy reading `modes`.
    #[must_use]
    pub const fn new(modes: ModeFlags) -> Self {
        Self { modes }
    }

    /// Shared mode flags.
    #[must_use]
    pub const fn modes(&self) -> &ModeFlags {
        &self.modes
    }

    /// Action that lets a paused node take its next step.
    #[must_use]
    pub const fn next_step(&self) -> ActionType {
        ActionType::Continue
    }
}

impl SelectionPolicy for CommandDriven {
    fn select(&self, _event: &Event) -> ActionType {
        if self.modes.gating() {
            ActionType::Pause
        } else {
            ActionType::Noop
        }
    }
}

/// Random selection weighted by per-action probabilities.
#[derive(Clone, Debug)]
pub struct Weighted {
    actions: Vec<ActionType>,
    cumulative: Vec<f64>,
}

impl Weighted {
    /// Build from `(action, weight)` pairs.
    ///
    /// Weights need not sum to one; they are scaled by their total.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWeights`] if a weight is negative or not
    /// finite, or if every weight is zero.
    pub fn new(weights: &[(ActionType, f64)]) -> Result<Self> {
        let mut actions = Vec::with_capacity(weights.len());
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;

        for &(action, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidWeights(format!(
                    "{action} has weight {weight}"
                )));
            }
            total += weight;
            actions.push(action);
            cumulative.push(total);
        }

        if total <= 0.0 {
            return Err(Error::InvalidWeights("weights sum to zero".into()));
        }

        Ok(Self {
            actions,
            cumulative,
        })
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or_default()
    }

    /// Running sums of the weights.
    #[must_use]
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Uniform draw in `[0, total)`.
    #[must_use]
    pub fn draw(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..self.total())
    }

    /// Index of the first action whose cumulative weight exceeds `draw`.
    ///
    /// Zero-weight actions are never chosen.
    #[must_use]
    pub fn pick_index(&self, draw: f64) -> usize {
        let idx = self.cumulative.partition_point(|&c| c <= draw);
        idx.min(self.cumulative.len() - 1)
    }

    /// Action chosen by `draw`.
    #[must_use]
    pub fn pick(&self, draw: f64) -> ActionType {
        self.actions[self.pick_index(draw)]
    }

    /// Draw and pick an action.
    #[must_use]
    pub fn determine_action(&self) -> ActionType {
        self.pick(self.draw())
    }
}

impl SelectionPolicy for Weighted {
    fn select(&self, _event: &Event) -> ActionType {
        self.determine_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> Weighted {
        Weighted::new(&[
            (ActionType::Noop, 0.2),
            (ActionType::Halt, 0.3),
            (ActionType::Pause, 0.3),
            (ActionType::Stop, 0.1),
            (ActionType::ResendLastMessage, 0.1),
        ])
        .unwrap()
    }

    #[test]
    fn test_weighted_table() {
        let weighted = table();

        assert_eq!(weighted.pick_index(0.0), 0);
        // 0.45 falls in the [0.2, 0.5) band
        assert_eq!(weighted.pick_index(0.45), 1);
        assert_eq!(weighted.pick(0.45), ActionType::Halt);
        assert_eq!(weighted.pick_index(0.5), 2);
        assert_eq!(weighted.pick_index(0.85), 3);
        assert_eq!(weighted.pick_index(0.999_999), 4);
    }

    #[test]
    fn test_zero_weight_never_chosen() {
        let weighted = Weighted::new(&[
            (ActionType::Noop, 0.0),
            (ActionType::Halt, 0.5),
            (ActionType::Pause, 0.0),
            (ActionType::Stop, 0.5),
        ])
        .unwrap();

        assert_eq!(weighted.pick(0.0), ActionType::Halt);
        assert_eq!(weighted.pick(0.5), ActionType::Stop);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(Weighted::new(&[(ActionType::Noop, 0.0)]).is_err());
        assert!(Weighted::new(&[]).is_err());
        assert!(Weighted::new(&[(ActionType::Noop, 1.0), (ActionType::Halt, -0.1)]).is_err());
        assert!(Weighted::new(&[(ActionType::Noop, f64::NAN)]).is_err());
    }

    #[test]
    fn test_step_by_step_gating() {
        let modes = ModeFlags::new(true, true);
        let policy = CommandDriven::new(modes.clone());
        let event = Event::default();

        assert_eq!(policy.select(&event), ActionType::Pause);
        assert_eq!(policy.next_step(), ActionType::Continue);

        modes.set_step_by_step(false);
        assert_eq!(policy.select(&event), ActionType::Noop);

        modes.set_step_by_step(true);
        modes.set_education(false);
        assert_eq!(policy.select(&event), ActionType::Noop);
    }

    #[test]
    fn test_mode_changes_notify() {
        let modes = ModeFlags::default();
        let mut changes = modes.subscribe();

        modes.set_education(false);
        assert!(!changes.has_changed().unwrap());

        modes.set_education(true);
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        modes.clone().set_step_by_step(true);
        assert!(changes.has_changed().unwrap());
    }

    proptest! {
        #[test]
        fn prop_pick_matches_band(
            weights in prop::collection::vec(0.0f64..10.0, 1..8),
            fraction in 0.0f64..1.0,
        ) {
            prop_assume!(weights.iter().sum::<f64>() > 0.0);
            let pairs: Vec<_> = weights
                .iter()
                .map(|&w| (ActionType::Noop, w))
                .collect();
            let weighted = Weighted::new(&pairs).unwrap();
            let draw = fraction * weighted.total();
            prop_assume!(draw < weighted.total());

            let idx = weighted.pick_index(draw);
            let cumulative = weighted.cumulative();
            prop_assert!(cumulative[idx] > draw);
            prop_assert!(weights[idx] > 0.0);
            if idx > 0 {
                prop_assert!(cumulative[idx - 1] <= draw);
            }
        }

        #[test]
        fn prop_draw_in_range(weight in 0.01f64..100.0) {
            let weighted = Weighted::new(&[(ActionType::Noop, weight)]).unwrap();
            let draw = weighted.draw();
            prop_assert!((0.0..weighted.total()).contains(&draw));
        }
    }
}
