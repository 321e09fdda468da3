//! Priority gate shared by every playback lane.
//!
//! A lane first *reserves* a slot, then loads the motion, then *starts* it.
//! Keeping the reservation separate from the active slot lets a load run
//! without holding the lane, while still shutting out lower-priority
//! requests until the load resolves.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordinal deciding which request may take over a lane.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MotionPriority {
    #[default]
    None = 0,
    Idle = 1,
    Normal = 2,
    Force = 3,
}

impl fmt::Display for MotionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Idle => "idle",
            Self::Normal => "normal",
            Self::Force => "force",
        };
        f.write_str(name)
    }
}

/// A `(group, index)` coordinate into the motion definitions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MotionSlot {
    pub group: String,
    pub index: usize,
}

impl MotionSlot {
    pub fn new(group: impl Into<String>, index: usize) -> Self {
        Self {
            group: group.into(),
            index,
        }
    }

    #[inline]
    fn is(&self, group: &str, index: usize) -> bool {
        self.index == index && self.group == group
    }
}

impl fmt::Display for MotionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.group, self.index)
    }
}

/// Coarse view of [`MotionState`] for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    /// A load is outstanding (a motion may also still be playing).
    Reserved,
    Active,
}

#[derive(Debug, Default, Clone)]
pub struct MotionState {
    /// Owner tag used in log lines.
    pub tag: String,
    current_priority: MotionPriority,
    reserve_priority: MotionPriority,
    active: Option<MotionSlot>,
    reserved: Option<MotionSlot>,
}

impl MotionState {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn current_priority(&self) -> MotionPriority {
        self.current_priority
    }

    #[inline]
    pub fn reserve_priority(&self) -> MotionPriority {
        self.reserve_priority
    }

    #[inline]
    pub fn active(&self) -> Option<&MotionSlot> {
        self.active.as_ref()
    }

    #[inline]
    pub fn reserved(&self) -> Option<&MotionSlot> {
        self.reserved.as_ref()
    }

    pub fn phase(&self) -> MotionPhase {
        if self.reserved.is_some() {
            MotionPhase::Reserved
        } else if self.active.is_some() {
            MotionPhase::Active
        } else {
            MotionPhase::Idle
        }
    }

    /// Claim `(group, index)` ahead of loading it.
    ///
    /// Returns false, leaving the state untouched, when the priority is
    /// `None`, when the slot is already active or reserved, or when the
    /// request does not outrank what is playing or pending. `Force` outranks
    /// everything except another pending `Force` reservation.
    pub fn reserve(&mut self, group: &str, index: usize, priority: MotionPriority) -> bool {
        if priority == MotionPriority::None {
            debug!(tag = %self.tag, "cannot reserve motion with priority none");
            return false;
        }

        if self.is_active(group, index) {
            debug!(tag = %self.tag, group, index, "motion is already playing or reserved");
            return false;
        }

        if priority == MotionPriority::Force {
            if self.reserve_priority == MotionPriority::Force {
                debug!(
                    tag = %self.tag,
                    group,
                    index,
                    "another forced motion is still loading"
                );
                return false;
            }
        } else if priority <= self.current_priority || priority <= self.reserve_priority {
            debug!(
                tag = %self.tag,
                group,
                index,
                %priority,
                current = %self.current_priority,
                reserved = %self.reserve_priority,
                "motion priority too low"
            );
            return false;
        }

        self.reserved = Some(MotionSlot::new(group, index));
        self.reserve_priority = priority;
        true
    }

    /// Promote the reservation for `(group, index)` once its load resolved.
    ///
    /// A reservation that has since been replaced is left alone. A failed
    /// load (`motion` is `None`) releases the reservation.
    pub fn start<M: ?Sized>(
        &mut self,
        motion: Option<&M>,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> bool {
        let current = self.reserve_priority == priority
            && self.reserved.as_ref().is_some_and(|slot| slot.is(group, index));
        if !current {
            debug!(tag = %self.tag, group, index, "reservation was superseded");
            return false;
        }

        self.reserved = None;
        self.reserve_priority = MotionPriority::None;

        if motion.is_none() {
            debug!(tag = %self.tag, group, index, "motion failed to load");
            return false;
        }

        self.active = Some(MotionSlot::new(group, index));
        self.current_priority = priority;
        true
    }

    /// True if `(group, index)` is playing or reserved.
    pub fn is_active(&self, group: &str, index: usize) -> bool {
        self.active.as_ref().is_some_and(|s| s.is(group, index))
            || self.reserved.as_ref().is_some_and(|s| s.is(group, index))
    }

    pub fn complete(&mut self) {
        self.active = None;
        self.current_priority = MotionPriority::None;
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.reserved = None;
        self.current_priority = MotionPriority::None;
        self.reserve_priority = MotionPriority::None;
    }

    /// Nothing is playing or pending, so an idle motion may be scheduled.
    #[inline]
    pub fn should_request_idle_motion(&self) -> bool {
        self.active.is_none() && self.reserved.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MotionPriority::*;

    const LOADED: Option<&()> = Some(&());

    #[test]
    fn priorities_compare_by_rank() {
        assert!(None < Idle && Idle < Normal && Normal < Force);
        assert_eq!(serde_json::to_string(&Force).unwrap(), "\"force\"");
        assert_eq!(Idle.to_string(), "idle");
    }

    #[test]
    fn none_priority_is_never_reserved() {
        let mut s = MotionState::new("t");
        assert!(!s.reserve("idle", 0, None));
        assert_eq!(s.phase(), MotionPhase::Idle);
    }

    #[test]
    fn reserve_then_start_becomes_active() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("tap", 1, Normal));
        assert_eq!(s.phase(), MotionPhase::Reserved);
        assert!(s.is_active("tap", 1));

        assert!(s.start(LOADED, "tap", 1, Normal));
        assert_eq!(s.phase(), MotionPhase::Active);
        assert_eq!(s.current_priority(), Normal);
        assert_eq!(s.reserve_priority(), None);
        assert_eq!(s.active(), Some(&MotionSlot::new("tap", 1)));
    }

    #[test]
    fn equal_or_lower_priority_is_rejected() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Normal));
        assert!(!s.reserve("b", 0, Normal));
        assert!(!s.reserve("b", 0, Idle));
        assert_eq!(s.reserved(), Some(&MotionSlot::new("a", 0)));

        assert!(s.start(LOADED, "a", 0, Normal));
        assert!(!s.reserve("b", 0, Normal));
        assert!(!s.reserve("b", 0, Idle));
    }

    #[test]
    fn higher_priority_supersedes_pending_reservation() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Idle));
        assert!(s.reserve("b", 0, Normal));
        // The idle load resolves late and must not take over.
        assert!(!s.start(LOADED, "a", 0, Idle));
        assert_eq!(s.reserved(), Some(&MotionSlot::new("b", 0)));
        assert!(s.start(LOADED, "b", 0, Normal));
    }

    #[test]
    fn force_blocks_only_another_pending_force() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Force));
        assert!(!s.reserve("b", 0, Force));

        assert!(s.start(LOADED, "a", 0, Force));
        assert!(s.reserve("b", 0, Force), "an active force motion can be preempted");
    }

    #[test]
    fn failed_load_releases_reservation() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Normal));
        assert!(!s.start::<()>(Option::None, "a", 0, Normal));
        assert_eq!(s.phase(), MotionPhase::Idle);
        assert!(s.reserve("b", 0, Idle));
    }

    #[test]
    fn same_slot_cannot_be_reserved_twice() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Idle));
        assert!(!s.reserve("a", 0, Force));
    }

    #[test]
    fn complete_and_reset() {
        let mut s = MotionState::new("t");
        assert!(s.reserve("a", 0, Normal));
        assert!(s.start(LOADED, "a", 0, Normal));
        assert!(s.reserve("b", 0, Force));

        s.complete();
        assert!(!s.is_active("a", 0));
        assert!(s.is_active("b", 0));
        assert!(!s.should_request_idle_motion());

        s.reset();
        assert!(!s.is_active("b", 0));
        assert!(s.should_request_idle_motion());
        assert!(s.reserve("c", 0, Idle));
    }
}
