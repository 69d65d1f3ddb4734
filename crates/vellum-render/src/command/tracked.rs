/// Whether a slot's current value still needs to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Clean,
    Dirty,
}

/// A piece of render state: the value being recorded plus every value
/// committed to the command stream this frame.
///
/// `history` is never empty. Its last entry is what the device will have
/// bound at the current point of replay.
#[derive(Debug, Clone)]
pub struct TrackedSlot<T> {
    current: T,
    history: Vec<T>,
}

impl<T: Clone + PartialEq> TrackedSlot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: initial.clone(),
            history: vec![initial],
        }
    }

    /// Records `value` and returns the slot's new status.
    ///
    /// A clean slot turns dirty only when the value actually changes. A dirty
    /// slot turns clean again when the value returns to the last committed
    /// one, so `a, b, a` leaves nothing to emit.
    pub fn push(&mut self, value: T, status: SlotStatus) -> SlotStatus {
        match status {
            SlotStatus::Clean => {
                if value == self.current {
                    return SlotStatus::Clean;
                }
                self.current = value;
                SlotStatus::Dirty
            }
            SlotStatus::Dirty => {
                self.current = value;
                if *self.last_committed() == self.current {
                    SlotStatus::Clean
                } else {
                    SlotStatus::Dirty
                }
            }
        }
    }

    /// Appends the current value to the history and returns its index.
    pub fn commit(&mut self) -> u32 {
        self.history.push(self.current.clone());
        (self.history.len() - 1) as u32
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn last_committed(&self) -> &T {
        // history always holds at least the seed value
        &self.history[self.history.len() - 1]
    }

    /// # Panics
    ///
    /// Panics if `index` was not returned by [`commit`](Self::commit) this
    /// frame (or is not 0).
    pub fn get(&self, index: u32) -> &T {
        &self.history[index as usize]
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Starts a new frame: the history collapses to the last committed value,
    /// which also becomes the current value.
    pub fn reseed(&mut self) {
        let last = self.last_committed().clone();
        self.history.clear();
        self.history.push(last.clone());
        self.current = last;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_same_value_stays_clean() {
        let mut slot = TrackedSlot::new(1);
        assert_eq!(slot.push(1, SlotStatus::Clean), SlotStatus::Clean);
    }

    #[test]
    fn test_round_trip_returns_to_clean() {
        let mut slot = TrackedSlot::new(1);
        let status = slot.push(2, SlotStatus::Clean);
        assert_eq!(status, SlotStatus::Dirty);
        let status = slot.push(3, status);
        assert_eq!(status, SlotStatus::Dirty);
        let status = slot.push(1, status);
        assert_eq!(status, SlotStatus::Clean);
        assert_eq!(*slot.current(), 1);
    }

    #[test]
    fn test_commit_and_reseed() {
        let mut slot = TrackedSlot::new("a");
        slot.push("b", SlotStatus::Clean);
        assert_eq!(slot.commit(), 1);
        assert_eq!(*slot.get(0), "a");
        assert_eq!(*slot.get(1), "b");

        slot.reseed();
        assert_eq!(slot.history_len(), 1);
        assert_eq!(*slot.get(0), "b");
        assert_eq!(*slot.current(), "b");
    }
}
