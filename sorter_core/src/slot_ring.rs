//! Circular per-slot bookkeeping.
//!
//! The ring never moves data between cells. Rotation only changes `head`,
//! and every access by logical position goes through
//! `slot_index(pos) = (head + pos) mod N`.

use std::fmt;
use std::num::NonZeroU32;

use thiserror::Error;

/// Identity of a bean while it rides the carousel. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(NonZeroU32);

impl BeanId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification lifecycle of the bean held by a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeanState {
    #[default]
    Empty,
    Entered,
    CaptureRequested,
    Normal,
    Defect,
}

impl BeanState {
    /// Normal or Defect: classification settled, waiting for ejection.
    pub fn is_terminal(self) -> bool {
        matches!(self, BeanState::Normal | BeanState::Defect)
    }

    /// Forward-only lifecycle: Entered -> CaptureRequested -> Normal|Defect.
    /// Clearing back to Empty goes through `SlotRing::clear`.
    fn can_become(self, next: BeanState) -> bool {
        matches!(
            (self, next),
            (BeanState::Entered, BeanState::CaptureRequested)
                | (BeanState::CaptureRequested, BeanState::Normal)
                | (BeanState::CaptureRequested, BeanState::Defect)
        )
    }
}

/// One cell of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    pub bean: Option<BeanId>,
    pub state: BeanState,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        self.bean.is_none()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("position {pos} already holds bean {bean}")]
    Occupied { pos: usize, bean: BeanId },
    #[error("position {pos} is empty")]
    Empty { pos: usize },
    #[error("bean {0} is not on the ring")]
    UnknownBean(BeanId),
    #[error("bean {bean} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        bean: BeanId,
        from: BeanState,
        to: BeanState,
    },
}

/// Fixed-size slot table plus the carousel bookkeeping that travels with it.
#[derive(Debug, Clone)]
pub struct SlotRing {
    slots: Vec<Slot>,
    head: usize,
    pending: Option<BeanId>,
    next_id: u32,
}

impl SlotRing {
    /// Empty ring of `n` slots. `n` must be at least 1.
    pub fn new(n: usize) -> Self {
        Self {
            slots: vec![Slot::default(); n.max(1)],
            head: 0,
            pending: None,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Slot::is_empty)
    }

    pub fn head(&self) -> usize {
        self.head
    }

    /// Physical array index for a logical position.
    #[inline]
    pub fn slot_index(&self, pos: usize) -> usize {
        (self.head + pos % self.len()) % self.len()
    }

    /// Logical position currently mapped onto array index `idx`.
    #[inline]
    pub fn position_of_index(&self, idx: usize) -> usize {
        (idx % self.len() + self.len() - self.head) % self.len()
    }

    pub fn get(&self, pos: usize) -> Slot {
        self.slots[self.slot_index(pos)]
    }

    /// Array index of the slot holding `bean` (linear scan).
    pub fn find(&self, bean: BeanId) -> Option<usize> {
        self.slots.iter().position(|s| s.bean == Some(bean))
    }

    /// Logical position of `bean`, if it is on the ring.
    pub fn position_of(&self, bean: BeanId) -> Option<usize> {
        self.find(bean).map(|idx| self.position_of_index(idx))
    }

    /// Place a new bean with a fresh id at `pos` (state Entered).
    pub fn insert_new(&mut self, pos: usize) -> Result<BeanId, RingError> {
        let idx = self.slot_index(pos);
        if let Some(bean) = self.slots[idx].bean {
            return Err(RingError::Occupied { pos, bean });
        }
        let id = self.allocate_id();
        self.slots[idx] = Slot {
            bean: Some(id),
            state: BeanState::Entered,
        };
        Ok(id)
    }

    /// Move the bean at `pos` forward to `state`.
    pub fn set_state(&mut self, pos: usize, state: BeanState) -> Result<BeanId, RingError> {
        let idx = self.slot_index(pos);
        let slot = &mut self.slots[idx];
        let Some(bean) = slot.bean else {
            return Err(RingError::Empty { pos });
        };
        if !slot.state.can_become(state) {
            return Err(RingError::InvalidTransition {
                bean,
                from: slot.state,
                to: state,
            });
        }
        slot.state = state;
        Ok(bean)
    }

    /// Set the state of `bean` wherever it is on the ring.
    pub fn set_state_of(&mut self, bean: BeanId, state: BeanState) -> Result<usize, RingError> {
        let pos = self
            .position_of(bean)
            .ok_or(RingError::UnknownBean(bean))?;
        self.set_state(pos, state)?;
        Ok(pos)
    }

    /// Empty the slot at `pos`, returning what it held.
    pub fn clear(&mut self, pos: usize) -> Slot {
        let idx = self.slot_index(pos);
        std::mem::take(&mut self.slots[idx])
    }

    /// Account for the carousel moving one cell downstream: whatever sat at
    /// position p now sits at p + 1.
    pub fn advance_cell(&mut self) {
        self.head = (self.head + self.len() - 1) % self.len();
    }

    pub fn pending(&self) -> Option<BeanId> {
        self.pending
    }

    pub fn set_pending(&mut self, bean: BeanId) {
        self.pending = Some(bean);
    }

    pub fn take_pending(&mut self) -> Option<BeanId> {
        self.pending.take()
    }

    /// Occupied slots as `(logical position, slot)`, in position order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, Slot)> + '_ {
        (0..self.len())
            .map(|pos| (pos, self.get(pos)))
            .filter(|(_, s)| !s.is_empty())
    }

    /// Forget everything: empty slots, head 0, no pending request, ids from 1.
    pub fn reset(&mut self) {
        self.slots.fill(Slot::default());
        self.head = 0;
        self.pending = None;
        self.next_id = 1;
    }

    fn allocate_id(&mut self) -> BeanId {
        let id = BeanId::new(self.next_id).unwrap_or(BeanId(NonZeroU32::MIN));
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        id
    }
}
