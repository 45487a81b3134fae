use crate::error::SlotError;
use crate::snapshot::ClipboardSnapshot;
use std::collections::BTreeMap;

/// Reserved id of the slot that mirrors the real system clipboard.
pub const SYSTEM_CLIPBOARD_ID: i32 = -1;

/// Most recent snapshot per clipboard slot.
///
/// The system clipboard slot always exists and cannot be removed.
#[derive(Debug, Clone)]
pub struct ClipboardSlotRegistry {
    slots: BTreeMap<i32, Option<ClipboardSnapshot>>,
}

impl Default for ClipboardSlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSlotRegistry {
    pub fn new() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(SYSTEM_CLIPBOARD_ID, None);
        Self { slots }
    }

    pub fn add(&mut self, id: i32) -> Result<(), SlotError> {
        if id == SYSTEM_CLIPBOARD_ID {
            return Err(SlotError::Reserved);
        }
        if id <= 0 {
            return Err(SlotError::InvalidId(id));
        }
        if self.slots.contains_key(&id) {
            return Err(SlotError::Duplicate(id));
        }
        self.slots.insert(id, None);
        Ok(())
    }

    /// Remove a slot, returning whatever it held.
    pub fn remove(&mut self, id: i32) -> Result<Option<ClipboardSnapshot>, SlotError> {
        if id == SYSTEM_CLIPBOARD_ID {
            return Err(SlotError::Reserved);
        }
        self.slots.remove(&id).ok_or(SlotError::Unknown(id))
    }

    pub fn contains(&self, id: i32) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: i32) -> Option<&ClipboardSnapshot> {
        self.slots.get(&id).and_then(Option::as_ref)
    }

    /// Store `snapshot` as the slot's contents; the latest write wins.
    pub fn set(&mut self, id: i32, snapshot: ClipboardSnapshot) -> Result<(), SlotError> {
        let slot = self.slots.get_mut(&id).ok_or(SlotError::Unknown(id))?;
        *slot = Some(snapshot);
        Ok(())
    }

    /// Slot ids in ascending order, the system clipboard first.
    pub fn ids(&self) -> Vec<i32> {
        self.slots.keys().copied().collect()
    }
}
