use crate::deck::manifest::CardRecord;

/// Number of card positions on one sheet.
pub const SLOTS_PER_PAGE: usize = 8;

/// Which card field a slot table is keyed by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotKey {
    /// Key slots by [`CardRecord::identity`].
    #[default]
    Identity,
    /// Key slots by [`CardRecord::display_name`].
    DisplayName,
}

/// A slot that was claimed by more than one card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotCollision {
    /// Contested slot index.
    pub slot: usize,
    /// Key that was overwritten.
    pub replaced: String,
    /// Key that now occupies the slot.
    pub winner: String,
}

/// Dense, order-preserving map from slot index to the card key printed there.
///
/// Length is `1 + max slot index` across all records; indices nobody claims stay empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<Option<String>>,
    collisions: Vec<SlotCollision>,
}

impl SlotTable {
    /// Build the table keyed by card identity.
    pub fn from_records(records: &[CardRecord]) -> Self {
        Self::from_records_by(records, SlotKey::Identity)
    }

    /// Build the table keyed by the chosen card field.
    ///
    /// Records are applied in order; when two records claim the same slot the later one wins and
    /// the collision is recorded and logged.
    pub fn from_records_by(records: &[CardRecord], key: SlotKey) -> Self {
        let mut table = Self::default();
        for record in records {
            let value = match key {
                SlotKey::Identity => &record.identity,
                SlotKey::DisplayName => &record.display_name,
            };
            for &slot in &record.slots {
                table.assign(slot, value.clone());
            }
        }
        table
    }

    /// Build a table directly from slot contents.
    pub fn from_slots(slots: Vec<Option<String>>) -> Self {
        Self {
            slots,
            collisions: Vec::new(),
        }
    }

    fn assign(&mut self, slot: usize, value: String) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        if let Some(previous) = self.slots[slot].replace(value.clone())
            && previous != value
        {
            tracing::warn!(
                slot,
                replaced = %previous,
                winner = %value,
                "slot claimed by more than one card; later card wins"
            );
            self.collisions.push(SlotCollision {
                slot,
                replaced: previous,
                winner: value,
            });
        }
    }

    /// Number of slots, including empty ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Return `true` when no slot was ever assigned.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Key printed at `slot`, `None` for empty or out-of-range slots.
    pub fn get(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    /// All slots in index order.
    pub fn as_slice(&self) -> &[Option<String>] {
        &self.slots
    }

    /// Assigned slots as `(index, key)` pairs.
    pub fn filled(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|k| (i, k)))
    }

    /// Overwrites observed while building.
    pub fn collisions(&self) -> &[SlotCollision] {
        &self.collisions
    }

    /// Number of pages needed to print every slot.
    pub fn page_count(&self) -> usize {
        self.slots.len().div_ceil(SLOTS_PER_PAGE)
    }

    /// Split into sheet-sized groups, preserving order.
    ///
    /// Slot `k` lands in group `k / 8` at position `k % 8`; the final group may be short.
    pub fn partition(&self) -> Vec<PageGroup<'_>> {
        self.slots
            .chunks(SLOTS_PER_PAGE)
            .enumerate()
            .map(|(index, slots)| PageGroup { index, slots })
            .collect()
    }
}

/// Up to eight consecutive slots printed on one sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageGroup<'a> {
    /// 0-based page index.
    pub index: usize,
    slots: &'a [Option<String>],
}

impl<'a> PageGroup<'a> {
    /// Deck index of this page's first slot.
    pub fn first_slot(&self) -> usize {
        self.index * SLOTS_PER_PAGE
    }

    /// Number of slots this page covers (at most eight).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Return `true` for a page covering no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Key at `position` (0..8) on this page; positions past the end are empty.
    pub fn at(&self, position: usize) -> Option<&'a str> {
        self.slots.get(position).and_then(|s| s.as_deref())
    }

    /// Slots covered by this page.
    pub fn slots(&self) -> &'a [Option<String>] {
        self.slots
    }

    /// Positions on the sheet that carry a card.
    pub fn filled_positions(&self) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|k| (i, k)))
    }
}
