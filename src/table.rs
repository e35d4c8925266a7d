//! In-memory record table.
//!
//! A [`RecordTable`] holds the records of one kind keyed by identity. It is
//! always iterated in ascending identity order, so two saves of the same
//! records produce byte-identical files regardless of insertion order.

use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordId};

/// Ordered collection of records of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable<R: Record> {
    rows: BTreeMap<RecordId, R>,
}

impl<R: Record> Default for RecordTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordTable<R> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Records in ascending identity order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    /// Cloned snapshot of all records in ascending identity order.
    #[must_use]
    pub fn all(&self) -> Vec<R> {
        self.rows.values().cloned().collect()
    }

    /// Looks up a record.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no record has this identity.
    pub fn get(&self, id: RecordId) -> StoreResult<&R> {
        self.rows.get(&id).ok_or(StoreError::NotFound {
            kind: R::kind().name,
            id,
        })
    }

    /// Returns true if a record with this identity exists.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Inserts a new record. The existing record wins on collision.
    ///
    /// # Errors
    /// - [`StoreError::Unassigned`] if the record has identity `0`
    /// - [`StoreError::IdentityConflict`] if the identity is taken
    pub fn insert(&mut self, record: R) -> StoreResult<()> {
        let id = Self::checked_id(&record)?;
        if self.rows.contains_key(&id) {
            return Err(StoreError::IdentityConflict {
                kind: R::kind().name,
                id,
            });
        }
        self.rows.insert(id, record);
        Ok(())
    }

    /// Replaces the record with the same identity, or adds it.
    ///
    /// Returns the replaced record, if any.
    ///
    /// # Errors
    /// [`StoreError::Unassigned`] if the record has identity `0`.
    pub fn upsert(&mut self, record: R) -> StoreResult<Option<R>> {
        let id = Self::checked_id(&record)?;
        Ok(self.rows.insert(id, record))
    }

    /// Removes a record. Returns false if it did not exist.
    pub fn delete(&mut self, id: RecordId) -> bool {
        self.rows.remove(&id).is_some()
    }

    /// `max(identity) + 1`, or the kind's floor on an empty table.
    ///
    /// # Errors
    /// [`StoreError::IdentityExhausted`] if the highest identity is already
    /// `RecordId::MAX`.
    pub fn next_identity(&self) -> StoreResult<RecordId> {
        match self.rows.keys().next_back() {
            None => Ok(R::kind().identity_floor),
            Some(max) => max.checked_add(1).ok_or(StoreError::IdentityExhausted {
                kind: R::kind().name,
            }),
        }
    }

    /// Gives an unassigned record the next identity. Records that already
    /// have one are left alone. Returns the record's identity.
    ///
    /// # Errors
    /// [`StoreError::IdentityExhausted`], see [`RecordTable::next_identity`].
    pub fn assign_identity(&self, record: &mut R) -> StoreResult<RecordId> {
        if record.id() == 0 {
            record.set_id(self.next_identity()?);
        }
        Ok(record.id())
    }

    fn checked_id(record: &R) -> StoreResult<RecordId> {
        match record.id() {
            0 => Err(StoreError::Unassigned {
                kind: R::kind().name,
            }),
            id => Ok(id),
        }
    }
}

impl<R: Record> FromIterator<R> for RecordTable<R> {
    /// Collects records, keeping the last one per identity and dropping
    /// unassigned ones.
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let rows = iter
            .into_iter()
            .filter(|r| r.id() != 0)
            .map(|r| (r.id(), r))
            .collect();
        Self { rows }
    }
}
