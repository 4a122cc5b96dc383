//! Durable participant registry.
//!
//! The [`ParticipantRegistry`] is the authoritative in-memory map from a
//! registry-assigned [`ParticipantId`] to a [`ParticipantDescription`],
//! with `(name, owner)` identity uniqueness enforced on every addition.
//! Durability is event-sourced: each mutation appends one
//! [`AtomicOperation`] to a [`ParticipantLogger`] journal *before* the
//! in-memory commit, and a restarted process reconstructs the registry by
//! deterministically replaying the journal from the beginning. There is
//! no snapshot mechanism: registration churn is low-frequency, so
//! replay-everything recovery stays cheap.

mod description;
mod journal;


use std::collections::HashMap;

use thiserror::Error;

pub use self::description::{
    ConvexShape, ParticipantDescription, Profile, Responsiveness, ShapeContext, ShapeKind,
};
pub use self::journal::{AtomicOperation, FileJournal, JournalError, OpKind, ParticipantLogger};
use crate::traffic::ParticipantId;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A participant with the same `(name, owner)` identity is already
    /// registered.
    #[error("participant \"{name}\" owned by \"{owner}\" is already registered")]
    AlreadyRegistered {
        /// Name of the conflicting participant.
        name: String,
        /// Owner of the conflicting participant.
        owner: String,
    },

    /// The given id is not currently registered.
    #[error("participant id {id} is not registered")]
    UnknownParticipant {
        /// The unregistered id.
        id: ParticipantId,
    },

    /// The journal replayed into an inconsistent registry.
    ///
    /// The registry refuses to start on such history: recovering an
    /// ambiguous safety-critical registry wrongly is worse than refusing
    /// to run.
    #[error("journal replay failed at record {record}: {reason}")]
    CorruptJournal {
        /// 1-based index of the offending record.
        record: usize,
        /// What made the record inapplicable.
        reason: String,
    },

    /// The journal itself failed.
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Identity key of a registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdentityKey {
    name: String,
    owner: String,
}

/// Authoritative registry of traffic participants.
///
/// One logical owner per process; mutation takes `&mut self`, which makes
/// the uniqueness check-then-insert sequence atomic by exclusivity.
/// Embedders that share the registry across threads wrap it in their own
/// mutex, covering readers and writers alike.
pub struct ParticipantRegistry {
    descriptions: HashMap<ParticipantId, ParticipantDescription>,
    id_from_identity: HashMap<IdentityKey, ParticipantId>,
    next_id: ParticipantId,
    restoring: bool,
    logger: Box<dyn ParticipantLogger>,
}

impl std::fmt::Debug for ParticipantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantRegistry")
            .field("participants", &self.descriptions.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl ParticipantRegistry {
    /// Constructs the registry by replaying `logger`'s history.
    ///
    /// Replay runs once, synchronously, before any external registration
    /// is accepted. Journal writes are suppressed while restoring; the
    /// journal stays the single source of truth and is not re-appended
    /// during recovery.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Journal`] if the history is unreadable or a record
    /// is malformed; [`RegistryError::CorruptJournal`] if a record cannot
    /// be applied (duplicate addition, removal of an unknown identity).
    pub fn new(logger: Box<dyn ParticipantLogger>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            descriptions: HashMap::new(),
            id_from_identity: HashMap::new(),
            next_id: 1,
            restoring: true,
            logger,
        };

        let mut record = 0usize;
        while let Some(operation) = registry.logger.read_next_record()? {
            record += 1;
            registry
                .apply(operation)
                .map_err(|reason| RegistryError::CorruptJournal { record, reason })?;
        }
        registry.restoring = false;

        tracing::info!(
            participants = registry.descriptions.len(),
            records = record,
            "participant registry restored from journal"
        );
        Ok(registry)
    }

    /// Registers a participant and returns its fresh id.
    ///
    /// The operation is journaled before the in-memory commit: a failed
    /// append leaves the registry unchanged and consumes no id.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if the `(name, owner)` pair is
    /// taken; [`RegistryError::Journal`] if the append fails.
    pub fn add_participant(
        &mut self,
        description: ParticipantDescription,
    ) -> Result<ParticipantId, RegistryError> {
        let key = IdentityKey {
            name: description.name.clone(),
            owner: description.owner.clone(),
        };
        if self.id_from_identity.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered {
                name: key.name,
                owner: key.owner,
            });
        }

        if !self.restoring {
            self.logger.write_operation(&AtomicOperation {
                operation: OpKind::Add,
                participant_description: description.clone(),
            })?;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.id_from_identity.insert(key, id);
        self.descriptions.insert(id, description);
        tracing::debug!(id, "participant registered");
        Ok(id)
    }

    /// Removes a participant by id.
    ///
    /// The removal is journaled before the in-memory erase; nothing is
    /// appended when the id is unknown.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownParticipant`] for an id that is not
    /// registered; [`RegistryError::Journal`] if the append fails.
    pub fn remove_participant(&mut self, id: ParticipantId) -> Result<(), RegistryError> {
        let Some(description) = self.descriptions.get(&id) else {
            return Err(RegistryError::UnknownParticipant { id });
        };

        if !self.restoring {
            self.logger.write_operation(&AtomicOperation {
                operation: OpKind::Remove,
                participant_description: description.clone(),
            })?;
        }

        let key = IdentityKey {
            name: description.name.clone(),
            owner: description.owner.clone(),
        };
        self.descriptions.remove(&id);
        self.id_from_identity.remove(&key);
        tracing::debug!(id, "participant removed");
        Ok(())
    }

    /// Looks up a description by id.
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantDescription> {
        self.descriptions.get(&id)
    }

    /// Looks up the id registered for an identity.
    #[must_use]
    pub fn id_of(&self, name: &str, owner: &str) -> Option<ParticipantId> {
        self.id_from_identity
            .get(&IdentityKey {
                name: name.to_owned(),
                owner: owner.to_owned(),
            })
            .copied()
    }

    /// Iterates over all registered participants.
    pub fn participants(&self) -> impl Iterator<Item = (ParticipantId, &ParticipantDescription)> {
        self.descriptions.iter().map(|(id, desc)| (*id, desc))
    }

    /// Number of registered participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Applies one replayed operation.
    ///
    /// Additions reconstruct id assignment in replay order; removals erase
    /// by identity lookup, since ids are not persisted in the journal.
    fn apply(&mut self, operation: AtomicOperation) -> Result<(), String> {
        match operation.operation {
            OpKind::Add => self
                .add_participant(operation.participant_description)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            OpKind::Remove => {
                let description = operation.participant_description;
                let Some(id) = self.id_of(&description.name, &description.owner) else {
                    return Err(format!(
                        "removal of unregistered participant \"{}\" owned by \"{}\"",
                        description.name, description.owner
                    ));
                };
                self.remove_participant(id).map_err(|e| e.to_string())
            }
        }
    }
}
