use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::users::dto::{Deleted, PublicUser, UserFields};
use crate::users::error::UserError;
use crate::users::repo::UserStore;

/// Outcome of a read: a record either exists and is active, or exists
/// as a tombstone. "Never existed" surfaces as `UserError::NotFound`.
#[derive(Debug)]
pub enum ReadOutcome {
    Active(PublicUser),
    Tombstone { id: i64 },
}

/// Stateless lifecycle logic over the record store. Safe to invoke
/// concurrently; the store's uniqueness index is the arbiter for
/// racing writes.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, payload: &Value) -> Result<PublicUser, UserError> {
        let fields = UserFields::from_value(payload)?;
        let record = self.store.insert(&fields).await?;
        Ok(record.into())
    }

    pub async fn read(&self, id: i64) -> Result<ReadOutcome, UserError> {
        let record = self.store.get(id).await?;
        if record.deleted {
            Ok(ReadOutcome::Tombstone { id: record.id })
        } else {
            Ok(ReadOutcome::Active(record.into()))
        }
    }

    pub async fn delete(&self, id: i64) -> Result<Deleted, UserError> {
        let record = self.store.mark_deleted(id).await?;
        Ok(Deleted {
            id: record.id,
            message: "User has been deleted.".into(),
        })
    }

    /// Apply the full field set, or nothing. The submitted email may
    /// stay as-is, move to a value nobody holds, or collide with
    /// another record; each case resolves to exactly one outcome.
    pub async fn update(&self, id: i64, payload: &Value) -> Result<PublicUser, UserError> {
        let fields = UserFields::from_value(payload)?;
        let current = self.store.get(id).await?;

        match self.store.find_by_email(&fields.email).await? {
            Some(holder) if holder.id != current.id => {
                warn!(id, email = %fields.email, holder = holder.id, "email collision on update");
                Err(UserError::Conflict(fields.email))
            }
            // The email is free, or this record already holds it (the
            // unchanged-email case). A concurrent claim surfaces from
            // the store as DuplicateEmail and maps to Conflict.
            Some(_) | None => {
                let updated = self.store.update(current.id, &fields).await?;
                Ok(updated.into())
            }
        }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<PublicUser>, UserError> {
        let records = self.store.list(active_only).await?;
        Ok(records.into_iter().map(PublicUser::from).collect())
    }
}
