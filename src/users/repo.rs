use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::users::dto::UserFields;
use crate::users::error::StoreError;

/// User record as stored. `id` and `created_at` are assigned once at
/// insert and never change; `deleted` only ever goes from false to true.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub newsletter_opt_in: bool,
    pub subscription_tier: i64,
    pub created_at: OffsetDateTime,
    pub deleted: bool,
}

/// Durable keyed storage of user records with a uniqueness index on
/// email. Soft-deleted records stay in the store and keep their email
/// reserved.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new record with defaults applied. Fails with
    /// `DuplicateEmail` if any record, deleted or not, holds the email.
    async fn insert(&self, candidate: &UserFields) -> Result<UserRecord, StoreError>;

    async fn get(&self, id: i64) -> Result<UserRecord, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Records in insertion order. `active_only` excludes soft-deleted ones.
    async fn list(&self, active_only: bool) -> Result<Vec<UserRecord>, StoreError>;

    /// Apply the full field set in one atomic write; the email index
    /// moves with the record in the same statement.
    async fn update(&self, id: i64, fields: &UserFields) -> Result<UserRecord, StoreError>;

    /// Idempotent soft-delete.
    async fn mark_deleted(&self, id: i64) -> Result<UserRecord, StoreError>;
}

pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn map_unique_violation(err: sqlx::Error, email: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateEmail(email.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert(&self, candidate: &UserFields) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (first_name, last_name, email, password, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, first_name, last_name, email, password,
                      newsletter_opt_in, subscription_tier, created_at, deleted
            "#,
        )
        .bind(&candidate.first_name)
        .bind(&candidate.last_name)
        .bind(&candidate.email)
        .bind(&candidate.password)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, &candidate.email))?;
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, first_name, last_name, email, password,
                   newsletter_opt_in, subscription_tier, created_at, deleted
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        record.ok_or(StoreError::NotFound(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, first_name, last_name, email, password,
                   newsletter_opt_in, subscription_tier, created_at, deleted
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn list(&self, active_only: bool) -> Result<Vec<UserRecord>, StoreError> {
        let sql = if active_only {
            r#"
            SELECT id, first_name, last_name, email, password,
                   newsletter_opt_in, subscription_tier, created_at, deleted
            FROM users
            WHERE deleted = FALSE
            ORDER BY id
            "#
        } else {
            r#"
            SELECT id, first_name, last_name, email, password,
                   newsletter_opt_in, subscription_tier, created_at, deleted
            FROM users
            ORDER BY id
            "#
        };
        let records = sqlx::query_as::<_, UserRecord>(sql)
            .fetch_all(&self.db)
            .await?;
        Ok(records)
    }

    async fn update(&self, id: i64, fields: &UserFields) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET first_name = ?, last_name = ?, email = ?, password = ?
            WHERE id = ?
            RETURNING id, first_name, last_name, email, password,
                      newsletter_opt_in, subscription_tier, created_at, deleted
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.password)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, &fields.email))?;
        record.ok_or(StoreError::NotFound(id))
    }

    async fn mark_deleted(&self, id: i64) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET deleted = TRUE
            WHERE id = ?
            RETURNING id, first_name, last_name, email, password,
                      newsletter_opt_in, subscription_tier, created_at, deleted
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        record.ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    pub(crate) async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        SqliteStore::new(pool)
    }

    pub(crate) fn fields(first: &str, last: &str, email: &str) -> UserFields {
        UserFields {
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            password: "p".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_fresh_ids_and_defaults() {
        let store = test_store().await;

        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();
        let bob = store.insert(&fields("Bob", "Ray", "b@x.com")).await.unwrap();

        assert_eq!(ann.id, 1);
        assert_eq!(bob.id, 2);
        assert!(!ann.newsletter_opt_in);
        assert_eq!(ann.subscription_tier, 1);
        assert!(!ann.deleted);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = test_store().await;
        store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();

        let err = store.insert(&fields("Bob", "Ray", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "a@x.com"));

        // Nothing was partially inserted.
        let all = store.list(false).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn deleted_records_keep_their_email_reserved() {
        let store = test_store().await;
        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();
        store.mark_deleted(ann.id).await.unwrap();

        let err = store.insert(&fields("Bob", "Ray", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn get_reports_missing_ids() {
        let store = test_store().await;
        let err = store.get(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn find_by_email_is_case_sensitive() {
        let store = test_store().await;
        store.insert(&fields("Ann", "Lee", "Ann@x.com")).await.unwrap();

        assert!(store.find_by_email("Ann@x.com").await.unwrap().is_some());
        assert!(store.find_by_email("ann@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_deleted_records_and_keeps_insertion_order() {
        let store = test_store().await;
        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();
        store.insert(&fields("Bob", "Ray", "b@x.com")).await.unwrap();
        store.insert(&fields("Cid", "Fox", "c@x.com")).await.unwrap();
        store.mark_deleted(ann.id).await.unwrap();

        let active = store.list(true).await.unwrap();
        assert_eq!(
            active.iter().map(|r| r.email.as_str()).collect::<Vec<_>>(),
            ["b@x.com", "c@x.com"]
        );

        let all = store.list(false).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, 1);
        assert!(all[0].deleted);
    }

    #[tokio::test]
    async fn update_moves_the_email_index_with_the_record() {
        let store = test_store().await;
        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();

        let updated = store
            .update(ann.id, &fields("Ann", "Lee", "b@x.com"))
            .await
            .unwrap();
        assert_eq!(updated.email, "b@x.com");

        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        let found = store.find_by_email("b@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, ann.id);
    }

    #[tokio::test]
    async fn update_preserves_id_and_created_at() {
        let store = test_store().await;
        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();

        let updated = store
            .update(ann.id, &fields("Anne", "Lee", "a@x.com"))
            .await
            .unwrap();
        assert_eq!(updated.id, ann.id);
        assert_eq!(updated.created_at, ann.created_at);
        assert_eq!(updated.first_name, "Anne");
    }

    #[tokio::test]
    async fn update_rejects_an_email_held_by_another_record() {
        let store = test_store().await;
        store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();
        let bob = store.insert(&fields("Bob", "Ray", "b@x.com")).await.unwrap();

        let err = store
            .update(bob.id, &fields("Bob", "Ray", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));

        // The losing record is untouched.
        let bob = store.get(bob.id).await.unwrap();
        assert_eq!(bob.email, "b@x.com");
    }

    #[tokio::test]
    async fn update_reports_missing_ids() {
        let store = test_store().await;
        let err = store
            .update(42, &fields("Ann", "Lee", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn mark_deleted_is_idempotent() {
        let store = test_store().await;
        let ann = store.insert(&fields("Ann", "Lee", "a@x.com")).await.unwrap();

        let first = store.mark_deleted(ann.id).await.unwrap();
        assert!(first.deleted);

        let second = store.mark_deleted(ann.id).await.unwrap();
        assert!(second.deleted);
        assert_eq!(second.email, first.email);
    }

    #[tokio::test]
    async fn mark_deleted_reports_missing_ids() {
        let store = test_store().await;
        let err = store.mark_deleted(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }
}
