use crate::entities::{image_records, prelude::*};
use crate::models::{ImageRecord, ImageStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, SqlErr, TransactionTrait,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("record {0} is gone or no longer in the expected status")]
    Stale(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for reservation metadata.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a new record. Fails with `StoreError::Conflict` when the key is taken.
    async fn insert(&self, record: ImageRecord) -> StoreResult<ImageRecord>;
    /// Writes the status and expiry of `record`, but only while the stored
    /// row is still in one of the `expected` statuses. Fails with
    /// `StoreError::Stale` otherwise.
    async fn save(&self, record: &ImageRecord, expected: &[ImageStatus]) -> StoreResult<()>;
    /// Like `save` for every record, in one transaction: one stale row
    /// leaves the whole batch unwritten.
    async fn save_all(&self, records: &[ImageRecord], expected: &[ImageStatus]) -> StoreResult<()>;
    async fn exists_by_key(&self, key: &str) -> StoreResult<bool>;
    async fn exists_by_key_and_status(&self, key: &str, status: ImageStatus) -> StoreResult<bool>;
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<ImageRecord>>;
    async fn find_by_keys(&self, keys: &[String]) -> StoreResult<Vec<ImageRecord>>;
    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: ImageStatus,
    ) -> StoreResult<Vec<ImageRecord>>;
    async fn find_by_key_and_status(
        &self,
        key: &str,
        status: ImageStatus,
    ) -> StoreResult<Option<ImageRecord>>;
    async fn find_by_status_and_expiry_before(
        &self,
        status: ImageStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<ImageRecord>>;
    async fn delete_by_key(&self, key: &str) -> StoreResult<()>;
}

fn to_record(model: image_records::Model) -> StoreResult<ImageRecord> {
    let key = model.key.clone();
    ImageRecord::try_from(model).map_err(|reason| StoreError::Corrupt { key, reason })
}

fn to_records(models: Vec<image_records::Model>) -> StoreResult<Vec<ImageRecord>> {
    models.into_iter().map(to_record).collect()
}

/// Compare-and-set on the status column.
async fn guarded_update<C: ConnectionTrait>(
    conn: &C,
    record: &ImageRecord,
    expected: &[ImageStatus],
) -> StoreResult<()> {
    let result = ImageRecords::update_many()
        .col_expr(
            image_records::Column::Status,
            Expr::value(record.status.as_str()),
        )
        .col_expr(image_records::Column::Expiry, Expr::value(record.expiry))
        .filter(image_records::Column::Key.eq(record.key.as_str()))
        .filter(image_records::Column::Status.is_in(expected.iter().map(|s| s.as_str())))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::Stale(record.key.clone()));
    }
    Ok(())
}

pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn insert(&self, record: ImageRecord) -> StoreResult<ImageRecord> {
        let active: image_records::ActiveModel = (&record).into();
        match active.insert(&self.db).await {
            Ok(model) => to_record(model),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(StoreError::Conflict(record.key)),
                _ => Err(e.into()),
            },
        }
    }

    async fn save(&self, record: &ImageRecord, expected: &[ImageStatus]) -> StoreResult<()> {
        guarded_update(&self.db, record, expected).await
    }

    async fn save_all(&self, records: &[ImageRecord], expected: &[ImageStatus]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin().await?;
        for record in records {
            if let Err(e) = guarded_update(&txn, record, expected).await {
                txn.rollback().await?;
                return Err(e);
            }
        }
        txn.commit().await?;
        Ok(())
    }

    async fn exists_by_key(&self, key: &str) -> StoreResult<bool> {
        let count = ImageRecords::find()
            .filter(image_records::Column::Key.eq(key))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn exists_by_key_and_status(&self, key: &str, status: ImageStatus) -> StoreResult<bool> {
        let count = ImageRecords::find()
            .filter(image_records::Column::Key.eq(key))
            .filter(image_records::Column::Status.eq(status.as_str()))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn find_by_key(&self, key: &str) -> StoreResult<Option<ImageRecord>> {
        ImageRecords::find()
            .filter(image_records::Column::Key.eq(key))
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn find_by_keys(&self, keys: &[String]) -> StoreResult<Vec<ImageRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let models = ImageRecords::find()
            .filter(image_records::Column::Key.is_in(keys.iter().cloned()))
            .all(&self.db)
            .await?;
        to_records(models)
    }

    async fn find_by_owner_and_status(
        &self,
        owner_id: &str,
        status: ImageStatus,
    ) -> StoreResult<Vec<ImageRecord>> {
        let models = ImageRecords::find()
            .filter(image_records::Column::OwnerId.eq(owner_id))
            .filter(image_records::Column::Status.eq(status.as_str()))
            .all(&self.db)
            .await?;
        to_records(models)
    }

    async fn find_by_key_and_status(
        &self,
        key: &str,
        status: ImageStatus,
    ) -> StoreResult<Option<ImageRecord>> {
        ImageRecords::find()
            .filter(image_records::Column::Key.eq(key))
            .filter(image_records::Column::Status.eq(status.as_str()))
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn find_by_status_and_expiry_before(
        &self,
        status: ImageStatus,
        before: DateTime<Utc>,
    ) -> StoreResult<Vec<ImageRecord>> {
        let models = ImageRecords::find()
            .filter(image_records::Column::Status.eq(status.as_str()))
            .filter(image_records::Column::Expiry.lt(before))
            .all(&self.db)
            .await?;
        to_records(models)
    }

    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        ImageRecords::delete_many()
            .filter(image_records::Column::Key.eq(key))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
