/*!
 * Unit of work
 *
 * Scoped database transaction for multi-step mutations: checkout, cancellation,
 * payment materialization and return approval all run inside one.
 */

use crate::errors::ServiceError;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::ops::Deref;
use tracing::{debug, warn};

/// A scoped transaction. Dropping it without `commit` rolls back every write
/// performed through it, so an early `?` return never leaves partial state.
///
/// # Example
///
/// ```rust,ignore
/// let uow = UnitOfWork::begin(&db).await?;
/// let outcome = create_orders(uow.conn(), &cart).await;
/// let orders = uow.finish(outcome).await?;
/// ```
pub struct UnitOfWork {
    txn: DatabaseTransaction,
}

impl UnitOfWork {
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, ServiceError> {
        let txn = db.begin().await?;
        Ok(Self { txn })
    }

    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), ServiceError> {
        self.txn.commit().await.map_err(|e| {
            warn!(error = %e, "transaction commit failed");
            ServiceError::DatabaseError(e)
        })
    }

    pub async fn rollback(self) -> Result<(), ServiceError> {
        self.txn.rollback().await?;
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err`. The original error is returned
    /// unchanged so callers can still match on its kind.
    pub async fn finish<T>(self, outcome: Result<T, ServiceError>) -> Result<T, ServiceError> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "rolling back unit of work");
                if let Err(rollback_err) = self.txn.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Deref for UnitOfWork {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement};

    async fn memory_db() -> DatabaseConnection {
        // one connection, so every handle sees the same in-memory database
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE TABLE scratch (v INTEGER NOT NULL)".to_string(),
        ))
        .await
        .unwrap();
        db
    }

    async fn count(db: &DatabaseConnection) -> i64 {
        let row = db
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM scratch".to_string(),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }

    async fn insert(conn: &DatabaseTransaction) -> Result<(), ServiceError> {
        conn.execute(Statement::from_string(
            DbBackend::Sqlite,
            "INSERT INTO scratch (v) VALUES (1)".to_string(),
        ))
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn finish_commits_on_success() {
        let db = memory_db().await;
        let uow = UnitOfWork::begin(&db).await.unwrap();
        let outcome = insert(uow.conn()).await;
        uow.finish(outcome).await.unwrap();
        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn finish_rolls_back_and_keeps_error_kind() {
        let db = memory_db().await;
        let uow = UnitOfWork::begin(&db).await.unwrap();
        let outcome = async {
            insert(uow.conn()).await?;
            Err::<(), _>(ServiceError::OutOfStock("sold out".into()))
        }
        .await;
        let err = uow.finish(outcome).await.unwrap_err();
        assert!(matches!(err, ServiceError::OutOfStock(_)));
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn dropping_without_commit_rolls_back() {
        let db = memory_db().await;
        {
            let uow = UnitOfWork::begin(&db).await.unwrap();
            insert(uow.conn()).await.unwrap();
        }
        assert_eq!(count(&db).await, 0);
    }
}
