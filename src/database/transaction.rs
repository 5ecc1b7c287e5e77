use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::backend::RoutineBackend;
use super::manager::DatabaseError;

/// An open unit of work on one pooled connection.
///
/// `commit` and `rollback` take the transaction by value, so a finished
/// transaction cannot be finalized twice or used for further calls:
///
/// ```compile_fail
/// # use autoclean_api::database::{DataAccess, PgBackend};
/// # async fn demo(dal: DataAccess<PgBackend>) -> Result<(), autoclean_api::database::DatabaseError> {
/// let tx = dal.begin_transaction().await?;
/// tx.commit().await?;
/// tx.rollback().await?; // use of moved value
/// # Ok(())
/// # }
/// ```
///
/// Dropping an unfinished transaction hands it back to the backend
/// unfinished; the PostgreSQL backend rolls it back on the connection.
pub struct Transaction<B: RoutineBackend> {
    id: Uuid,
    backend: Arc<B>,
    inner: Option<B::Tx>,
}

impl<B: RoutineBackend> Transaction<B> {
    pub(crate) fn new(backend: Arc<B>, tx: B::Tx) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            inner: Some(tx),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn connection(&mut self) -> Result<&mut B::Tx, DatabaseError> {
        self.inner.as_mut().ok_or(DatabaseError::TransactionFinished)
    }

    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        let tx = self.inner.take().ok_or(DatabaseError::TransactionFinished)?;
        self.backend.commit(tx).await?;
        tracing::debug!(transaction = %self.id, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        let tx = self.inner.take().ok_or(DatabaseError::TransactionFinished)?;
        self.backend.rollback(tx).await?;
        tracing::debug!(transaction = %self.id, "Transaction rolled back");
        Ok(())
    }
}

impl<B: RoutineBackend> Drop for Transaction<B> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            tracing::warn!(
                transaction = %self.id,
                "Transaction dropped without commit or rollback; rolling back"
            );
        }
    }
}

impl<B: RoutineBackend> fmt::Debug for Transaction<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("open", &self.inner.is_some())
            .finish()
    }
}
