use std::backtrace::Backtrace;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info};

use super::backend::RoutineBackend;
use super::postgres::PgBackend;
use super::routine::{RawResult, RoutineInvocation, RoutineOutput};
use super::transaction::Transaction;
use crate::config::AppConfig;

/// Errors from the data access layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Routine '{routine}' failed: {message}")]
    QueryError { routine: String, message: String },

    #[error("Routine '{routine}' timed out after {timeout_ms}ms")]
    Timeout { routine: String, timeout_ms: u64 },

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True when the database could not be reached at all
    pub fn is_connection(&self) -> bool {
        match self {
            DatabaseError::ConnectionError(_) | DatabaseError::InvalidDatabaseUrl => true,
            DatabaseError::Sqlx(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)
            ),
            _ => false,
        }
    }
}

/// Data access layer: one lazily created pool plus routine execution and
/// transaction primitives.
///
/// Constructed once at startup and handed to handlers through application
/// state. The pool is created on first use; concurrent first uses share a
/// single in-flight connect, and a failed connect is retried by the next
/// caller.
pub struct DataAccess<B: RoutineBackend = PgBackend> {
    backend: Arc<B>,
    pool: RwLock<OnceCell<B::Pool>>,
    routine_timeout: Duration,
}

impl DataAccess<PgBackend> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(PgBackend::new(config), config.database.routine_timeout())
    }
}

impl<B: RoutineBackend> DataAccess<B> {
    pub fn new(backend: B, routine_timeout: Duration) -> Self {
        Self {
            backend: Arc::new(backend),
            pool: RwLock::new(OnceCell::new()),
            routine_timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the pool, connecting on first use
    pub async fn get_pool(&self) -> Result<B::Pool, DatabaseError> {
        // Held across the connect so close_pool cannot swap the cell mid-init
        let cell = self.pool.read().await;
        let pool = cell
            .get_or_try_init(|| async {
                let pool = self.backend.connect().await.map_err(|e| {
                    error!(error = %e, "Failed to create database pool");
                    e
                })?;
                info!("Created database pool");
                Ok::<_, DatabaseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    /// Execute a named routine and shape its result.
    ///
    /// Runs on the pool unless a transaction is supplied. Failures are logged
    /// with the routine name and returned unchanged.
    pub async fn execute_routine(
        &self,
        invocation: &RoutineInvocation,
        transaction: Option<&mut Transaction<B>>,
    ) -> Result<RoutineOutput, DatabaseError> {
        let started = Instant::now();

        match self.run_routine(invocation, transaction).await {
            Ok(raw) => {
                debug!(
                    routine = invocation.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    result_sets = raw.result_sets.len(),
                    "Routine executed"
                );
                Ok(RoutineOutput::shape(
                    raw,
                    invocation.expected(),
                    invocation.result_set_names(),
                ))
            }
            Err(e) => {
                error!(
                    routine = invocation.name(),
                    error = %e,
                    backtrace = %Backtrace::force_capture(),
                    "Database request error"
                );
                Err(e)
            }
        }
    }

    async fn run_routine(
        &self,
        invocation: &RoutineInvocation,
        transaction: Option<&mut Transaction<B>>,
    ) -> Result<RawResult, DatabaseError> {
        invocation.validate()?;

        let outcome = match transaction {
            Some(tx) => {
                let conn = tx.connection()?;
                tokio::time::timeout(self.routine_timeout, self.backend.call_in(conn, invocation)).await
            }
            None => {
                let pool = self.get_pool().await?;
                tokio::time::timeout(self.routine_timeout, self.backend.call(&pool, invocation)).await
            }
        };

        outcome.map_err(|_| DatabaseError::Timeout {
            routine: invocation.name().to_string(),
            timeout_ms: self.routine_timeout.as_millis() as u64,
        })?
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<B>, DatabaseError> {
        let pool = self.get_pool().await?;
        let tx = Transaction::new(self.backend.clone(), self.backend.begin(&pool).await?);
        debug!(transaction = %tx.id(), "Transaction started");
        Ok(tx)
    }

    pub async fn commit_transaction(&self, transaction: Transaction<B>) -> Result<(), DatabaseError> {
        transaction.commit().await
    }

    pub async fn rollback_transaction(&self, transaction: Transaction<B>) -> Result<(), DatabaseError> {
        transaction.rollback().await
    }

    /// Close the pool; the next use creates a fresh one
    pub async fn close_pool(&self) {
        let mut cell = self.pool.write().await;
        let previous = std::mem::take(&mut *cell);
        if let Some(pool) = previous.into_inner() {
            self.backend.close(pool).await;
            info!("Closed database pool");
        }
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.get_pool().await?;
        self.backend.ping(&pool).await
    }
}
