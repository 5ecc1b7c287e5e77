use async_trait::async_trait;

use super::manager::DatabaseError;
use super::routine::{RawResult, RoutineInvocation};

/// Driver seam for the data access layer.
///
/// Implementations own connecting, executing a named routine and the
/// transaction primitives. Result shaping, timeouts and error logging live
/// in [`DataAccess`](super::DataAccess) so every backend shares them.
#[async_trait]
pub trait RoutineBackend: Send + Sync + 'static {
    /// Cheaply clonable handle to a live connection pool
    type Pool: Clone + Send + Sync + 'static;

    /// An open transaction bound to one pooled connection
    type Tx: Send + 'static;

    async fn connect(&self) -> Result<Self::Pool, DatabaseError>;

    /// Execute a routine on a pooled connection
    async fn call(
        &self,
        pool: &Self::Pool,
        invocation: &RoutineInvocation,
    ) -> Result<RawResult, DatabaseError>;

    /// Execute a routine inside an open transaction
    async fn call_in(
        &self,
        tx: &mut Self::Tx,
        invocation: &RoutineInvocation,
    ) -> Result<RawResult, DatabaseError>;

    async fn begin(&self, pool: &Self::Pool) -> Result<Self::Tx, DatabaseError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), DatabaseError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), DatabaseError>;

    /// Round-trip check used by the health endpoint
    async fn ping(&self, pool: &Self::Pool) -> Result<(), DatabaseError>;

    async fn close(&self, pool: Self::Pool);
}
