//! Test doubles and fixtures shared by unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::database::{
    DatabaseError, RawResult, ResultSet, RoutineBackend, RoutineInvocation, Row,
};

/// Account fixture matching the placeholder credential
pub fn mock_account() -> Value {
    json!({ "idAccount": 1, "name": "Test Account", "active": 1 })
}

/// User fixture matching the placeholder credential
pub fn mock_user() -> Value {
    json!({ "idUser": 1, "idAccount": 1, "name": "Test User", "email": "test@example.com" })
}

/// Turn a JSON array of objects into a result set
pub fn rows(value: Value) -> ResultSet {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map,
                other => panic!("row fixture must be an object, got {}", other),
            })
            .collect::<Vec<Row>>(),
        other => panic!("rows fixture must be an array, got {}", other),
    }
}

#[derive(Debug)]
pub struct ScriptedPool {
    pub generation: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedTx {
    pub calls: usize,
}

/// In-memory backend returning canned result sets per routine name.
///
/// Unknown routines fail with a query error, which is how tests exercise
/// the error path.
#[derive(Default)]
pub struct ScriptedBackend {
    results: HashMap<String, RawResult>,
    connect_delay: Duration,
    call_delay: Duration,
    failing_connects: AtomicUsize,
    connects: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, routine: &str, sets: Vec<ResultSet>, rows_affected: u64) -> Self {
        self.results
            .insert(routine.to_string(), RawResult::new(sets, rows_affected));
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Fail the first `count` connect attempts
    pub fn failing_connects(self, count: usize) -> Self {
        self.failing_connects.store(count, Ordering::SeqCst);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Calls made so far, as `pool:<routine>` or `tx:<routine>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, scope: &str, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", scope, invocation.name()));

        self.results
            .get(invocation.name())
            .cloned()
            .ok_or_else(|| DatabaseError::QueryError {
                routine: invocation.name().to_string(),
                message: "routine does not exist".to_string(),
            })
    }
}

#[async_trait]
impl RoutineBackend for ScriptedBackend {
    type Pool = Arc<ScriptedPool>;
    type Tx = ScriptedTx;

    async fn connect(&self) -> Result<Self::Pool, DatabaseError> {
        let generation = self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }

        let remaining = self.failing_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(DatabaseError::ConnectionError("connection refused".to_string()));
        }

        Ok(Arc::new(ScriptedPool { generation }))
    }

    async fn call(&self, _pool: &Self::Pool, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
        self.respond("pool", invocation).await
    }

    async fn call_in(&self, tx: &mut Self::Tx, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
        tx.calls += 1;
        self.respond("tx", invocation).await
    }

    async fn begin(&self, _pool: &Self::Pool) -> Result<Self::Tx, DatabaseError> {
        Ok(ScriptedTx::default())
    }

    async fn commit(&self, _tx: Self::Tx) -> Result<(), DatabaseError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: Self::Tx) -> Result<(), DatabaseError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self, _pool: &Self::Pool) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self, _pool: Self::Pool) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
