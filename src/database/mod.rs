pub mod backend;
pub mod manager;
pub mod postgres;
pub mod routine;
pub mod transaction;

pub use backend::RoutineBackend;
pub use manager::{DataAccess, DatabaseError};
pub use postgres::PgBackend;
pub use routine::{
    ExpectedReturn, RawResult, ResultSet, RoutineInvocation, RoutineOutput, RoutineParam, Row,
};
pub use transaction::Transaction;
