use sqlx::PgPool;

/// Executes entity queries against a shared Postgres pool.
///
/// Each query is a plain struct with a `kanau::processor::Processor` impl
/// on this type, see [`crate::entities`].
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// SQLSTATE `numeric_value_out_of_range`, raised when a `BIGINT` sum wraps.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

pub(crate) fn is_out_of_range(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == NUMERIC_OUT_OF_RANGE)
}
