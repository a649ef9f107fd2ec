mod agents;
mod comments;
mod communities;
mod posts;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::store::ForumStore;

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ForumStore for Database {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`
fn map_unique_violation(e: sqlx::Error, constraint: &str, message: String) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some(constraint) {
            return AppError::Conflict(message);
        }
    }
    AppError::Database(e)
}
