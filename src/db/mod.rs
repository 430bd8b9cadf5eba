//! Database layer
//!
//! SQLite is the default backend; MySQL is available for larger
//! deployments. Repositories talk to the pool through [`DatabasePool`] and
//! pick the backend-specific query with [`Backend`].
//!
//! ```ignore
//! use photodesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
