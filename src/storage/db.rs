use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::core::config;
use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Per-connection setup: busy timeout, WAL journal and foreign keys.
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(config::database::busy_timeout())?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}

/// Create a new database connection pool
///
/// Initializes a pool of up to `DB_POOL_SIZE` connections and applies the
/// embedded schema migrations on the first one.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use randtalk::storage::create_pool;
///
/// let pool = create_pool("randtalk.sqlite")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    create_pool_with_size(database_path, *config::DB_POOL_SIZE)
}

/// Same as [`create_pool`] with an explicit pool size.
pub fn create_pool_with_size(database_path: &str, max_size: u32) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(configure_connection);
    let pool = Pool::builder().max_size(max_size).build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;
    log::info!("Database ready at {} (pool size {})", database_path, max_size);

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Current UTC time in the RFC 3339 form stored in `created_at` / `updated_at`.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pool_applies_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool_with_size(path.to_str().unwrap(), 2).unwrap();
        let conn = get_connection(&pool).unwrap();

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);

        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)).unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn test_now_timestamp_is_rfc3339() {
        let ts = now_timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
