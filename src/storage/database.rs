//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite document storage featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - WAL mode for concurrent readers during import
//! - Offset pagination over corpus order

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};

use crate::types::{Document, ProjectId, Result, ResultExt, WeaveError, log_filter_warn};

use super::document_store::DocumentFilter;

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
///
/// Pool size is dynamically calculated based on CPU cores for optimal performance.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// Formula: clamp(cores, MIN, MAX). Reads dominate, writes only on import.
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }

    /// Create config with automatic pool sizing based on CPU cores
    pub fn auto() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Raw row before type conversion
struct DocumentRow {
    id: String,
    doc_type: String,
    category: String,
    content: String,
    quality_score: f64,
    priority: String,
    relevance_score: f64,
    last_modified: String,
    dependencies: String,
}

impl DocumentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doc_type: row.get(1)?,
            category: row.get(2)?,
            content: row.get(3)?,
            quality_score: row.get(4)?,
            priority: row.get(5)?,
            relevance_score: row.get(6)?,
            last_modified: row.get(7)?,
            dependencies: row.get(8)?,
        })
    }

    fn into_document(self) -> Result<Document> {
        let doc_type = self
            .doc_type
            .parse()
            .map_err(|e: String| WeaveError::Storage(format!("document {}: {}", self.id, e)))?;
        let priority = self
            .priority
            .parse()
            .map_err(|e: String| WeaveError::Storage(format!("document {}: {}", self.id, e)))?;
        let last_modified = DateTime::parse_from_rfc3339(&self.last_modified)
            .with_context_fn(|| format!("document {}: invalid last_modified", self.id))?
            .with_timezone(&Utc);
        let dependencies: Vec<String> = serde_json::from_str(&self.dependencies)?;

        Ok(Document::new(self.id, doc_type, self.content)
            .with_category(self.category)
            .with_priority(priority)
            .with_scores(self.relevance_score, self.quality_score)
            .with_last_modified(last_modified)
            .with_dependencies(dependencies))
    }
}

/// Thread-safe database with connection pooling.
///
/// Uses r2d2 connection pool for concurrent access with automatic
/// connection management and health checking.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| WeaveError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| WeaveError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Configure a new connection with production-ready settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            WeaveError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .with_context("Failed to read schema version")
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// All operations within the closure are atomic. If the closure panics,
    /// the transaction is rolled back and an error is returned instead of
    /// poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(WeaveError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Insert or replace documents for a project in one transaction.
    ///
    /// New documents are appended to the corpus order; replaced documents
    /// keep their position (gaps in `position` are harmless).
    pub fn upsert_documents(&self, project: &ProjectId, documents: &[Document]) -> Result<usize> {
        let project = project.as_str().to_string();
        let documents = documents.to_vec();
        self.transaction(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO projects (id, created_at) VALUES (?1, ?2)",
                params![project, Utc::now().to_rfc3339()],
            )
            .with_context("Failed to register project")?;

            let mut next: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM documents WHERE project_id = ?1",
                    params![project],
                    |row| row.get(0),
                )
                .with_context("Failed to read corpus position")?;

            let mut stmt = conn
                .prepare(
                    "INSERT INTO documents
                     (project_id, id, doc_type, category, content, quality_score, priority,
                      relevance_score, last_modified, dependencies, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(project_id, id) DO UPDATE SET
                        doc_type = excluded.doc_type,
                        category = excluded.category,
                        content = excluded.content,
                        quality_score = excluded.quality_score,
                        priority = excluded.priority,
                        relevance_score = excluded.relevance_score,
                        last_modified = excluded.last_modified,
                        dependencies = excluded.dependencies",
                )
                .with_context("Failed to prepare document insert")?;

            for doc in &documents {
                let deps = serde_json::to_string(&doc.dependencies)?;
                stmt.execute(params![
                        project,
                        doc.id,
                        doc.doc_type.as_str(),
                        doc.category,
                        doc.content.as_ref(),
                        doc.quality_score,
                        doc.priority.as_str(),
                        doc.relevance_score,
                        doc.last_modified.to_rfc3339(),
                        deps,
                        next,
                    ])
                    .with_context_fn(|| format!("Failed to store document {}", doc.id))?;
                next += 1;
            }
            Ok(documents.len())
        })
    }

    /// One page of documents in corpus order. Fetches one extra row to
    /// tell whether another page follows.
    pub fn list_documents_page(
        &self,
        project: &ProjectId,
        filter: &DocumentFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Document>, bool)> {
        let conn = self.conn()?;

        let mut query = String::from(
            "SELECT id, doc_type, category, content, quality_score, priority,
                    relevance_score, last_modified, dependencies
             FROM documents WHERE project_id = ?1",
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(project.as_str().to_string())];

        if !filter.exclude_types.is_empty() {
            let start = values.len() + 1;
            let slots: Vec<String> = (0..filter.exclude_types.len())
                .map(|i| format!("?{}", start + i))
                .collect();
            query.push_str(&format!(" AND doc_type NOT IN ({})", slots.join(", ")));
            for t in &filter.exclude_types {
                values.push(Box::new(t.as_str().to_string()));
            }
        }
        if !filter.exclude_categories.is_empty() {
            let start = values.len() + 1;
            let slots: Vec<String> = (0..filter.exclude_categories.len())
                .map(|i| format!("?{}", start + i))
                .collect();
            query.push_str(&format!(" AND category NOT IN ({})", slots.join(", ")));
            for c in &filter.exclude_categories {
                values.push(Box::new(c.clone()));
            }
        }

        query.push_str(&format!(
            " ORDER BY position LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Box::new(limit as i64 + 1));
        values.push(Box::new(offset as i64));

        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query)?;
        let mut documents: Vec<Document> = stmt
            .query_map(params_refs.as_slice(), DocumentRow::from_row)?
            .filter_map(|r| log_filter_warn(r, "reading document row"))
            .filter_map(|row| log_filter_warn(row.into_document(), "decoding document"))
            .collect();

        let has_more = documents.len() > limit;
        documents.truncate(limit);
        Ok((documents, has_more))
    }

    pub fn count_documents(&self, project: &ProjectId) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE project_id = ?1",
                params![project.as_str()],
                |row| row.get(0),
            )
            .with_context("Failed to count documents")?;
        Ok(count as usize)
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM projects ORDER BY id")?;
        let projects = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| log_filter_warn(r, "reading project"))
            .collect();
        Ok(projects)
    }
}
