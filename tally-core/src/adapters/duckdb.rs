//! DuckDB repository implementation
//!
//! One embedded database backs the credential, session and ledger stores.
//! Every call takes the connection lock for a single statement (or a
//! statement plus its read-back), which gives per-record atomicity.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Identity, PublicTransaction, Session, Transaction, TransactionDraft, TransactionKind,
};
use crate::ports::{CredentialStore, LedgerStore, SessionStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Timestamp layout written to TIMESTAMP columns (always UTC)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const IDENTITY_COLUMNS: &str = "identity_id, display_name, email, password_hash, external_id, \
     avatar_ref, created_at::VARCHAR";

const TRANSACTION_COLUMNS: &str = "transaction_id, owner_id, kind, category, amount::VARCHAR, \
     description, transaction_date::VARCHAR, created_at::VARCHAR, updated_at::VARCHAR";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("Duplicate key")
            || msg.contains("unique constraint")
            || msg.contains("primary key constraint")
        {
            let what = if msg.contains("email") {
                "email already belongs to another identity"
            } else if msg.contains("external_id") {
                "external account already linked to another identity"
            } else {
                "record already exists"
            };
            Error::Conflict(what.to_string())
        } else {
            Error::StoreUnavailable(msg)
        }
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff on file locking errors, which show
    /// up when another process holds the file (e.g. a second CLI call).
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) if is_retryable_error(&e.to_string()) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        error = %e,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Private in-memory database (tests, throwaway contexts)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations, returning what was applied
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === Identity helpers ===

    fn query_identity(&self, filter_column: &str, key: &str) -> Result<Option<Identity>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_identities WHERE {} = ?",
            IDENTITY_COLUMNS, filter_column
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([key], IdentityRow::read)?;
        rows.next().transpose()?.map(IdentityRow::into_identity).transpose()
    }

    // === Transaction helpers ===

    fn select_transaction(conn: &Connection, id: Uuid, owner_id: Uuid) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE transaction_id = ? AND owner_id = ?",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            params![id.to_string(), owner_id.to_string()],
            TransactionRow::read,
        )?;
        rows.next()
            .transpose()?
            .map(TransactionRow::into_transaction)
            .transpose()
    }

    /// Number of stored identities
    pub fn identity_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_identities", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of stored transactions across all owners
    pub fn transaction_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl CredentialStore for DuckDbRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        self.query_identity("email", email)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>> {
        self.query_identity("external_id", external_id)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        self.query_identity("identity_id", &id.to_string())
    }

    async fn create_identity(&self, identity: Identity) -> Result<Identity> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_identities (identity_id, display_name, email, password_hash,
                                         external_id, avatar_ref, created_at)
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
            params![
                identity.id.to_string(),
                identity.display_name,
                identity.email,
                identity.password_hash,
                identity.external_id,
                identity.avatar_ref,
                format_timestamp(identity.created_at),
            ],
        )?;
        Ok(identity)
    }

    async fn link_external_id(
        &self,
        id: Uuid,
        external_id: &str,
        avatar_ref: Option<&str>,
    ) -> Result<Identity> {
        {
            let conn = self.lock()?;
            let changed = conn.execute(
                "UPDATE sys_identities
                 SET external_id = ?, avatar_ref = COALESCE(avatar_ref, ?)
                 WHERE identity_id = ?",
                params![external_id, avatar_ref, id.to_string()],
            )?;
            if changed == 0 {
                return Err(Error::not_found(format!("identity {}", id)));
            }
        }
        self.query_identity("identity_id", &id.to_string())?
            .ok_or_else(|| Error::not_found(format!("identity {}", id)))
    }
}

#[async_trait]
impl SessionStore for DuckDbRepository {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_sessions (token_hash, identity_id, created_at, expires_at)
             VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                session.token_hash,
                session.identity_id.to_string(),
                format_timestamp(session.created_at),
                format_timestamp(session.expires_at),
            ],
        )?;
        Ok(())
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT token_hash, identity_id, created_at::VARCHAR, expires_at::VARCHAR
             FROM sys_sessions WHERE token_hash = ?",
        )?;
        let mut rows = stmt.query_map([token_hash], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        match rows.next().transpose()? {
            Some((token_hash, identity_id, created_at, expires_at)) => Ok(Some(Session {
                token_hash,
                identity_id: parse_uuid(&identity_id)?,
                created_at: parse_timestamp(&created_at)?,
                expires_at: parse_timestamp(&expires_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn touch_session(&self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sys_sessions SET expires_at = CAST(? AS TIMESTAMP) WHERE token_hash = ?",
            params![format_timestamp(expires_at), token_hash],
        )?;
        Ok(())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_sessions WHERE token_hash = ?", [token_hash])?;
        Ok(deleted > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM sys_sessions WHERE expires_at <= CAST(? AS TIMESTAMP)",
            [format_timestamp(now)],
        )?;
        Ok(deleted as u64)
    }
}

#[async_trait]
impl LedgerStore for DuckDbRepository {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_transactions (transaction_id, owner_id, kind, category, amount,
                                           description, transaction_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18, 4)), ?,
                     CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                tx.id.to_string(),
                tx.owner_id.to_string(),
                tx.kind.as_str(),
                tx.category,
                tx.amount.to_string(),
                tx.description,
                format_timestamp(tx.date),
                format_timestamp(tx.created_at),
                format_timestamp(tx.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn list_transactions(&self, owner_id: Uuid, limit: Option<usize>) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut sql = format!(
            "SELECT {} FROM sys_transactions WHERE owner_id = ?
             ORDER BY transaction_date DESC, created_at DESC",
            TRANSACTION_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([owner_id.to_string()], TransactionRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    async fn list_all_transactions(&self) -> Result<Vec<PublicTransaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.transaction_id, i.display_name, t.kind, t.category, t.amount::VARCHAR,
                    t.description, t.transaction_date::VARCHAR
             FROM sys_transactions t
             LEFT JOIN sys_identities i ON i.identity_id = t.owner_id
             ORDER BY t.transaction_date DESC, t.created_at DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, owner_name, kind, category, amount, description, date)| {
                Ok(PublicTransaction {
                    id: parse_uuid(&id)?,
                    owner_name,
                    kind: parse_kind(&kind)?,
                    category,
                    amount: parse_decimal(&amount)?,
                    description,
                    date: parse_timestamp(&date)?,
                })
            })
            .collect()
    }

    async fn get_transaction(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        Self::select_transaction(&conn, id, owner_id)
    }

    async fn update_transaction(
        &self,
        id: Uuid,
        owner_id: Uuid,
        draft: &TransactionDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sys_transactions
             SET kind = ?,
                 category = ?,
                 amount = CAST(? AS DECIMAL(18, 4)),
                 description = ?,
                 transaction_date = COALESCE(CAST(? AS TIMESTAMP), transaction_date),
                 updated_at = CAST(? AS TIMESTAMP)
             WHERE transaction_id = ? AND owner_id = ?",
            params![
                draft.kind.as_str(),
                draft.category,
                draft.amount.to_string(),
                draft.description,
                draft.date.map(format_timestamp),
                format_timestamp(updated_at),
                id.to_string(),
                owner_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::select_transaction(&conn, id, owner_id)
    }

    async fn delete_transaction(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM sys_transactions WHERE transaction_id = ? AND owner_id = ?",
            params![id.to_string(), owner_id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

// Row shapes as read from DuckDB, converted outside the row callback so
// parse failures surface as crate errors.

struct IdentityRow {
    id: String,
    display_name: String,
    email: Option<String>,
    password_hash: Option<String>,
    external_id: Option<String>,
    avatar_ref: Option<String>,
    created_at: String,
}

impl IdentityRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            external_id: row.get(4)?,
            avatar_ref: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_identity(self) -> Result<Identity> {
        Ok(Identity {
            id: parse_uuid(&self.id)?,
            display_name: self.display_name,
            email: self.email,
            password_hash: self.password_hash,
            external_id: self.external_id,
            avatar_ref: self.avatar_ref,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct TransactionRow {
    id: String,
    owner_id: String,
    kind: String,
    category: String,
    amount: String,
    description: Option<String>,
    date: String,
    created_at: String,
    updated_at: String,
}

impl TransactionRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            kind: row.get(2)?,
            category: row.get(3)?,
            amount: row.get(4)?,
            description: row.get(5)?,
            date: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: parse_uuid(&self.id)?,
            owner_id: parse_uuid(&self.owner_id)?,
            kind: parse_kind(&self.kind)?,
            category: self.category,
            amount: parse_decimal(&self.amount)?,
            description: self.description,
            date: parse_timestamp(&self.date)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

// Helper functions

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a TIMESTAMP read back as VARCHAR (`2024-01-15 10:30:00[.123456]`)
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::store(format!("Unreadable timestamp in store: {}", s)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::store(format!("Unreadable id in store: {}", s)))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s)
        .map(|d| d.normalize())
        .map_err(|_| Error::store(format!("Unreadable amount in store: {}", s)))
}

fn parse_kind(s: &str) -> Result<TransactionKind> {
    TransactionKind::from_str(s).map_err(|_| Error::store(format!("Unreadable kind in store: {}", s)))
}
