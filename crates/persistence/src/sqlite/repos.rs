//! Repository implementations for SQLite
//!
//! Single-statement methods are generic over `sqlx::Executor`, so they run
//! against the pool or inside a caller's transaction (`&mut *tx`).
//! Multi-statement writes take `&mut SqliteConnection` and must be called
//! inside a transaction.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use veilcredit_core::{
    AuditEntry, CoprocessorPatch, CreditScore, EncryptedSubmission, Loan, LoanStatus,
    NewAuditEntry, Role, ScoreStatus, User,
};

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the users table
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user
    pub async fn insert<'e, E>(executor: E, user: &User) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = UserRow::from(user);
        sqlx::query("INSERT INTO users (id, wallet_address, role, created_at) VALUES (?, ?, ?, ?)")
            .bind(&row.id)
            .bind(&row.wallet_address)
            .bind(&row.role)
            .bind(row.created_at)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Fetch a user by ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<UserRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("User", id))
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<Option<UserRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Look up a user by normalized wallet
    pub async fn find_by_wallet<'e, E>(
        executor: E,
        wallet_address: &str,
    ) -> PersistenceResult<Option<UserRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE wallet_address = ?")
            .bind(wallet_address)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Update the role
    pub async fn update_role<'e, E>(executor: E, id: &str, role: Role) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn count<'e, E>(executor: E) -> PersistenceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Submission Repository
// ============================================================================

/// Repository for the encrypted_submissions table (append-only)
pub struct SubmissionRepo;

impl SubmissionRepo {
    pub async fn insert<'e, E>(executor: E, submission: &EncryptedSubmission) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = SubmissionRow::from(submission);
        sqlx::query(
            r#"
            INSERT INTO encrypted_submissions (id, user_id, salary_handle, debts_handle, expenses_handle, submitted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.salary_handle)
        .bind(&row.debts_handle)
        .bind(&row.expenses_handle)
        .bind(row.submitted_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// A user's submissions, newest first
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: &str,
    ) -> PersistenceResult<Vec<SubmissionRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM encrypted_submissions WHERE user_id = ? ORDER BY submitted_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Credit Score Repository
// ============================================================================

/// Repository for the credit_scores table
pub struct CreditScoreRepo;

impl CreditScoreRepo {
    pub async fn insert<'e, E>(executor: E, score: &CreditScore) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = CreditScoreRow::from(score);
        sqlx::query(
            r#"
            INSERT INTO credit_scores (id, user_id, submission_id, score_handle, status, computed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.submission_id)
        .bind(&row.score_handle)
        .bind(&row.status)
        .bind(row.computed_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Current score: latest `computed_at`, ties broken by insertion order
    pub async fn latest_for_user<'e, E>(
        executor: E,
        user_id: &str,
    ) -> PersistenceResult<Option<CreditScoreRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, CreditScoreRow>(
            "SELECT * FROM credit_scores WHERE user_id = ? ORDER BY computed_at DESC, rowid DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: &str,
    ) -> PersistenceResult<Vec<CreditScoreRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, CreditScoreRow>(
            "SELECT * FROM credit_scores WHERE user_id = ? ORDER BY computed_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: &str,
        status: ScoreStatus,
    ) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE credit_scores SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("CreditScore", id));
        }
        Ok(())
    }
}

// ============================================================================
// Loan Repository
// ============================================================================

/// Column changes applied together with a status transition.
/// `None` keeps the stored value.
#[derive(Debug, Clone)]
pub struct LoanChanges {
    pub lender_id: Option<String>,
    pub approved_amount: Option<i64>,
    pub decision_handle: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LoanChanges {
    pub fn new() -> Self {
        Self {
            lender_id: None,
            approved_amount: None,
            decision_handle: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_lender(mut self, lender_id: &str) -> Self {
        self.lender_id = Some(lender_id.to_string());
        self
    }

    pub fn with_approved_amount(mut self, amount: i64) -> Self {
        self.approved_amount = Some(amount);
        self
    }

    pub fn with_decision(mut self, handle: &str) -> Self {
        self.decision_handle = Some(handle.to_string());
        self
    }
}

impl Default for LoanChanges {
    fn default() -> Self {
        Self::new()
    }
}

/// Repository for the loans table
pub struct LoanRepo;

impl LoanRepo {
    /// Insert a new loan
    pub async fn insert<'e, E>(executor: E, loan: &Loan) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = LoanRow::from(loan);
        sqlx::query(
            r#"
            INSERT INTO loans (id, borrower_id, lender_id, requested_amount, approved_amount, term_days,
                               risk_tier, status, decision_handle, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.borrower_id)
        .bind(&row.lender_id)
        .bind(row.requested_amount)
        .bind(row.approved_amount)
        .bind(row.term_days)
        .bind(&row.risk_tier)
        .bind(&row.status)
        .bind(&row.decision_handle)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Fetch a loan by ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<LoanRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Loan", id))
    }

    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<Option<LoanRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Compare-and-swap on status. Returns `false` when the loan is missing
    /// or no longer in `from`; exactly one of two racing calls gets `true`.
    pub async fn transition<'e, E>(
        executor: E,
        id: &str,
        from: LoanStatus,
        to: LoanStatus,
        changes: &LoanChanges,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE loans SET
                status = ?,
                lender_id = COALESCE(?, lender_id),
                approved_amount = COALESCE(?, approved_amount),
                decision_handle = COALESCE(?, decision_handle),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(&changes.lender_id)
        .bind(changes.approved_amount)
        .bind(&changes.decision_handle)
        .bind(changes.updated_at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All loans, newest first
    pub async fn list_all<'e, E>(executor: E) -> PersistenceResult<Vec<LoanRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_borrower<'e, E>(
        executor: E,
        borrower_id: &str,
    ) -> PersistenceResult<Vec<LoanRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE borrower_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(borrower_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Loans decided by this lender
    pub async fn list_by_lender<'e, E>(
        executor: E,
        lender_id: &str,
    ) -> PersistenceResult<Vec<LoanRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE lender_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(lender_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Every pending loan plus the ones this lender decided
    pub async fn list_visible_to_lender<'e, E>(
        executor: E,
        lender_id: &str,
    ) -> PersistenceResult<Vec<LoanRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE status = 'pending' OR lender_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(lender_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Audit Repository
// ============================================================================

/// Repository for the audit_log table (append-only, hash-chained)
pub struct AuditRepo;

impl AuditRepo {
    /// Append one entry. Call inside a transaction: advancing `audit_head`
    /// is the write that serialises appenders.
    pub async fn append(
        conn: &mut SqliteConnection,
        draft: NewAuditEntry,
    ) -> PersistenceResult<AuditEntry> {
        let (seq, prev_hash): (i64, String) = sqlx::query_as(
            "UPDATE audit_head SET last_seq = last_seq + 1 WHERE id = 1 RETURNING last_seq, last_hash",
        )
        .fetch_one(&mut *conn)
        .await?;

        let entry = draft.seal(seq, &prev_hash, Utc::now());
        let row = AuditEntryRow::try_from(&entry)?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (id, seq, user_id, action, entity_type, entity_id, metadata, timestamp, prev_hash, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(row.seq)
        .bind(&row.user_id)
        .bind(&row.action)
        .bind(&row.entity_type)
        .bind(&row.entity_id)
        .bind(&row.metadata)
        .bind(row.timestamp)
        .bind(&row.prev_hash)
        .bind(&row.hash)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE audit_head SET last_hash = ? WHERE id = 1")
            .bind(&entry.hash)
            .execute(&mut *conn)
            .await?;

        Ok(entry)
    }

    /// Newest first
    pub async fn recent<'e, E>(executor: E, limit: i64) -> PersistenceResult<Vec<AuditEntryRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, AuditEntryRow>(
            "SELECT * FROM audit_log ORDER BY seq DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Whole chain in append order, for verification
    pub async fn all_ascending<'e, E>(executor: E) -> PersistenceResult<Vec<AuditEntryRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, AuditEntryRow>("SELECT * FROM audit_log ORDER BY seq ASC")
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Number of entries
    pub async fn count<'e, E>(executor: E) -> PersistenceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Coprocessor Status Repository
// ============================================================================

/// Repository for coprocessor_status (single row, id = 1)
pub struct CoprocessorRepo;

impl CoprocessorRepo {
    pub async fn get<'e, E>(executor: E) -> PersistenceResult<Option<CoprocessorStatusRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, CoprocessorStatusRow>(
            "SELECT * FROM coprocessor_status WHERE id = 1",
        )
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Count one computation and fold its latency into the running mean.
    /// Both happen in one upsert, so concurrent calls never lose an update.
    pub async fn record_computation<'e, E>(
        executor: E,
        latency_ms: f64,
        at: DateTime<Utc>,
    ) -> PersistenceResult<CoprocessorStatusRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, CoprocessorStatusRow>(
            r#"
            INSERT INTO coprocessor_status (id, status, last_key_rotation, total_computations, average_latency_ms, updated_at)
            VALUES (1, 'active', NULL, 1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                average_latency_ms = (coprocessor_status.average_latency_ms * coprocessor_status.total_computations
                                      + excluded.average_latency_ms) / (coprocessor_status.total_computations + 1),
                total_computations = coprocessor_status.total_computations + 1,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(latency_ms)
        .bind(at)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Merge-patch; creates the row with defaults when missing.
    pub async fn apply_patch<'e, E>(
        executor: E,
        patch: &CoprocessorPatch,
        at: DateTime<Utc>,
    ) -> PersistenceResult<CoprocessorStatusRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let status = patch.status.map(|s| s.as_str());
        let row = sqlx::query_as::<_, CoprocessorStatusRow>(
            r#"
            INSERT INTO coprocessor_status (id, status, last_key_rotation, total_computations, average_latency_ms, updated_at)
            VALUES (1, COALESCE(?, 'active'), ?, 0, COALESCE(?, 0), ?)
            ON CONFLICT(id) DO UPDATE SET
                status = COALESCE(?, coprocessor_status.status),
                last_key_rotation = COALESCE(?, coprocessor_status.last_key_rotation),
                average_latency_ms = COALESCE(?, coprocessor_status.average_latency_ms),
                updated_at = ?
            RETURNING *
            "#,
        )
        // insert
        .bind(status)
        .bind(patch.last_key_rotation)
        .bind(patch.average_latency_ms)
        .bind(at)
        // update
        .bind(status)
        .bind(patch.last_key_rotation)
        .bind(patch.average_latency_ms)
        .bind(at)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Create the database connection pool
pub async fn create_pool(database_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// Run migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Open a database and apply the schema
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Private in-memory database with the schema applied.
///
/// Pinned to one connection that never expires: every new SQLite memory
/// connection would otherwise be a fresh, empty database.
pub async fn connect_in_memory() -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilcredit_core::{AuditAction, CoprocessorState, HandleCodec, RiskTier};

    const WALLET: &str = "0x00000000000000000000000000000000000000a1";

    async fn seeded_user(pool: &SqlitePool) -> User {
        let user = User::new(WALLET, Role::Borrower).unwrap();
        UserRepo::insert(pool, &user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_user_round_trip() {
        let pool = connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;

        let row = UserRepo::find_by_wallet(&pool, WALLET).await.unwrap().unwrap();
        assert_eq!(User::try_from(row).unwrap(), user);

        UserRepo::update_role(&pool, &user.id, Role::Lender).await.unwrap();
        let row = UserRepo::get_by_id(&pool, &user.id).await.unwrap();
        assert_eq!(row.role, "lender");

        assert!(UserRepo::get_by_id(&pool, "USR-missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_wallet_is_unique_violation() {
        let pool = connect_in_memory().await.unwrap();
        seeded_user(&pool).await;

        let again = User::new(WALLET, Role::Lender).unwrap();
        let err = UserRepo::insert(&pool, &again).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_latest_score_wins() {
        let pool = connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;

        let older = CreditScore::computed(&user.id, None, HandleCodec::encode(610));
        let newer = CreditScore::computed(&user.id, None, HandleCodec::encode(780));
        CreditScoreRepo::insert(&pool, &older).await.unwrap();
        CreditScoreRepo::insert(&pool, &newer).await.unwrap();

        let latest = CreditScoreRepo::latest_for_user(&pool, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(CreditScoreRepo::list_for_user(&pool, &user.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_loan_transition_is_compare_and_swap() {
        let pool = connect_in_memory().await.unwrap();
        let user = seeded_user(&pool).await;
        let loan = Loan::new(&user.id, 10_000, 30, RiskTier::Medium).unwrap();
        LoanRepo::insert(&pool, &loan).await.unwrap();

        let changes = LoanChanges::new().with_approved_amount(10_000);
        let first = LoanRepo::transition(&pool, &loan.id, LoanStatus::Pending, LoanStatus::Approved, &changes)
            .await
            .unwrap();
        let second = LoanRepo::transition(&pool, &loan.id, LoanStatus::Pending, LoanStatus::Denied, &changes)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let row = LoanRepo::get_by_id(&pool, &loan.id).await.unwrap();
        assert_eq!(row.status, "approved");
        assert_eq!(row.approved_amount, Some(10_000));
    }

    #[tokio::test]
    async fn test_audit_append_chains_entries() {
        let pool = connect_in_memory().await.unwrap();
        let mut tx = pool.begin().await.unwrap();

        let first = AuditRepo::append(&mut tx, NewAuditEntry::new(AuditAction::KeyRotated))
            .await
            .unwrap();
        let second = AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(AuditAction::AuditAppended).with_user("USR-1"),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.prev_hash, first.hash);

        let rows = AuditRepo::all_ascending(&pool).await.unwrap();
        let entries: Vec<AuditEntry> = rows
            .into_iter()
            .map(|r| AuditEntry::try_from(r).unwrap())
            .collect();
        assert!(veilcredit_core::verify_chain(&entries).is_ok());
    }

    #[tokio::test]
    async fn test_audit_log_rejects_updates() {
        let pool = connect_in_memory().await.unwrap();
        let mut tx = pool.begin().await.unwrap();
        AuditRepo::append(&mut tx, NewAuditEntry::new(AuditAction::KeyRotated))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let result = sqlx::query("UPDATE audit_log SET action = 'LOAN_DENIED'")
            .execute(&pool)
            .await;
        assert!(result.is_err());
        assert!(sqlx::query("DELETE FROM audit_log").execute(&pool).await.is_err());
        assert_eq!(AuditRepo::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_coprocessor_lazy_create_and_running_mean() {
        let pool = connect_in_memory().await.unwrap();
        assert!(CoprocessorRepo::get(&pool).await.unwrap().is_none());

        CoprocessorRepo::record_computation(&pool, 10.0, Utc::now()).await.unwrap();
        let row = CoprocessorRepo::record_computation(&pool, 20.0, Utc::now()).await.unwrap();

        assert_eq!(row.total_computations, 2);
        assert!((row.average_latency_ms - 15.0).abs() < 1e-9);
        assert_eq!(row.status, "active");
    }

    #[tokio::test]
    async fn test_coprocessor_patch_merges() {
        let pool = connect_in_memory().await.unwrap();
        CoprocessorRepo::record_computation(&pool, 4.0, Utc::now()).await.unwrap();

        let patch = CoprocessorPatch::new().with_status(CoprocessorState::Degraded);
        let row = CoprocessorRepo::apply_patch(&pool, &patch, Utc::now()).await.unwrap();

        assert_eq!(row.status, "degraded");
        assert_eq!(row.total_computations, 1);
        assert!((row.average_latency_ms - 4.0).abs() < 1e-9);
        assert!(row.last_key_rotation.is_none());
    }

    #[tokio::test]
    async fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("veilcredit.db").display());

        {
            let pool = init_database(&url).await.unwrap();
            seeded_user(&pool).await;
            pool.close().await;
        }

        // migrations are idempotent; data survives reopening
        let pool = init_database(&url).await.unwrap();
        assert_eq!(UserRepo::count(&pool).await.unwrap(), 1);
    }
}
