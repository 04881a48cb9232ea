//! PostgreSQL implementation of MemberRepository.
//!
//! Profile and payment history live in JSONB columns on the member row, so a
//! renewal and its payment record are written by the same versioned UPDATE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, MemberId, Timestamp};
use crate::domain::membership::{
    Email, Member, MemberProfile, MemberRole, MembershipStatus, PasswordHash, PaymentRecord,
    SubscriptionStatus,
};
use crate::ports::{InsertOutcome, MemberRepository};

const MEMBER_COLUMNS: &str = r#"
    id, email, name, secondary_name, password_hash, role, membership_status,
    membership_expiry, subscription_status, stripe_customer_id, stripe_subscription_id,
    profile, payment_history, version, created_at, updated_at
"#;

/// PostgreSQL implementation of the MemberRepository port.
pub struct PostgresMemberRepository {
    pool: PgPool,
}

impl PostgresMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<Member>, DomainError> {
        let sql = format!("SELECT {} FROM members WHERE {} = $1", MEMBER_COLUMNS, filter);
        let row: Option<MemberRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find member", e))?;

        row.map(Member::try_from).transpose()
    }
}

/// Database row representation of a member.
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    email: String,
    name: String,
    secondary_name: Option<String>,
    password_hash: String,
    role: String,
    membership_status: String,
    membership_expiry: Option<DateTime<Utc>>,
    subscription_status: Option<String>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    profile: Json<MemberProfile>,
    payment_history: Json<Vec<PaymentRecord>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = DomainError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let email = Email::try_from(row.email)
            .map_err(|e| corrupt("email", e.to_string()))?;
        let role: MemberRole = row
            .role
            .parse()
            .map_err(|_| corrupt("role", row.role.clone()))?;
        let membership_status = MembershipStatus::parse(&row.membership_status)
            .ok_or_else(|| corrupt("membership_status", row.membership_status.clone()))?;
        let subscription_status = row
            .subscription_status
            .map(|s| {
                SubscriptionStatus::from_provider(&s)
                    .ok_or_else(|| corrupt("subscription_status", s))
            })
            .transpose()?;

        Ok(Member {
            id: MemberId::from_uuid(row.id),
            email,
            name: row.name,
            secondary_name: row.secondary_name,
            password_hash: PasswordHash::new(row.password_hash),
            role,
            membership_status,
            membership_expiry: row.membership_expiry.map(Timestamp::from_datetime),
            subscription_status,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            profile: row.profile.0,
            payment_history: row.payment_history.0,
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn corrupt(column: &str, value: impl Into<String>) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", column, value.into()),
    )
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl MemberRepository for PostgresMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        let sql = format!("SELECT {} FROM members WHERE id = $1", MEMBER_COLUMNS);
        let row: Option<MemberRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find member", e))?;

        row.map(Member::try_from).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Member>, DomainError> {
        self.find_one("email", email.as_str()).await
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Member>, DomainError> {
        self.find_one("stripe_customer_id", customer_id).await
    }

    async fn insert(&self, member: &Member) -> Result<InsertOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO members (
                id, email, name, secondary_name, password_hash, role, membership_status,
                membership_expiry, subscription_status, stripe_customer_id,
                stripe_subscription_id, profile, payment_history, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(member.id.as_uuid())
        .bind(member.email.as_str())
        .bind(&member.name)
        .bind(&member.secondary_name)
        .bind(member.password_hash.as_str())
        .bind(member.role.as_str())
        .bind(member.membership_status.as_str())
        .bind(member.membership_expiry.map(|t| *t.as_datetime()))
        .bind(member.subscription_status.map(|s| s.as_str()))
        .bind(&member.stripe_customer_id)
        .bind(&member.stripe_subscription_id)
        .bind(Json(&member.profile))
        .bind(Json(member.payment_history()))
        .bind(member.version)
        .bind(member.created_at.as_datetime())
        .bind(member.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert member", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!(email = %member.email, "Member insert skipped, email exists");
            return Ok(InsertOutcome::AlreadyExists);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn update(&self, member: &Member) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE members SET
                name = $3,
                secondary_name = $4,
                role = $5,
                membership_status = $6,
                membership_expiry = $7,
                subscription_status = $8,
                stripe_customer_id = $9,
                stripe_subscription_id = $10,
                profile = $11,
                payment_history = $12,
                updated_at = $13,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(member.id.as_uuid())
        .bind(member.version)
        .bind(&member.name)
        .bind(&member.secondary_name)
        .bind(member.role.as_str())
        .bind(member.membership_status.as_str())
        .bind(member.membership_expiry.map(|t| *t.as_datetime()))
        .bind(member.subscription_status.map(|s| s.as_str()))
        .bind(&member.stripe_customer_id)
        .bind(&member.stripe_subscription_id)
        .bind(Json(&member.profile))
        .bind(Json(member.payment_history()))
        .bind(member.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update member", e))?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT version FROM members WHERE id = $1")
                    .bind(member.id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("check member version", e))?;

            return Err(match exists {
                None => DomainError::new(ErrorCode::MemberNotFound, "Member not found")
                    .with_detail("member_id", member.id.to_string()),
                Some(stored) => DomainError::new(
                    ErrorCode::ConcurrentModification,
                    "Member was modified concurrently",
                )
                .with_detail("expected_version", member.version.to_string())
                .with_detail("stored_version", stored.to_string()),
            });
        }

        Ok(())
    }
}
