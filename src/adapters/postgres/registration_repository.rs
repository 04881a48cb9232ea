//! PostgreSQL implementation of RegistrationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, RegistrationId, Timestamp};
use crate::domain::membership::Email;
use crate::domain::registration::{EventRegistration, RegistrationStatus};
use crate::ports::RegistrationRepository;

pub struct PostgresRegistrationRepository {
    pool: PgPool,
}

impl PostgresRegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    event_name: String,
    email: String,
    amount_cents: i64,
    currency: String,
    payment_intent_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for EventRegistration {
    type Error = DomainError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let status = RegistrationStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid registration status: {}", row.status),
            )
        })?;
        let email = Email::try_from(row.email).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid email: {}", e))
        })?;

        Ok(EventRegistration {
            id: RegistrationId::from_uuid(row.id),
            event_name: row.event_name,
            email,
            amount_cents: row.amount_cents,
            currency: row.currency,
            payment_intent_id: row.payment_intent_id,
            status,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl RegistrationRepository for PostgresRegistrationRepository {
    async fn insert(&self, registration: &EventRegistration) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO event_registrations (
                id, event_name, email, amount_cents, currency, payment_intent_id,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(registration.id.as_uuid())
        .bind(&registration.event_name)
        .bind(registration.email.as_str())
        .bind(registration.amount_cents)
        .bind(&registration.currency)
        .bind(&registration.payment_intent_id)
        .bind(registration.status.as_str())
        .bind(registration.created_at.as_datetime())
        .bind(registration.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert registration", e))?;

        Ok(())
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<EventRegistration>, DomainError> {
        let row: Option<RegistrationRow> = sqlx::query_as(
            r#"
            SELECT id, event_name, email, amount_cents, currency, payment_intent_id,
                   status, created_at, updated_at
            FROM event_registrations
            WHERE payment_intent_id = $1
            "#,
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find registration", e))?;

        row.map(EventRegistration::try_from).transpose()
    }

    async fn find_by_id(
        &self,
        id: &RegistrationId,
    ) -> Result<Option<EventRegistration>, DomainError> {
        let row: Option<RegistrationRow> = sqlx::query_as(
            r#"
            SELECT id, event_name, email, amount_cents, currency, payment_intent_id,
                   status, created_at, updated_at
            FROM event_registrations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find registration", e))?;

        row.map(EventRegistration::try_from).transpose()
    }

    async fn update(&self, registration: &EventRegistration) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE event_registrations SET
                payment_intent_id = $2,
                status = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(registration.id.as_uuid())
        .bind(&registration.payment_intent_id)
        .bind(registration.status.as_str())
        .bind(registration.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update registration", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RegistrationNotFound,
                "Registration not found",
            ));
        }

        Ok(())
    }
}
