//! Member store port.
//!
//! # Design
//!
//! - **Insert-if-absent**: `insert` is atomic on the email unique key, so two
//!   processes racing to register the same address create one member
//! - **Optimistic locking**: `update` succeeds only against the version it
//!   was read at
//!
//! # Example
//!
//! ```ignore
//! match repo.insert(&member).await? {
//!     InsertOutcome::Inserted => Ok(member.id),
//!     InsertOutcome::AlreadyExists => {
//!         // someone else won; re-read and decide
//!         let existing = repo.find_by_email(&member.email).await?;
//!         ...
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, MemberId};
use crate::domain::membership::{Email, Member};

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The member was stored.
    Inserted,
    /// A member with the same email already exists; nothing was written.
    AlreadyExists,
}

/// Repository port for Member aggregate persistence.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find a member by ID.
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError>;

    /// Find a member by normalized email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Member>, DomainError>;

    /// Find the member linked to a Stripe customer.
    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Member>, DomainError>;

    /// Store a new member unless one with the same email exists.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, member: &Member) -> Result<InsertOutcome, DomainError>;

    /// Persist changes to an existing member.
    ///
    /// `member.version` must equal the stored version; the stored version is
    /// then incremented.
    ///
    /// # Errors
    ///
    /// - `MemberNotFound` if the member doesn't exist
    /// - `ConcurrentModification` if the stored version moved on
    /// - `DatabaseError` on persistence failure
    async fn update(&self, member: &Member) -> Result<(), DomainError>;
}
