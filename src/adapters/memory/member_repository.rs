//! In-memory member store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, MemberId};
use crate::domain::membership::{Email, Member};
use crate::ports::{InsertOutcome, MemberRepository};

#[derive(Default)]
struct State {
    members: HashMap<MemberId, Member>,
    injected_update_errors: VecDeque<DomainError>,
}

/// Member store backed by a `HashMap`.
///
/// The write lock is held across each check-and-write, which makes `insert`
/// and `update` atomic.
#[derive(Clone, Default)]
pub struct InMemoryMemberRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `update` fail with `error` before touching the store.
    pub async fn fail_next_update(&self, error: DomainError) {
        self.state.write().await.injected_update_errors.push_back(error);
    }

    pub async fn member_count(&self) -> usize {
        self.state.read().await.members.len()
    }

    pub async fn all(&self) -> Vec<Member> {
        self.state.read().await.members.values().cloned().collect()
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        Ok(self.state.read().await.members.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Member>, DomainError> {
        let state = self.state.read().await;
        Ok(state.members.values().find(|m| &m.email == email).cloned())
    }

    async fn find_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Member>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .members
            .values()
            .find(|m| m.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn insert(&self, member: &Member) -> Result<InsertOutcome, DomainError> {
        let mut state = self.state.write().await;
        if state.members.values().any(|m| m.email == member.email) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.members.insert(member.id, member.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn update(&self, member: &Member) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if let Some(err) = state.injected_update_errors.pop_front() {
            return Err(err);
        }

        let stored = state.members.get_mut(&member.id).ok_or_else(|| {
            DomainError::new(ErrorCode::MemberNotFound, format!("Member {} not found", member.id))
        })?;
        if stored.version != member.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "Member {} is at version {}, update was based on {}",
                    member.id, stored.version, member.version
                ),
            ));
        }

        let mut next = member.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}
