//! In-memory repositories with failure injection, used by the test suites.

use crate::db::models::{Role, Settings, SettingsPatch, Vote, VoteRecord};
use crate::db::repositories::{SettingsRepository, VoteRepository};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Default)]
pub struct InMemoryVoteRepository {
    votes: Mutex<Vec<VoteRecord>>,
    next_id: AtomicI64,
    create_failure: Mutex<Option<StoreError>>,
    list_failure: Mutex<Option<StoreError>>,
    delete_failure: Mutex<Option<StoreError>>,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
    creates: AtomicUsize,
    lists: AtomicUsize,
}

impl InMemoryVoteRepository {
    pub fn with_votes(votes: &[(Role, i32)]) -> Self {
        let repo = Self::default();
        for &(role, value) in votes {
            repo.insert_direct(role, value);
        }
        repo
    }

    /// Writes a vote without going through `create`, as another process would.
    pub fn insert_direct(&self, role: Role, value: i32) {
        self.votes.lock().unwrap().push(VoteRecord { role, value });
    }

    pub fn fail_create(&self, error: Option<StoreError>) {
        *self.create_failure.lock().unwrap() = error;
    }

    pub fn fail_list(&self, error: Option<StoreError>) {
        *self.list_failure.lock().unwrap() = error;
    }

    pub fn fail_delete(&self, error: Option<StoreError>) {
        *self.delete_failure.lock().unwrap() = error;
    }

    /// Makes every subsequent `list_all` snapshot the votes, then wait for a
    /// permit from `release_lists` before answering.
    pub fn hold_lists(&self) {
        *self.list_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_lists(&self, n: usize) {
        if let Some(gate) = self.list_gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    /// Stops gating new `list_all` calls; calls already waiting stay on the
    /// returned gate.
    pub fn take_list_gate(&self) -> Option<Arc<Semaphore>> {
        self.list_gate.lock().unwrap().take()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.votes.lock().unwrap().len()
    }
}

#[async_trait]
impl VoteRepository for InMemoryVoteRepository {
    async fn create(&self, role: Role, value: i32) -> Result<Vote, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.create_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.votes.lock().unwrap().push(VoteRecord { role, value });
        Ok(Vote {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            role,
            value,
            date_created: Utc::now(),
        })
    }

    async fn list_all(&self) -> Result<Vec<VoteRecord>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let votes = self.votes.lock().unwrap().clone();
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(error) = self.list_failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(votes)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        if let Some(error) = self.delete_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.votes.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: Mutex<Settings>,
    failure: Mutex<Option<StoreError>>,
}

impl InMemorySettingsRepository {
    pub fn fail(&self, error: Option<StoreError>) {
        *self.failure.lock().unwrap() = error;
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self) -> Result<Settings, StoreError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn update(&self, patch: &SettingsPatch) -> Result<Settings, StoreError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let mut settings = self.settings.lock().unwrap();
        settings.id.get_or_insert(1);
        settings.apply(patch);
        Ok(settings.clone())
    }
}
