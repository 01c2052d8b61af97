//! Users, credentials and sessions.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::auth::tokens;
use crate::error::ApiError;
use crate::models::filter::SyncFilter;
use crate::models::user::{Device, User};

/// Decides which usernames may be registered.
pub trait UsernamePolicy: Send + Sync {
    /// Returns a human-readable reason when `username` is rejected.
    fn validate(&self, username: &str) -> Result<(), String>;
}

/// Letters, digits and underscores, at least `min_length` characters.
#[derive(Debug, Clone)]
pub struct DefaultUsernamePolicy {
    pub min_length: usize,
}

impl Default for DefaultUsernamePolicy {
    fn default() -> Self {
        Self { min_length: 5 }
    }
}

impl UsernamePolicy for DefaultUsernamePolicy {
    fn validate(&self, username: &str) -> Result<(), String> {
        if username.chars().count() < self.min_length {
            return Err(format!(
                "Username must be at least {} characters",
                self.min_length
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err("Username may only contain letters, digits and underscores".to_string());
        }
        Ok(())
    }
}

/// Stored account. Not `Debug`: it holds the password hash.
pub(crate) struct UserRecord {
    pub user: User,
    pub password_hash: String,
    pub tokens: BTreeSet<String>,
    pub filters: HashMap<String, SyncFilter>,
    next_filter_id: u64,
}

pub(crate) struct SessionRecord {
    pub user_id: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
}

/// Accounts keyed by user id, plus a token index for O(1) resolution.
#[derive(Default)]
pub struct IdentityStore {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, SessionRecord>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id).map(|r| &r.user)
    }

    pub fn password_hash(&self, user_id: &str) -> Option<&str> {
        self.users.get(user_id).map(|r| r.password_hash.as_str())
    }

    /// Adds a new account. Fails `UserInUse` if the id is taken.
    pub fn insert(&mut self, user: User, password_hash: String) -> Result<(), ApiError> {
        if self.users.contains_key(&user.user_id) {
            return Err(ApiError::user_in_use(
                "Trying to register a user ID which has been taken",
            ));
        }
        self.users.insert(
            user.user_id.clone(),
            UserRecord {
                user,
                password_hash,
                tokens: BTreeSet::new(),
                filters: HashMap::new(),
                next_filter_id: 0,
            },
        );
        Ok(())
    }

    /// Issues a fresh token bound to `device_id`. `None` if the user is unknown.
    pub fn create_session(&mut self, user_id: &str, device_id: &str) -> Option<String> {
        let record = self.users.get_mut(user_id)?;
        let token = loop {
            let candidate = tokens::generate_access_token();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        record.tokens.insert(token.clone());
        self.sessions.insert(
            token.clone(),
            SessionRecord {
                user_id: user_id.to_string(),
                device_id: device_id.to_string(),
                created_at: Utc::now(),
            },
        );
        Some(token)
    }

    pub fn resolve(&self, token: &str) -> Option<&User> {
        let session = self.sessions.get(token)?;
        self.user(&session.user_id)
    }

    /// Revokes one session. Returns the device it was bound to, or `None` if
    /// the token was already gone.
    pub fn revoke(&mut self, token: &str) -> Option<String> {
        let session = self.sessions.remove(token)?;
        if let Some(record) = self.users.get_mut(&session.user_id) {
            record.tokens.remove(token);
        }
        Some(session.device_id)
    }

    /// Revokes every session of `user_id`, returning how many were removed.
    pub fn revoke_all(&mut self, user_id: &str) -> usize {
        let Some(record) = self.users.get_mut(user_id) else {
            return 0;
        };
        let tokens = std::mem::take(&mut record.tokens);
        for token in &tokens {
            self.sessions.remove(token);
        }
        tokens.len()
    }

    pub fn set_password_hash(&mut self, user_id: &str, password_hash: String) -> Result<(), ApiError> {
        let record = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        record.password_hash = password_hash;
        Ok(())
    }

    /// One device per live session, oldest first.
    pub fn devices(&self, user_id: &str) -> Vec<Device> {
        let Some(record) = self.users.get(user_id) else {
            return Vec::new();
        };
        let mut devices: Vec<Device> = record
            .tokens
            .iter()
            .filter_map(|t| self.sessions.get(t))
            .map(|s| Device {
                device_id: s.device_id.clone(),
                created_at: s.created_at,
            })
            .collect();
        devices.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.device_id.cmp(&b.device_id))
        });
        devices
    }

    pub fn add_filter(&mut self, user_id: &str, filter: SyncFilter) -> Result<String, ApiError> {
        let record = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        let id = record.next_filter_id.to_string();
        record.next_filter_id += 1;
        record.filters.insert(id.clone(), filter);
        Ok(id)
    }

    pub fn filter(&self, user_id: &str, filter_id: &str) -> Result<&SyncFilter, ApiError> {
        self.users
            .get(user_id)
            .and_then(|r| r.filters.get(filter_id))
            .ok_or_else(|| ApiError::unknown_filter(format!("No filter with id {filter_id}")))
    }
}
