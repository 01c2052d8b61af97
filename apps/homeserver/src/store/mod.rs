//! The store aggregate: identities, rooms and timelines behind one lock.

pub mod account;
pub mod directory;
pub mod identity;
pub mod timeline;

use std::time::Duration;

use homeserver_common::id::{localpart, qualified, sigil};
use homeserver_common::local_alias;
use parking_lot::RwLock;

use crate::auth::password::CredentialHasher;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::event::{Event, NewEvent};
use crate::models::room::Room;
use crate::models::user::User;
use crate::sync::fanout::{SyncBroadcast, TimelinePayload};

pub use account::Account;
pub use directory::RoomDirectory;
pub use identity::{DefaultUsernamePolicy, IdentityStore, UsernamePolicy};
pub use timeline::EventTimeline;

/// Everything guarded by the store lock.
#[derive(Default)]
pub(crate) struct StoreState {
    pub identity: IdentityStore,
    pub directory: RoomDirectory,
    pub timeline: EventTimeline,
}

impl StoreState {
    /// Appends an event, folds it into room state, and queues a wake-up for
    /// everyone who can see it.
    pub fn emit(
        &mut self,
        new: NewEvent,
        server_name: &str,
        notices: &mut Vec<TimelinePayload>,
    ) -> (String, u64) {
        let event = self.timeline.append(new, server_name);
        self.directory.apply(event);

        let mut recipients = self.directory.audience(&event.room_id);
        recipients.push(event.sender.clone());
        if let Some(target) = event.membership().and(event.state_key.as_ref()) {
            recipients.push(target.clone());
        }

        notices.push(TimelinePayload {
            room_id: event.room_id.clone(),
            position: event.stream_position,
            recipients,
        });
        (event.event_id.clone(), event.stream_position)
    }
}

/// The in-process homeserver core.
///
/// Reads take the shared lock, mutations the exclusive one. Wake-ups for
/// suspended syncs are published after the exclusive lock is released.
pub struct Store {
    pub(crate) state: RwLock<StoreState>,
    pub(crate) broadcast: SyncBroadcast,
    pub(crate) server_name: String,
    pub(crate) passwords: CredentialHasher,
    pub(crate) sync_max_timeout: Duration,
    username_policy: Box<dyn UsernamePolicy>,
}

impl Store {
    pub fn new(config: &Config) -> Result<Self, password_hash::Error> {
        Ok(Self {
            state: RwLock::new(StoreState::default()),
            broadcast: SyncBroadcast::new(),
            server_name: config.server_name.clone(),
            passwords: CredentialHasher::new(
                config.password_memory_kib,
                config.password_iterations,
            )?,
            sync_max_timeout: Duration::from_millis(config.sync_max_timeout_ms),
            username_policy: Box::new(DefaultUsernamePolicy {
                min_length: config.username_min_length,
            }),
        })
    }

    /// Replaces the username validation policy.
    pub fn with_username_policy(mut self, policy: impl UsernamePolicy + 'static) -> Self {
        self.username_policy = Box::new(policy);
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Fully qualified user id for a bare or qualified username.
    pub fn user_id_for(&self, username: &str) -> String {
        let local = localpart(sigil::USER, username, &self.server_name);
        qualified(sigil::USER, local, &self.server_name)
    }

    /// Creates an account and logs it in on `device_id`.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        device_id: &str,
    ) -> Result<(User, String), ApiError> {
        self.username_policy
            .validate(username)
            .map_err(ApiError::invalid_username)?;

        let password_hash = self.passwords.hash(password)?;
        let user = User {
            user_id: qualified(sigil::USER, username, &self.server_name),
            display_name: username.to_string(),
            created_at: chrono::Utc::now(),
        };

        let token = {
            let mut state = self.state.write();
            state.identity.insert(user.clone(), password_hash)?;
            state
                .identity
                .create_session(&user.user_id, device_id)
                .ok_or_else(|| ApiError::internal("Registered user vanished"))?
        };

        tracing::info!(user_id = %user.user_id, device_id, "user registered");
        Ok((user, token))
    }

    /// Checks the credential and issues a fresh session token.
    ///
    /// Unknown users and wrong passwords fail identically.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        device_id: &str,
    ) -> Result<(User, String), ApiError> {
        let user_id = self.user_id_for(username);
        let password_hash = self
            .state
            .read()
            .identity
            .password_hash(&user_id)
            .map(str::to_string);

        if !self.passwords.verify_stored(password, password_hash.as_deref()) {
            tracing::debug!(%user_id, "login rejected");
            return Err(ApiError::forbidden("Invalid username or password"));
        }

        let mut state = self.state.write();
        let token = state
            .identity
            .create_session(&user_id, device_id)
            .ok_or_else(|| ApiError::forbidden("Invalid username or password"))?;
        let user = state
            .identity
            .user(&user_id)
            .cloned()
            .ok_or_else(|| ApiError::forbidden("Invalid username or password"))?;
        drop(state);

        tracing::info!(%user_id, device_id, "user logged in");
        Ok((user, token))
    }

    pub fn resolve_token(&self, token: &str) -> Option<User> {
        self.state.read().identity.resolve(token).cloned()
    }

    /// Revokes the session behind `token`. A no-op if it is already gone.
    pub fn logout(&self, token: &str) {
        if let Some(user) = self.resolve_token(token) {
            self.account(&user).logout(token);
        }
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.state.read().identity.user(user_id).cloned()
    }

    /// The capability surface of `user`.
    pub fn account(&self, user: &User) -> Account<'_> {
        Account::new(self, user.clone())
    }

    pub fn get_room_by_id(&self, room_id: &str) -> Option<Room> {
        self.state.read().directory.room(room_id).cloned()
    }

    /// Accepts `#alias:server`, `#alias` or `alias`.
    pub fn get_room_by_alias(&self, alias: &str) -> Option<Room> {
        let local = local_alias(alias, &self.server_name);
        self.state.read().directory.by_alias(local).cloned()
    }

    /// Resolves either a room id (`!…`) or an alias.
    pub fn resolve_room(&self, id_or_alias: &str) -> Option<Room> {
        if id_or_alias.starts_with(sigil::ROOM) {
            self.get_room_by_id(id_or_alias)
        } else {
            self.get_room_by_alias(id_or_alias)
        }
    }

    pub fn public_rooms(&self, filter: &str) -> Vec<Room> {
        self.state
            .read()
            .directory
            .public_rooms(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The full timeline of a room, oldest first.
    pub fn room_events(&self, room_id: &str) -> Vec<Event> {
        self.state.read().timeline.room_events(room_id).to_vec()
    }

    pub fn events_since(&self, room_id: &str, position: u64) -> Vec<Event> {
        self.state
            .read()
            .timeline
            .events_since(room_id, position)
            .to_vec()
    }

    pub fn event_by_id(&self, event_id: &str) -> Option<Event> {
        self.state.read().timeline.event_by_id(event_id).cloned()
    }

    pub fn current_position(&self) -> u64 {
        self.state.read().timeline.current_position()
    }

    /// Wakes suspended syncs. Called after the write lock is released.
    pub(crate) fn publish(&self, notices: Vec<TimelinePayload>) {
        for notice in notices {
            self.broadcast.dispatch(notice);
        }
    }
}
