//! What an authenticated user can do.

use homeserver_common::alias::is_valid_local_alias;
use homeserver_common::id::{sigil, sigil_ulid};

use crate::error::{ApiError, FieldError};
use crate::models::event::{EventContent, Membership, NewEvent};
use crate::models::filter::SyncFilter;
use crate::models::room::{CreateRoomRequest, Room, Visibility};
use crate::models::user::{Device, User};
use crate::sync::fanout::TimelinePayload;

use super::{Store, StoreState};

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// A user bound to the store, exposing the per-user operations.
pub struct Account<'a> {
    store: &'a Store,
    user: User,
}

impl<'a> Account<'a> {
    pub(crate) fn new(store: &'a Store, user: User) -> Self {
        Self { store, user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn id(&self) -> &str {
        &self.user.user_id
    }

    /// Runs `f` under the write lock, then wakes syncs for whatever it appended.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState, &mut Vec<TimelinePayload>) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.store.state.write();
            f(&mut *state, &mut notices)
        };
        self.store.publish(notices);
        result
    }

    pub fn create_room(&self, request: CreateRoomRequest) -> Result<Room, ApiError> {
        let mut errors = Vec::new();
        let alias = request.room_alias_name.as_deref().map(str::trim);
        if let Some(alias) = alias {
            if !is_valid_local_alias(alias) {
                errors.push(FieldError::new(
                    "room_alias_name",
                    "Alias must be non-empty and contain no ':' or whitespace",
                ));
            }
        }

        let mut invitees: Vec<String> = Vec::new();
        for invitee in &request.invite {
            let user_id = self.store.user_id_for(invitee);
            if user_id != self.user.user_id && !invitees.contains(&user_id) {
                invitees.push(user_id);
            }
        }

        let server_name = self.store.server_name.as_str();
        let creator = self.user.user_id.as_str();

        let room = self.mutate(|state, notices| {
            for invitee in &invitees {
                if !state.identity.contains(invitee) {
                    errors.push(FieldError::new("invite", format!("Unknown user {invitee}")));
                }
            }
            if !errors.is_empty() {
                return Err(ApiError::validation(std::mem::take(&mut errors)));
            }
            if let Some(alias) = alias {
                if !state.directory.alias_available(alias) {
                    return Err(ApiError::alias_in_use("Room alias already taken"));
                }
            }

            let room_id = sigil_ulid(sigil::ROOM, server_name);
            state
                .directory
                .insert(Room::new(room_id.clone(), creator.to_string()));

            let mut initial = vec![
                NewEvent::state(&room_id, creator, EventContent::Create {
                    creator: creator.to_string(),
                }),
                NewEvent::membership(&room_id, creator, creator, Membership::Join),
                NewEvent::state(&room_id, creator, EventContent::JoinRules {
                    visibility: request.visibility,
                }),
            ];
            if let Some(name) = &request.name {
                initial.push(NewEvent::state(&room_id, creator, EventContent::Name {
                    name: name.clone(),
                }));
            }
            if let Some(topic) = &request.topic {
                initial.push(NewEvent::state(&room_id, creator, EventContent::Topic {
                    topic: topic.clone(),
                }));
            }
            if let Some(alias) = alias {
                initial.push(NewEvent::state(&room_id, creator, EventContent::CanonicalAlias {
                    alias: alias.to_string(),
                }));
            }
            for invitee in &invitees {
                initial.push(NewEvent::membership(&room_id, creator, invitee, Membership::Invite));
            }

            for new in initial {
                state.emit(new, server_name, notices);
            }

            state
                .directory
                .room(&room_id)
                .cloned()
                .ok_or_else(|| ApiError::internal("Created room vanished"))
        })?;

        tracing::info!(
            room_id = %room.room_id,
            creator = %room.creator,
            visibility = ?room.visibility,
            invited = room.invited.len(),
            "room created"
        );
        Ok(room)
    }

    /// Joins a room by id or alias. Joining again is a silent success.
    pub fn join_room(&self, id_or_alias: &str) -> Result<Room, ApiError> {
        let room_id = self
            .store
            .resolve_room(id_or_alias)
            .map(|r| r.room_id)
            .ok_or_else(|| ApiError::not_found("Room not found"))?;
        let user_id = self.id();

        let (room, joined) = self.mutate(|state, notices| {
            let room = state
                .directory
                .room(&room_id)
                .ok_or_else(|| ApiError::not_found("Room not found"))?;
            if room.is_member(user_id) {
                return Ok((room.clone(), false));
            }
            if room.visibility == Visibility::Private && !room.is_invited(user_id) {
                return Err(ApiError::forbidden("You are not invited to this room"));
            }

            state.emit(
                NewEvent::membership(&room_id, user_id, user_id, Membership::Join),
                &self.store.server_name,
                notices,
            );
            let room = state
                .directory
                .room(&room_id)
                .cloned()
                .ok_or_else(|| ApiError::internal("Joined room vanished"))?;
            Ok((room, true))
        })?;

        if joined {
            tracing::info!(%room_id, %user_id, "user joined room");
        }
        Ok(room)
    }

    /// Leaves a room. Fails `NotMember` unless currently joined.
    pub fn leave_room(&self, room_id: &str) -> Result<(), ApiError> {
        let user_id = self.id();
        self.mutate(|state, notices| {
            let room = state
                .directory
                .room(room_id)
                .ok_or_else(|| ApiError::not_found("Room not found"))?;
            if !room.is_member(user_id) {
                return Err(ApiError::not_member("You are not a member of this room"));
            }
            state.emit(
                NewEvent::membership(room_id, user_id, user_id, Membership::Leave),
                &self.store.server_name,
                notices,
            );
            Ok(())
        })?;

        tracing::info!(%room_id, %user_id, "user left room");
        Ok(())
    }

    /// Appends a member-only event to a room and returns its id.
    fn emit_as_member(&self, room_id: &str, new: NewEvent) -> Result<String, ApiError> {
        let user_id = self.id();
        self.mutate(|state, notices| {
            let room = state
                .directory
                .room(room_id)
                .ok_or_else(|| ApiError::not_found("Room not found"))?;
            if !room.is_member(user_id) {
                return Err(ApiError::forbidden("You are not a member of this room"));
            }
            let (event_id, _) = state.emit(new, &self.store.server_name, notices);
            Ok(event_id)
        })
    }

    pub fn set_topic(&self, room_id: &str, topic: &str) -> Result<String, ApiError> {
        self.emit_as_member(
            room_id,
            NewEvent::state(room_id, self.id(), EventContent::Topic {
                topic: topic.to_string(),
            }),
        )
    }

    pub fn set_room_visibility(
        &self,
        room_id: &str,
        visibility: Visibility,
    ) -> Result<String, ApiError> {
        self.emit_as_member(
            room_id,
            NewEvent::state(room_id, self.id(), EventContent::JoinRules { visibility }),
        )
    }

    pub fn send_message(&self, room_id: &str, body: &str) -> Result<String, ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::validation(vec![FieldError::new(
                "body",
                "Message body is required",
            )]));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(ApiError::validation(vec![FieldError::new(
                "body",
                format!("Message body must be {MAX_MESSAGE_LEN} characters or fewer"),
            )]));
        }
        self.emit_as_member(room_id, NewEvent::message(room_id, self.id(), body))
    }

    /// Revokes one session; revoking an already revoked token is a no-op.
    pub fn logout(&self, token: &str) {
        let mut state = self.store.state.write();
        if state.identity.resolve(token).map(User::id) != Some(self.id()) {
            return;
        }
        if let Some(device_id) = state.identity.revoke(token) {
            drop(state);
            tracing::info!(user_id = %self.id(), %device_id, "session logged out");
        }
    }

    pub fn logout_all(&self) {
        let revoked = self.store.state.write().identity.revoke_all(self.id());
        tracing::info!(user_id = %self.id(), revoked, "all sessions logged out");
    }

    /// Replaces the credential. Existing sessions stay valid.
    pub fn change_password(&self, new_password: &str) -> Result<(), ApiError> {
        let hash = self.store.passwords.hash(new_password)?;
        self.store
            .state
            .write()
            .identity
            .set_password_hash(self.id(), hash)?;
        tracing::info!(user_id = %self.id(), "password changed");
        Ok(())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.store.state.read().identity.devices(self.id())
    }

    pub fn joined_rooms(&self) -> Vec<String> {
        self.store.state.read().directory.joined_rooms(self.id())
    }

    pub fn create_filter(&self, filter: SyncFilter) -> Result<String, ApiError> {
        self.store
            .state
            .write()
            .identity
            .add_filter(self.id(), filter)
    }

    pub fn filter(&self, filter_id: &str) -> Result<SyncFilter, ApiError> {
        self.store
            .state
            .read()
            .identity
            .filter(self.id(), filter_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::tests::test_store;

    fn public_lobby() -> CreateRoomRequest {
        CreateRoomRequest {
            name: Some("lobby".to_string()),
            visibility: Visibility::Public,
            ..Default::default()
        }
    }

    #[test]
    fn creator_is_the_first_member() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let room = store.account(&alice).create_room(public_lobby()).unwrap();

        assert_eq!(room.creator(), alice.id());
        assert_eq!(room.members(), [alice.user_id.clone()]);
        assert_eq!(room.name(), Some("lobby"));
        assert_eq!(room.visibility(), Visibility::Public);
        assert_eq!(store.account(&alice).joined_rooms(), [room.room_id.clone()]);
    }

    #[test]
    fn creation_emits_initial_state_in_order() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let room = store
            .account(&alice)
            .create_room(CreateRoomRequest {
                name: Some("dev".into()),
                topic: Some("rust".into()),
                room_alias_name: Some("dev".into()),
                invite: vec![bob.user_id.clone(), alice.user_id.clone()],
                ..Default::default()
            })
            .unwrap();

        let kinds: Vec<&str> = store
            .room_events(room.id())
            .iter()
            .map(|e| e.kind().as_str())
            .collect();
        assert_eq!(
            kinds,
            [
                "m.room.create",
                "m.room.member",
                "m.room.join_rules",
                "m.room.name",
                "m.room.topic",
                "m.room.canonical_alias",
                "m.room.member",
            ]
        );
        assert_eq!(room.alias_name(), Some("dev"));
        assert_eq!(room.invited, [bob.user_id.clone()]);
    }

    #[test]
    fn duplicate_alias_fails_without_side_effects() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let request = CreateRoomRequest {
            room_alias_name: Some("lobby".into()),
            ..Default::default()
        };
        store.account(&alice).create_room(request.clone()).unwrap();
        let before = store.current_position();

        let err = store.account(&alice).create_room(request).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AliasInUse);
        assert_eq!(store.current_position(), before);
        assert_eq!(store.state.read().directory.len(), 1);
    }

    #[test]
    fn bad_room_config_is_a_validation_error() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let err = store
            .account(&alice)
            .create_room(CreateRoomRequest {
                room_alias_name: Some("bad alias".into()),
                invite: vec!["@ghost:localhost".into()],
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParam);
        let fields: Vec<String> = err.details.unwrap().into_iter().map(|d| d.field).collect();
        assert_eq!(fields, ["room_alias_name", "invite"]);
        assert!(store.state.read().directory.is_empty());
    }

    #[test]
    fn alias_lookup_strips_sigil_and_server() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let room = store
            .account(&alice)
            .create_room(CreateRoomRequest {
                room_alias_name: Some("lobby".into()),
                ..Default::default()
            })
            .unwrap();

        for alias in ["#lobby:localhost", "#lobby", "lobby"] {
            assert_eq!(store.get_room_by_alias(alias).unwrap().room_id, room.room_id);
        }
        assert!(store.get_room_by_alias("#lobby:elsewhere.org").is_none());
        assert_eq!(store.resolve_room(&room.room_id).unwrap().room_id, room.room_id);
    }

    #[test]
    fn private_rooms_need_an_invite() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let (carol, _) = store.register("carol", "pw123456", "d1").unwrap();
        let room = store
            .account(&alice)
            .create_room(CreateRoomRequest {
                invite: vec!["bobby".into()],
                ..Default::default()
            })
            .unwrap();

        let err = store.account(&carol).join_room(room.id()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        let joined = store.account(&bob).join_room(room.id()).unwrap();
        assert!(joined.is_member(bob.id()));
        assert!(!joined.is_invited(bob.id()));
    }

    #[test]
    fn joining_twice_adds_no_event() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let room = store.account(&alice).create_room(public_lobby()).unwrap();

        store.account(&bob).join_room(room.id()).unwrap();
        let position = store.current_position();
        let again = store.account(&bob).join_room(room.id()).unwrap();
        assert_eq!(store.current_position(), position);
        assert_eq!(again.members().len(), 2);
    }

    #[test]
    fn leave_requires_membership() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let room = store.account(&alice).create_room(public_lobby()).unwrap();

        let err = store.account(&bob).leave_room(room.id()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotMember);

        store.account(&bob).join_room(room.id()).unwrap();
        store.account(&bob).leave_room(room.id()).unwrap();
        let err = store.account(&bob).leave_room(room.id()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotMember);

        let err = store.account(&bob).leave_room("!missing:localhost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn topic_and_visibility_are_member_only() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let room = store.account(&alice).create_room(public_lobby()).unwrap();

        let err = store.account(&bob).set_topic(room.id(), "hijack").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        let err = store
            .account(&bob)
            .set_room_visibility(room.id(), Visibility::Private)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        store.account(&alice).set_topic(room.id(), "welcome").unwrap();
        store
            .account(&alice)
            .set_room_visibility(room.id(), Visibility::Private)
            .unwrap();
        let room = store.get_room_by_id(room.id()).unwrap();
        assert_eq!(room.topic(), Some("welcome"));
        assert_eq!(room.visibility(), Visibility::Private);
        assert!(store.public_rooms("").is_empty());
    }

    #[test]
    fn messages_are_validated_and_member_only() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (bob, _) = store.register("bobby", "pw123456", "d1").unwrap();
        let room = store.account(&alice).create_room(public_lobby()).unwrap();

        let err = store.account(&alice).send_message(room.id(), "   ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParam);
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        let err = store.account(&alice).send_message(room.id(), &long).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParam);
        let err = store.account(&bob).send_message(room.id(), "hi").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        let event_id = store.account(&alice).send_message(room.id(), "hi").unwrap();
        let event = store.event_by_id(&event_id).unwrap();
        assert_eq!(event.content, EventContent::text("hi"));
        assert_eq!(event.sender, alice.user_id);
    }

    #[test]
    fn logout_revokes_only_that_session() {
        let store = test_store();
        let (alice, t1) = store.register("alice", "pw123456", "d1").unwrap();
        let (_, t2) = store.login("alice", "pw123456", "d2").unwrap();

        store.account(&alice).logout(&t1);
        assert!(store.resolve_token(&t1).is_none());
        assert!(store.resolve_token(&t2).is_some());
        store.account(&alice).logout(&t1);

        let devices = store.account(&alice).devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "d2");
    }

    #[test]
    fn logout_ignores_other_users_tokens() {
        let store = test_store();
        let (alice, _) = store.register("alice", "pw123456", "d1").unwrap();
        let (_, bob_token) = store.register("bobby", "pw123456", "d1").unwrap();

        store.account(&alice).logout(&bob_token);
        assert!(store.resolve_token(&bob_token).is_some());
    }

    #[test]
    fn logout_all_revokes_every_session_of_one_user() {
        let store = test_store();
        let (alice, t1) = store.register("alice", "pw123456", "d1").unwrap();
        let (_, t2) = store.login("alice", "pw123456", "d2").unwrap();
        let (_, bob_token) = store.register("bobby", "pw123456", "d1").unwrap();

        store.account(&alice).logout_all();
        assert!(store.resolve_token(&t1).is_none());
        assert!(store.resolve_token(&t2).is_none());
        assert!(store.resolve_token(&bob_token).is_some());
    }

    #[test]
    fn password_change_keeps_sessions() {
        let store = test_store();
        let (alice, t1) = store.register("alice", "pw123456", "d1").unwrap();

        store.account(&alice).change_password("new_pw_999").unwrap();
        assert!(store.resolve_token(&t1).is_some());
        assert!(store.login("alice", "pw123456", "d2").is_err());
        assert!(store.login("alice", "new_pw_999", "d2").is_ok());
    }
}
