//! Room registry, alias index and per-user membership index.

use std::collections::{BTreeMap, HashMap};

use crate::models::event::{Event, EventContent, Membership};
use crate::models::room::{Room, Visibility};

/// A user's latest membership in one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipRecord {
    pub membership: Membership,
    /// Position of the event that set `membership`.
    pub at: u64,
    /// Position of the most recent join, kept after leaving.
    pub joined_at: Option<u64>,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<String, Room>,
    aliases: HashMap<String, String>,
    memberships: HashMap<String, BTreeMap<String, MembershipRecord>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn insert(&mut self, room: Room) {
        self.rooms.insert(room.room_id.clone(), room);
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Looks up a room by its local alias (already stripped of sigil and server).
    pub fn by_alias(&self, local_alias: &str) -> Option<&Room> {
        self.aliases
            .get(local_alias)
            .and_then(|room_id| self.rooms.get(room_id))
    }

    pub fn alias_available(&self, local_alias: &str) -> bool {
        !self.aliases.contains_key(local_alias)
    }

    /// Public rooms matching `filter`, most members first, then by room id.
    pub fn public_rooms(&self, filter: &str) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self
            .rooms
            .values()
            .filter(|r| r.visibility == Visibility::Public && r.matches(filter))
            .collect();
        rooms.sort_by(|a, b| {
            b.members
                .len()
                .cmp(&a.members.len())
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        rooms
    }

    pub fn membership(&self, user_id: &str, room_id: &str) -> Option<&MembershipRecord> {
        self.memberships.get(user_id)?.get(room_id)
    }

    /// Every room the user has ever had a membership in, by room id.
    pub fn memberships_of(&self, user_id: &str) -> impl Iterator<Item = (&String, &MembershipRecord)> {
        self.memberships.get(user_id).into_iter().flatten()
    }

    pub fn joined_rooms(&self, user_id: &str) -> Vec<String> {
        self.memberships_of(user_id)
            .filter(|(_, r)| r.membership == Membership::Join)
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// Users who should hear about new events in the room: members and invitees.
    pub fn audience(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|r| r.members.iter().chain(&r.invited).cloned().collect())
            .unwrap_or_default()
    }

    /// Folds an appended state event into the room's current state.
    pub fn apply(&mut self, event: &Event) {
        let Some(room) = self.rooms.get_mut(&event.room_id) else {
            return;
        };

        match &event.content {
            EventContent::Name { name } => room.name = Some(name.clone()),
            EventContent::Topic { topic } => room.topic = Some(topic.clone()),
            EventContent::JoinRules { visibility } => room.visibility = *visibility,
            EventContent::CanonicalAlias { alias } => {
                if let Some(previous) = room.alias.replace(alias.clone()) {
                    self.aliases.remove(&previous);
                }
                self.aliases.insert(alias.clone(), event.room_id.clone());
            }
            EventContent::Member { membership } => {
                let Some(target) = event.state_key.as_deref() else {
                    return;
                };
                room.members.retain(|m| m != target);
                room.invited.retain(|m| m != target);
                match membership {
                    Membership::Join => room.members.push(target.to_string()),
                    Membership::Invite => room.invited.push(target.to_string()),
                    Membership::Leave => {}
                }

                let records = self.memberships.entry(target.to_string()).or_default();
                let joined_at = match membership {
                    Membership::Join => Some(event.stream_position),
                    Membership::Leave => records.get(&event.room_id).and_then(|r| r.joined_at),
                    Membership::Invite => None,
                };
                records.insert(
                    event.room_id.clone(),
                    MembershipRecord {
                        membership: *membership,
                        at: event.stream_position,
                        joined_at,
                    },
                );
            }
            EventContent::Create { .. } | EventContent::Message { .. } => {}
        }
    }
}
