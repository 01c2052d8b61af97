use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::event::Event;

use super::cursor::SyncCursor;

/// The delta returned by one sync call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReply {
    pub next_batch: String,
    pub rooms: SyncRooms,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncRooms {
    pub join: BTreeMap<String, JoinedRoom>,
    pub invite: BTreeMap<String, InvitedRoom>,
    pub leave: BTreeMap<String, LeftRoom>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventList {
    pub events: Vec<Event>,
}

impl EventList {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinedRoom {
    /// State preceding the timeline, sent when the join is new to the client.
    pub state: EventList,
    pub timeline: EventList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvitedRoom {
    pub state: EventList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeftRoom {
    pub timeline: EventList,
}

impl SyncReply {
    pub fn empty(cursor: SyncCursor) -> Self {
        Self {
            next_batch: cursor.to_string(),
            rooms: SyncRooms::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.join.is_empty() && self.rooms.invite.is_empty() && self.rooms.leave.is_empty()
    }

    /// Every event in the reply, for callers that don't care about sections.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        let joined = self
            .rooms
            .join
            .values()
            .flat_map(|r| r.state.events.iter().chain(&r.timeline.events));
        let invited = self.rooms.invite.values().flat_map(|r| &r.state.events);
        let left = self.rooms.leave.values().flat_map(|r| &r.timeline.events);
        joined.chain(invited).chain(left)
    }
}
