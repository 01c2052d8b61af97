//! Incremental catch-up: per-user deltas since a cursor, with long-poll.

pub mod cursor;
pub mod fanout;
pub mod reply;

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout_at, Instant};

use crate::error::ApiError;
use crate::models::event::Membership;
use crate::models::filter::SyncFilter;
use crate::models::user::User;
use crate::store::Store;

pub use cursor::SyncCursor;
pub use reply::{InvitedRoom, JoinedRoom, LeftRoom, SyncReply};

/// Stands in for a wait too long to represent as an `Instant`.
const FAR_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Parameters of one sync call.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// The `next_batch` of a previous reply; `None` for a first sync.
    pub since: Option<String>,
    /// A stored filter id, or an inline JSON filter.
    pub filter: Option<String>,
    /// How long to wait for new events. Clamped to the configured maximum.
    pub timeout: Duration,
}

impl Store {
    /// Sync on behalf of the user owning `token`.
    pub async fn sync(&self, token: &str, request: SyncRequest) -> Result<SyncReply, ApiError> {
        let user = self
            .resolve_token(token)
            .ok_or_else(|| ApiError::unknown_token("Unrecognised access token"))?;
        self.sync_as(&user, request).await
    }

    /// Returns the delta since `request.since`, waiting up to the timeout for
    /// one to appear. A first sync never waits.
    ///
    /// No lock is held while suspended. Dropping the returned future drops the
    /// broadcast receiver, which is the only trace the wait leaves behind.
    pub async fn sync_as(&self, user: &User, request: SyncRequest) -> Result<SyncReply, ApiError> {
        let since = request
            .since
            .as_deref()
            .map(str::parse::<SyncCursor>)
            .transpose()?;
        let filter = self.resolve_filter(user, request.filter.as_deref())?;
        let wait = request.timeout.min(self.sync_max_timeout);
        let deadline = Instant::now()
            .checked_add(wait)
            .unwrap_or_else(|| Instant::now() + FAR_DEADLINE);

        // Subscribe before computing so no append can slip between the two.
        let mut wake = self.broadcast.subscribe();

        loop {
            let reply = self.compute_delta(user.id(), since, &filter);
            let Some(since) = since else {
                return Ok(reply);
            };
            if !reply.is_empty() {
                return Ok(reply);
            }

            tracing::debug!(user_id = %user.id(), %since, "sync suspended");
            loop {
                match timeout_at(deadline, wake.recv()).await {
                    Ok(Ok(payload)) => {
                        if payload.position > since.position() && payload.concerns(user.id()) {
                            tracing::debug!(
                                user_id = %user.id(),
                                room_id = %payload.room_id,
                                position = payload.position,
                                "sync woken"
                            );
                            break;
                        }
                    }
                    Ok(Err(RecvError::Lagged(skipped))) => {
                        tracing::warn!(user_id = %user.id(), skipped, "sync receiver lagged");
                        break;
                    }
                    Ok(Err(RecvError::Closed)) | Err(_) => {
                        tracing::debug!(user_id = %user.id(), %since, "sync timed out");
                        return Ok(SyncReply::empty(since));
                    }
                }
            }
        }
    }

    fn resolve_filter(&self, user: &User, filter: Option<&str>) -> Result<SyncFilter, ApiError> {
        match filter.map(str::trim) {
            None | Some("") => Ok(SyncFilter::default()),
            Some(inline) if inline.starts_with('{') => serde_json::from_str(inline)
                .map_err(|e| ApiError::invalid_param(format!("Invalid filter: {e}"))),
            Some(filter_id) => self.account(user).filter(filter_id),
        }
    }

    /// Builds the delta under the shared lock.
    fn compute_delta(
        &self,
        user_id: &str,
        since: Option<SyncCursor>,
        filter: &SyncFilter,
    ) -> SyncReply {
        let state = self.state.read();
        let timeline = &state.timeline;
        let current = timeline.current_position();
        let after = since.map_or(0, SyncCursor::position);

        let mut reply = SyncReply::empty(SyncCursor(current));
        for (room_id, record) in state.directory.memberships_of(user_id) {
            if !filter.allows_room(room_id) {
                continue;
            }
            let changed = record.at > after;
            let joined_at_since = since.is_some()
                && timeline.membership_at(room_id, user_id, after) == Some(Membership::Join);

            match record.membership {
                Membership::Join => {
                    let room = if changed && !joined_at_since {
                        JoinedRoom {
                            state: filter.select(&timeline.state_before(room_id, record.at)).into(),
                            timeline: filter
                                .select(timeline.events_since(room_id, record.at - 1))
                                .into(),
                        }
                    } else {
                        JoinedRoom {
                            state: Default::default(),
                            timeline: filter.select(timeline.events_since(room_id, after)).into(),
                        }
                    };
                    if !room.state.is_empty() || !room.timeline.is_empty() {
                        reply.rooms.join.insert(room_id.clone(), room);
                    }
                }
                Membership::Invite if changed => {
                    let room = InvitedRoom {
                        state: filter
                            .select(&timeline.state_before(room_id, current + 1))
                            .into(),
                    };
                    if !room.state.is_empty() {
                        reply.rooms.invite.insert(room_id.clone(), room);
                    }
                }
                Membership::Leave if changed && since.is_some() => {
                    let from = match record.joined_at {
                        Some(joined) if !joined_at_since => after.max(joined - 1),
                        _ => after,
                    };
                    let room = LeftRoom {
                        timeline: filter
                            .select(timeline.events_between(room_id, from, record.at))
                            .into(),
                    };
                    if !room.timeline.is_empty() {
                        reply.rooms.leave.insert(room_id.clone(), room);
                    }
                }
                Membership::Invite | Membership::Leave => {}
            }
        }
        reply
    }
}
