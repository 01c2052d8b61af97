use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account as seen by callers. Never carries the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.display_name
    }
}

/// One logged-in device, i.e. one live session of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub device_id: String,
    pub created_at: DateTime<Utc>,
}
