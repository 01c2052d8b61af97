pub mod account;
pub mod auth;
pub mod directory;
pub mod health;
pub mod rooms;
pub mod sync;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/_matrix/client",
        auth::versions_router().nest(
            "/r0",
            auth::router()
                .merge(account::router())
                .merge(rooms::router())
                .merge(directory::router())
                .merge(sync::router()),
        ),
    )
}
