pub mod event;
pub mod filter;
pub mod room;
pub mod user;
