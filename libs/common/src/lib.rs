pub mod alias;
pub mod id;

pub use alias::local_alias;
pub use id::{localpart, qualified, sigil_ulid};
