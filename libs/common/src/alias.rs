//! Room alias normalisation.

use crate::id::{localpart, sigil};

/// Reduces `#lobby:example.org`, `#lobby` or `lobby` to the local alias `lobby`.
///
/// Only the local server's suffix is stripped; an alias qualified with another
/// server keeps its suffix and therefore never matches a local alias.
pub fn local_alias<'a>(alias: &'a str, server_name: &str) -> &'a str {
    localpart(sigil::ALIAS, alias, server_name)
}

/// Whether `alias` is acceptable as the local part of a new room alias.
pub fn is_valid_local_alias(alias: &str) -> bool {
    !alias.is_empty()
        && !alias.starts_with(sigil::ALIAS)
        && !alias.chars().any(|c| c == ':' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sigil_and_own_server() {
        assert_eq!(local_alias("#lobby:example.org", "example.org"), "lobby");
        assert_eq!(local_alias("#lobby", "example.org"), "lobby");
        assert_eq!(local_alias("lobby", "example.org"), "lobby");
    }

    #[test]
    fn keeps_foreign_suffix() {
        assert_eq!(local_alias("#lobby:other.org", "example.org"), "lobby:other.org");
    }

    #[test]
    fn validates_local_alias() {
        assert!(is_valid_local_alias("lobby"));
        assert!(is_valid_local_alias("dev-chat_2"));
        assert!(!is_valid_local_alias(""));
        assert!(!is_valid_local_alias("a b"));
        assert!(!is_valid_local_alias("lobby:example.org"));
        assert!(!is_valid_local_alias("#lobby"));
    }
}
