use ulid::Ulid;

/// Generates a new server-scoped ULID identifier with the given sigil.
///
/// # Examples
/// ```
/// let id = homeserver_common::id::sigil_ulid(homeserver_common::id::sigil::ROOM, "example.org");
/// assert!(id.starts_with('!'));
/// assert!(id.ends_with(":example.org"));
/// ```
pub fn sigil_ulid(sigil: char, server_name: &str) -> String {
    format!("{}{}:{}", sigil, Ulid::new(), server_name)
}

/// Builds a fully qualified identifier such as `@alice:example.org`.
pub fn qualified(sigil: char, local: &str, server_name: &str) -> String {
    format!("{sigil}{local}:{server_name}")
}

/// Extracts the local part of an identifier that may or may not be qualified.
///
/// A leading `sigil` is removed, and so is a trailing `:server_name`. Suffixes
/// naming another server are left in place, so foreign ids never match a local
/// name.
pub fn localpart<'a>(sigil: char, id: &'a str, server_name: &str) -> &'a str {
    let id = id.strip_prefix(sigil).unwrap_or(id);
    match id.strip_suffix(server_name) {
        Some(rest) if rest.ends_with(':') => &rest[..rest.len() - 1],
        _ => id,
    }
}

/// Well-known identifier sigils.
pub mod sigil {
    pub const USER: char = '@';
    pub const ROOM: char = '!';
    pub const EVENT: char = '$';
    pub const ALIAS: char = '#';
}
