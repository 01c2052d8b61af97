/// Homeserver configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Domain this server owns; user ids, room ids and aliases are scoped to it.
    pub server_name: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Minimum username length accepted by the default username policy.
    pub username_min_length: usize,
    /// Hard upper bound on how long a sync request may be suspended.
    pub sync_max_timeout_ms: u64,
    /// Argon2id memory cost in KiB.
    pub password_memory_kib: u32,
    /// Argon2id iteration count.
    pub password_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            port: 8008,
            username_min_length: 5,
            sync_max_timeout_ms: 30_000,
            password_memory_kib: argon2::Params::DEFAULT_M_COST,
            password_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Panics with a descriptive message if a variable is set but unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_name: std::env::var("SERVER_NAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.server_name),
            port: parsed_var("PORT", defaults.port),
            username_min_length: parsed_var("USERNAME_MIN_LENGTH", defaults.username_min_length),
            sync_max_timeout_ms: parsed_var("SYNC_MAX_TIMEOUT_MS", defaults.sync_max_timeout_ms),
            password_memory_kib: parsed_var("PASSWORD_MEMORY_KIB", defaults.password_memory_kib),
            password_iterations: parsed_var("PASSWORD_ITERATIONS", defaults.password_iterations),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .unwrap_or_else(|_| panic!("{name} env var has an invalid value: {v}")),
        _ => default,
    }
}
