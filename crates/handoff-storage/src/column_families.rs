//! RocksDB column family definitions.

/// One-time link tokens: token → TokenPayload (TTL: application setting)
pub const CF_ONE_TIME_TOKENS: &str = "one_time_tokens";

/// Launcher sessions: login_challenge → LauncherSession (TTL: 10 min)
pub const CF_LAUNCHER_SESSIONS: &str = "launcher_sessions";

/// Local identities: (provider_id, external_id) → LocalIdentity
pub const CF_LOCAL_IDENTITIES: &str = "local_identities";

/// Local identities by user: (provider_id, user_id) → external_id
pub const CF_LOCAL_IDENTITIES_BY_USER: &str = "local_identities_by_user";

/// Applications: application_id → Application
pub const CF_APPLICATIONS: &str = "applications";

/// Auth log: entry_id → AuthLogEntry
pub const CF_AUTH_LOG: &str = "auth_log";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        CF_ONE_TIME_TOKENS,
        CF_LAUNCHER_SESSIONS,
        CF_LOCAL_IDENTITIES,
        CF_LOCAL_IDENTITIES_BY_USER,
        CF_APPLICATIONS,
        CF_AUTH_LOG,
    ]
}

/// Column families whose entries expire and should be swept periodically
pub fn expiring_column_families() -> Vec<&'static str> {
    vec![CF_ONE_TIME_TOKENS, CF_LAUNCHER_SESSIONS]
}
