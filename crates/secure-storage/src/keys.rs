//! Entry names.

/// Keys of the entries this client writes.
pub struct StorageKeys;

impl StorageKeys {
    /// Supabase access token
    pub const ACCESS_TOKEN: &'static str = "supabase_access_token";

    /// Supabase refresh token
    pub const REFRESH_TOKEN: &'static str = "supabase_refresh_token";
}
