//! Server Configuration

/// Listener and redirect settings. Stripe and Supabase credentials are read
/// by their own `from_env` constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Browser origin used for checkout redirects when a request has no
    /// `Origin` header
    pub app_origin: String,
}

impl ServerConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:3000";
    pub const DEFAULT_APP_ORIGIN: &'static str = "http://localhost:5173";

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| Self::DEFAULT_BIND_ADDR.into()),
            app_origin: lookup("APP_ORIGIN")
                .map(|origin| origin.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_APP_ORIGIN.into()),
        }
    }
}
