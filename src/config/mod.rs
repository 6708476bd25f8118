use std::env;
use std::time::Duration;

/// Tunables for reservation issuing and reconciliation
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a presigned upload URL stays valid, in seconds (default: 30)
    pub upload_window_secs: u64,

    /// Ceiling for bulk upload URL requests (default: 20)
    pub max_bulk_count: usize,

    /// Format marker prepended to every generated key (default: "v2_")
    pub key_prefix: String,

    /// Length of the random part of a key (default: 32)
    pub key_salt_length: usize,

    /// Period of the background reconcile sweep, in seconds (default: 300)
    pub reconcile_interval_secs: u64,

    /// HMAC secret for bearer tokens
    pub jwt_secret: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_window_secs: 30,
            max_bulk_count: 20,
            key_prefix: "v2_".to_string(),
            key_salt_length: 32,
            reconcile_interval_secs: 300,
            jwt_secret: "secret".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_window_secs: env::var("UPLOAD_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.upload_window_secs),

            max_bulk_count: env::var("MAX_TEMP_UPLOAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_bulk_count),

            key_prefix: env::var("KEY_PREFIX").unwrap_or(default.key_prefix),

            key_salt_length: env::var("KEY_SALT_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|len: &usize| *len > 0)
                .unwrap_or(default.key_salt_length),

            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(default.reconcile_interval_secs),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),
        }
    }

    /// Short windows so expiry and reconciliation are observable by hand.
    /// Only the token secret is still read from the environment.
    pub fn development() -> Self {
        let default = Self::default();
        Self {
            upload_window_secs: 30,
            max_bulk_count: 20,
            reconcile_interval_secs: 10,
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret.clone()),
            ..default
        }
    }

    pub fn upload_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.upload_window_secs as i64)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}
