use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: Option<String>,
    pub redis_url: Option<String>,
    pub server_port: u16,
    pub meeting_base_url: String,
    pub role_cache_ttl_seconds: u64,
    pub reminder: ReminderConfig,
}

/// Settings for the periodic reminder sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Window start, in minutes after "now".
    pub window_start_minutes: i64,
    /// Window end (exclusive), in minutes after "now".
    pub window_end_minutes: i64,
    pub enqueue_timeout_seconds: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 3600,
            window_start_minutes: 23 * 60,
            window_end_minutes: 24 * 60,
            enqueue_timeout_seconds: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ReminderConfig::default();

        let mut reminder = ReminderConfig {
            enabled: parse_or("SCHEDULER_ENABLED", defaults.enabled),
            interval_seconds: parse_or("REMINDER_INTERVAL_SECONDS", defaults.interval_seconds),
            window_start_minutes: parse_or("REMINDER_WINDOW_START_MINUTES", defaults.window_start_minutes),
            window_end_minutes: parse_or("REMINDER_WINDOW_END_MINUTES", defaults.window_end_minutes),
            enqueue_timeout_seconds: parse_or(
                "REMINDER_ENQUEUE_TIMEOUT_SECONDS",
                defaults.enqueue_timeout_seconds,
            ),
        };

        if reminder.window_start_minutes >= reminder.window_end_minutes {
            warn!(
                "Reminder window [{}, {}) is empty, using default window",
                reminder.window_start_minutes, reminder.window_end_minutes
            );
            reminder.window_start_minutes = defaults.window_start_minutes;
            reminder.window_end_minutes = defaults.window_end_minutes;
        }

        if reminder.interval_seconds == 0 {
            warn!("REMINDER_INTERVAL_SECONDS must be positive, using default");
            reminder.interval_seconds = defaults.interval_seconds;
        }

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
            redis_url: env::var("REDIS_URL").ok(),
            server_port: parse_or("SERVER_PORT", 3000),
            meeting_base_url: env::var("MEETING_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("MEETING_BASE_URL not set, using default");
                    "https://meet.amae.clinic".to_string()
                }),
            role_cache_ttl_seconds: parse_or("ROLE_CACHE_TTL_SECONDS", 300),
            reminder,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_notification_queue_configured(&self) -> bool {
        self.redis_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reminder_window_is_23_to_24_hours() {
        let reminder = ReminderConfig::default();
        assert_eq!(reminder.window_start_minutes, 1380);
        assert_eq!(reminder.window_end_minutes, 1440);
        assert_eq!(reminder.interval_seconds, 3600);
        assert!(reminder.enabled);
    }

    #[test]
    fn parse_or_falls_back_on_missing_key() {
        let value: u64 = parse_or("AMAE_TEST_KEY_THAT_IS_NEVER_SET", 42);
        assert_eq!(value, 42);
    }
}
