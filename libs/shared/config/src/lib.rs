use std::env;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub bind_address: String,
    pub scheduling: SchedulingConfig,
}

/// Clinic-wide scheduling defaults, handed to the schedule generator and the
/// booking resolver when they are constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulingConfig {
    pub default_start_time: NaiveTime,
    pub default_end_time: NaiveTime,
    pub rest_days: Vec<Weekday>,
    /// Last day of a scheduling week; used when a generation request has no end date.
    pub week_ends_on: Weekday,
    pub auto_leave_on_rest_days: bool,
    pub max_schedule_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
            default_end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            rest_days: vec![Weekday::Sun],
            week_ends_on: Weekday::Sun,
            auto_leave_on_rest_days: false,
            max_schedule_days: 92,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_start_time = env_parsed("CLINIC_DEFAULT_START_TIME", defaults.default_start_time, parse_time);
        let default_end_time = env_parsed("CLINIC_DEFAULT_END_TIME", defaults.default_end_time, parse_time);

        let (default_start_time, default_end_time) = if default_start_time < default_end_time {
            (default_start_time, default_end_time)
        } else {
            warn!(
                "CLINIC_DEFAULT_START_TIME ({}) is not before CLINIC_DEFAULT_END_TIME ({}), using defaults",
                default_start_time, default_end_time
            );
            (defaults.default_start_time, defaults.default_end_time)
        };

        Self {
            default_start_time,
            default_end_time,
            rest_days: env_parsed("CLINIC_REST_DAYS", defaults.rest_days, parse_weekdays),
            week_ends_on: env_parsed("CLINIC_WEEK_ENDS_ON", defaults.week_ends_on, |v| {
                v.trim().parse::<Weekday>().ok()
            }),
            auto_leave_on_rest_days: env_parsed(
                "CLINIC_AUTO_LEAVE_ON_REST_DAYS",
                defaults.auto_leave_on_rest_days,
                |v| v.trim().parse::<bool>().ok(),
            ),
            max_schedule_days: env_parsed("CLINIC_MAX_SCHEDULE_DAYS", defaults.max_schedule_days, |v| {
                v.trim().parse::<i64>().ok().filter(|days| *days > 0)
            }),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
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
            store_backend: env_parsed("CLINIC_STORE", StoreBackend::Memory, |v| v.parse().ok()),
            bind_address: env::var("CLINIC_BIND")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty(),
        };

        store_ready && !self.supabase_jwt_secret.is_empty()
    }
}

fn env_parsed<T, F>(key: &str, default: T, parse: F) -> T
where
    T: std::fmt::Debug,
    F: FnOnce(&str) -> Option<T>,
{
    match env::var(key) {
        Ok(raw) => match parse(&raw) {
            Some(value) => value,
            None => {
                warn!("{} has an invalid value '{}', using default {:?}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Parses a comma separated weekday list. An empty string means "no rest days".
pub fn parse_weekdays(raw: &str) -> Option<Vec<Weekday>> {
    let mut days = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day = part.parse::<Weekday>().ok()?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Some(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weekday_lists() {
        assert_eq!(parse_weekdays("sun"), Some(vec![Weekday::Sun]));
        assert_eq!(parse_weekdays("Sat, sunday ,sat"), Some(vec![Weekday::Sat, Weekday::Sun]));
        assert_eq!(parse_weekdays(""), Some(vec![]));
        assert_eq!(parse_weekdays("sun,funday"), None);
    }

    #[test]
    fn parses_short_and_long_times() {
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("17:45:10"), NaiveTime::from_hms_opt(17, 45, 10));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn default_scheduling_config_rests_on_sunday() {
        let config = SchedulingConfig::default();
        assert_eq!(config.rest_days, vec![Weekday::Sun]);
        assert_eq!(config.default_start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(config.default_end_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn store_backend_from_str() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("supabase".parse::<StoreBackend>(), Ok(StoreBackend::Supabase));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
