use std::env::var;
use std::str::FromStr;

use dotenvy::dotenv;

/// Runtime configuration, read from the environment at startup. Connection
/// targets are required; pipeline knobs fall back to their defaults when
/// unset, but a value that is set and unparsable is a startup error.
pub struct Config {
    pub database_url: String,
    pub nats_url: String,
    pub queue_stream: String,
    pub queue_subject_prefix: String,
    pub queue_durable_prefix: String,
    pub workers_per_class: usize,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub delivery_timeout_secs: u64,
    pub visibility_timeout_secs: u64,
    pub fetch_expires_secs: u64,
    pub shutdown_grace_secs: u64,
    pub quota_default_limit: u32,
    pub quota_window_hours: i64,
}

impl Config {
    pub fn try_parse() -> Result<Config, String> {
        let _ = dotenv();

        Ok(Config {
            database_url: var("DATABASE_URL")
                .map_err(|_| "An error occured while getting DATABASE_URL env param")?,
            nats_url: var("NATS_URL")
                .map_err(|_| "An error occured while getting NATS_URL env param")?,
            queue_stream: var("QUEUE_STREAM").unwrap_or_else(|_| "COURIER_JOBS".to_string()),
            queue_subject_prefix: var("QUEUE_SUBJECT_PREFIX")
                .unwrap_or_else(|_| "courier.jobs".to_string()),
            queue_durable_prefix: var("QUEUE_DURABLE_PREFIX")
                .unwrap_or_else(|_| "courier-dispatch".to_string()),
            workers_per_class: parse_or("WORKERS_PER_CLASS", 5)?,
            max_attempts: parse_or("MAX_ATTEMPTS", 3)?,
            retry_base_ms: parse_or("RETRY_BASE_MS", 1_000)?,
            retry_max_ms: parse_or("RETRY_MAX_MS", 30_000)?,
            delivery_timeout_secs: parse_or("DELIVERY_TIMEOUT_SECS", 30)?,
            visibility_timeout_secs: parse_or("VISIBILITY_TIMEOUT_SECS", 60)?,
            fetch_expires_secs: parse_or("FETCH_EXPIRES_SECS", 30)?,
            shutdown_grace_secs: parse_or("SHUTDOWN_GRACE_SECS", 30)?,
            quota_default_limit: parse_or("QUOTA_DEFAULT_LIMIT", 1_000)?,
            quota_window_hours: parse_or("QUOTA_WINDOW_HOURS", 24)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| format!("An error occured while parsing {key} env param")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_knob_falls_back_to_its_default() {
        assert_eq!(parse_or("COURIER_TEST_UNSET_KNOB", 7u32).unwrap(), 7);
    }

    #[test]
    fn set_knob_is_parsed() {
        unsafe { std::env::set_var("COURIER_TEST_VALID_KNOB", "12") };
        assert_eq!(parse_or("COURIER_TEST_VALID_KNOB", 7u32).unwrap(), 12);
    }

    #[test]
    fn malformed_knob_is_a_startup_error_not_a_silent_default() {
        unsafe { std::env::set_var("COURIER_TEST_BAD_KNOB", "abc") };
        let result = parse_or("COURIER_TEST_BAD_KNOB", 7u32);
        assert!(result.is_err());
    }
}
