//! Ambient helpers: paths, environment and logging

pub mod config_paths;
pub mod env;
pub mod logger;

/// Current wall-clock time as fractional Unix seconds.
pub fn unix_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_now_is_close_to_chrono() {
        let chrono_secs = chrono::Utc::now().timestamp() as f64;
        assert!((unix_now() - chrono_secs).abs() < 5.0);
    }
}
