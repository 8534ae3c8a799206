use chrono::Utc;

/// Current wall-clock time as unix milliseconds, the unit item keys use.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_are_monotonic_enough_and_recent() {
        let a = unix_millis();
        let b = unix_millis();
        assert!(b >= a);
        // 2020-01-01T00:00:00Z
        assert!(a > 1_577_836_800_000);
    }
}
