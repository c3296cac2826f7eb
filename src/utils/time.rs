use chrono::{DateTime, Utc};

/// Whole seconds that passed between two moments, rounded down. A clock that went backwards
/// yields zero.
pub fn elapsed_whole_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (now - since).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

/// This is the standard way of displaying accumulated time in tabtally: `hh:mm:ss`, with the
/// hour group left out while it is zero.
pub fn format_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours == 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_elapsed_rounds_down() {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap();
        assert_eq!(elapsed_whole_seconds(start, start), 0);
        assert_eq!(
            elapsed_whole_seconds(start, start + Duration::milliseconds(999)),
            0
        );
        assert_eq!(
            elapsed_whole_seconds(start, start + Duration::milliseconds(5999)),
            5
        );
        assert_eq!(elapsed_whole_seconds(start + Duration::seconds(3), start), 0);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "00:00");
        assert_eq!(format_seconds(59), "00:59");
        assert_eq!(format_seconds(1250), "20:50");
        assert_eq!(format_seconds(3665), "01:01:05");
        assert_eq!(format_seconds(100 * 3600), "100:00:00");
    }
}
