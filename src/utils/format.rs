/// `m:ss`, minutes unbounded (`90:00` for an hour and a half).
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Badge label: whole minutes while at least one remains, then seconds.
pub fn badge_text(remaining_secs: u64) -> String {
    let minutes = remaining_secs / 60;
    if minutes > 0 {
        minutes.to_string()
    } else {
        (remaining_secs % 60).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(5400), "90:00");
    }

    #[test]
    fn badge_switches_to_seconds_under_a_minute() {
        assert_eq!(badge_text(1500), "25");
        assert_eq!(badge_text(119), "1");
        assert_eq!(badge_text(60), "1");
        assert_eq!(badge_text(59), "59");
        assert_eq!(badge_text(0), "0");
    }
}
