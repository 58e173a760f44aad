//! Hour-of-day arithmetic on a 24-hour circle.
//!
//! The night window (22:00-05:59) crosses midnight, so every distance here is
//! computed modulo 24: from 23 to 2 is 3 hours forward, never 21 or -21.

/// First hour of the night window.
pub const NIGHT_START: u8 = 22;
/// Last hour of the night window.
pub const NIGHT_END: u8 = 5;

pub const HOURS_PER_DAY: u8 = 24;
pub const MS_PER_HOUR: i64 = 3_600_000;

/// 22-23 and 0-5.
pub fn is_night_hour(hour: u8) -> bool {
    let hour = hour % HOURS_PER_DAY;
    hour >= NIGHT_START || hour <= NIGHT_END
}

/// Hours to wait going forward from `from` until the clock reads `to`.
///
/// Always in `0..24`; equal hours are distance 0.
pub fn forward_distance(from: u8, to: u8) -> u8 {
    let from = from % HOURS_PER_DAY;
    let to = to % HOURS_PER_DAY;
    (to + HOURS_PER_DAY - from) % HOURS_PER_DAY
}

/// Shortest distance either way round the clock, in `0..=12`.
pub fn circular_distance(a: u8, b: u8) -> u8 {
    let forward = forward_distance(a, b);
    forward.min(HOURS_PER_DAY - forward) % HOURS_PER_DAY
}

/// Milliseconds until the next occurrence of `to`.
pub fn forward_delay_ms(from: u8, to: u8) -> i64 {
    i64::from(forward_distance(from, to)) * MS_PER_HOUR
}

/// Night hours in clock order starting at 22, so the window reads contiguously.
pub fn night_window() -> impl Iterator<Item = u8> {
    (NIGHT_START..HOURS_PER_DAY).chain(0..=NIGHT_END)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_night_window_wraps() {
        let hours: Vec<u8> = night_window().collect();
        assert_eq!(hours, vec![22, 23, 0, 1, 2, 3, 4, 5]);
        assert!(hours.iter().all(|h| is_night_hour(*h)));
        assert!(!is_night_hour(6));
        assert!(!is_night_hour(21));
    }

    #[test]
    fn test_forward_distance_across_midnight() {
        assert_eq!(forward_distance(23, 2), 3);
        assert_eq!(forward_distance(2, 23), 21);
        assert_eq!(forward_distance(7, 7), 0);
        assert_eq!(forward_delay_ms(23, 2), 3 * MS_PER_HOUR);
    }

    #[test]
    fn test_circular_distance_is_symmetric() {
        assert_eq!(circular_distance(23, 2), 3);
        assert_eq!(circular_distance(2, 23), 3);
        assert_eq!(circular_distance(0, 12), 12);
        assert_eq!(circular_distance(5, 5), 0);
    }
}
