use chrono::{DateTime, Utc};

pub const TEMP_ID_PREFIX: &str = "temp-";

/// Client-side ids for optimistic entries: `temp-{millis}-{seq}`. The sequence
/// keeps ids unique within one millisecond.
#[derive(Debug, Default)]
pub struct TempIdGenerator {
    seq: u64,
}

impl TempIdGenerator {
    pub fn next_id(&mut self, now: DateTime<Utc>) -> String {
        self.seq += 1;
        format!("{TEMP_ID_PREFIX}{}-{}", now.timestamp_millis(), self.seq)
    }
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn ids_are_prefixed_and_unique() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ids = TempIdGenerator::default();
        let first = ids.next_id(now);
        let second = ids.next_id(now);
        assert_ne!(first, second);
        assert!(is_temp_id(&first));
        assert!(first.starts_with(&format!("temp-{}", now.timestamp_millis())));
        assert!(!is_temp_id("server-99"));
    }
}
