use super::round_percent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub rate: i64,
}

/// Reduce attendance records to counts and a rate. Only `present` counts
/// toward the rate numerator; `late` is not-present for rate purposes
/// (stated business rule, flagged for stakeholder review in DESIGN.md).
pub fn stats<I>(records: I) -> AttendanceStats
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut present: i64 = 0;
    let mut absent: i64 = 0;
    let mut late: i64 = 0;

    for status in records {
        match status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Late => late += 1,
        }
    }

    let total = present + absent + late;
    AttendanceStats {
        present,
        absent,
        late,
        rate: round_percent(present as f64, total as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::{Absent, Late, Present};

    #[test]
    fn counts_and_rate_over_a_mixed_month() {
        let records = [
            Present, Present, Present, Present, Present, Present, Present, Absent, Absent, Late,
        ];
        let s = stats(records);
        assert_eq!(s.present, 7);
        assert_eq!(s.absent, 2);
        assert_eq!(s.late, 1);
        assert_eq!(s.rate, 70);
    }

    #[test]
    fn late_does_not_count_as_present_for_rate() {
        let s = stats([Late, Late, Present, Present]);
        assert_eq!(s.rate, 50);
    }

    #[test]
    fn empty_input_yields_zero_rate() {
        let s = stats([]);
        assert_eq!(s.present, 0);
        assert_eq!(s.absent, 0);
        assert_eq!(s.late, 0);
        assert_eq!(s.rate, 0);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [Present, Absent, Late] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("excused"), None);
    }
}
