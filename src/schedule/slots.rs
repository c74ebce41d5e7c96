//! Static period time tables, one per schedule variant.

use chrono::NaiveTime;
use serde::Serialize;
use std::fmt;

pub const PERIODS_PER_DAY: usize = 10;

/// Wall-clock bounds of one period, independent of any date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// The bell schedules the school runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScheduleVariant {
    MorningMeeting,
    X,
    AB1,
    Daily,
    Unum,
}

type Hms = (u32, u32, u32);

const fn slot(start: (u32, u32), end: (u32, u32)) -> (Hms, Hms) {
    ((start.0, start.1, 0), (end.0, end.1, 0))
}

const MM_SLOTS: [(Hms, Hms); PERIODS_PER_DAY] = [
    slot((8, 45), (9, 20)),
    slot((9, 25), (10, 15)),
    slot((10, 15), (10, 35)),
    slot((10, 35), (11, 10)),
    slot((11, 15), (11, 50)),
    slot((11, 55), (12, 30)),
    slot((12, 35), (12, 35)),
    slot((12, 35), (13, 10)),
    slot((13, 15), (13, 50)),
    slot((13, 55), (14, 30)),
];

const X_SLOTS: [(Hms, Hms); PERIODS_PER_DAY] = [
    slot((8, 0), (8, 35)),
    slot((8, 40), (10, 25)),
    slot((10, 25), (10, 40)),
    slot((10, 40), (11, 15)),
    slot((11, 20), (11, 55)),
    slot((12, 0), (12, 32)),
    slot((12, 33), (12, 34)),
    slot((12, 35), (13, 10)),
    slot((13, 15), (13, 50)),
    slot((13, 55), (14, 30)),
];

const AB1_SLOTS: [(Hms, Hms); PERIODS_PER_DAY] = [
    slot((9, 45), (10, 10)),
    slot((10, 15), (10, 40)),
    slot((10, 40), (11, 5)),
    slot((11, 5), (11, 30)),
    slot((11, 35), (12, 0)),
    slot((12, 5), (12, 30)),
    slot((12, 35), (13, 0)),
    slot((13, 5), (13, 30)),
    slot((13, 35), (14, 0)),
    slot((14, 5), (14, 30)),
];

const DAILY_SLOTS: [(Hms, Hms); PERIODS_PER_DAY] = [
    slot((8, 0), (8, 40)),
    slot((8, 45), (9, 45)),
    slot((9, 45), (10, 15)),
    slot((10, 15), (10, 55)),
    slot((11, 0), (11, 40)),
    slot((11, 45), (12, 20)),
    slot((12, 20), (12, 25)),
    slot((12, 25), (13, 0)),
    slot((13, 5), (13, 45)),
    slot((13, 50), (14, 30)),
];

const UNUM_SLOTS: [(Hms, Hms); PERIODS_PER_DAY] = [
    slot((8, 0), (8, 35)),
    slot((8, 40), (9, 25)),
    slot((9, 30), (10, 40)),
    slot((10, 40), (11, 15)),
    slot((11, 20), (11, 55)),
    slot((12, 0), (12, 35)),
    ((12, 35, 1), (12, 40, 0)),
    slot((12, 40), (13, 15)),
    slot((13, 20), (13, 55)),
    slot((14, 0), (14, 30)),
];

impl ScheduleVariant {
    pub const ALL: [ScheduleVariant; 5] = [
        Self::MorningMeeting,
        Self::X,
        Self::AB1,
        Self::Daily,
        Self::Unum,
    ];

    /// Map a calendar's free-text schedule name onto a variant.
    ///
    /// Checks run in a fixed order and anything unrecognized is treated as a
    /// normal day.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        if normalized.contains("morning meeting") || normalized == "mm" {
            Self::MorningMeeting
        } else if normalized.contains("x schedule") || normalized == "x" {
            Self::X
        } else if normalized.contains("a/b1") || normalized.contains("ab1") {
            Self::AB1
        } else if normalized.contains("daily") {
            Self::Daily
        } else if normalized.contains("unum") {
            Self::Unum
        } else {
            Self::Daily
        }
    }

    /// Canonical table name.
    pub fn name(self) -> &'static str {
        match self {
            Self::MorningMeeting => "MM Schedule",
            Self::X => "X Schedule",
            Self::AB1 => "A/B1 Schedule",
            Self::Daily => "Daily Schedule",
            Self::Unum => "Unum Schedule",
        }
    }

    fn table(self) -> [(Hms, Hms); PERIODS_PER_DAY] {
        match self {
            Self::MorningMeeting => MM_SLOTS,
            Self::X => X_SLOTS,
            Self::AB1 => AB1_SLOTS,
            Self::Daily => DAILY_SLOTS,
            Self::Unum => UNUM_SLOTS,
        }
    }

    /// The ten slots; index `i` belongs to period `i + 1`.
    pub fn slots(self) -> [Slot; PERIODS_PER_DAY] {
        self.table().map(|(start, end)| Slot {
            start: hms(start),
            end: hms(end),
        })
    }
}

impl fmt::Display for ScheduleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn hms((h, m, s): Hms) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_from_label_priority() {
        assert_eq!(ScheduleVariant::from_label("Morning Meeting"), ScheduleVariant::MorningMeeting);
        assert_eq!(ScheduleVariant::from_label("MM"), ScheduleVariant::MorningMeeting);
        assert_eq!(ScheduleVariant::from_label("X Schedule"), ScheduleVariant::X);
        assert_eq!(ScheduleVariant::from_label("x"), ScheduleVariant::X);
        assert_eq!(ScheduleVariant::from_label("A/B1 Schedule"), ScheduleVariant::AB1);
        assert_eq!(ScheduleVariant::from_label("AB1"), ScheduleVariant::AB1);
        assert_eq!(ScheduleVariant::from_label("Daily Schedule"), ScheduleVariant::Daily);
        assert_eq!(ScheduleVariant::from_label("Unum Schedule"), ScheduleVariant::Unum);
        // "morning meeting" is checked before "daily"
        assert_eq!(
            ScheduleVariant::from_label("Daily Morning Meeting"),
            ScheduleVariant::MorningMeeting
        );
    }

    #[test]
    fn test_from_label_unknown_falls_back_to_daily() {
        assert_eq!(ScheduleVariant::from_label("Half Day"), ScheduleVariant::Daily);
        assert_eq!(ScheduleVariant::from_label(""), ScheduleVariant::Daily);
    }

    #[test]
    fn test_every_variant_has_ordered_slots() {
        for variant in ScheduleVariant::ALL {
            let slots = variant.slots();
            assert_eq!(slots.len(), PERIODS_PER_DAY);
            for slot in slots {
                assert!(slot.start <= slot.end, "{variant}: {slot:?}");
            }
        }
    }

    #[test]
    fn test_known_slots() {
        let daily = ScheduleVariant::Daily.slots();
        assert_eq!(daily[0], Slot { start: t(8, 0), end: t(8, 40) });
        assert_eq!(daily[2], Slot { start: t(9, 45), end: t(10, 15) });

        let unum = ScheduleVariant::Unum.slots();
        assert_eq!(unum[6].start, NaiveTime::from_hms_opt(12, 35, 1).unwrap());
        assert_eq!(ScheduleVariant::AB1.slots()[9].end, t(14, 30));
    }
}
