//! Merging scraped courses with the slot table for a schedule variant.

use crate::schedule::slots::ScheduleVariant;
use crate::schedule::{DayType, ScheduleMatrix, SchedulePeriod, SynthesizedSchedule};

fn build(matrix: &ScheduleMatrix, schedule_type: &str) -> SynthesizedSchedule {
    let variant = ScheduleVariant::from_label(schedule_type);
    let periods = variant
        .slots()
        .into_iter()
        .zip(1u8..)
        .map(|(slot, period)| SchedulePeriod {
            period,
            course: matrix.periods.get(&period).cloned(),
            start: slot.start,
            end: slot.end,
        })
        .collect();

    SynthesizedSchedule {
        day: matrix.day.clone(),
        schedule_type: schedule_type.to_owned(),
        periods,
    }
}

/// Today's schedule: the matrix for `day_type.day` laid over its variant's
/// slots. `None` when the matrix has no row for that day.
pub fn synthesize(matrices: &[ScheduleMatrix], day_type: &DayType) -> Option<SynthesizedSchedule> {
    let matrix = matrices.iter().find(|m| m.day == day_type.day)?;
    Some(build(matrix, &day_type.schedule_type))
}

/// Every day in the matrix under one variant.
pub fn synthesize_all(matrices: &[ScheduleMatrix], variant_label: &str) -> Vec<SynthesizedSchedule> {
    matrices.iter().map(|m| build(m, variant_label)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Course;
    use chrono::NaiveTime;
    use std::collections::BTreeMap;

    fn course(name: &str) -> Course {
        Course {
            name: name.to_owned(),
            section: "1".to_owned(),
            room: "12".to_owned(),
            capacity: "20".to_owned(),
        }
    }

    fn matrix(day: &str, courses: &[(u8, &str)]) -> ScheduleMatrix {
        ScheduleMatrix {
            day: day.to_owned(),
            periods: courses.iter().map(|(p, n)| (*p, course(n))).collect::<BTreeMap<_, _>>(),
        }
    }

    fn day_type(day: &str, schedule_type: &str) -> DayType {
        DayType {
            day: day.to_owned(),
            schedule_type: schedule_type.to_owned(),
        }
    }

    #[test]
    fn test_period_three_daily() {
        let matrices = [matrix("F", &[(3, "Physics")]), matrix("A", &[(3, "Art")])];
        let schedule = synthesize(&matrices, &day_type("F", "Daily Schedule")).unwrap();

        assert_eq!(schedule.day, "F");
        assert_eq!(schedule.schedule_type, "Daily Schedule");
        assert_eq!(schedule.periods.len(), 10);

        let third = &schedule.periods[2];
        assert_eq!(third.period, 3);
        assert_eq!(third.course.as_ref().unwrap().name, "Physics");
        assert_eq!(third.start, NaiveTime::from_hms_opt(9, 45, 0).unwrap());
        assert_eq!(third.end, NaiveTime::from_hms_opt(10, 15, 0).unwrap());
        assert!(schedule.periods.iter().filter(|p| p.period != 3).all(|p| p.course.is_none()));
    }

    #[test]
    fn test_schedule_type_echoed_verbatim() {
        let matrices = [matrix("B", &[])];
        let schedule = synthesize(&matrices, &day_type("B", "Some Assembly")).unwrap();
        assert_eq!(schedule.schedule_type, "Some Assembly");
        // unrecognized labels use the daily table
        assert_eq!(schedule.periods[0].start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn test_missing_day_is_none() {
        let matrices = [matrix("A", &[(1, "Latin")])];
        assert!(synthesize(&matrices, &day_type("G", "Daily Schedule")).is_none());
        assert!(synthesize(&[], &day_type("A", "Daily Schedule")).is_none());
    }

    #[test]
    fn test_synthesize_all_covers_every_day() {
        let matrices = [matrix("A", &[]), matrix("B", &[(10, "Band")]), matrix("C", &[])];
        let all = synthesize_all(&matrices, "X Schedule");
        assert_eq!(all.iter().map(|s| s.day.as_str()).collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(all.iter().all(|s| s.periods.len() == 10));
        assert_eq!(all[1].periods[9].course.as_ref().unwrap().name, "Band");
        assert_eq!(all[0].periods[1].end, NaiveTime::from_hms_opt(10, 25, 0).unwrap());
    }

    #[test]
    fn test_idempotent() {
        let matrices = [matrix("D", &[(2, "Chem"), (7, "Lunch Duty")])];
        let day = day_type("D", "MM");
        let first = serde_json::to_string(&synthesize(&matrices, &day)).unwrap();
        let second = serde_json::to_string(&synthesize(&matrices, &day)).unwrap();
        assert_eq!(first, second);
    }
}
