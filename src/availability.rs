//! Availability Query Engine.
//!
//! Answers which tables of a restaurant can take a party at a given slot and
//! whether the restaurant is open then. A table is free at a slot when no
//! active reservation holds it at exactly that date and time; reservation
//! durations are not modelled.
//!
//! The day of week is always derived from the requested date.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use diesel::prelude::*;
use serde::Serialize;

use crate::models::{DiningTable, OperatingHours, ReservationStatus};
use crate::validation::AvailabilityParams;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub restaurant_id: i32,
    pub date: NaiveDate,
    pub day_of_week: &'static str,
    pub is_open: bool,
    pub is_available: bool,
    pub available_times: Vec<NaiveTime>,
    pub candidate_tables: Vec<DiningTable>,
}

impl Availability {
    fn empty(restaurant_id: i32, date: NaiveDate) -> Self {
        Availability {
            restaurant_id,
            date,
            day_of_week: day_of_week(date),
            is_open: false,
            is_available: false,
            available_times: Vec::new(),
            candidate_tables: Vec::new(),
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .find(|day| weekday_name(*day).eq_ignore_ascii_case(name))
}

pub fn day_of_week(date: NaiveDate) -> &'static str {
    weekday_name(date.weekday())
}

pub fn is_open_at(hours: &[OperatingHours], time: NaiveTime) -> bool {
    hours.iter().any(|row| row.is_open_at(time))
}

/// Distinct opening times, ascending.
pub fn opening_times(hours: &[OperatingHours]) -> Vec<NaiveTime> {
    hours
        .iter()
        .map(|row| row.opening_time)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Deterministic table assignment: smallest capacity that fits, then lowest id.
pub fn choose_table(candidates: &[DiningTable]) -> Option<&DiningTable> {
    candidates.iter().min_by_key(|table| (table.capacity, table.id))
}

pub fn is_bookable_restaurant(conn: &mut PgConnection, restaurant_id: i32) -> QueryResult<bool> {
    use crate::schema::restaurants;

    diesel::select(diesel::dsl::exists(
        restaurants::table
            .filter(restaurants::id.eq(restaurant_id))
            .filter(restaurants::is_approved.eq(true)),
    ))
    .get_result(conn)
}

/// Operating-hours rows for the weekday of `date`.
pub fn hours_for_date(
    conn: &mut PgConnection,
    restaurant_id: i32,
    date: NaiveDate,
) -> QueryResult<Vec<OperatingHours>> {
    use crate::schema::operating_hours;

    operating_hours::table
        .filter(operating_hours::restaurant_id.eq(restaurant_id))
        .filter(operating_hours::day_of_week.eq(day_of_week(date)))
        .order(operating_hours::opening_time.asc())
        .select(OperatingHours::as_select())
        .load(conn)
}

/// Tables with capacity >= `min_capacity`, smallest first.
pub fn candidate_tables(
    conn: &mut PgConnection,
    restaurant_id: i32,
    min_capacity: i32,
) -> QueryResult<Vec<DiningTable>> {
    use crate::schema::dining_tables;

    dining_tables::table
        .filter(dining_tables::restaurant_id.eq(restaurant_id))
        .filter(dining_tables::capacity.ge(min_capacity))
        .order((dining_tables::capacity.asc(), dining_tables::id.asc()))
        .select(DiningTable::as_select())
        .load(conn)
}

/// Candidate tables with no active reservation at exactly `(date, time)`.
pub fn free_tables(
    conn: &mut PgConnection,
    restaurant_id: i32,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> QueryResult<Vec<DiningTable>> {
    use crate::schema::{dining_tables, reservations};

    let held = reservations::table
        .filter(reservations::restaurant_id.eq(restaurant_id))
        .filter(reservations::reservation_date.eq(date))
        .filter(reservations::reservation_time.eq(time))
        .filter(reservations::status.eq_any(ReservationStatus::ACTIVE.to_vec()))
        .select(reservations::table_id);

    dining_tables::table
        .filter(dining_tables::restaurant_id.eq(restaurant_id))
        .filter(dining_tables::capacity.ge(party_size))
        .filter(dining_tables::id.ne_all(held))
        .order((dining_tables::capacity.asc(), dining_tables::id.asc()))
        .select(DiningTable::as_select())
        .load(conn)
}

pub fn find_availability(
    conn: &mut PgConnection,
    params: &AvailabilityParams,
) -> QueryResult<Availability> {
    let AvailabilityParams { restaurant_id, date, time, party_size } = *params;

    if !is_bookable_restaurant(conn, restaurant_id)? {
        log::debug!(
            "availability requested for unknown or unapproved restaurant {}",
            restaurant_id
        );
        return Ok(Availability::empty(restaurant_id, date));
    }

    let hours = hours_for_date(conn, restaurant_id, date)?;
    let min_capacity = party_size.unwrap_or(1);

    let (is_open, candidate_tables) = match time {
        Some(time) => (
            is_open_at(&hours, time),
            free_tables(conn, restaurant_id, date, time, min_capacity)?,
        ),
        None => (!hours.is_empty(), candidate_tables(conn, restaurant_id, min_capacity)?),
    };

    Ok(Availability {
        restaurant_id,
        date,
        day_of_week: day_of_week(date),
        is_open,
        is_available: is_open && !candidate_tables.is_empty(),
        available_times: opening_times(&hours),
        candidate_tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn hours(day: &str, open: NaiveTime, close: NaiveTime) -> OperatingHours {
        OperatingHours {
            id: 1,
            restaurant_id: 1,
            day_of_week: day.to_owned(),
            opening_time: open,
            closing_time: close,
        }
    }

    fn table(id: i32, capacity: i32) -> DiningTable {
        DiningTable {
            id,
            restaurant_id: 1,
            table_number: format!("T{}", id),
            capacity,
        }
    }

    #[rstest]
    #[case(2030, 1, 7, "Monday")]
    #[case(2030, 1, 8, "Tuesday")]
    #[case(2024, 2, 29, "Thursday")]
    #[case(2025, 12, 28, "Sunday")]
    fn weekday_is_derived_from_date(
        #[case] y: i32,
        #[case] m: u32,
        #[case] d: u32,
        #[case] expected: &str,
    ) {
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(y, m, d).unwrap()), expected);
    }

    #[test]
    fn weekday_names_round_trip() {
        assert_eq!(parse_weekday("Saturday"), Some(Weekday::Sat));
        assert_eq!(parse_weekday("saturday"), Some(Weekday::Sat));
        assert_eq!(parse_weekday("Sat"), None);
    }

    #[rstest]
    #[case(time(9, 0), true)]
    #[case(time(19, 0), true)]
    #[case(time(22, 0), true)]
    #[case(time(22, 1), false)]
    #[case(time(8, 59), false)]
    #[case(time(23, 0), false)]
    fn open_interval_is_inclusive(#[case] at: NaiveTime, #[case] expected: bool) {
        let monday = [hours("Monday", time(9, 0), time(22, 0))];
        assert_eq!(is_open_at(&monday, at), expected);
    }

    #[test]
    fn no_hours_means_closed() {
        assert!(!is_open_at(&[], time(12, 0)));
    }

    #[test]
    fn opening_times_are_distinct_and_sorted() {
        let rows = [
            hours("Monday", time(17, 0), time(22, 0)),
            hours("Monday", time(11, 0), time(14, 0)),
            hours("Monday", time(11, 0), time(15, 0)),
        ];
        assert_eq!(opening_times(&rows), vec![time(11, 0), time(17, 0)]);
    }

    #[test]
    fn smallest_fitting_table_wins_then_lowest_id() {
        let candidates = [table(5, 6), table(9, 4), table(3, 4), table(1, 8)];
        assert_eq!(choose_table(&candidates).map(|t| t.id), Some(3));
    }

    #[test]
    fn no_candidates_means_no_choice() {
        assert_eq!(choose_table(&[]), None);
    }
}
