//! Boundary validation: loosely-typed request bodies and query strings are
//! turned into typed commands here, before any of them reach the database.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime, Weekday};
use regex::Regex;

use crate::availability::{parse_weekday, weekday_name};
use crate::error::ServiceError;
use crate::models::{
    AvailabilityQuery, CreateReservationRequest, DiningTableChanges, NewOperatingHours,
    NewRestaurant, NewRestaurantRequest, OperatingHoursInput, RestaurantChanges, RestaurantFields,
    SearchQuery, UpdateRestaurantRequest,
};
use crate::search::SearchFilters;

pub const MAX_PARTY_SIZE: i32 = 20;
pub const MAX_TABLE_CAPACITY: i32 = 20;
pub const MAX_SPECIAL_REQUEST_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 2000;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9 \-]+$").expect("name pattern is a valid regex"))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::validation("date not in correct format, expected YYYY-MM-DD"))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime, ServiceError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ServiceError::validation("time not in correct format, expected HH:MM"))
}

pub fn validate_party_size(party_size: i32) -> Result<i32, ServiceError> {
    if party_size < 1 {
        return Err(ServiceError::validation("party size must be at least 1"));
    }
    if party_size > MAX_PARTY_SIZE {
        return Err(ServiceError::validation(format!(
            "party size must not exceed {}",
            MAX_PARTY_SIZE
        )));
    }
    Ok(party_size)
}

fn validate_id(id: i32, what: &str) -> Result<i32, ServiceError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(ServiceError::validation(format!("{} must be a positive integer", what)))
    }
}

fn optional_text(
    value: Option<&str>,
    max_len: usize,
    what: &str,
) -> Result<Option<String>, ServiceError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) if v.chars().count() > max_len => {
            Err(ServiceError::validation(format!(
                "{} must not exceed {} characters",
                what, max_len
            )))
        }
        Some(v) => Ok(Some(v.to_owned())),
    }
}

fn required_text(value: &str, what: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServiceError::validation(format!("{} is required", what)))
    } else {
        Ok(value.to_owned())
    }
}

/// A booking command with every field validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub customer_id: i32,
    pub restaurant_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub special_request: Option<String>,
}

impl BookingRequest {
    pub fn parse(customer_id: i32, form: &CreateReservationRequest) -> Result<Self, ServiceError> {
        Ok(BookingRequest {
            customer_id,
            restaurant_id: validate_id(form.restaurant_id, "restaurant_id")?,
            date: parse_date(&form.reservation_date)?,
            time: parse_time(&form.reservation_time)?,
            party_size: validate_party_size(form.party_size)?,
            special_request: optional_text(
                form.special_request.as_deref(),
                MAX_SPECIAL_REQUEST_LEN,
                "special request",
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityParams {
    pub restaurant_id: i32,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub party_size: Option<i32>,
}

impl AvailabilityParams {
    pub fn parse(query: &AvailabilityQuery) -> Result<Self, ServiceError> {
        Ok(AvailabilityParams {
            restaurant_id: validate_id(query.restaurant_id, "restaurant_id")?,
            date: parse_date(&query.date)?,
            time: query
                .time
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(parse_time)
                .transpose()?,
            party_size: query.party_size.map(validate_party_size).transpose()?,
        })
    }
}

pub fn search_filters(query: &SearchQuery) -> Result<SearchFilters, ServiceError> {
    let non_empty = |value: &Option<String>| {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
    };

    if let Some(price) = query.price_range {
        if !(1..=5).contains(&price) {
            return Err(ServiceError::validation("price_range must be between 1 and 5"));
        }
    }
    if let Some(rating) = query.rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(ServiceError::validation("rating must be between 0 and 5"));
        }
    }

    Ok(SearchFilters {
        location: non_empty(&query.location),
        cuisine_type: non_empty(&query.cuisine_type),
        price_ceiling: query.price_range,
        min_rating: query.rating,
        date: non_empty(&query.date).as_deref().map(parse_date).transpose()?,
        time: non_empty(&query.time).as_deref().map(parse_time).transpose()?,
        party_size: query.party_size.map(validate_party_size).transpose()?,
    })
}

pub fn parse_notes(notes: Option<&str>) -> Result<Option<String>, ServiceError> {
    optional_text(notes, MAX_NOTES_LEN, "notes")
}

/// One validated operating-hours row, not yet bound to a restaurant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoursEntry {
    pub day: Weekday,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

impl HoursEntry {
    pub fn for_restaurant(&self, restaurant_id: i32) -> NewOperatingHours {
        NewOperatingHours {
            restaurant_id,
            day_of_week: weekday_name(self.day).to_owned(),
            opening_time: self.opening_time,
            closing_time: self.closing_time,
        }
    }
}

pub fn operating_hours(inputs: &[OperatingHoursInput]) -> Result<Vec<HoursEntry>, ServiceError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(inputs.len());

    for input in inputs {
        let day = parse_weekday(input.day_of_week.trim())
            .ok_or_else(|| {
                ServiceError::validation(format!("unknown day of week '{}'", input.day_of_week))
            })?;
        if !seen.insert(day) {
            return Err(ServiceError::validation(format!(
                "operating hours for {} given more than once",
                weekday_name(day)
            )));
        }

        let opening_time = parse_time(&input.opening_time)?;
        let closing_time = parse_time(&input.closing_time)?;
        if opening_time >= closing_time {
            return Err(ServiceError::validation(format!(
                "opening time must be before closing time on {}",
                weekday_name(day)
            )));
        }

        entries.push(HoursEntry { day, opening_time, closing_time });
    }

    Ok(entries)
}

pub fn restaurant_fields(form: &RestaurantFields) -> Result<RestaurantChanges, ServiceError> {
    let name = required_text(&form.name, "name")?;
    let cuisine_type = required_text(&form.cuisine_type, "cuisine type")?;
    if !name_pattern().is_match(&cuisine_type) {
        return Err(ServiceError::validation(concat!(
            "cuisine type should be alphanumeric, ",
            "spaces and hyphens are the only special characters allowed"
        )));
    }
    if !(1..=5).contains(&form.cost_rating) {
        return Err(ServiceError::validation("cost rating must be between 1 and 5"));
    }

    Ok(RestaurantChanges {
        name,
        description: optional_text(form.description.as_deref(), 5000, "description")?,
        cuisine_type,
        address_line1: required_text(&form.address_line1, "address")?,
        city: required_text(&form.city, "city")?,
        zip_code: required_text(&form.zip_code, "zip code")?,
        phone: optional_text(form.phone.as_deref(), 30, "phone")?,
        cost_rating: form.cost_rating,
    })
}

pub fn new_restaurant(
    manager_id: i32,
    form: &NewRestaurantRequest,
) -> Result<(NewRestaurant, Vec<HoursEntry>), ServiceError> {
    let restaurant = restaurant_fields(&form.fields)?.with_manager(manager_id);
    Ok((restaurant, operating_hours(&form.operating_hours)?))
}

/// `None` hours leave the stored schedule untouched.
pub fn restaurant_update(
    form: &UpdateRestaurantRequest,
) -> Result<(RestaurantChanges, Option<Vec<HoursEntry>>), ServiceError> {
    let changes = restaurant_fields(&form.fields)?;
    let hours = form.operating_hours.as_deref().map(operating_hours).transpose()?;
    Ok((changes, hours))
}

pub fn table_fields(table_number: &str, capacity: i32) -> Result<DiningTableChanges, ServiceError> {
    let table_number = required_text(table_number, "table number")?;
    if table_number.chars().count() > 20 || !name_pattern().is_match(&table_number) {
        return Err(ServiceError::validation(
            "table number should be at most 20 alphanumeric characters, spaces and hyphens allowed",
        ));
    }
    if !(1..=MAX_TABLE_CAPACITY).contains(&capacity) {
        return Err(ServiceError::validation(format!(
            "capacity must be a number between 1 and {}",
            MAX_TABLE_CAPACITY
        )));
    }
    Ok(DiningTableChanges { table_number, capacity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn booking_form(date: &str, time: &str, party_size: i32) -> CreateReservationRequest {
        CreateReservationRequest {
            restaurant_id: 3,
            reservation_date: date.to_owned(),
            reservation_time: time.to_owned(),
            party_size,
            special_request: Some("  window seat  ".to_owned()),
        }
    }

    #[rstest]
    #[case("19:00", 19, 0, 0)]
    #[case("19:00:00", 19, 0, 0)]
    #[case(" 07:05 ", 7, 5, 0)]
    #[case("22:00:30", 22, 0, 30)]
    fn parses_supported_time_formats(
        #[case] input: &str,
        #[case] h: u32,
        #[case] m: u32,
        #[case] s: u32,
    ) {
        assert_eq!(parse_time(input).unwrap(), NaiveTime::from_hms_opt(h, m, s).unwrap());
    }

    #[rstest]
    #[case("7pm")]
    #[case("25:00")]
    #[case("")]
    fn rejects_malformed_times(#[case] input: &str) {
        assert!(matches!(parse_time(input), Err(ServiceError::Validation(_))));
    }

    #[rstest]
    #[case("2030-01-07", true)]
    #[case("07/01/2030", false)]
    #[case("2030-02-30", false)]
    fn validates_dates(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(parse_date(input).is_ok(), ok);
    }

    #[rstest]
    #[case(0, false)]
    #[case(-2, false)]
    #[case(1, true)]
    #[case(MAX_PARTY_SIZE, true)]
    #[case(MAX_PARTY_SIZE + 1, false)]
    fn validates_party_size(#[case] party_size: i32, #[case] ok: bool) {
        assert_eq!(validate_party_size(party_size).is_ok(), ok);
    }

    #[test]
    fn booking_request_is_typed_and_trimmed() {
        let request = BookingRequest::parse(11, &booking_form("2030-01-07", "19:00", 4)).unwrap();

        assert_eq!(request.customer_id, 11);
        assert_eq!(request.restaurant_id, 3);
        assert_eq!(request.date, NaiveDate::from_ymd_opt(2030, 1, 7).unwrap());
        assert_eq!(request.time, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        assert_eq!(request.special_request.as_deref(), Some("window seat"));
    }

    #[test]
    fn oversized_special_request_is_rejected() {
        let mut form = booking_form("2030-01-07", "19:00", 2);
        form.special_request = Some("x".repeat(MAX_SPECIAL_REQUEST_LEN + 1));
        assert!(BookingRequest::parse(1, &form).is_err());
    }

    #[test]
    fn availability_params_treat_blank_time_as_absent() {
        let params = AvailabilityParams::parse(&AvailabilityQuery {
            restaurant_id: 1,
            date: "2030-01-07".to_owned(),
            time: Some("  ".to_owned()),
            party_size: None,
        })
        .unwrap();
        assert_eq!(params.time, None);
    }

    #[test]
    fn operating_hours_reject_duplicate_days() {
        let inputs = vec![
            OperatingHoursInput {
                day_of_week: "Monday".to_owned(),
                opening_time: "09:00".to_owned(),
                closing_time: "22:00".to_owned(),
            },
            OperatingHoursInput {
                day_of_week: "Monday".to_owned(),
                opening_time: "10:00".to_owned(),
                closing_time: "12:00".to_owned(),
            },
        ];
        assert!(operating_hours(&inputs).is_err());
    }

    #[test]
    fn operating_hours_reject_inverted_intervals() {
        let inputs = vec![OperatingHoursInput {
            day_of_week: "Friday".to_owned(),
            opening_time: "23:00".to_owned(),
            closing_time: "02:00".to_owned(),
        }];
        assert!(operating_hours(&inputs).is_err());
    }

    #[test]
    fn operating_hours_bind_to_restaurant() {
        let inputs = vec![OperatingHoursInput {
            day_of_week: "Sunday".to_owned(),
            opening_time: "11:30".to_owned(),
            closing_time: "15:00".to_owned(),
        }];
        let entries = operating_hours(&inputs).unwrap();
        let row = entries[0].for_restaurant(9);

        assert_eq!(row.restaurant_id, 9);
        assert_eq!(row.day_of_week, "Sunday");
        assert_eq!(row.opening_time, NaiveTime::from_hms_opt(11, 30, 0).unwrap());
    }

    #[rstest]
    #[case("T1", 4, true)]
    #[case("Patio 2", 6, true)]
    #[case("", 4, false)]
    #[case("T#1", 4, false)]
    #[case("T1", 0, false)]
    #[case("T1", MAX_TABLE_CAPACITY + 1, false)]
    fn validates_table_fields(#[case] number: &str, #[case] capacity: i32, #[case] ok: bool) {
        assert_eq!(table_fields(number, capacity).is_ok(), ok);
    }

    #[test]
    fn search_filters_parse_slot_fields() {
        let filters = search_filters(&SearchQuery {
            location: Some(" Austin ".to_owned()),
            date: Some("2030-01-07".to_owned()),
            time: Some("19:00".to_owned()),
            party_size: Some(2),
            ..SearchQuery::default()
        })
        .unwrap();

        assert_eq!(filters.location.as_deref(), Some("Austin"));
        assert_eq!(filters.time, Some(NaiveTime::from_hms_opt(19, 0, 0).unwrap()));
        assert_eq!(filters.party_size, Some(2));
    }

    #[test]
    fn search_filters_reject_out_of_range_price() {
        let query = SearchQuery { price_range: Some(9), ..SearchQuery::default() };
        assert!(search_filters(&query).is_err());
    }

    fn update_form(body: serde_json::Value) -> UpdateRestaurantRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn restaurant_update_without_hours_keeps_schedule() {
        let form = update_form(serde_json::json!({
            "name": "Chez Nous",
            "cuisine_type": "French",
            "address_line1": "1 Main Street",
            "city": "Austin",
            "zip_code": "73301",
            "cost_rating": 4,
        }));
        let (changes, hours) = restaurant_update(&form).unwrap();

        assert_eq!(changes.name, "Chez Nous");
        assert_eq!(changes.description, None);
        assert_eq!(hours, None);
    }

    #[test]
    fn restaurant_update_with_empty_hours_clears_schedule() {
        let form = update_form(serde_json::json!({
            "name": "Chez Nous",
            "cuisine_type": "French",
            "address_line1": "1 Main Street",
            "city": "Austin",
            "zip_code": "73301",
            "cost_rating": 4,
            "operating_hours": [],
        }));
        let (_, hours) = restaurant_update(&form).unwrap();
        assert_eq!(hours, Some(Vec::new()));
    }

    #[test]
    fn restaurant_update_rejects_bad_cost_rating() {
        let form = update_form(serde_json::json!({
            "name": "Chez Nous",
            "cuisine_type": "French",
            "address_line1": "1 Main Street",
            "city": "Austin",
            "zip_code": "73301",
            "cost_rating": 6,
        }));
        assert!(matches!(restaurant_update(&form), Err(ServiceError::Validation(_))));
    }
}
