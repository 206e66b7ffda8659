//! Restaurant search with an optional availability predicate.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;

use crate::availability::day_of_week;
use crate::models::{ReservationStatus, Restaurant};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub location: Option<String>,
    pub cuisine_type: Option<String>,
    pub price_ceiling: Option<i32>,
    pub min_rating: Option<f64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub party_size: Option<i32>,
}

impl SearchFilters {
    /// The availability predicate applies only when both time and party size are given.
    pub fn slot(&self) -> Option<(NaiveTime, i32)> {
        self.time.zip(self.party_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestaurantSummary {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
    pub bookings_today: i64,
    pub available_times: Vec<NaiveTime>,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RatingTally {
    pub count: i64,
    sum: i64,
}

impl RatingTally {
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

/// Review count and rating sum per restaurant; restaurants without reviews are absent.
pub(crate) fn rating_tallies(
    conn: &mut PgConnection,
    restaurant_ids: &[i32],
) -> QueryResult<HashMap<i32, RatingTally>> {
    use crate::schema::reviews;

    let mut ratings: HashMap<i32, RatingTally> = HashMap::new();
    for (restaurant_id, rating) in reviews::table
        .filter(reviews::restaurant_id.eq_any(restaurant_ids))
        .select((reviews::restaurant_id, reviews::rating))
        .load::<(i32, i32)>(conn)?
    {
        let tally = ratings.entry(restaurant_id).or_default();
        tally.count += 1;
        tally.sum += i64::from(rating);
    }
    Ok(ratings)
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Ids of approved restaurants with a free candidate table at the slot and
/// operating hours covering it on the date's weekday.
fn restaurants_with_free_slot(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> QueryResult<BTreeSet<i32>> {
    use crate::schema::{dining_tables, operating_hours, reservations};

    let held = reservations::table
        .filter(reservations::reservation_date.eq(date))
        .filter(reservations::reservation_time.eq(time))
        .filter(reservations::status.eq_any(ReservationStatus::ACTIVE.to_vec()))
        .select(reservations::table_id);

    let with_free_table: BTreeSet<i32> = dining_tables::table
        .filter(dining_tables::capacity.ge(party_size))
        .filter(dining_tables::id.ne_all(held))
        .select(dining_tables::restaurant_id)
        .distinct()
        .load::<i32>(conn)?
        .into_iter()
        .collect();

    let open_at_time: BTreeSet<i32> = operating_hours::table
        .filter(operating_hours::day_of_week.eq(day_of_week(date)))
        .filter(operating_hours::opening_time.le(time))
        .filter(operating_hours::closing_time.ge(time))
        .select(operating_hours::restaurant_id)
        .load::<i32>(conn)?
        .into_iter()
        .collect();

    Ok(with_free_table.intersection(&open_at_time).copied().collect())
}

pub fn search_restaurants(
    conn: &mut PgConnection,
    today: NaiveDate,
    filters: &SearchFilters,
) -> QueryResult<Vec<RestaurantSummary>> {
    use crate::schema::{operating_hours, reservations, restaurants};

    let date = filters.date.unwrap_or(today);

    let mut query = restaurants::table
        .filter(restaurants::is_approved.eq(true))
        .select(Restaurant::as_select())
        .into_boxed();

    if let Some(location) = &filters.location {
        let pattern = like_pattern(location);
        query = query.filter(
            restaurants::city
                .ilike(pattern.clone())
                .or(restaurants::zip_code.ilike(pattern)),
        );
    }
    if let Some(cuisine) = &filters.cuisine_type {
        query = query.filter(restaurants::cuisine_type.eq(cuisine.clone()));
    }
    if let Some(ceiling) = filters.price_ceiling {
        query = query.filter(restaurants::cost_rating.le(ceiling));
    }
    if let Some((time, party_size)) = filters.slot() {
        let ids: Vec<i32> =
            restaurants_with_free_slot(conn, date, time, party_size)?.into_iter().collect();
        query = query.filter(restaurants::id.eq_any(ids));
    }

    let found: Vec<Restaurant> = query
        .order((restaurants::name.asc(), restaurants::id.asc()))
        .load(conn)?;

    if found.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = found.iter().map(|r| r.id).collect();

    let ratings = rating_tallies(conn, &ids)?;

    let mut bookings: HashMap<i32, i64> = HashMap::new();
    for restaurant_id in reservations::table
        .filter(reservations::restaurant_id.eq_any(&ids))
        .filter(reservations::reservation_date.eq(date))
        .filter(reservations::status.eq_any(ReservationStatus::ACTIVE.to_vec()))
        .select(reservations::restaurant_id)
        .load::<i32>(conn)?
    {
        *bookings.entry(restaurant_id).or_default() += 1;
    }

    let mut opening: HashMap<i32, BTreeSet<NaiveTime>> = HashMap::new();
    for (restaurant_id, opening_time) in operating_hours::table
        .filter(operating_hours::restaurant_id.eq_any(&ids))
        .filter(operating_hours::day_of_week.eq(day_of_week(date)))
        .select((operating_hours::restaurant_id, operating_hours::opening_time))
        .load::<(i32, NaiveTime)>(conn)?
    {
        opening.entry(restaurant_id).or_default().insert(opening_time);
    }

    let summaries = found
        .into_iter()
        .map(|restaurant| {
            let tally = ratings.get(&restaurant.id).copied().unwrap_or_default();
            RestaurantSummary {
                reviews_count: tally.count,
                average_rating: tally.average(),
                bookings_today: bookings.get(&restaurant.id).copied().unwrap_or(0),
                available_times: opening
                    .remove(&restaurant.id)
                    .map(|times| times.into_iter().collect())
                    .unwrap_or_default(),
                restaurant,
            }
        })
        .filter(|summary| match filters.min_rating {
            Some(min) => summary.average_rating.map_or(false, |avg| avg >= min),
            None => true,
        })
        .collect();

    Ok(summaries)
}
