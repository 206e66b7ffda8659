//! Supplementary CRUD around the booking core: restaurants and their hours,
//! dining tables, and read-side reservation listings.
//!
//! Every function takes the caller's [`Actor`] and performs its own
//! ownership check, so handlers stay thin.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::auth::{Actor, Role};
use crate::availability::parse_weekday;
use crate::error::ServiceError;
use crate::models::{
    DiningTable, DiningTableChanges, ManagedRestaurant, NewDiningTable, NewOperatingHours,
    NewRestaurant, OperatingHours, PendingRestaurant, Reservation, ReservationStats,
    ReservationStatus, Restaurant, RestaurantChanges, RestaurantDetails,
};
use crate::search::rating_tallies;
use crate::validation::HoursEntry;

fn restaurant_by_id(
    conn: &mut PgConnection,
    restaurant_id: i32,
) -> Result<Restaurant, ServiceError> {
    use crate::schema::restaurants;

    restaurants::table
        .find(restaurant_id)
        .select(Restaurant::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("restaurant not found"))
}

/// Loads the restaurant and checks that `actor` manages it.
pub fn managed_restaurant(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
) -> Result<Restaurant, ServiceError> {
    let restaurant = restaurant_by_id(conn, restaurant_id)?;
    if actor.manages(restaurant.manager_id) {
        Ok(restaurant)
    } else {
        Err(ServiceError::forbidden("you do not manage this restaurant"))
    }
}

fn weekday_order(row: &OperatingHours) -> u32 {
    parse_weekday(&row.day_of_week).map_or(7, |day| day.num_days_from_monday())
}

fn hours_of(conn: &mut PgConnection, restaurant_id: i32) -> QueryResult<Vec<OperatingHours>> {
    use crate::schema::operating_hours;

    let mut hours = operating_hours::table
        .filter(operating_hours::restaurant_id.eq(restaurant_id))
        .select(OperatingHours::as_select())
        .load(conn)?;
    hours.sort_by_key(|row| (weekday_order(row), row.opening_time));
    Ok(hours)
}

fn tables_of(conn: &mut PgConnection, restaurant_id: i32) -> QueryResult<Vec<DiningTable>> {
    use crate::schema::dining_tables;

    dining_tables::table
        .filter(dining_tables::restaurant_id.eq(restaurant_id))
        .order((dining_tables::table_number.asc(), dining_tables::id.asc()))
        .select(DiningTable::as_select())
        .load(conn)
}

fn insert_hours(
    conn: &mut PgConnection,
    restaurant_id: i32,
    hours: &[HoursEntry],
) -> QueryResult<usize> {
    use crate::schema::operating_hours;

    if hours.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewOperatingHours> =
        hours.iter().map(|entry| entry.for_restaurant(restaurant_id)).collect();
    diesel::insert_into(operating_hours::table).values(&rows).execute(conn)
}

fn swap_hours(
    conn: &mut PgConnection,
    restaurant_id: i32,
    hours: &[HoursEntry],
) -> QueryResult<usize> {
    use crate::schema::operating_hours;

    diesel::delete(operating_hours::table.filter(operating_hours::restaurant_id.eq(restaurant_id)))
        .execute(conn)?;
    insert_hours(conn, restaurant_id, hours)
}

/// New restaurants start unapproved and are invisible to search and booking.
pub fn create_restaurant(
    conn: &mut PgConnection,
    actor: &Actor,
    new_restaurant: &NewRestaurant,
    hours: &[HoursEntry],
) -> Result<RestaurantDetails, ServiceError> {
    use crate::schema::restaurants;

    actor.require_manager_role()?;

    conn.transaction(|conn| {
        let restaurant = diesel::insert_into(restaurants::table)
            .values(new_restaurant)
            .returning(Restaurant::as_returning())
            .get_result(conn)?;

        insert_hours(conn, restaurant.id, hours)?;
        let operating_hours = hours_of(conn, restaurant.id)?;

        log::info!(
            "restaurant {} '{}' created by user {}",
            restaurant.id,
            restaurant.name,
            actor.user_id
        );

        Ok(RestaurantDetails { restaurant, operating_hours, tables: Vec::new() })
    })
}

/// Approved restaurants are public; unapproved ones are visible only to
/// their manager and admins.
pub fn restaurant_details(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: Option<&Actor>,
) -> Result<RestaurantDetails, ServiceError> {
    let restaurant = restaurant_by_id(conn, restaurant_id)?;
    let visible =
        restaurant.is_approved || actor.map_or(false, |a| a.manages(restaurant.manager_id));
    if !visible {
        return Err(ServiceError::not_found("restaurant not found"));
    }

    Ok(RestaurantDetails {
        operating_hours: hours_of(conn, restaurant.id)?,
        tables: tables_of(conn, restaurant.id)?,
        restaurant,
    })
}

/// Replaces the whole weekly schedule in one transaction.
pub fn replace_operating_hours(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
    hours: &[HoursEntry],
    now: NaiveDateTime,
) -> Result<Vec<OperatingHours>, ServiceError> {
    use crate::schema::restaurants;

    conn.transaction(|conn| {
        managed_restaurant(conn, restaurant_id, actor)?;

        swap_hours(conn, restaurant_id, hours)?;
        diesel::update(restaurants::table.find(restaurant_id))
            .set(restaurants::updated_at.eq(now))
            .execute(conn)?;

        log::info!(
            "operating hours of restaurant {} replaced ({} days)",
            restaurant_id,
            hours.len()
        );

        Ok(hours_of(conn, restaurant_id)?)
    })
}

/// Rewrites the restaurant's details, and its weekly schedule when `hours`
/// is given, in one transaction. Approval state and manager are untouched.
pub fn update_restaurant(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
    changes: &RestaurantChanges,
    hours: Option<&[HoursEntry]>,
    now: NaiveDateTime,
) -> Result<RestaurantDetails, ServiceError> {
    use crate::schema::restaurants;

    conn.transaction(|conn| {
        managed_restaurant(conn, restaurant_id, actor)?;

        let restaurant = diesel::update(restaurants::table.find(restaurant_id))
            .set((changes, restaurants::updated_at.eq(now)))
            .returning(Restaurant::as_returning())
            .get_result(conn)?;
        if let Some(hours) = hours {
            swap_hours(conn, restaurant_id, hours)?;
        }

        log::info!("restaurant {} updated by user {}", restaurant_id, actor.user_id);

        Ok(RestaurantDetails {
            operating_hours: hours_of(conn, restaurant_id)?,
            tables: tables_of(conn, restaurant_id)?,
            restaurant,
        })
    })
}

/// The actor's own restaurants by name, approved or not, with review aggregates.
pub fn restaurants_for_manager(
    conn: &mut PgConnection,
    actor: &Actor,
) -> Result<Vec<ManagedRestaurant>, ServiceError> {
    use crate::schema::restaurants;

    actor.require_manager_role()?;

    let owned: Vec<Restaurant> = restaurants::table
        .filter(restaurants::manager_id.eq(actor.user_id))
        .order((restaurants::name.asc(), restaurants::id.asc()))
        .select(Restaurant::as_select())
        .load(conn)?;

    let ids: Vec<i32> = owned.iter().map(|r| r.id).collect();
    let ratings = rating_tallies(conn, &ids)?;

    Ok(owned
        .into_iter()
        .map(|restaurant| {
            let tally = ratings.get(&restaurant.id).copied().unwrap_or_default();
            ManagedRestaurant {
                reviews_count: tally.count,
                average_rating: tally.average(),
                restaurant,
            }
        })
        .collect())
}

/// Restaurants awaiting approval, newest first.
pub fn pending_restaurants(
    conn: &mut PgConnection,
    actor: &Actor,
) -> Result<Vec<PendingRestaurant>, ServiceError> {
    use crate::schema::{restaurants, users};

    actor.require_admin()?;

    let rows: Vec<(Restaurant, String, String, String)> = restaurants::table
        .inner_join(users::table)
        .filter(restaurants::is_approved.eq(false))
        .order((restaurants::created_at.desc(), restaurants::id.desc()))
        .select((Restaurant::as_select(), users::email, users::first_name, users::last_name))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(restaurant, manager_email, first_name, last_name)| PendingRestaurant {
            restaurant,
            manager_email,
            manager_name: format!("{} {}", first_name, last_name),
        })
        .collect())
}

/// Returns the restaurant and whether this call flipped it to approved.
pub fn approve_restaurant(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<(Restaurant, bool), ServiceError> {
    use crate::schema::restaurants;

    actor.require_admin()?;

    conn.transaction(|conn| {
        let restaurant = restaurant_by_id(conn, restaurant_id)?;
        if restaurant.is_approved {
            return Ok((restaurant, false));
        }

        let approved = diesel::update(restaurants::table.find(restaurant_id))
            .set((restaurants::is_approved.eq(true), restaurants::updated_at.eq(now)))
            .returning(Restaurant::as_returning())
            .get_result(conn)?;

        log::info!("restaurant {} approved by user {}", restaurant_id, actor.user_id);
        Ok((approved, true))
    })
}

/// Hours, tables, reservations and reviews go with it.
pub fn delete_restaurant(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
) -> Result<(), ServiceError> {
    use crate::schema::restaurants;

    actor.require_admin()?;

    let deleted = diesel::delete(restaurants::table.find(restaurant_id)).execute(conn)?;
    if deleted == 0 {
        return Err(ServiceError::not_found("restaurant not found"));
    }
    log::info!("restaurant {} deleted by user {}", restaurant_id, actor.user_id);
    Ok(())
}

pub fn list_tables(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
) -> Result<Vec<DiningTable>, ServiceError> {
    managed_restaurant(conn, restaurant_id, actor)?;
    Ok(tables_of(conn, restaurant_id)?)
}

fn duplicate_table_number(err: DieselError) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ServiceError::validation("Table number already exists for this restaurant.")
        }
        other => other.into(),
    }
}

pub fn create_table(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
    fields: DiningTableChanges,
) -> Result<DiningTable, ServiceError> {
    use crate::schema::dining_tables;

    managed_restaurant(conn, restaurant_id, actor)?;

    let new_table = NewDiningTable {
        restaurant_id,
        table_number: fields.table_number,
        capacity: fields.capacity,
    };
    let table = diesel::insert_into(dining_tables::table)
        .values(&new_table)
        .returning(DiningTable::as_returning())
        .get_result(conn)
        .map_err(duplicate_table_number)?;

    log::info!(
        "table {} ({} seats) added to restaurant {}",
        table.table_number,
        table.capacity,
        restaurant_id
    );
    Ok(table)
}

/// Locks the table row until the surrounding transaction ends, so bookings
/// against it wait on their foreign-key check.
fn managed_table(
    conn: &mut PgConnection,
    table_id: i32,
    actor: &Actor,
) -> Result<DiningTable, ServiceError> {
    use crate::schema::dining_tables;

    let table: DiningTable = dining_tables::table
        .find(table_id)
        .select(DiningTable::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("table not found"))?;

    managed_restaurant(conn, table.restaurant_id, actor)?;
    Ok(table)
}

/// Capacity may not drop below the party size of any active reservation on the table.
pub fn update_table(
    conn: &mut PgConnection,
    table_id: i32,
    actor: &Actor,
    changes: &DiningTableChanges,
) -> Result<DiningTable, ServiceError> {
    use crate::schema::{dining_tables, reservations};

    conn.transaction(|conn| {
        managed_table(conn, table_id, actor)?;

        let largest_party: Option<i32> = reservations::table
            .filter(reservations::table_id.eq(table_id))
            .filter(reservations::status.eq_any(ReservationStatus::ACTIVE.to_vec()))
            .select(diesel::dsl::max(reservations::party_size))
            .first(conn)?;
        if let Some(party_size) = largest_party.filter(|&size| size > changes.capacity) {
            return Err(ServiceError::validation(format!(
                "capacity cannot drop below {}, the largest active party on this table",
                party_size
            )));
        }

        diesel::update(dining_tables::table.find(table_id))
            .set(changes)
            .returning(DiningTable::as_returning())
            .get_result(conn)
            .map_err(duplicate_table_number)
    })
}

/// Refused while the table still holds an active reservation.
pub fn delete_table(
    conn: &mut PgConnection,
    table_id: i32,
    actor: &Actor,
) -> Result<(), ServiceError> {
    use crate::schema::{dining_tables, reservations};

    conn.transaction(|conn| {
        managed_table(conn, table_id, actor)?;

        let held: bool = diesel::select(diesel::dsl::exists(
            reservations::table
                .filter(reservations::table_id.eq(table_id))
                .filter(reservations::status.eq_any(ReservationStatus::ACTIVE.to_vec())),
        ))
        .get_result(conn)?;
        if held {
            return Err(ServiceError::validation(
                "table has active reservations and cannot be deleted",
            ));
        }

        diesel::delete(dining_tables::table.find(table_id)).execute(conn)?;
        log::info!("table {} deleted by user {}", table_id, actor.user_id);
        Ok(())
    })
}

/// Visible to the booking customer, the restaurant's manager and admins.
pub fn get_reservation(
    conn: &mut PgConnection,
    reservation_id: i32,
    actor: &Actor,
) -> Result<Reservation, ServiceError> {
    use crate::schema::{reservations, restaurants};

    let (reservation, manager_id): (Reservation, i32) = reservations::table
        .inner_join(restaurants::table)
        .filter(reservations::id.eq(reservation_id))
        .select((Reservation::as_select(), restaurants::manager_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("reservation not found"))?;

    let is_owner = actor.role == Role::Customer && actor.user_id == reservation.customer_id;
    if is_owner || actor.manages(manager_id) {
        Ok(reservation)
    } else {
        Err(ServiceError::forbidden("not allowed to view this reservation"))
    }
}

pub fn reservations_for_customer(
    conn: &mut PgConnection,
    customer_id: i32,
) -> Result<Vec<Reservation>, ServiceError> {
    use crate::schema::reservations;

    Ok(reservations::table
        .filter(reservations::customer_id.eq(customer_id))
        .order((reservations::reservation_date.desc(), reservations::reservation_time.desc()))
        .select(Reservation::as_select())
        .load(conn)?)
}

pub fn reservations_for_restaurant(
    conn: &mut PgConnection,
    restaurant_id: i32,
    actor: &Actor,
    date: Option<NaiveDate>,
) -> Result<Vec<Reservation>, ServiceError> {
    use crate::schema::reservations;

    managed_restaurant(conn, restaurant_id, actor)?;

    let mut query = reservations::table
        .filter(reservations::restaurant_id.eq(restaurant_id))
        .select(Reservation::as_select())
        .into_boxed();
    if let Some(date) = date {
        query = query.filter(reservations::reservation_date.eq(date));
    }

    Ok(query
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
            reservations::id.asc(),
        ))
        .load(conn)?)
}

fn tally(rows: &[(ReservationStatus, NaiveDate)], today: NaiveDate) -> ReservationStats {
    let mut stats = ReservationStats::default();
    for (status, date) in rows {
        stats.total += 1;
        match status {
            ReservationStatus::Pending => stats.pending += 1,
            ReservationStatus::Confirmed => stats.confirmed += 1,
            ReservationStatus::Completed => stats.completed += 1,
            ReservationStatus::Cancelled => stats.cancelled += 1,
        }
        if *date == today {
            stats.today += 1;
        }
    }
    stats
}

/// Counts across every restaurant the actor manages; admins see all of them.
pub fn reservation_stats(
    conn: &mut PgConnection,
    actor: &Actor,
    today: NaiveDate,
) -> Result<ReservationStats, ServiceError> {
    use crate::schema::{reservations, restaurants};

    actor.require_manager_role()?;

    let mut query = reservations::table
        .inner_join(restaurants::table)
        .select((reservations::status, reservations::reservation_date))
        .into_boxed();
    if !actor.is_admin() {
        query = query.filter(restaurants::manager_id.eq(actor.user_id));
    }

    let rows: Vec<(ReservationStatus, NaiveDate)> = query.load(conn)?;
    log::debug!("computed reservation stats over {} rows for user {}", rows.len(), actor.user_id);
    Ok(tally(&rows, today))
}
