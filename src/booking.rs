//! Reservation Writer.
//!
//! Checks and insert share one transaction. Two writers that pick the same
//! table for the same slot cannot both commit: the partial unique index
//! `reservations_active_slot_idx` rejects the second insert, which surfaces
//! here as [`ServiceError::Conflict`]. A conflict is retried once with a
//! fresh transaction; a second conflict is reported as `Unavailable`.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::availability::{
    candidate_tables, choose_table, free_tables, hours_for_date, is_bookable_restaurant, is_open_at,
};
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::models::{NewReservation, Reservation, ReservationStatus};
use crate::validation::BookingRequest;

const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub initial_status: ReservationStatus,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        BookingPolicy { initial_status: ReservationStatus::Pending }
    }
}

pub fn create_reservation(
    conn: &mut PgConnection,
    clock: &dyn Clock,
    policy: BookingPolicy,
    request: &BookingRequest,
) -> Result<Reservation, ServiceError> {
    let now = clock.now();
    if request.date.and_time(request.time) <= now {
        return Err(ServiceError::validation("reservation time must be in the future"));
    }

    for attempt in 1..=MAX_ATTEMPTS {
        match try_create_reservation(conn, now, policy, request) {
            Err(ServiceError::Conflict) if attempt < MAX_ATTEMPTS => {
                log::info!(
                    "booking conflict for restaurant {} at {} {}, retrying",
                    request.restaurant_id,
                    request.date,
                    request.time
                );
            }
            Err(ServiceError::Conflict) => {
                log::info!(
                    "booking conflict for restaurant {} at {} {} persisted after {} attempts",
                    request.restaurant_id,
                    request.date,
                    request.time,
                    MAX_ATTEMPTS
                );
                return Err(ServiceError::Unavailable);
            }
            other => return other,
        }
    }

    Err(ServiceError::Unavailable)
}

/// One attempt: every precondition plus the insert, in a single transaction.
pub fn try_create_reservation(
    conn: &mut PgConnection,
    now: NaiveDateTime,
    policy: BookingPolicy,
    request: &BookingRequest,
) -> Result<Reservation, ServiceError> {
    use crate::schema::reservations::dsl::reservations;

    conn.transaction(|conn| {
        if !is_bookable_restaurant(conn, request.restaurant_id)? {
            return Err(ServiceError::not_found("restaurant not found"));
        }

        if candidate_tables(conn, request.restaurant_id, request.party_size)?.is_empty() {
            return Err(ServiceError::not_found(format!(
                "no table seats a party of {}",
                request.party_size
            )));
        }

        let free = free_tables(
            conn,
            request.restaurant_id,
            request.date,
            request.time,
            request.party_size,
        )?;
        let table = choose_table(&free).ok_or(ServiceError::Unavailable)?;

        let hours = hours_for_date(conn, request.restaurant_id, request.date)?;
        if !is_open_at(&hours, request.time) {
            return Err(ServiceError::OutOfHours);
        }

        let new_reservation = NewReservation {
            customer_id: request.customer_id,
            restaurant_id: request.restaurant_id,
            table_id: table.id,
            reservation_date: request.date,
            reservation_time: request.time,
            party_size: request.party_size,
            status: policy.initial_status,
            special_request: request.special_request.clone(),
            created_at: now,
            updated_at: now,
        };

        let reservation = diesel::insert_into(reservations)
            .values(&new_reservation)
            .returning(Reservation::as_returning())
            .get_result(conn)?;

        log::info!(
            "reservation {} created for table {} at {} {}",
            reservation.id,
            reservation.table_id,
            reservation.reservation_date,
            reservation.reservation_time
        );

        Ok(reservation)
    })
}
