//! Reservation Lifecycle Manager.
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            │
//!    └──────┬─────┘
//!           ▼
//!       cancelled
//! ```
//!
//! Managers (of the owning restaurant), admins and the system drive every
//! edge. Customers may only cancel their own reservation, and only before
//! it starts. Cancelling a cancelled reservation succeeds without a write.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::auth::{Actor, Role};
use crate::error::ServiceError;
use crate::models::{Reservation, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply { from: ReservationStatus, to: ReservationStatus },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub reservation: Reservation,
    pub previous_status: ReservationStatus,
    pub changed: bool,
}

pub fn is_allowed_edge(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;

    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, Completed)
            | (Confirmed, Cancelled)
    )
}

/// Decides whether `actor` may move `reservation` to `to`, without touching storage.
pub fn plan_transition(
    reservation: &Reservation,
    restaurant_manager_id: i32,
    actor: &Actor,
    to: ReservationStatus,
    now: NaiveDateTime,
) -> Result<Transition, ServiceError> {
    let from = reservation.status;
    let acts_for_restaurant = actor.manages(restaurant_manager_id);
    let is_owner = actor.role == Role::Customer && actor.user_id == reservation.customer_id;

    if !acts_for_restaurant && !is_owner {
        return Err(ServiceError::forbidden("not allowed to change this reservation"));
    }

    if from == ReservationStatus::Cancelled && to == ReservationStatus::Cancelled {
        return Ok(Transition::Unchanged);
    }

    if !acts_for_restaurant {
        if to != ReservationStatus::Cancelled {
            return Err(ServiceError::forbidden("customers may only cancel their reservations"));
        }
        if reservation.starts_at() <= now {
            log::debug!("reservation {} already started, customer cancel refused", reservation.id);
            return Err(ServiceError::InvalidTransition { from, to });
        }
    }

    if is_allowed_edge(from, to) {
        Ok(Transition::Apply { from, to })
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

pub fn transition_reservation(
    conn: &mut PgConnection,
    reservation_id: i32,
    actor: &Actor,
    to: ReservationStatus,
    now: NaiveDateTime,
) -> Result<TransitionOutcome, ServiceError> {
    use crate::schema::{reservations, restaurants};

    conn.transaction(|conn| {
        let reservation: Reservation = reservations::table
            .find(reservation_id)
            .select(Reservation::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| ServiceError::not_found("reservation not found"))?;

        let manager_id: i32 = restaurants::table
            .find(reservation.restaurant_id)
            .select(restaurants::manager_id)
            .first(conn)?;

        match plan_transition(&reservation, manager_id, actor, to, now)? {
            Transition::Unchanged => Ok(TransitionOutcome {
                previous_status: reservation.status,
                reservation,
                changed: false,
            }),
            Transition::Apply { from, to } => {
                let updated = diesel::update(reservations::table.find(reservation_id))
                    .set((reservations::status.eq(to), reservations::updated_at.eq(now)))
                    .returning(Reservation::as_returning())
                    .get_result(conn)?;

                log::info!(
                    "reservation {} moved from {} to {} by user {}",
                    reservation_id,
                    from,
                    to,
                    actor.user_id
                );

                Ok(TransitionOutcome {
                    reservation: updated,
                    previous_status: from,
                    changed: true,
                })
            }
        }
    })
}

/// Manager-only free-text notes; last write wins.
pub fn update_notes(
    conn: &mut PgConnection,
    reservation_id: i32,
    actor: &Actor,
    notes: Option<String>,
    now: NaiveDateTime,
) -> Result<Reservation, ServiceError> {
    use crate::schema::{reservations, restaurants};

    let (reservation_id, manager_id): (i32, i32) = reservations::table
        .inner_join(restaurants::table)
        .filter(reservations::id.eq(reservation_id))
        .select((reservations::id, restaurants::manager_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("reservation not found"))?;

    if !actor.manages(manager_id) {
        return Err(ServiceError::forbidden("only the restaurant manager can edit notes"));
    }

    let reservation = diesel::update(reservations::table.find(reservation_id))
        .set((reservations::notes.eq(notes), reservations::updated_at.eq(now)))
        .returning(Reservation::as_returning())
        .get_result(conn)?;

    Ok(reservation)
}
