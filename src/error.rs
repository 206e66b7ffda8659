//! Error taxonomy shared by the booking core and its HTTP surface.
//!
//! Business-rule rejections (`Unavailable`, `OutOfHours`,
//! `InvalidTransition`) are ordinary outcomes and are never logged at error
//! level. `System` carries infrastructure detail for the logs only; the
//! response body is always the generic message.

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::models::{ApiResponse, ReservationStatus};

pub const SYSTEM_ERROR_MESSAGE: &str = "something went wrong, please try again later";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("no table available for that time")]
    Unavailable,

    #[error("the restaurant is not open at that time")]
    OutOfHours,

    #[error("the table was just booked by someone else, please try again")]
    Conflict,

    #[error("cannot move a reservation from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("system error: {0}")]
    System(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::System(_) => SYSTEM_ERROR_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }
}

/// Names the missing row from a Postgres `<table>_<column>_fkey` constraint.
fn missing_reference(constraint: Option<&str>) -> ServiceError {
    let what = match constraint.unwrap_or_default() {
        name if name.ends_with("customer_id_fkey") || name.ends_with("manager_id_fkey") => {
            "unknown user"
        }
        name if name.ends_with("table_id_fkey") => "table not found",
        name if name.ends_with("restaurant_id_fkey") => "restaurant not found",
        _ => "referenced record not found",
    };
    ServiceError::not_found(what)
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ServiceError::not_found("record not found"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ServiceError::Conflict
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                log::debug!("foreign key violation: {}", info.message());
                missing_reference(info.constraint_name())
            }
            other => ServiceError::System(format!("database error: {}", other)),
        }
    }
}

impl From<r2d2::Error> for ServiceError {
    fn from(err: r2d2::Error) -> Self {
        ServiceError::System(format!("connection pool error: {}", err))
    }
}

impl From<BlockingError> for ServiceError {
    fn from(err: BlockingError) -> Self {
        ServiceError::System(format!("blocking task failed: {}", err))
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unavailable
            | ServiceError::Conflict
            | ServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ServiceError::OutOfHours => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::System(detail) => log::error!("request failed: {}", detail),
            ServiceError::Forbidden(_)
            | ServiceError::Unavailable
            | ServiceError::OutOfHours
            | ServiceError::Conflict
            | ServiceError::InvalidTransition { .. } => log::info!("request rejected: {}", self),
            _ => log::debug!("request rejected: {}", self),
        }

        HttpResponse::build(self.status_code())
            .json(ApiResponse { message: self.public_message() })
    }
}
