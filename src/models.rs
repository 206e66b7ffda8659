use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use crate::schema::{dining_tables, operating_hours, reservations, restaurants};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types::Text,
    AsChangeset, Insertable, Selectable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::ReservationStatus)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Statuses that hold a table at their slot.
    pub const ACTIVE: [ReservationStatus; 2] =
        [ReservationStatus::Pending, ReservationStatus::Confirmed];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("Unrecognized reservation status: {}", other)),
        }
    }
}

impl ToSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        <String as FromSql<Text, Pg>>::from_sql(bytes)?
            .parse()
            .map_err(Into::into)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Restaurant {
    pub id: i32,
    pub manager_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub cuisine_type: String,
    pub address_line1: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub cost_rating: i32,
    pub is_approved: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = restaurants)]
pub struct NewRestaurant {
    pub manager_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub cuisine_type: String,
    pub address_line1: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub cost_rating: i32,
}

/// Full replacement of a restaurant's editable details; `None` clears the column.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = restaurants)]
#[diesel(treat_none_as_null = true)]
pub struct RestaurantChanges {
    pub name: String,
    pub description: Option<String>,
    pub cuisine_type: String,
    pub address_line1: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub cost_rating: i32,
}

impl RestaurantChanges {
    pub fn with_manager(self, manager_id: i32) -> NewRestaurant {
        NewRestaurant {
            manager_id,
            name: self.name,
            description: self.description,
            cuisine_type: self.cuisine_type,
            address_line1: self.address_line1,
            city: self.city,
            zip_code: self.zip_code,
            phone: self.phone,
            cost_rating: self.cost_rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = operating_hours)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OperatingHours {
    pub id: i32,
    pub restaurant_id: i32,
    pub day_of_week: String,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

impl OperatingHours {
    /// Both ends inclusive; intervals never wrap past midnight.
    pub fn is_open_at(&self, time: NaiveTime) -> bool {
        self.opening_time <= time && time <= self.closing_time
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = operating_hours)]
pub struct NewOperatingHours {
    pub restaurant_id: i32,
    pub day_of_week: String,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = dining_tables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DiningTable {
    pub id: i32,
    pub restaurant_id: i32,
    pub table_number: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dining_tables)]
pub struct NewDiningTable {
    pub restaurant_id: i32,
    pub table_number: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = dining_tables)]
pub struct DiningTableChanges {
    pub table_number: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = reservations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reservation {
    pub id: i32,
    pub customer_id: i32,
    pub restaurant_id: i32,
    pub table_id: i32,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub special_request: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Reservation {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.reservation_date.and_time(self.reservation_time)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub customer_id: i32,
    pub restaurant_id: i32,
    pub table_id: i32,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub special_request: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// Request/Response models for API
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationRequest {
    pub restaurant_id: i32,
    pub reservation_date: String,
    pub reservation_time: String,
    pub party_size: i32,
    pub special_request: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub restaurant_id: i32,
    pub date: String,
    pub time: Option<String>,
    pub party_size: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub location: Option<String>,
    pub cuisine_type: Option<String>,
    pub price_range: Option<i32>,
    pub rating: Option<f64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub party_size: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantReservationsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatingHoursInput {
    pub day_of_week: String,
    pub opening_time: String,
    pub closing_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantFields {
    pub name: String,
    pub description: Option<String>,
    pub cuisine_type: String,
    pub address_line1: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub cost_rating: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRestaurantRequest {
    #[serde(flatten)]
    pub fields: RestaurantFields,
    #[serde(default)]
    pub operating_hours: Vec<OperatingHoursInput>,
}

/// Omitting `operating_hours` keeps the current schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRestaurantRequest {
    #[serde(flatten)]
    pub fields: RestaurantFields,
    #[serde(default)]
    pub operating_hours: Option<Vec<OperatingHoursInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTableRequest {
    pub restaurant_id: i32,
    pub table_number: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTableRequest {
    pub table_number: String,
    pub capacity: i32,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub message: String,
    pub reservation: Reservation,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub message: String,
    pub changed: bool,
    pub reservation: Reservation,
}

#[derive(Debug, Serialize)]
pub struct RestaurantDetails {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub operating_hours: Vec<OperatingHours>,
    pub tables: Vec<DiningTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedRestaurant {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingRestaurant {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub manager_email: String,
    pub manager_name: String,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReservationStats {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub today: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub message: String,
}
