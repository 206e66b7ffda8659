//! HTTP surface. Handlers validate input, hand database work to the blocking
//! pool and publish notifications once the write has committed.

use std::sync::Arc;

use actix_web::{delete, error, get, post, put, web, HttpResponse};

use crate::actions;
use crate::auth::{Actor, Role};
use crate::availability;
use crate::booking::{self, BookingPolicy};
use crate::clock::Clock;
use crate::db::DbPool;
use crate::error::ServiceError;
use crate::lifecycle::{self, TransitionOutcome};
use crate::models::{
    ApiResponse, AvailabilityQuery, CreateReservationRequest, CreateTableRequest,
    NewRestaurantRequest, NotesRequest, OperatingHoursInput, ReservationResponse,
    ReservationStatus, RestaurantReservationsQuery, SearchQuery, TransitionRequest,
    TransitionResponse, UpdateRestaurantRequest, UpdateTableRequest,
};
use crate::notify::{notify_in_background, Notification, NotificationSender};
use crate::search;
use crate::validation::{self, AvailabilityParams, BookingRequest};

type HandlerResult = Result<HttpResponse, ServiceError>;

/// Shared by every worker; built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn NotificationSender>,
    pub policy: BookingPolicy,
}

fn message(text: &str) -> ApiResponse {
    ApiResponse { message: text.to_owned() }
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        let response = match err {
            error::JsonPayloadError::ContentType => {
                HttpResponse::UnsupportedMediaType().json(message("Unsupported Media Type"))
            }
            error::JsonPayloadError::Deserialize(ref err) => {
                HttpResponse::BadRequest().json(message(&err.to_string()))
            }
            _ => HttpResponse::BadRequest().json(message(&detail)),
        };
        error::InternalError::from_response(err, response).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(message(&err.to_string()));
        error::InternalError::from_response(err, response).into()
    })
}

#[get("/health")]
async fn health() -> HandlerResult {
    Ok(HttpResponse::Ok().json(message("ok")))
}

#[get("/restaurants/search")]
async fn search_restaurants(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> HandlerResult {
    let filters = validation::search_filters(&query)?;
    let pool = state.pool.clone();
    let today = state.clock.now().date();

    let results = web::block(move || {
        let mut conn = pool.get()?;
        Ok::<_, ServiceError>(search::search_restaurants(&mut conn, today, &filters)?)
    })
    .await??;

    Ok(HttpResponse::Ok().json(results))
}

#[get("/reservations/availability")]
async fn find_availability(
    state: web::Data<AppState>,
    query: web::Query<AvailabilityQuery>,
) -> HandlerResult {
    let params = AvailabilityParams::parse(&query)?;
    let pool = state.pool.clone();

    let result = web::block(move || {
        let mut conn = pool.get()?;
        Ok::<_, ServiceError>(availability::find_availability(&mut conn, &params)?)
    })
    .await??;

    Ok(HttpResponse::Ok().json(result))
}

#[post("/reservations")]
async fn create_reservation(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Json<CreateReservationRequest>,
) -> HandlerResult {
    if actor.role != Role::Customer {
        return Err(ServiceError::forbidden("only customers can book tables"));
    }
    let request = BookingRequest::parse(actor.user_id, &form)?;

    let pool = state.pool.clone();
    let clock = state.clock.clone();
    let policy = state.policy;
    let reservation = web::block(move || {
        let mut conn = pool.get()?;
        booking::create_reservation(&mut conn, clock.as_ref(), policy, &request)
    })
    .await??;

    notify_in_background(
        state.notifier.clone(),
        Notification::reservation_created(&reservation),
    );

    Ok(HttpResponse::Created().json(ReservationResponse {
        message: "reservation created".to_owned(),
        reservation,
    }))
}

#[get("/reservations/mine")]
async fn my_reservations(state: web::Data<AppState>, actor: Actor) -> HandlerResult {
    let pool = state.pool.clone();
    let reservations = web::block(move || {
        let mut conn = pool.get()?;
        actions::reservations_for_customer(&mut conn, actor.user_id)
    })
    .await??;

    Ok(HttpResponse::Ok().json(reservations))
}

#[get("/reservations/stats")]
async fn reservation_stats(state: web::Data<AppState>, actor: Actor) -> HandlerResult {
    actor.require_manager_role()?;
    let pool = state.pool.clone();
    let today = state.clock.now().date();

    let stats = web::block(move || {
        let mut conn = pool.get()?;
        actions::reservation_stats(&mut conn, &actor, today)
    })
    .await??;

    Ok(HttpResponse::Ok().json(stats))
}

#[get("/reservations/{id}")]
async fn get_reservation(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    let reservation_id = path.into_inner();
    let pool = state.pool.clone();

    let reservation = web::block(move || {
        let mut conn = pool.get()?;
        actions::get_reservation(&mut conn, reservation_id, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(reservation))
}

async fn apply_transition(
    state: &web::Data<AppState>,
    actor: Actor,
    reservation_id: i32,
    to: ReservationStatus,
) -> HandlerResult {
    let pool = state.pool.clone();
    let now = state.clock.now();

    let outcome: TransitionOutcome = web::block(move || {
        let mut conn = pool.get()?;
        lifecycle::transition_reservation(&mut conn, reservation_id, &actor, to, now)
    })
    .await??;

    if outcome.changed {
        notify_in_background(
            state.notifier.clone(),
            Notification::status_changed(&outcome.reservation, outcome.previous_status),
        );
    }

    let message = if outcome.changed {
        format!("reservation {}", outcome.reservation.status)
    } else {
        format!("reservation already {}", outcome.reservation.status)
    };
    Ok(HttpResponse::Ok().json(TransitionResponse {
        message,
        changed: outcome.changed,
        reservation: outcome.reservation,
    }))
}

#[put("/reservations/{id}/status")]
async fn transition_reservation(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    form: web::Json<TransitionRequest>,
) -> HandlerResult {
    apply_transition(&state, actor, path.into_inner(), form.status).await
}

#[post("/reservations/{id}/cancel")]
async fn cancel_reservation(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    apply_transition(&state, actor, path.into_inner(), ReservationStatus::Cancelled).await
}

#[put("/reservations/{id}/notes")]
async fn update_notes(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    form: web::Json<NotesRequest>,
) -> HandlerResult {
    let notes = validation::parse_notes(form.notes.as_deref())?;
    let reservation_id = path.into_inner();
    let pool = state.pool.clone();
    let now = state.clock.now();

    let reservation = web::block(move || {
        let mut conn = pool.get()?;
        lifecycle::update_notes(&mut conn, reservation_id, &actor, notes, now)
    })
    .await??;

    Ok(HttpResponse::Ok().json(reservation))
}

#[post("/restaurants")]
async fn create_restaurant(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Json<NewRestaurantRequest>,
) -> HandlerResult {
    actor.require_manager_role()?;
    let (new_restaurant, hours) = validation::new_restaurant(actor.user_id, &form)?;
    let pool = state.pool.clone();

    let details = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_restaurant(&mut conn, &actor, &new_restaurant, &hours)
    })
    .await??;

    Ok(HttpResponse::Created().json(details))
}

#[get("/restaurants/manager/list")]
async fn my_restaurants(state: web::Data<AppState>, actor: Actor) -> HandlerResult {
    actor.require_manager_role()?;
    let pool = state.pool.clone();

    let restaurants = web::block(move || {
        let mut conn = pool.get()?;
        actions::restaurants_for_manager(&mut conn, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(restaurants))
}

#[get("/restaurants/pending")]
async fn pending_restaurants(state: web::Data<AppState>, actor: Actor) -> HandlerResult {
    actor.require_admin()?;
    let pool = state.pool.clone();

    let restaurants = web::block(move || {
        let mut conn = pool.get()?;
        actions::pending_restaurants(&mut conn, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(restaurants))
}

#[get("/restaurants/{id}")]
async fn restaurant_details(
    state: web::Data<AppState>,
    actor: Option<Actor>,
    path: web::Path<i32>,
) -> HandlerResult {
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();

    let details = web::block(move || {
        let mut conn = pool.get()?;
        actions::restaurant_details(&mut conn, restaurant_id, actor.as_ref())
    })
    .await??;

    Ok(HttpResponse::Ok().json(details))
}

#[put("/restaurants/{id}")]
async fn update_restaurant(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    form: web::Json<UpdateRestaurantRequest>,
) -> HandlerResult {
    actor.require_manager_role()?;
    let (changes, hours) = validation::restaurant_update(&form)?;
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();
    let now = state.clock.now();

    let details = web::block(move || {
        let mut conn = pool.get()?;
        actions::update_restaurant(
            &mut conn,
            restaurant_id,
            &actor,
            &changes,
            hours.as_deref(),
            now,
        )
    })
    .await??;

    Ok(HttpResponse::Ok().json(details))
}

#[put("/restaurants/{id}/hours")]
async fn replace_operating_hours(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    form: web::Json<Vec<OperatingHoursInput>>,
) -> HandlerResult {
    let hours = validation::operating_hours(&form)?;
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();
    let now = state.clock.now();

    let saved = web::block(move || {
        let mut conn = pool.get()?;
        actions::replace_operating_hours(&mut conn, restaurant_id, &actor, &hours, now)
    })
    .await??;

    Ok(HttpResponse::Ok().json(saved))
}

#[post("/restaurants/{id}/approve")]
async fn approve_restaurant(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    actor.require_admin()?;
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();
    let now = state.clock.now();

    let (restaurant, newly_approved) = web::block(move || {
        let mut conn = pool.get()?;
        actions::approve_restaurant(&mut conn, restaurant_id, &actor, now)
    })
    .await??;

    if newly_approved {
        notify_in_background(
            state.notifier.clone(),
            Notification::restaurant_approved(&restaurant),
        );
    }

    Ok(HttpResponse::Ok().json(restaurant))
}

#[delete("/restaurants/{id}")]
async fn delete_restaurant(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    actor.require_admin()?;
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();

    web::block(move || {
        let mut conn = pool.get()?;
        actions::delete_restaurant(&mut conn, restaurant_id, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(message("restaurant deleted")))
}

#[get("/restaurants/{id}/reservations")]
async fn restaurant_reservations(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    query: web::Query<RestaurantReservationsQuery>,
) -> HandlerResult {
    let date = query
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(validation::parse_date)
        .transpose()?;
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();

    let reservations = web::block(move || {
        let mut conn = pool.get()?;
        actions::reservations_for_restaurant(&mut conn, restaurant_id, &actor, date)
    })
    .await??;

    Ok(HttpResponse::Ok().json(reservations))
}

#[get("/restaurants/{id}/tables")]
async fn restaurant_tables(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    let restaurant_id = path.into_inner();
    let pool = state.pool.clone();

    let tables = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_tables(&mut conn, restaurant_id, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(tables))
}

#[post("/tables")]
async fn create_table(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Json<CreateTableRequest>,
) -> HandlerResult {
    actor.require_manager_role()?;
    let fields = validation::table_fields(&form.table_number, form.capacity)?;
    let restaurant_id = form.restaurant_id;
    let pool = state.pool.clone();

    let table = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_table(&mut conn, restaurant_id, &actor, fields)
    })
    .await??;

    Ok(HttpResponse::Created().json(table))
}

#[put("/tables/{id}")]
async fn update_table(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
    form: web::Json<UpdateTableRequest>,
) -> HandlerResult {
    actor.require_manager_role()?;
    let changes = validation::table_fields(&form.table_number, form.capacity)?;
    let table_id = path.into_inner();
    let pool = state.pool.clone();

    let table = web::block(move || {
        let mut conn = pool.get()?;
        actions::update_table(&mut conn, table_id, &actor, &changes)
    })
    .await??;

    Ok(HttpResponse::Ok().json(table))
}

#[delete("/tables/{id}")]
async fn delete_table(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<i32>,
) -> HandlerResult {
    actor.require_manager_role()?;
    let table_id = path.into_inner();
    let pool = state.pool.clone();

    web::block(move || {
        let mut conn = pool.get()?;
        actions::delete_table(&mut conn, table_id, &actor)
    })
    .await??;

    Ok(HttpResponse::Ok().json(message("table deleted")))
}

/// Static segments are registered ahead of `{id}` routes sharing a prefix.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(search_restaurants)
        .service(find_availability)
        .service(create_reservation)
        .service(my_reservations)
        .service(reservation_stats)
        .service(get_reservation)
        .service(transition_reservation)
        .service(cancel_reservation)
        .service(update_notes)
        .service(create_restaurant)
        .service(my_restaurants)
        .service(pending_restaurants)
        .service(restaurant_details)
        .service(update_restaurant)
        .service(replace_operating_hours)
        .service(approve_restaurant)
        .service(delete_restaurant)
        .service(restaurant_reservations)
        .service(restaurant_tables)
        .service(create_table)
        .service(update_table)
        .service(delete_table);
}
