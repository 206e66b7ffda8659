//! Shared fixtures for tests that need a live Postgres.
//!
//! Set `TEST_DATABASE_URL` to a disposable database to run them; without it
//! every database test returns early. Fixtures create fresh users and
//! restaurants per test, so tests can share the database and run in parallel.

#![allow(dead_code)]

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use uuid::Uuid;

use tablebook::actions;
use tablebook::auth::{Actor, Role};
use tablebook::db::{self, DbPool};
use tablebook::models::{DiningTable, DiningTableChanges, NewRestaurant, Restaurant};
use tablebook::schema::{restaurants, reviews, users};
use tablebook::validation::HoursEntry;

/// Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

/// Tuesday.
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 8).unwrap()
}

pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn test_pool() -> Option<DbPool> {
    static POOL: OnceLock<Option<DbPool>> = OnceLock::new();

    POOL.get_or_init(|| {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set, skipping database tests");
                return None;
            }
        };

        let pool = Pool::builder()
            .max_size(8)
            .build(ConnectionManager::<PgConnection>::new(url))
            .expect("test database should be reachable");
        let mut conn = pool.get().expect("test database connection");
        db::run_migrations(&mut conn).expect("migrations should apply");
        Some(pool)
    })
    .clone()
}

pub fn insert_user(conn: &mut PgConnection, role: &str) -> i32 {
    diesel::insert_into(users::table)
        .values((
            users::email.eq(format!("{}@example.test", Uuid::new_v4())),
            users::first_name.eq("Test"),
            users::last_name.eq("User"),
            users::role.eq(role),
        ))
        .returning(users::id)
        .get_result(conn)
        .expect("insert user")
}

pub fn customer(conn: &mut PgConnection) -> Actor {
    Actor { user_id: insert_user(conn, "customer"), role: Role::Customer }
}

pub fn manager(conn: &mut PgConnection) -> Actor {
    Actor { user_id: insert_user(conn, "restaurant_manager"), role: Role::RestaurantManager }
}

pub fn admin(conn: &mut PgConnection) -> Actor {
    Actor { user_id: insert_user(conn, "admin"), role: Role::Admin }
}

/// A city name no other test uses, for search isolation.
pub fn unique_city() -> String {
    format!("City {}", &Uuid::new_v4().simple().to_string()[..12])
}

pub struct RestaurantFixture {
    pub name: String,
    pub city: String,
    pub cuisine_type: String,
    pub cost_rating: i32,
    pub approved: bool,
    pub hours: Vec<(Weekday, NaiveTime, NaiveTime)>,
    pub tables: Vec<(&'static str, i32)>,
}

impl Default for RestaurantFixture {
    fn default() -> Self {
        RestaurantFixture {
            name: "Bistro".to_owned(),
            city: unique_city(),
            cuisine_type: "French".to_owned(),
            cost_rating: 3,
            approved: true,
            hours: vec![(Weekday::Mon, time(9, 0), time(22, 0))],
            tables: vec![("T1", 4)],
        }
    }
}

pub struct Seeded {
    pub restaurant: Restaurant,
    pub manager: Actor,
    pub tables: Vec<DiningTable>,
}

pub fn seed_restaurant(conn: &mut PgConnection, fixture: RestaurantFixture) -> Seeded {
    let owner = manager(conn);
    let new_restaurant = NewRestaurant {
        manager_id: owner.user_id,
        name: fixture.name,
        description: None,
        cuisine_type: fixture.cuisine_type,
        address_line1: "1 Main Street".to_owned(),
        city: fixture.city,
        zip_code: "73301".to_owned(),
        phone: None,
        cost_rating: fixture.cost_rating,
    };
    let hours: Vec<HoursEntry> = fixture
        .hours
        .iter()
        .map(|(day, opening_time, closing_time)| HoursEntry {
            day: *day,
            opening_time: *opening_time,
            closing_time: *closing_time,
        })
        .collect();

    let details = actions::create_restaurant(conn, &owner, &new_restaurant, &hours)
        .expect("create restaurant");
    let restaurant_id = details.restaurant.id;

    let tables = fixture
        .tables
        .iter()
        .map(|(number, capacity)| {
            let fields =
                DiningTableChanges { table_number: (*number).to_owned(), capacity: *capacity };
            actions::create_table(conn, restaurant_id, &owner, fields).expect("create table")
        })
        .collect();

    let restaurant = if fixture.approved {
        actions::approve_restaurant(conn, restaurant_id, &Actor::system(), now())
            .expect("approve restaurant")
            .0
    } else {
        details.restaurant
    };

    Seeded { restaurant, manager: owner, tables }
}

pub fn add_review(conn: &mut PgConnection, restaurant_id: i32, rating: i32) {
    let reviewer = insert_user(conn, "customer");
    diesel::insert_into(reviews::table)
        .values((
            reviews::restaurant_id.eq(restaurant_id),
            reviews::customer_id.eq(reviewer),
            reviews::rating.eq(rating),
        ))
        .execute(conn)
        .expect("insert review");
}

pub fn set_approved(conn: &mut PgConnection, restaurant_id: i32, approved: bool) {
    diesel::update(restaurants::table.find(restaurant_id))
        .set(restaurants::is_approved.eq(approved))
        .execute(conn)
        .expect("update approval");
}
