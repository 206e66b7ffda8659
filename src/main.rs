use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use tablebook::booking::BookingPolicy;
use tablebook::clock::SystemClock;
use tablebook::config::Config;
use tablebook::db;
use tablebook::notify::{AmqpNotifier, NotificationSender};
use tablebook::routes::{self, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // initialize DB pool outside of `HttpServer::new` so that it is shared across all workers
    let pool = db::initialize_db_pool(&config).map_err(|e| {
        log::error!("could not create database pool: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    if config.run_migrations {
        let mut conn = pool
            .get()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        db::run_migrations(&mut conn).map_err(|e| {
            log::error!("migrations failed: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
    }

    let notifier = if config.amqp.enabled {
        match AmqpNotifier::connect(&config.amqp).await {
            Ok(notifier) => notifier,
            Err(e) => {
                log::warn!("notifications disabled, broker unreachable: {}", e);
                AmqpNotifier::disconnected()
            }
        }
    } else {
        log::info!("notifications disabled by configuration");
        AmqpNotifier::disconnected()
    };
    let notifier: Arc<dyn NotificationSender> = Arc::new(notifier);

    let state = web::Data::new(AppState {
        pool,
        clock: Arc::new(SystemClock),
        notifier,
        policy: BookingPolicy { initial_status: config.initial_status },
    });

    log::info!("starting HTTP server at http://{}:{}", config.bind_address, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(routes::json_config())
            .app_data(routes::query_config())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
