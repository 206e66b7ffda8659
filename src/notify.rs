//! Outbound notifications.
//!
//! Events are published after the database transaction that caused them has
//! committed. Publishing never blocks or fails a request: handlers hand the
//! event to [`notify_in_background`] and move on.

use std::sync::Arc;

use amqprs::{
    callbacks::{DefaultChannelCallback, DefaultConnectionCallback},
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    connection::{Connection, OpenConnectionArguments},
    BasicProperties,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use log::{debug, error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AmqpConfig;
use crate::models::{Reservation, ReservationStatus, Restaurant};

const MAX_PUBLISH_ATTEMPTS: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ReservationCreated {
        reservation_id: i32,
        customer_id: i32,
        restaurant_id: i32,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i32,
        status: ReservationStatus,
    },
    ReservationStatusChanged {
        reservation_id: i32,
        customer_id: i32,
        restaurant_id: i32,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    RestaurantApproved {
        restaurant_id: i32,
        manager_id: i32,
        restaurant_name: String,
    },
}

impl Notification {
    pub fn reservation_created(reservation: &Reservation) -> Self {
        Notification::ReservationCreated {
            reservation_id: reservation.id,
            customer_id: reservation.customer_id,
            restaurant_id: reservation.restaurant_id,
            date: reservation.reservation_date,
            time: reservation.reservation_time,
            party_size: reservation.party_size,
            status: reservation.status,
        }
    }

    pub fn status_changed(reservation: &Reservation, from: ReservationStatus) -> Self {
        Notification::ReservationStatusChanged {
            reservation_id: reservation.id,
            customer_id: reservation.customer_id,
            restaurant_id: reservation.restaurant_id,
            from,
            to: reservation.status,
        }
    }

    pub fn restaurant_approved(restaurant: &Restaurant) -> Self {
        Notification::RestaurantApproved {
            restaurant_id: restaurant.id,
            manager_id: restaurant.manager_id,
            restaurant_name: restaurant.name.clone(),
        }
    }

    pub fn routing_key(&self) -> &'static str {
        match self {
            Notification::ReservationCreated { .. } => "reservation.created",
            Notification::ReservationStatusChanged { .. } => "reservation.status_changed",
            Notification::RestaurantApproved { .. } => "restaurant.approved",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("broker error: {0}")]
    Amqp(#[from] amqprs::error::Error),

    #[error("could not encode notification: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Publishes JSON events to a durable topic exchange.
///
/// A notifier built with [`AmqpNotifier::disconnected`] drops every event;
/// the service runs with one when the broker is disabled or unreachable.
#[derive(Clone)]
pub struct AmqpNotifier {
    connection: Option<Arc<Connection>>,
    exchange: String,
}

impl AmqpNotifier {
    pub async fn connect(config: &AmqpConfig) -> Result<Self, NotifyError> {
        info!("connecting to AMQP broker at {}:{}", config.host, config.port);

        let connection = Connection::open(&OpenConnectionArguments::new(
            &config.host,
            config.port,
            &config.username,
            &config.password,
        ))
        .await?;
        connection.register_callback(DefaultConnectionCallback).await?;

        let setup_channel = connection.open_channel(None).await?;
        setup_channel.register_callback(DefaultChannelCallback).await?;
        setup_channel
            .exchange_declare(
                ExchangeDeclareArguments::new(&config.exchange, "topic").durable(true).finish(),
            )
            .await?;
        let _ = setup_channel.close().await;

        info!("declared notification exchange '{}'", config.exchange);

        Ok(AmqpNotifier {
            connection: Some(Arc::new(connection)),
            exchange: config.exchange.clone(),
        })
    }

    pub fn disconnected() -> Self {
        AmqpNotifier { connection: None, exchange: String::new() }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn fresh_channel(connection: &Connection) -> Result<Channel, NotifyError> {
        let channel = connection.open_channel(None).await?;
        channel.register_callback(DefaultChannelCallback).await?;
        Ok(channel)
    }

    async fn publish_once(
        &self,
        connection: &Connection,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), NotifyError> {
        let channel = Self::fresh_channel(connection).await?;

        let message_id = Uuid::new_v4().to_string();
        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json")
            .with_message_id(&message_id)
            .finish();

        let published = channel
            .basic_publish(
                properties,
                payload,
                BasicPublishArguments::new(&self.exchange, routing_key),
            )
            .await;
        let _ = channel.close().await;
        published?;

        debug!("published {} as message {}", routing_key, message_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for AmqpNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        let Some(connection) = &self.connection else {
            debug!("notifications disabled, dropping {}", notification.routing_key());
            return Ok(());
        };

        let routing_key = notification.routing_key();
        let payload = serde_json::to_vec(&notification)?;
        let mut delay_ms = INITIAL_BACKOFF_MS;

        for attempt in 1..MAX_PUBLISH_ATTEMPTS {
            match self.publish_once(connection, routing_key, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "publishing {} failed (attempt {}/{}), retrying: {}",
                        routing_key, attempt, MAX_PUBLISH_ATTEMPTS, e
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
            }
        }

        self.publish_once(connection, routing_key, payload).await
    }
}

/// Fire-and-forget: failures are logged, never returned to the caller.
pub fn notify_in_background(sender: Arc<dyn NotificationSender>, notification: Notification) {
    tokio::spawn(async move {
        let routing_key = notification.routing_key();
        if let Err(e) = sender.send(notification).await {
            error!("failed to publish {} notification: {}", routing_key, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn reservation() -> Reservation {
        let created =
            NaiveDateTime::parse_from_str("2030-01-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Reservation {
            id: 11,
            customer_id: 5,
            restaurant_id: 2,
            table_id: 7,
            reservation_date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            reservation_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            party_size: 4,
            status: ReservationStatus::Pending,
            special_request: None,
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn created_event_payload() {
        let event = Notification::reservation_created(&reservation());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(event.routing_key(), "reservation.created");
        assert_eq!(json["event"], "reservation_created");
        assert_eq!(json["reservation_id"], 11);
        assert_eq!(json["date"], "2030-01-07");
        assert_eq!(json["time"], "19:00:00");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn status_change_carries_both_states() {
        let mut confirmed = reservation();
        confirmed.status = ReservationStatus::Confirmed;
        let event = Notification::status_changed(&confirmed, ReservationStatus::Pending);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(event.routing_key(), "reservation.status_changed");
        assert_eq!(json["from"], "pending");
        assert_eq!(json["to"], "confirmed");
    }

    #[tokio::test]
    async fn disconnected_notifier_drops_events() {
        let notifier = AmqpNotifier::disconnected();
        assert!(!notifier.is_connected());
        assert!(notifier.send(Notification::reservation_created(&reservation())).await.is_ok());
    }
}
