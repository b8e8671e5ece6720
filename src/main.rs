use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_dispatch::repository::{business_partition, driver_partition};
use order_dispatch::{
    Config, DriverAssignmentStore, KeyValueStore, LineItem, NotificationStore, OrderDraft,
    OrderLifecycleService, OrderStatus, ScyllaStore, SideEffectMode, StatusUpdate,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_dispatch=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order lifecycle demo");

    let config = Config::from_env();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        ScyllaStore::connect(&config.store_node, &config.keyspace, config.request_timeout)
            .await?,
    );

    let mode = if config.strict_side_effects {
        SideEffectMode::Strict
    } else {
        SideEffectMode::BestEffort
    };
    let service = OrderLifecycleService::new(store.clone(), mode);

    // Stand-ins for the identities the calling layer would assert.
    let business_id = Uuid::new_v4();
    let driver_id = Uuid::new_v4();

    // === 1. Place an order ===
    let order = service
        .place_order(
            business_id,
            OrderDraft {
                customer_name: "Marta Soler".to_string(),
                customer_phone: "+34600123456".to_string(),
                items: vec![
                    LineItem::new("Margherita", 2, 950),
                    LineItem::new("Sparkling water", 1, 250),
                ],
                business_notes: Some("ring twice".to_string()),
            },
        )
        .await?;
    tracing::info!("✅ Order {} placed ({} cents)", order.order_number, order.total_cents());

    // === 2. Walk the status chain ===
    service
        .update_order_status(
            business_id,
            order.order_id,
            StatusUpdate {
                note: Some("accepted".to_string()),
                preparation_time_minutes: Some(25),
                ..StatusUpdate::to(OrderStatus::Confirmed)
            },
        )
        .await?;

    for status in [OrderStatus::Preparing, OrderStatus::Ready] {
        service
            .update_order_status(business_id, order.order_id, StatusUpdate::to(status))
            .await?;
    }

    service
        .update_order_status(
            business_id,
            order.order_id,
            StatusUpdate {
                driver_id: Some(driver_id),
                ..StatusUpdate::to(OrderStatus::OutForDelivery)
            },
        )
        .await?;
    tracing::info!("🚚 Order {} handed to driver {}", order.order_number, driver_id);

    let delivered = service
        .update_order_status(
            business_id,
            order.order_id,
            StatusUpdate::to(OrderStatus::Delivered),
        )
        .await?;
    tracing::info!(
        "✅ Order {} delivered after {} status changes",
        delivered.order_number,
        delivered.status_history.len()
    );

    // === 3. Show the fan-out ===
    let notifications = NotificationStore::new(store.clone());
    for notification in notifications
        .list(&business_partition(business_id), 10)
        .await?
    {
        tracing::info!("📬 business: {}", notification.message);
    }
    for notification in notifications.list(&driver_partition(driver_id), 10).await? {
        tracing::info!("📬 driver: {}", notification.message);
    }

    let assignments = DriverAssignmentStore::new(store);
    let work = assignments.for_driver(driver_id).await?;
    tracing::info!("🗂 Driver {} has {} assignment(s)", driver_id, work.len());

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
