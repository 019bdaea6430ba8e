// crates/sync/examples/sync_demo.rs
//! Demonstration of a full sync cycle between two in-process devices

use chrono::Utc;
use std::sync::Arc;
use tether_codec::{encode, ChunkBuffer};
use tether_core::{DeviceId, EntityKind, FieldMap, ObjectId, ScalarValue, Watermark};
use tether_store::{DeviceStore, MemoryStore, WatermarkFile};
use tether_sync::{ChangeTracker, MergeEngine, SchemaRegistry, SyncConfig, SyncOrchestrator};
use tether_transport::{ChannelTransport, Transport};

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("Tether Sync Demo");
    println!("================\n");

    let (phone_end, watch_end) = ChannelTransport::pair();
    let phone_store = MemoryStore::new();
    let watch_store = MemoryStore::new();

    // Edits made on the phone
    println!("Phone: creating two reminders");
    for title in ["water the plants", "pick up parcel"] {
        let mut fields = FieldMap::new();
        fields.insert("title".to_string(), ScalarValue::from(title));
        fields.insert("completed".to_string(), ScalarValue::Flag(false));
        phone_store
            .write_fields(
                ObjectId::new(),
                EntityKind::Reminder,
                &fields,
                Utc::now(),
                &DeviceId::from_string("phone".to_string()),
            )
            .await
            .unwrap();
    }

    // A weather refresh made on the watch
    println!("Watch: caching a weather snapshot");
    let mut fields = FieldMap::new();
    fields.insert("location".to_string(), ScalarValue::from("Lisbon"));
    fields.insert("temperature_c".to_string(), ScalarValue::from(27.0));
    watch_store
        .write_fields(
            ObjectId::new(),
            EntityKind::WeatherCache,
            &fields,
            Utc::now(),
            &DeviceId::from_string("watch".to_string()),
        )
        .await
        .unwrap();

    // The watch side answers each inbound transmission with its own changes
    let responder = spawn_watch(watch_end, watch_store.clone());

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = SyncOrchestrator::new(
        SyncConfig::default(),
        DeviceId::from_string("phone".to_string()),
        Arc::new(phone_store.clone()),
        Arc::new(phone_end),
        WatermarkFile::new(dir.path().join("watermark.json")),
    )
    .unwrap();

    println!("\nRunning one sync cycle...");
    let report = orchestrator.sync_once().await.unwrap();

    println!("\nCycle report:");
    println!("  Sent:      {} records", report.outbound_records);
    println!("  Applied:   {} records", report.merge.applied);
    println!("  Duration:  {:?}", report.duration);
    println!("  Watermark: {}", orchestrator.watermark().instant());

    let mutations = phone_store
        .query_mutated_since(chrono::DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap();
    println!("\nPhone store now holds {} objects", mutations.len());
    println!("\n✓ Devices synced successfully");

    responder.abort();
}

fn spawn_watch(endpoint: ChannelTransport, store: MemoryStore) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let registry = Arc::new(SchemaRegistry::with_defaults());
        let store: Arc<dyn DeviceStore> = Arc::new(store);
        let tracker = ChangeTracker::new(Arc::clone(&store), Arc::clone(&registry), 500);
        let merge = MergeEngine::new(store, registry);
        let mut buffer = ChunkBuffer::new();
        let mut watermark = Watermark::origin();

        loop {
            let Ok(payload) = endpoint.recv().await else {
                return;
            };
            let Ok(Some(inbound)) = buffer.accept(payload) else {
                continue;
            };

            let cycle_start = Utc::now();
            let Ok(batch) = tracker.changes_since(&watermark).await else {
                return;
            };
            let Ok(reply) = encode(&batch.changeset, 16 * 1024) else {
                return;
            };
            for chunk in reply {
                if endpoint.send(chunk).await.is_err() {
                    return;
                }
            }
            if merge.apply(&inbound).await.is_err() {
                return;
            }
            watermark.advance_to(cycle_start);
        }
    })
}
