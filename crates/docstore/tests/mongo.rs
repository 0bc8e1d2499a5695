//! Controller tests against a live MongoDB.
//!
//! Gated behind the `integration` feature:
//!
//! ```text
//! MONGODB_URI=mongodb://localhost:27017 cargo test -p docstore --features integration
//! ```
//!
//! Each test works in its own randomly named collection and drops it at the
//! end.

#![cfg(feature = "integration")]

use std::time::Duration;

use bson::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docstore::{
    connect_with, timestamped_record, Attributes, IndexSpec, RecordController, Selector,
    StoreConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Device {
    #[serde(rename = "_id")]
    id: String,
    site: String,
    serial: String,
    firmware: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

timestamped_record!(Device, bson_datetime);

fn device(id: &str, site: &str, serial: &str) -> Device {
    Device {
        id: id.to_string(),
        site: site.to_string(),
        serial: serial.to_string(),
        firmware: "1.0.0".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn fresh_controller() -> (RecordController<Device>, mongodb::Collection<Document>) {
    let config = StoreConfig::from_env()
        .with_app_name("docstore-integration")
        .with_server_selection_timeout(Duration::from_secs(5));
    let db = connect_with(&config).await.expect("MongoDB must be reachable at MONGODB_URI");

    let name = format!("it_{}", uuid::Uuid::new_v4().simple());
    let ctrl = RecordController::from_database(&db, &name);
    let handle = db.collection::<Document>(&name);
    (ctrl, handle)
}

#[tokio::test]
async fn crud_round_trip() {
    let (ctrl, handle) = fresh_controller().await;

    let mut d = device("d1", "north", "SN-1");
    ctrl.create(&mut d).await.expect("create");
    let loaded = ctrl.get("d1").await.expect("get");
    assert_eq!(loaded.serial, "SN-1");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut changed = loaded.clone();
    changed.firmware = "2.0.0".to_string();
    ctrl.update("d1", &mut changed).await.expect("update");

    let loaded = ctrl.get("d1").await.expect("get");
    assert_eq!(loaded.firmware, "2.0.0");
    assert!(loaded.updated_at > loaded.created_at);

    ctrl.update("ghost", &mut device("ghost", "x", "y"))
        .await
        .expect("silent no-op");
    assert!(ctrl.get("ghost").await.unwrap_err().is_not_found());

    ctrl.delete("d1").await.expect("delete");
    assert!(ctrl.get("d1").await.unwrap_err().is_not_found());
    assert!(ctrl.list_all().await.expect("list_all").is_empty());

    handle.drop(None).await.expect("drop");
}

#[tokio::test]
async fn bulk_attributes_and_ranges() {
    let (ctrl, handle) = fresh_controller().await;
    for (id, site) in [("a", "north"), ("b", "north"), ("c", "south")] {
        ctrl.create(&mut device(id, site, id)).await.expect("create");
    }

    ctrl.update_attributes(
        &Selector::new().and_eq("site", "north"),
        &Attributes::new().set("firmware", "3.1.0"),
    )
    .await
    .expect("update_attributes");

    let north = ctrl.list(&Selector::new().and_eq("site", "north")).await.expect("list");
    assert_eq!(north.len(), 2);
    assert!(north.iter().all(|d| d.firmware == "3.1.0"));

    assert!(ctrl.exists(&Selector::new().and_eq("site", "east")).await.expect("exists").is_none());

    ctrl.delete_range(&Selector::new().and_eq("site", "north")).await.expect("delete_range");
    assert_eq!(ctrl.list_all().await.expect("list_all").len(), 1);

    handle.drop(None).await.expect("drop");
}

#[tokio::test]
async fn unique_compound_index() {
    let (ctrl, handle) = fresh_controller().await;

    let name = ctrl
        .create_index(&IndexSpec::new().ascending("site").ascending("serial").unique(true))
        .await
        .expect("create_index");
    assert_eq!(name, "site_1_serial_1");

    ctrl.create(&mut device("a", "north", "SN-1")).await.expect("first");
    ctrl.create(&mut device("b", "south", "SN-1")).await.expect("different site");
    let err = ctrl
        .create(&mut device("c", "north", "SN-1"))
        .await
        .expect_err("duplicate pair");
    assert!(err.is_duplicate_key());

    handle.drop(None).await.expect("drop");
}
