mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tabula::{CompareOp, Error, Model, ModelMeta, Query, Registry, StorageType, Transformer};

fn homes() -> tabula::Database {
    open(builder().model::<Player>().model::<Home>())
}

#[test]
fn test_inlined_columns_are_prefixed() {
    let db = homes();
    let table = db.registry().table::<Home>().unwrap();
    let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "created_at",
            "updated_at",
            "owner",
            "label",
            "spot__world",
            "spot__x",
            "spot__y",
            "spot__z",
            "spot__yaw",
            "spot__pitch",
        ]
    );
    assert_eq!(table.column("spot__yaw").unwrap().storage, StorageType::Float);
    assert!(table.columns()[5..].iter().all(|c| c.nullable));

    let origin = table.column("spot__pitch").unwrap().origin.clone().unwrap();
    assert_eq!(origin.field, "spot");
    assert_eq!(origin.sub_field, "pitch");
}

#[test]
fn test_location_survives_storage() {
    let db = homes();
    let owner = stored(&db, Player::new("alex"));
    let spot = tabula_location();
    let home = stored(&db, Home::new(&owner, "base", Some(spot.clone())));

    let loaded = db.find_by_id::<Home>(home.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.spot, Some(spot));
    assert_eq!(loaded, home);
}

#[test]
fn test_null_transformed_field_round_trips() {
    let db = homes();
    let owner = stored(&db, Player::new("alex"));
    let home = stored(&db, Home::new(&owner, "nowhere", None));
    let loaded = db.find_by_id::<Home>(home.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.spot, None);

    let query = Query::filter("spot", CompareOp::Eq, serde_json::Value::Null);
    assert_eq!(db.count::<Home>(&query).unwrap(), 1);
}

#[test]
fn test_unique_transformed_field_is_composite() {
    let db = homes();
    let table = db.registry().table::<Home>().unwrap();
    let key = table.unique_keys().iter().find(|k| k.name == "spot").unwrap();
    assert_eq!(key.columns.len(), 6);
    assert!(table.create_sql().contains(
        "UNIQUE (\"spot__world\", \"spot__x\", \"spot__y\", \"spot__z\", \"spot__yaw\", \"spot__pitch\")"
    ));

    let owner = stored(&db, Player::new("alex"));
    stored(&db, Home::new(&owner, "first", Some(spawn())));
    let mut clash = Home::new(&owner, "second", Some(spawn()));
    let err = db.store(&mut clash).unwrap_err();
    assert!(matches!(err, Error::DuplicateProperty { ref column, .. } if column == "spot"), "{err:?}");

    // Any differing sub-value makes the key distinct.
    let mut moved = spawn();
    moved.y += 1.0;
    stored(&db, Home::new(&owner, "third", Some(moved)));

    // Null keys never collide.
    stored(&db, Home::new(&owner, "nowhere", None));
    stored(&db, Home::new(&owner, "elsewhere", None));
    assert_eq!(db.count_all::<Home>().unwrap(), 4);
}

#[test]
fn test_query_by_whole_transformed_value() {
    let db = homes();
    let owner = stored(&db, Player::new("alex"));
    stored(&db, Home::new(&owner, "spawn", Some(spawn())));
    stored(&db, Home::new(&owner, "far", Some(tabula_location())));

    let location = serde_json::to_value(spawn()).unwrap();
    let found = db.find::<Home>(&Query::filter("spot", CompareOp::Eq, location.clone())).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label, "spawn");

    let others = db.count::<Home>(&Query::filter("spot", CompareOp::Ne, location.clone())).unwrap();
    assert_eq!(others, 1);

    let err = db
        .find::<Home>(&Query::filter("spot", CompareOp::Gt, location))
        .unwrap_err();
    assert!(matches!(err, Error::Query(_)));
}

#[test]
fn test_not_equal_includes_missing_values() {
    let db = homes();
    let owner = stored(&db, Player::new("alex"));
    stored(&db, Home::new(&owner, "spawn", Some(spawn())));
    stored(&db, Home::new(&owner, "far", Some(tabula_location())));
    stored(&db, Home::new(&owner, "void", None));

    let location = serde_json::to_value(spawn()).unwrap();
    let query = Query::filter("spot", CompareOp::Ne, location).order_by("label", true);
    let labels: Vec<String> = db.find::<Home>(&query).unwrap().into_iter().map(|h| h.label).collect();
    assert_eq!(labels, vec!["far", "void"]);

    let placed = Query::filter("spot", CompareOp::Ne, serde_json::Value::Null);
    assert_eq!(db.count::<Home>(&placed).unwrap(), 2);
    let missing = Query::filter("spot", CompareOp::Eq, serde_json::Value::Null);
    assert_eq!(db.count::<Home>(&missing).unwrap(), 1);
}

#[test]
fn test_query_by_sub_field_and_sort_by_transformed_field() {
    let db = homes();
    let owner = stored(&db, Player::new("alex"));
    stored(&db, Home::new(&owner, "b", Some(Location::new("world", 5.0, 0.0, 0.0))));
    stored(&db, Home::new(&owner, "a", Some(Location::new("world", 1.0, 0.0, 0.0))));
    stored(&db, Home::new(&owner, "n", Some(Location::new("nether", 0.0, 0.0, 0.0))));

    let query = Query::filter("spot.world", CompareOp::Eq, "world").order_by("spot", true);
    let labels: Vec<String> = db.find::<Home>(&query).unwrap().into_iter().map(|h| h.label).collect();
    assert_eq!(labels, vec!["a", "b"]);
}

fn tabula_location() -> Location {
    Location {
        world: "world_the_end".into(),
        x: 100.25,
        y: 49.0,
        z: -1024.75,
        yaw: 180.0,
        pitch: 45.5,
    }
}

/// Counts every conversion it performs.
struct CountingLocationTransformer {
    replaced: Arc<AtomicUsize>,
}

impl Transformer for CountingLocationTransformer {
    type Foreign = Location;
    type Known = LocationModel;
    const FOREIGN: &'static str = "Location";

    fn replace(&self, l: &Location) -> LocationModel {
        self.replaced.fetch_add(1, Ordering::SeqCst);
        LocationTransformer.replace(l)
    }

    fn revive(&self, m: LocationModel) -> Location {
        LocationTransformer.revive(m)
    }
}

#[test]
fn test_each_write_replaces_a_field_once() {
    let replaced = Arc::new(AtomicUsize::new(0));
    let transformer = CountingLocationTransformer {
        replaced: replaced.clone(),
    };
    let db = open(
        Registry::builder()
            .transformer(transformer)
            .unwrap()
            .model::<Player>()
            .model::<Home>(),
    );
    let owner = stored(&db, Player::new("alex"));

    let mut home = stored(&db, Home::new(&owner, "base", Some(spawn())));
    assert_eq!(replaced.load(Ordering::SeqCst), 1);

    home.label = "camp".into();
    db.store(&mut home).unwrap();
    assert_eq!(replaced.load(Ordering::SeqCst), 2);

    stored(&db, Home::new(&owner, "nowhere", None));
    assert_eq!(replaced.load(Ordering::SeqCst), 2);

    let location = serde_json::to_value(spawn()).unwrap();
    assert_eq!(db.count::<Home>(&Query::filter("spot", CompareOp::Eq, location)).unwrap(), 1);
    assert_eq!(replaced.load(Ordering::SeqCst), 3);

    let loaded = db.find_by_id::<Home>(home.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.spot, Some(spawn()));
    assert_eq!(replaced.load(Ordering::SeqCst), 3);
}

#[derive(Debug, Serialize, Deserialize, Model)]
struct Outpost {
    #[serde(flatten)]
    #[tabula(meta)]
    meta: ModelMeta,
    #[serde(rename = "spot__x")]
    #[tabula(rename = "spot__x")]
    spot_x: f64,
}

#[test]
fn test_separator_in_field_name_is_fatal() {
    let err = builder().model::<Outpost>().build().unwrap_err();
    assert!(
        matches!(err, Error::Schema(ref msg) if msg.contains("Outpost.spot__x") && msg.contains("reserved separator")),
        "{err:?}"
    );
}
