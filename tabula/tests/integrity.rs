mod common;

use common::*;
use serde::{Deserialize, Serialize};
use tabula::{CompareOp, Error, ErrorKind, Model, ModelMeta, OnDelete, Query, Registry, Revocation, Sequenced};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
struct Guild {
    #[serde(flatten)]
    #[tabula(meta)]
    meta: ModelMeta,
    name: String,
    #[tabula(references = "Member", on_delete = "cascade")]
    leader: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
struct Member {
    #[serde(flatten)]
    #[tabula(meta)]
    meta: ModelMeta,
    name: String,
    #[tabula(references = "Guild", on_delete = "cascade")]
    guild: Option<Uuid>,
}

fn member(name: &str, guild: &Guild) -> Member {
    Member {
        meta: ModelMeta::default(),
        name: name.to_string(),
        guild: guild.meta.id,
    }
}

fn claim(owner: &Player, area: i64) -> Claim {
    Claim {
        meta: ModelMeta::default(),
        owner: owner.meta.id.unwrap(),
        area,
    }
}

fn ban(player: &Player) -> Ban {
    Ban {
        meta: ModelMeta::default(),
        player: player.meta.id,
        revocation: Revocation::default(),
    }
}

#[test]
fn test_cascade_removes_dependents() {
    let db = open(builder().model::<Player>().model::<Home>());
    let alex = stored(&db, Player::new("alex"));
    let sam = stored(&db, Player::new("sam"));
    stored(&db, Home::new(&alex, "base", Some(spawn())));
    stored(&db, Home::new(&alex, "farm", None));
    let kept = stored(&db, Home::new(&sam, "tower", None));

    db.delete(&alex).unwrap();
    let remaining = db.list::<Home>().unwrap();
    assert_eq!(remaining, vec![kept]);
}

#[test]
fn test_set_null_clears_reference() {
    let db = open(builder().model::<Player>().model::<Ban>());
    let alex = stored(&db, Player::new("alex"));
    let ban = stored(&db, ban(&alex));

    db.delete(&alex).unwrap();
    let loaded = db.find_by_id::<Ban>(ban.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.player, None);
}

#[test]
fn test_restrict_blocks_delete_atomically() {
    let db = open(builder().model::<Player>().model::<Home>().model::<Claim>());
    let alex = stored(&db, Player::new("alex"));
    stored(&db, Home::new(&alex, "base", None));
    stored(&db, claim(&alex, 64));

    let err = db.delete(&alex).unwrap_err();
    match &err {
        Error::RestrictedDelete {
            model,
            referenced_by,
            column,
        } => {
            assert_eq!(model, "Player");
            assert_eq!(referenced_by, "Claim");
            assert_eq!(column, "owner");
        }
        other => panic!("expected a restricted delete, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(db.count_all::<Player>().unwrap(), 1);
    assert_eq!(db.count_all::<Home>().unwrap(), 1);
}

#[test]
fn test_restrict_allows_unreferenced_delete() {
    let db = open(builder().model::<Player>().model::<Claim>());
    let alex = stored(&db, Player::new("alex"));
    let sam = stored(&db, Player::new("sam"));
    stored(&db, claim(&sam, 16));
    db.delete(&alex).unwrap();
    assert_eq!(db.count_all::<Player>().unwrap(), 1);
}

#[test]
fn test_delete_where_counts_only_matched_rows() {
    let db = open(builder().model::<Player>().model::<Home>());
    let alex = stored(&db, Player::new("alex"));
    let sam = stored(&db, Player::new("sam"));
    stored(&db, Home::new(&alex, "a", None));
    stored(&db, Home::new(&sam, "b", None));

    let removed = db
        .delete_where::<Player>(&Query::filter("name", CompareOp::Ne, "nobody"))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(db.count_all::<Home>().unwrap(), 0);
}

#[test]
fn test_sequence_neighbours_are_unlinked_on_delete() {
    let db = open(Registry::builder().model::<QuestStep>());
    let mut a = stored(&db, QuestStep::new("gather"));
    let mut b = stored(&db, QuestStep::new("craft"));
    let mut c = stored(&db, QuestStep::new("deliver"));
    QuestStep::link(&mut a, &mut b).unwrap();
    QuestStep::link(&mut b, &mut c).unwrap();
    for step in [&mut a, &mut b, &mut c] {
        db.store(step).unwrap();
    }

    let ordered: Vec<String> = QuestStep::order_chain(db.list::<QuestStep>().unwrap())
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(ordered, vec!["gather", "craft", "deliver"]);

    db.delete(&b).unwrap();
    let a = db.find_by_id::<QuestStep>(a.meta.id.unwrap()).unwrap().unwrap();
    let c = db.find_by_id::<QuestStep>(c.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(a.sequence.next_id, None);
    assert_eq!(c.sequence.previous_id, None);
}

#[test]
fn test_sequence_columns_reference_owner() {
    let registry = Registry::builder().model::<QuestStep>().build().unwrap();
    let table = registry.table::<QuestStep>().unwrap();
    let fk = table.column("previous_id").unwrap().foreign_key.clone().unwrap();
    assert_eq!(fk.table, "quest_step");
    assert_eq!(fk.on_delete, OnDelete::SetNull);
}

#[test]
fn test_reference_to_unregistered_model_is_fatal() {
    let err = builder().model::<Home>().build().unwrap_err();
    assert!(matches!(err, Error::Schema(ref msg) if msg.contains("Player")), "{err:?}");
}

#[test]
fn test_mutual_cascade_deletes_each_row_once() {
    let db = open(Registry::builder().model::<Guild>().model::<Member>());
    let guild = |name: &str| Guild {
        meta: ModelMeta::default(),
        name: name.to_string(),
        leader: None,
    };
    let mut builders = stored(&db, guild("builders"));
    let mut miners = stored(&db, guild("miners"));
    let alex = stored(&db, member("alex", &builders));
    stored(&db, member("sam", &builders));
    let kim = stored(&db, member("kim", &miners));
    builders.leader = alex.meta.id;
    db.store(&mut builders).unwrap();
    miners.leader = kim.meta.id;
    db.store(&mut miners).unwrap();

    db.delete(&alex).unwrap();
    assert_eq!(db.list::<Guild>().unwrap(), vec![miners]);
    assert_eq!(db.list::<Member>().unwrap(), vec![kim]);
}
