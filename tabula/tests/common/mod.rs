#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula::{
    Cooldown, Cooling, Database, Model, ModelMeta, Registry, RegistryBuilder, Revocable, Revocation, Schema,
    Sequence, Sequenced, Transformer, VariantSet,
};
use uuid::Uuid;

// ── Foreign types and their wrappers ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(world: &str, x: f64, y: f64, z: f64) -> Self {
        Location {
            world: world.to_string(),
            x,
            y,
            z,
            yaw: 90.0,
            pitch: -12.5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Schema)]
pub struct LocationModel {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

pub struct LocationTransformer;

impl Transformer for LocationTransformer {
    type Foreign = Location;
    type Known = LocationModel;
    const FOREIGN: &'static str = "Location";

    fn replace(&self, l: &Location) -> LocationModel {
        LocationModel {
            world: l.world.clone(),
            x: l.x,
            y: l.y,
            z: l.z,
            yaw: l.yaw,
            pitch: l.pitch,
        }
    }

    fn revive(&self, m: LocationModel) -> Location {
        Location {
            world: m.world,
            x: m.x,
            y: m.y,
            z: m.z,
            yaw: m.yaw,
            pitch: m.pitch,
        }
    }
}

/// A player as seen by game code; stored as a bare UUID reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerHandle(pub Uuid);

#[derive(Debug, Serialize, Deserialize, Schema)]
pub struct PlayerHandleModel {
    pub uuid: Uuid,
}

pub struct PlayerHandleTransformer;

impl Transformer for PlayerHandleTransformer {
    type Foreign = PlayerHandle;
    type Known = PlayerHandleModel;
    const FOREIGN: &'static str = "PlayerHandle";

    fn replace(&self, p: &PlayerHandle) -> PlayerHandleModel {
        PlayerHandleModel { uuid: p.0 }
    }

    fn revive(&self, m: PlayerHandleModel) -> PlayerHandle {
        PlayerHandle(m.uuid)
    }
}

// ── Models ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Warp {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    #[tabula(unique)]
    pub name: String,
    pub location: Location,
    pub creator: PlayerHandle,
    pub cost: i32,
    pub open: bool,
}

impl Warp {
    pub fn new(name: &str, location: Location, creator: PlayerHandle) -> Self {
        Warp {
            meta: ModelMeta::default(),
            name: name.to_string(),
            location,
            creator,
            cost: 0,
            open: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    #[tabula(unique)]
    pub name: String,
    #[tabula(migration_default = 0)]
    pub level: i32,
}

impl Player {
    pub fn new(name: &str) -> Self {
        Player {
            meta: ModelMeta::default(),
            name: name.to_string(),
            level: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    #[tabula(references = "Player", on_delete = "cascade")]
    pub owner: Uuid,
    pub label: String,
    /// Two homes may not share a spot.
    #[tabula(unique)]
    pub spot: Option<Location>,
}

impl Home {
    pub fn new(owner: &Player, label: &str, spot: Option<Location>) -> Self {
        Home {
            meta: ModelMeta::default(),
            owner: owner.meta.id.unwrap_or_default(),
            label: label.to_string(),
            spot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    #[tabula(references = "Player", on_delete = "set_null")]
    pub player: Option<Uuid>,
    #[serde(flatten)]
    #[tabula(mixin, designated)]
    pub revocation: Revocation,
}

impl Revocable for Ban {
    fn revocation(&self) -> &Revocation {
        &self.revocation
    }

    fn revocation_mut(&mut self) -> &mut Revocation {
        &mut self.revocation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    #[tabula(references = "Player", on_delete = "restrict")]
    pub owner: Uuid,
    pub area: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Kit {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    pub name: String,
    #[serde(flatten)]
    #[tabula(mixin)]
    pub cooldown: Cooldown,
}

impl Cooling for Kit {
    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct QuestStep {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    pub title: String,
    #[serde(flatten)]
    #[tabula(mixin)]
    pub sequence: Sequence,
}

impl QuestStep {
    pub fn new(title: &str) -> Self {
        QuestStep {
            meta: ModelMeta::default(),
            title: title.to_string(),
            sequence: Sequence::default(),
        }
    }
}

impl Sequenced for QuestStep {
    fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }
}

// ── Variant payloads ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coins {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, Schema)]
pub struct CoinsModel {
    pub amount: i64,
}

pub struct CoinsTransformer;

impl Transformer for CoinsTransformer {
    type Foreign = Coins;
    type Known = CoinsModel;
    const FOREIGN: &'static str = "Coins";

    fn replace(&self, c: &Coins) -> CoinsModel {
        CoinsModel { amount: c.amount }
    }

    fn revive(&self, m: CoinsModel) -> Coins {
        Coins { amount: m.amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub material: String,
    pub count: i32,
}

#[derive(Debug, Serialize, Deserialize, Schema)]
pub struct ItemStackModel {
    pub material: String,
    pub count: i32,
}

pub struct ItemStackTransformer;

impl Transformer for ItemStackTransformer {
    type Foreign = ItemStack;
    type Known = ItemStackModel;
    const FOREIGN: &'static str = "ItemStack";

    fn replace(&self, i: &ItemStack) -> ItemStackModel {
        ItemStackModel {
            material: i.material.clone(),
            count: i.count,
        }
    }

    fn revive(&self, m: ItemStackModel) -> ItemStack {
        ItemStack {
            material: m.material,
            count: m.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RewardPayload {
    Coins(Coins),
    Item(ItemStack),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    #[serde(flatten)]
    #[tabula(meta)]
    pub meta: ModelMeta,
    pub kind: String,
    #[tabula(variant = "RewardPayload", discriminant = "kind")]
    pub payload: Option<RewardPayload>,
}

// ── Setup ────────────────────────────────────────────────────────────

pub fn builder() -> RegistryBuilder {
    Registry::builder()
        .transformer(LocationTransformer)
        .unwrap()
        .transformer(PlayerHandleTransformer)
        .unwrap()
}

pub fn open(builder: RegistryBuilder) -> Database {
    let registry = Arc::new(builder.build().unwrap());
    Database::open_in_memory(registry).unwrap()
}

pub fn reward_variants() -> VariantSet {
    VariantSet::new("RewardPayload")
        .arm("coins", "Coins")
        .arm("item", "ItemStack")
}

pub fn spawn() -> Location {
    Location::new("world", 0.5, 64.0, -0.5)
}

pub fn stored<M: Model>(db: &Database, mut model: M) -> M {
    db.store(&mut model).unwrap();
    model
}
