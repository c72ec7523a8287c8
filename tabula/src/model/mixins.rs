//! Reusable field groups: revocation, linked-list sequencing and cooldowns.
//!
//! Each mixin is a plain struct flattened into a model with
//! `#[serde(flatten)]`, declared through [`FieldSet::mixin`], and exposed by
//! an accessor trait with the behaviour built on top.

use super::Model;
use crate::error::{Error, Result};
use crate::query::{Predicate, Query};
use crate::schema::{FieldDescriptor, FieldSet, Mixin, OnDelete};
use crate::types::{CompareOp, FieldType};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revocation {
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_by: Option<Uuid>,
    /// Only persisted by models that designate the mixin.
    #[serde(default)]
    pub revoke_reason: Option<String>,
}

impl Mixin for Revocation {
    fn describe(fields: &mut FieldSet) {
        fields
            .field(FieldDescriptor::new("revokedAt", FieldType::Timestamp).nullable())
            .field(FieldDescriptor::new("revokedBy", FieldType::Uuid).nullable())
            .field(
                FieldDescriptor::new("revokeReason", FieldType::String)
                    .nullable()
                    .inherit(false),
            );
    }
}

impl Revocation {
    /// Rows that have not been revoked.
    pub fn active() -> Query {
        Query::filter("revokedAt", CompareOp::Eq, serde_json::Value::Null)
    }
}

pub trait Revocable: Model {
    fn revocation(&self) -> &Revocation;

    fn revocation_mut(&mut self) -> &mut Revocation;

    fn is_revoked(&self) -> bool {
        self.revocation().revoked_at.is_some()
    }

    /// Marks the record revoked. Revoking twice keeps the first revocation.
    fn revoke(&mut self, by: Option<Uuid>, reason: Option<String>, at: DateTime<Utc>) -> bool {
        if self.is_revoked() {
            return false;
        }
        let revocation = self.revocation_mut();
        revocation.revoked_at = Some(at);
        revocation.revoked_by = by;
        revocation.revoke_reason = reason;
        true
    }
}

/// Doubly linked neighbours by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    #[serde(default)]
    pub previous_id: Option<Uuid>,
    #[serde(default)]
    pub next_id: Option<Uuid>,
}

impl Mixin for Sequence {
    fn describe(fields: &mut FieldSet) {
        let owner = fields.owner();
        fields
            .field(
                FieldDescriptor::new("previousId", FieldType::Uuid)
                    .nullable()
                    .references(owner, OnDelete::SetNull),
            )
            .field(
                FieldDescriptor::new("nextId", FieldType::Uuid)
                    .nullable()
                    .references(owner, OnDelete::SetNull),
            );
    }
}

pub trait Sequenced: Model + Sized {
    fn sequence(&self) -> &Sequence;

    fn sequence_mut(&mut self) -> &mut Sequence;

    /// Link `previous -> next`. Both must already be persisted.
    fn link(previous: &mut Self, next: &mut Self) -> Result<()> {
        let previous_id = previous.id().ok_or_else(|| Error::MissingIdentifier {
            model: Self::NAME.to_string(),
        })?;
        let next_id = next.id().ok_or_else(|| Error::MissingIdentifier {
            model: Self::NAME.to_string(),
        })?;
        previous.sequence_mut().next_id = Some(next_id);
        next.sequence_mut().previous_id = Some(previous_id);
        Ok(())
    }

    /// Order records by following `nextId` from every head. Records left
    /// over because of broken or cyclic links keep their input order at the end.
    fn order_chain(items: Vec<Self>) -> Vec<Self> {
        let ids: HashSet<Uuid> = items.iter().filter_map(|m| m.id()).collect();
        let by_id: HashMap<Uuid, usize> = items
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.id().map(|id| (id, i)))
            .collect();

        let mut order = Vec::with_capacity(items.len());
        let mut placed = vec![false; items.len()];
        for (start, item) in items.iter().enumerate() {
            let is_head = item
                .sequence()
                .previous_id
                .map_or(true, |previous| !ids.contains(&previous));
            if !is_head || placed[start] {
                continue;
            }
            let mut cursor = Some(start);
            while let Some(index) = cursor.filter(|i| !placed[*i]) {
                placed[index] = true;
                order.push(index);
                cursor = items[index]
                    .sequence()
                    .next_id
                    .and_then(|next| by_id.get(&next).copied());
            }
        }
        order.extend((0..items.len()).filter(|i| !placed[*i]));

        let mut slots: Vec<Option<Self>> = items.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooldown {
    #[serde(default)]
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Mixin for Cooldown {
    fn describe(fields: &mut FieldSet) {
        fields.field(FieldDescriptor::new("cooldownUntil", FieldType::Timestamp).nullable());
    }
}

impl Cooldown {
    /// Rows whose cooldown is still running at `now`.
    pub fn cooling(now: DateTime<Utc>) -> Query {
        Query::new().and(Predicate::new(
            "cooldownUntil",
            CompareOp::Gt,
            now.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ))
    }
}

pub trait Cooling: Model {
    fn cooldown(&self) -> &Cooldown;

    fn cooldown_mut(&mut self) -> &mut Cooldown;

    fn start_cooldown(&mut self, length: Duration, now: DateTime<Utc>) {
        self.cooldown_mut().cooldown_until = Some(now + length);
    }

    fn is_cooling(&self, now: DateTime<Utc>) -> bool {
        self.remaining_cooldown(now).is_some()
    }

    /// `None` once the cooldown has expired or was never started.
    fn remaining_cooldown(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldown()
            .cooldown_until
            .map(|until| until - now)
            .filter(|left| *left > Duration::zero())
    }
}
