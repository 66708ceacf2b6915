use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, PoisonError, RwLock},
};

/// Created-resource identifiers remembered between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    UserId,
    RestaurantId,
    OrderId,
    TransactionId,
    DeliveryId,
    NotificationId,
}

impl Slot {
    pub fn all() -> &'static [Slot] {
        &[
            Slot::UserId,
            Slot::RestaurantId,
            Slot::OrderId,
            Slot::TransactionId,
            Slot::DeliveryId,
            Slot::NotificationId,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::UserId => "user_id",
            Slot::RestaurantId => "restaurant_id",
            Slot::OrderId => "order_id",
            Slot::TransactionId => "transaction_id",
            Slot::DeliveryId => "delivery_id",
            Slot::NotificationId => "notification_id",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        match Slot::all().iter().find(|slot| slot.as_str() == key) {
            Some(slot) => Ok(*slot),
            None => bail!("Unknown session slot: {}", s),
        }
    }
}

/// Point-in-time copy of the session, handed to payload builders.
pub type Bindings = HashMap<Slot, String>;

/// Shared keyed store of the last created ids.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    slots: Arc<RwLock<HashMap<Slot, String>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, slot: Slot, value: impl Into<String>) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, value.into());
    }

    pub fn get(&self, slot: Slot) -> Option<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot)
            .cloned()
    }

    pub fn snapshot(&self) -> Bindings {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Parses `slot=value` pairs separated by commas and stores them.
    pub fn seed(&self, pairs: &str) -> Result<()> {
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = match pair.split_once('=') {
                Some(kv) => kv,
                None => bail!("Expected slot=value but got: {}", pair),
            };
            let v = v.trim();
            if v.is_empty() {
                bail!("Empty value for slot: {}", k);
            }
            self.set(k.parse()?, v);
        }
        Ok(())
    }
}

/// Replaces every `$$slot` string inside `body` with the bound value.
pub fn refine_body(body: Value, bindings: &Bindings) -> Result<Value> {
    match body {
        Value::Object(obj) => {
            let mut out = serde_json::Map::with_capacity(obj.len());
            for (k, v) in obj {
                out.insert(k, refine_body(v, bindings)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => arr
            .into_iter()
            .map(|a| refine_body(a, bindings))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::String(st) => match st.strip_prefix("$$") {
            Some(name) => resolve(name, bindings).map(Value::String),
            None => Ok(Value::String(st)),
        },
        other => Ok(other),
    }
}

/// Expands `$$slot` segments of a path such as `/$$order_id/update_status`.
pub fn refine_path(path: &str, bindings: &Bindings) -> Result<String> {
    path.split('/')
        .map(|seg| match seg.strip_prefix("$$") {
            Some(name) => resolve(name, bindings),
            None => Ok(seg.to_string()),
        })
        .collect::<Result<Vec<_>>>()
        .map(|segs| segs.join("/"))
}

fn resolve(name: &str, bindings: &Bindings) -> Result<String> {
    let slot: Slot = name.parse()?;
    match bindings.get(&slot) {
        Some(v) => Ok(v.clone()),
        None => bail!("No value recorded for ${}", slot),
    }
}
