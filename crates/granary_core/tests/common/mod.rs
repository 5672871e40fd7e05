#![allow(dead_code)]

use granary_core::{Entity, EntityId, Link};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grower {
    pub id: EntityId,
    pub name: String,
    pub region: String,
}

impl Grower {
    pub fn new(name: &str, region: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            region: region.to_string(),
        }
    }
}

impl Entity for Grower {
    const SET_NAME: &'static str = "growers";

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: EntityId,
    pub label: String,
}

impl Bin {
    pub fn new(label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.to_string(),
        }
    }
}

impl Entity for Bin {
    const SET_NAME: &'static str = "bins";

    fn entity_id(&self) -> EntityId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub id: EntityId,
    pub crop: String,
    pub tonnes: i64,
    #[serde(default)]
    pub grower: Option<Link<Grower>>,
    #[serde(default)]
    pub bins: Vec<Link<Bin>>,
}

impl Harvest {
    pub fn new(crop: &str, tonnes: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            crop: crop.to_string(),
            tonnes,
            grower: None,
            bins: Vec::new(),
        }
    }
}

impl Entity for Harvest {
    const SET_NAME: &'static str = "harvests";

    fn entity_id(&self) -> EntityId {
        self.id
    }
}
