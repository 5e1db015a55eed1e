use std::any::Any;
use std::collections::HashMap;

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use super::{EntityFactory, EntityTrait, PropertyValue};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Surfaces: u8 {
        const TOP = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl Surfaces {
    pub fn from_word(word: &str) -> Option<Surfaces> {
        match word {
            "top" => Some(Surfaces::TOP),
            "bottom" => Some(Surfaces::BOTTOM),
            "left" => Some(Surfaces::LEFT),
            "right" => Some(Surfaces::RIGHT),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Climbable;

impl EntityTrait for Climbable {
    fn name(&self) -> &str {
        "climbable"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeathZone;

impl EntityTrait for DeathZone {
    fn name(&self) -> &str {
        "death-zone"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Solid {
    pub fixed: bool,
    pub obstructs: bool,
    pub attack: Surfaces,
}

impl Default for Solid {
    fn default() -> Self {
        Solid { fixed: false, obstructs: false, attack: Surfaces::all() }
    }
}

impl EntityTrait for Solid {
    fn name(&self) -> &str {
        "solid"
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> bool {
        match (name, value) {
            ("fixed", PropertyValue::Bool(v)) => {
                self.fixed = *v;
                true
            }
            ("obstructs", PropertyValue::Bool(v)) => {
                self.obstructs = *v;
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Door {
    pub direction: Vec2,
    pub one_way: bool,
}

impl EntityTrait for Door {
    fn name(&self) -> &str {
        "door"
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> bool {
        match (name, value) {
            ("one-way", PropertyValue::Bool(v)) => {
                self.one_way = *v;
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One spawnable payload: when `event` fires on the host, the engine creates
/// an entity from `factory` at the host position plus `offset`.
#[derive(Clone)]
pub struct SpawnItem {
    pub event: String,
    pub factory: EntityFactory,
    pub offset: Vec3,
}

#[derive(Default, Clone)]
pub struct Spawn {
    pub items: Vec<SpawnItem>,
}

impl EntityTrait for Spawn {
    fn name(&self) -> &str {
        "spawn"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Property-bag trait for externally registered names with no specialized
/// parse path. Recognizes every property and stores it by attribute name.
pub struct GenericTrait {
    name: String,
    properties: HashMap<String, PropertyValue>,
}

impl GenericTrait {
    pub fn new(name: impl Into<String>) -> Self {
        GenericTrait { name: name.into(), properties: HashMap::new() }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

impl EntityTrait for GenericTrait {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> bool {
        self.properties.insert(name.to_string(), value.clone());
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
