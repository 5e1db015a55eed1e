use std::collections::HashMap;
use std::fmt;

use glam::{Vec2, Vec3};

use super::{AudioHandle, CompiledEntity, Entity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PlayAudio(String),
    StopAudio(String),
    EmitEvent(String),
    RunSequence(String),
    GotoScene(String),
}

#[derive(Debug, Clone)]
pub struct EventBinding {
    pub name: String,
    pub action: Action,
}

/// Declarative event wiring in bind order. The engine dispatches; the
/// compiler only records which action runs for which event name.
#[derive(Clone, Default)]
pub struct EventHub {
    bindings: Vec<EventBinding>,
}

impl EventHub {
    pub fn bind(&mut self, name: impl Into<String>, action: Action) {
        self.bindings.push(EventBinding { name: name.into(), action });
    }

    pub fn bindings(&self) -> &[EventBinding] {
        &self.bindings
    }

    pub fn bindings_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Action> {
        self.bindings.iter().filter(move |b| b.name == name).map(|b| &b.action)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceStep {
    Wait(f32),
    Run(Action),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub steps: Vec<SequenceStep>,
}

#[derive(Clone, Default)]
pub struct Sequencer {
    sequences: HashMap<String, Sequence>,
}

impl Sequencer {
    pub fn add_sequence(&mut self, id: impl Into<String>, sequence: Sequence) {
        self.sequences.insert(id.into(), sequence);
    }

    pub fn sequence(&self, id: &str) -> Option<&Sequence> {
        self.sequences.get(id)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// One camera steering region: `window` is the span of camera positions the
/// path covers, `constraint` clamps the camera while inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPath {
    pub window: [Vec3; 2],
    pub constraint: [Vec3; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub smoothing: f32,
    pub paths: Vec<CameraPath>,
}

impl Camera {
    pub const DEFAULT_SMOOTHING: f32 = 20.0;

    pub fn new() -> Self {
        Camera { smoothing: Self::DEFAULT_SMOOTHING, paths: Vec::new() }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct World {
    pub gravity: Vec2,
    entities: Vec<Entity>,
    simulations: u32,
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    pub fn add(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn entity(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn entity_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.entities.get_mut(index)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn simulate(&mut self, dt: f32) {
        self.simulations += 1;
        for entity in &mut self.entities {
            entity.advance(dt);
        }
    }

    pub fn simulations(&self) -> u32 {
        self.simulations
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Climbable,
    DeathZone,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedBehavior {
    pub category: BehaviorKind,
    pub entity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedInstance {
    pub object_id: String,
    pub entity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub pos: Vec2,
    pub radius: f32,
}

impl Checkpoint {
    pub const DEFAULT_RADIUS: f32 = 100.0;
}

pub struct Scene {
    pub name: Option<String>,
    pub camera: Option<Camera>,
    pub world: World,
    pub audio: HashMap<String, AudioHandle>,
    pub events: EventHub,
    pub sequencer: Sequencer,
    pub objects: HashMap<String, CompiledEntity>,
    pub behaviors: Vec<PlacedBehavior>,
    pub layout: Vec<PlacedInstance>,
    pub checkpoints: Vec<Checkpoint>,
}

impl Scene {
    pub const EVENT_END: &'static str = "scene.end";

    pub fn new() -> Self {
        Scene {
            name: None,
            camera: None,
            world: World::new(),
            audio: HashMap::new(),
            events: EventHub::default(),
            sequencer: Sequencer::default(),
            objects: HashMap::new(),
            behaviors: Vec::new(),
            layout: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.world.gravity
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene").field("name", &self.name).finish_non_exhaustive()
    }
}
