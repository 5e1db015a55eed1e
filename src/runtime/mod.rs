use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use glam::{Vec2, Vec3};
use image::GenericImageView;

pub mod animation;
pub mod traits;
pub mod world;

use animation::{AnimationSet, TextureSet, UVAnimator, UVRect};
use world::{EventHub, Sequencer};

pub const DEFAULT_ID: &str = "__default";

#[derive(Clone)]
pub struct TextureHandle(Rc<image::DynamicImage>);

impl TextureHandle {
    pub fn new(image: image::DynamicImage) -> Self {
        Self(Rc::new(image))
    }

    pub fn image(&self) -> &image::DynamicImage {
        &self.0
    }

    pub fn size(&self) -> Vec2 {
        let (w, h) = self.0.dimensions();
        Vec2::new(w as f32, h as f32)
    }

    pub fn ptr_eq(&self, other: &TextureHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone)]
pub struct AudioHandle {
    samples: Rc<[f32]>,
    sample_rate: u32,
}

impl AudioHandle {
    pub fn new(samples: impl Into<Rc<[f32]>>, sample_rate: u32) -> Self {
        Self { samples: samples.into(), sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }
}

#[derive(Clone)]
pub struct RenderedText {
    pub geometry: Geometry,
    pub texture: TextureHandle,
}

#[derive(Clone)]
pub struct FontHandle(Rc<dyn Fn(&str) -> RenderedText>);

impl FontHandle {
    pub fn new(render: impl Fn(&str) -> RenderedText + 'static) -> Self {
        Self(Rc::new(render))
    }

    pub fn render(&self, text: &str) -> RenderedText {
        (self.0)(text)
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Plane { segments: (u32, u32) },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub size: Vec2,
    pub uvs: Vec<UVRect>,
}

impl Geometry {
    pub fn plane(size: Vec2, segments: (u32, u32)) -> Self {
        let faces = segments.0.max(1) as usize * segments.1.max(1) as usize;
        Geometry { kind: GeometryKind::Plane { segments }, size, uvs: vec![UVRect::ZERO; faces] }
    }

    pub fn face_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn scale(&mut self, factor: f32) {
        self.size *= factor;
    }
}

#[derive(Clone, Default)]
pub struct Material {
    pub texture: Option<TextureHandle>,
}

#[derive(Clone)]
pub struct Model {
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Num(f32),
    Bool(bool),
    Str(String),
}

impl PropertyValue {
    pub fn as_num(&self) -> Option<f32> {
        match self {
            PropertyValue::Num(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

pub trait EntityTrait {
    fn name(&self) -> &str;

    /// Returns false when the property is not recognized; callers drop it silently.
    fn set_property(&mut self, _name: &str, _value: &PropertyValue) -> bool {
        false
    }

    fn on_attach(&mut self, _host: &Entity) {}

    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn EntityTrait + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTrait").field("name", &self.name()).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionZone {
    Rect { w: f32, h: f32, x: f32, y: f32 },
    Circle { r: f32, x: f32, y: f32 },
}

#[derive(Clone)]
pub struct AnimationRouter(Rc<dyn Fn(&Entity) -> Option<String>>);

impl AnimationRouter {
    pub fn new(route: impl Fn(&Entity) -> Option<String> + 'static) -> Self {
        Self(Rc::new(route))
    }

    pub fn route(&self, host: &Entity) -> Option<String> {
        (self.0)(host)
    }
}

#[derive(Clone)]
pub struct EntityFactory(Rc<dyn Fn() -> Entity>);

impl EntityFactory {
    pub fn new(build: impl Fn() -> Entity + 'static) -> Self {
        Self(Rc::new(build))
    }

    pub fn create(&self) -> Entity {
        (self.0)()
    }
}

impl fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFactory").finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TraitFactory(Rc<dyn Fn() -> Box<dyn EntityTrait>>);

impl TraitFactory {
    pub fn new(build: impl Fn() -> Box<dyn EntityTrait> + 'static) -> Self {
        Self(Rc::new(build))
    }

    pub fn create(&self) -> Box<dyn EntityTrait> {
        (self.0)()
    }
}

/// Where an entity definition sits in its source document, kept so tooling
/// can point back at the defining element after the DOM is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub tag: String,
    pub range: Range<usize>,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone)]
pub struct CompiledEntity {
    pub source: SourceSpan,
    pub factory: EntityFactory,
}

pub struct Entity {
    pub name: Option<String>,
    pub instance_id: Option<String>,
    pub position: Vec3,
    pub direction: Vec2,
    pub model: Option<Model>,
    pub animators: Vec<UVAnimator>,
    pub collision: Vec<CollisionZone>,
    pub audio: HashMap<String, AudioHandle>,
    pub animations: AnimationSet,
    pub textures: TextureSet,
    pub animation_router: Option<AnimationRouter>,
    pub events: EventHub,
    pub sequencer: Sequencer,
    traits: Vec<Box<dyn EntityTrait>>,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    pub fn new() -> Self {
        Self {
            name: None,
            instance_id: None,
            position: Vec3::ZERO,
            direction: Vec2::new(1.0, 0.0),
            model: None,
            animators: Vec::new(),
            collision: Vec::new(),
            audio: HashMap::new(),
            animations: AnimationSet::default(),
            textures: TextureSet::default(),
            animation_router: None,
            events: EventHub::default(),
            sequencer: Sequencer::default(),
            traits: Vec::new(),
        }
    }

    pub fn apply_trait(&mut self, mut applied: Box<dyn EntityTrait>) {
        applied.on_attach(self);
        self.traits.push(applied);
    }

    pub fn trait_named(&self, name: &str) -> Option<&dyn EntityTrait> {
        self.traits.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn traits(&self) -> impl Iterator<Item = &dyn EntityTrait> {
        self.traits.iter().map(|t| t.as_ref())
    }

    pub fn route_animation(&self) -> Option<String> {
        self.animation_router.as_ref().and_then(|router| router.route(self))
    }

    pub fn add_collision_rect(&mut self, w: f32, h: f32, x: f32, y: f32) {
        self.collision.push(CollisionZone::Rect { w, h, x, y });
    }

    pub fn add_collision_zone(&mut self, r: f32, x: f32, y: f32) {
        self.collision.push(CollisionZone::Circle { r, x, y });
    }

    pub fn advance(&mut self, dt: f32) {
        if let Some(model) = self.model.as_mut() {
            for animator in &mut self.animators {
                animator.advance(dt);
                animator.refresh(&mut model.geometry);
            }
        } else {
            for animator in &mut self.animators {
                animator.advance(dt);
            }
        }
    }

    pub fn refresh_animators(&mut self) {
        if let Some(model) = self.model.as_mut() {
            for animator in &self.animators {
                animator.refresh(&mut model.geometry);
            }
        }
    }
}
