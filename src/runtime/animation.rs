use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;

use super::{Geometry, TextureHandle, DEFAULT_ID};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UVRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UVRect {
    pub const ZERO: UVRect = UVRect { min: Vec2::ZERO, max: Vec2::ZERO };

    pub fn from_pixels(offset: Vec2, size: Vec2, texture_size: Vec2) -> Self {
        UVRect { min: offset / texture_size, max: (offset + size) / texture_size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub uv: UVRect,
    pub duration: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub id: Option<String>,
    pub group: Option<String>,
    pub frames: Vec<Frame>,
}

impl Animation {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }
}

/// Named animations for one entity scope. The entry under `DEFAULT_ID` aliases
/// whichever animation was registered first, so lookups without an id resolve
/// to the same shared timeline.
#[derive(Clone, Default)]
pub struct AnimationSet {
    map: HashMap<String, Rc<Animation>>,
}

impl AnimationSet {
    pub fn insert(&mut self, animation: Rc<Animation>) {
        let key = animation.id.clone().unwrap_or_else(|| DEFAULT_ID.to_string());
        self.map.insert(key, animation.clone());
        if !self.map.contains_key(DEFAULT_ID) {
            self.map.insert(DEFAULT_ID.to_string(), animation);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Rc<Animation>> {
        self.map.get(id)
    }

    pub fn default_animation(&self) -> Option<&Rc<Animation>> {
        self.map.get(DEFAULT_ID)
    }

    pub fn has_default(&self) -> bool {
        self.map.contains_key(DEFAULT_ID)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }
}

#[derive(Clone)]
pub struct TextureRecord {
    pub id: String,
    pub handle: TextureHandle,
    pub size: Vec2,
}

#[derive(Clone, Default)]
pub struct TextureSet {
    map: HashMap<String, TextureRecord>,
}

impl TextureSet {
    pub fn insert(&mut self, record: TextureRecord) {
        let key = record.id.clone();
        self.map.insert(key, record.clone());
        if !self.map.contains_key(DEFAULT_ID) {
            self.map.insert(DEFAULT_ID.to_string(), record);
        }
    }

    /// A set holding only the given record, exposed as the default.
    pub fn default_only(record: TextureRecord) -> Self {
        let mut set = TextureSet::default();
        set.map.insert(DEFAULT_ID.to_string(), record);
        set
    }

    pub fn get(&self, id: &str) -> Option<&TextureRecord> {
        self.map.get(id)
    }

    pub fn default_texture(&self) -> Option<&TextureRecord> {
        self.map.get(DEFAULT_ID)
    }

    pub fn has_default(&self) -> bool {
        self.map.contains_key(DEFAULT_ID)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }
}

/// Drives one animation timeline into a subset of geometry faces. An empty
/// index list addresses every face of the geometry.
#[derive(Clone)]
pub struct UVAnimator {
    animation: Rc<Animation>,
    pub indices: Vec<usize>,
    pub time: f32,
}

impl UVAnimator {
    pub fn new(animation: Rc<Animation>) -> Self {
        UVAnimator { animation, indices: Vec::new(), time: 0.0 }
    }

    pub fn animation(&self) -> &Rc<Animation> {
        &self.animation
    }

    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        let frames = &self.animation.frames;
        if frames.is_empty() {
            return None;
        }
        let mut remaining = self.time.max(0.0);
        if let Some(total) = self.total_duration() {
            if total > 0.0 {
                remaining %= total;
            }
        }
        for frame in frames {
            match frame.duration {
                // A frame without a duration holds until something resets the clock.
                Some(d) if remaining >= d => remaining -= d,
                _ => return Some(frame),
            }
        }
        frames.last()
    }

    pub fn refresh(&self, geometry: &mut Geometry) {
        let Some(frame) = self.current_frame() else {
            return;
        };
        if self.indices.is_empty() {
            for uv in geometry.uvs.iter_mut() {
                *uv = frame.uv;
            }
        } else {
            for &index in &self.indices {
                if let Some(uv) = geometry.uvs.get_mut(index) {
                    *uv = frame.uv;
                }
            }
        }
    }

    fn total_duration(&self) -> Option<f32> {
        let mut total = 0.0;
        for frame in &self.animation.frames {
            total += frame.duration?;
        }
        Some(total)
    }
}
