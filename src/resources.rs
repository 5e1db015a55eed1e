use std::collections::HashMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::{CompileError, Result};
use crate::runtime::{
    AnimationRouter, AudioHandle, Entity, EntityFactory, FontHandle, TextureHandle, TraitFactory,
};

/// Retrieves raw document text for a URL. Implementations decide what a URL
/// means; the compiler never touches the filesystem or network itself.
pub trait DocumentFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<String>>;
}

/// Decodes media referenced from documents into runtime handles.
pub trait MediaLoader {
    fn load_texture<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<TextureHandle>>;
    fn load_audio<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<AudioHandle>>;
}

fn no_resource(kind: &str, id: &str) -> CompileError {
    CompileError::Definition(format!("No resource \"{id}\" of type {kind}"))
}

#[derive(Default)]
pub struct CharacterRegistry {
    map: HashMap<String, Rc<dyn Fn() -> Entity>>,
}

impl CharacterRegistry {
    pub fn add(&mut self, name: impl Into<String>, build: impl Fn() -> Entity + 'static) {
        self.map.insert(name.into(), Rc::new(build));
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<dyn Fn() -> Entity>> {
        self.map.get(name).cloned().ok_or_else(|| no_resource("character", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

#[derive(Default)]
pub struct TraitRegistry {
    map: HashMap<String, TraitFactory>,
}

impl TraitRegistry {
    pub fn add(&mut self, name: impl Into<String>, factory: TraitFactory) {
        self.map.insert(name.into(), factory);
    }

    pub fn resolve(&self, name: &str) -> Option<TraitFactory> {
        self.map.get(name).cloned()
    }
}

/// Cross-document resources registered by the host before any compile runs:
/// reusable object constructors, fonts for text entities, named animation
/// routers.
#[derive(Default)]
pub struct ResourceManager {
    objects: HashMap<String, EntityFactory>,
    fonts: HashMap<String, FontHandle>,
    routers: HashMap<String, AnimationRouter>,
}

impl ResourceManager {
    pub fn add_object(&mut self, id: impl Into<String>, factory: EntityFactory) {
        self.objects.insert(id.into(), factory);
    }

    pub fn add_font(&mut self, id: impl Into<String>, font: FontHandle) {
        self.fonts.insert(id.into(), font);
    }

    pub fn add_router(&mut self, id: impl Into<String>, router: AnimationRouter) {
        self.routers.insert(id.into(), router);
    }

    pub fn object(&self, id: &str) -> Result<EntityFactory> {
        self.objects.get(id).cloned().ok_or_else(|| no_resource("object", id))
    }

    pub fn find_object(&self, id: &str) -> Option<EntityFactory> {
        self.objects.get(id).cloned()
    }

    pub fn font(&self, id: &str) -> Result<FontHandle> {
        self.fonts.get(id).cloned().ok_or_else(|| no_resource("font", id))
    }

    pub fn router(&self, id: &str) -> Result<AnimationRouter> {
        self.routers.get(id).cloned().ok_or_else(|| no_resource("router", id))
    }
}

/// Everything a compile run can look up but not mutate.
#[derive(Default)]
pub struct Resources {
    pub characters: CharacterRegistry,
    pub traits: TraitRegistry,
    pub shared: ResourceManager,
}
