use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::future::try_join_all;
use rhai::{Engine, ImmutableString, Scope, AST};
use roxmltree::Node;

use crate::compile::{animation, events, face, sequence, texture, traits as trait_compile};
use crate::compile::{Ctx, Once};
use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::animation::{AnimationSet, TextureRecord, TextureSet, UVAnimator};
use crate::runtime::world::{EventBinding, Sequence};
use crate::runtime::{
    AnimationRouter, AudioHandle, CollisionZone, CompiledEntity, Entity, EntityFactory, Geometry,
    Material, Model, SourceSpan, TraitFactory,
};

/// The compiled product of one `<entities>` or `<objects>` scope: every
/// definition keyed by id, each carrying its factory and source span.
pub struct EntitySet {
    entities: HashMap<String, CompiledEntity>,
}

impl EntitySet {
    pub fn get(&self, id: &str) -> Option<&CompiledEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompiledEntity)> {
        self.entities.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySet")
            .field("ids", &self.entities.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub struct EntityCompiler<'a, 'input> {
    scope: Node<'a, 'input>,
    child_tag: &'static str,
    ctx: Ctx,
    cell: Once<Rc<EntitySet>>,
}

impl<'a, 'input> EntityCompiler<'a, 'input> {
    pub fn new(scope: Node<'a, 'input>, ctx: Ctx) -> Result<Self> {
        let child_tag = match scope.tag_name().name() {
            "entities" => "entity",
            "objects" => "object",
            _ => return Err(CompileError::definition("Node not <entities> or <objects>")),
        };
        Ok(EntityCompiler { scope, child_tag, ctx, cell: Once::new() })
    }

    /// Compiles the scope once. Repeated calls replay the first outcome and
    /// hand out the same shared set.
    pub async fn compile(&self) -> Result<Rc<EntitySet>> {
        if let Some(done) = self.cell.cached() {
            return done;
        }
        let outcome = self.resolve().await;
        self.cell.store(outcome)
    }

    async fn resolve(&self) -> Result<Rc<EntitySet>> {
        let textures = texture::compile(self.scope, &self.ctx).await?;
        let animations = self.parse_animations(&textures)?;

        // Duplicate ids abort before any definition task launches. Only
        // direct children count; nested markup never declares entities.
        let mut declared: Vec<(String, SourceSpan, Node)> = Vec::new();
        for node in reader::children_named(self.scope, self.child_tag) {
            let id = reader::attr(node, "id").ok_or_else(|| {
                CompileError::Definition(format!("Missing id on <{}>", self.child_tag))
            })?;
            if declared.iter().any(|(existing, ..)| existing == id) {
                return Err(CompileError::DuplicateId(id.to_string()));
            }
            declared.push((id.to_string(), span(node), node));
        }

        let blueprints = try_join_all(
            declared
                .iter()
                .map(|(id, _, node)| self.parse_entity(id, *node, &animations, &textures)),
        )
        .await?;

        let mut entities = HashMap::new();
        for ((id, source, _), blueprint) in declared.into_iter().zip(blueprints) {
            let factory = synthesize(Rc::new(blueprint));
            entities.insert(id, CompiledEntity { source, factory });
        }
        Ok(Rc::new(EntitySet { entities }))
    }

    fn parse_animations(&self, textures: &TextureSet) -> Result<AnimationSet> {
        let mut set = AnimationSet::default();
        for group in reader::descendants_named(self.scope, "animations") {
            let mut animation_nodes = reader::children_named(group, "animation").peekable();
            if animation_nodes.peek().is_none() {
                continue;
            }
            let record = governing_texture(textures, reader::attr(group, "texture"))?;
            let texture_size = record.size;
            for animation_node in animation_nodes {
                let compiled = animation::compile(animation_node, texture_size)?;
                set.insert(Rc::new(compiled));
            }
        }
        Ok(set)
    }

    async fn parse_entity(
        &self,
        id: &str,
        node: Node<'a, 'input>,
        animations: &AnimationSet,
        textures: &TextureSet,
    ) -> Result<Blueprint> {
        let base = self.base_constructor(node)?;
        let (geometries, animators, texture_override) = self.parse_body(id, node, animations)?;

        let (router, collision, audio, event_bindings, trait_factories, sequences) =
            futures::try_join!(
                async { self.parse_router(id, node) },
                async { parse_collision(node) },
                self.parse_audio(node),
                async { parse_events(node) },
                async { self.parse_traits(node) },
                async { parse_sequences(node) },
            )?;

        let textures = match texture_override {
            Some(record) => TextureSet::default_only(record),
            None => textures.clone(),
        };

        Ok(Blueprint {
            id: id.to_string(),
            base,
            geometries,
            animators,
            collision,
            audio,
            events: event_bindings,
            sequences,
            traits: trait_factories,
            animations: animations.clone(),
            textures,
            router,
        })
    }

    fn base_constructor(&self, node: Node) -> Result<Rc<dyn Fn() -> Entity>> {
        if reader::attr(node, "type") == Some("character") {
            let source = reader::attr(node, "source")
                .ok_or_else(|| CompileError::definition("Character source missing"))?;
            return self.ctx.resources.characters.resolve(source);
        }
        Ok(Rc::new(Entity::new))
    }

    // Geometry and text bodies are exclusive. A text body renders through the
    // named font and replaces the texture pool with the rendered page, and it
    // gets no geometry animators.
    fn parse_body(
        &self,
        id: &str,
        node: Node,
        animations: &AnimationSet,
    ) -> Result<(Vec<Geometry>, Vec<UVAnimator>, Option<TextureRecord>)> {
        let geometry_nodes: Vec<Node> = reader::descendants_named(node, "geometry").collect();
        if !geometry_nodes.is_empty() {
            let mut geometries = Vec::new();
            let mut animators = Vec::new();
            for geometry_node in geometry_nodes {
                geometries.push(read_geometry(geometry_node)?);
                let faces = face::compile(geometry_node, animations)?;
                if faces.is_empty() {
                    if let Some(default) = animations.default_animation() {
                        animators.push(UVAnimator::new(default.clone()));
                    }
                } else {
                    animators.extend(faces);
                }
            }
            return Ok((geometries, animators, None));
        }

        if let Some(text_node) = reader::descendant_named(node, "text") {
            let font_id = reader::attr(text_node, "font").ok_or_else(|| {
                CompileError::Definition(format!("Font missing for text in \"{id}\""))
            })?;
            let font = self.ctx.resources.shared.font(font_id)?;
            let rendered = font.render(text_node.text().unwrap_or("").trim());
            let record = TextureRecord {
                id: id.to_string(),
                size: rendered.texture.size(),
                handle: rendered.texture,
            };
            return Ok((vec![rendered.geometry], Vec::new(), Some(record)));
        }

        Ok((Vec::new(), Vec::new(), None))
    }

    fn parse_router(&self, id: &str, node: Node) -> Result<Option<AnimationRouter>> {
        let Some(router_node) = reader::descendant_named(node, "animation-router") else {
            return Ok(None);
        };
        if let Some(name) = reader::attr(router_node, "name") {
            return Ok(Some(self.ctx.resources.shared.router(name)?));
        }
        let script = router_node.text().unwrap_or("").trim().to_string();
        if script.is_empty() {
            return Err(CompileError::Definition(format!(
                "Animation router empty in \"{id}\""
            )));
        }
        script_router(id, &script).map(Some)
    }

    async fn parse_audio(&self, node: Node<'_, '_>) -> Result<HashMap<String, AudioHandle>> {
        let mut ids = Vec::new();
        let mut urls = Vec::new();
        for audio_node in reader::descendants_named(node, "audio") {
            for entry in reader::element_children(audio_node) {
                let id = reader::attr(entry, "id")
                    .ok_or_else(|| CompileError::definition("Audio id missing"))?;
                let src = reader::attr(entry, "src").ok_or_else(|| {
                    CompileError::Definition(format!("Audio src missing for \"{id}\""))
                })?;
                ids.push(id.to_string());
                urls.push(self.ctx.resolve_url(src));
            }
        }
        let handles = try_join_all(urls.iter().map(|url| self.ctx.media.load_audio(url)))
            .await
            .map_err(CompileError::from)?;
        Ok(ids.into_iter().zip(handles).collect())
    }

    fn parse_traits(&self, node: Node) -> Result<Vec<TraitFactory>> {
        let mut factories = Vec::new();
        for traits_node in reader::children_named(node, "traits") {
            for trait_node in reader::children_named(traits_node, "trait") {
                factories.push(trait_compile::compile(trait_node, &self.ctx)?);
            }
        }
        Ok(factories)
    }
}

struct Blueprint {
    id: String,
    base: Rc<dyn Fn() -> Entity>,
    geometries: Vec<Geometry>,
    animators: Vec<UVAnimator>,
    collision: Vec<CollisionZone>,
    audio: HashMap<String, AudioHandle>,
    events: Vec<EventBinding>,
    sequences: Vec<(String, Sequence)>,
    traits: Vec<TraitFactory>,
    animations: AnimationSet,
    textures: TextureSet,
    router: Option<AnimationRouter>,
}

fn synthesize(blueprint: Rc<Blueprint>) -> EntityFactory {
    if !blueprint.geometries.is_empty() && !blueprint.textures.has_default() {
        log::warn!("no default texture for object \"{}\"", blueprint.id);
    }
    EntityFactory::new(move || {
        let mut entity = (blueprint.base)();
        entity.name = Some(blueprint.id.clone());
        entity.audio = blueprint.audio.clone();
        entity.animations = blueprint.animations.clone();
        entity.textures = blueprint.textures.clone();
        entity.animation_router = blueprint.router.clone();
        if let Some(geometry) = blueprint.geometries.first() {
            let material = Material {
                texture: blueprint.textures.default_texture().map(|r| r.handle.clone()),
            };
            entity.model = Some(Model { geometry: geometry.clone(), material });
            entity.animators = blueprint.animators.clone();
        }
        for zone in &blueprint.collision {
            entity.collision.push(*zone);
        }
        for factory in &blueprint.traits {
            entity.apply_trait(factory.create());
        }
        for binding in &blueprint.events {
            entity.events.bind(binding.name.clone(), binding.action.clone());
        }
        for (id, sequence) in &blueprint.sequences {
            entity.sequencer.add_sequence(id.clone(), sequence.clone());
        }
        // Run initial update of all UV maps.
        entity.refresh_animators();
        entity
    })
}

fn governing_texture<'s>(textures: &'s TextureSet, id: Option<&str>) -> Result<&'s TextureRecord> {
    match id {
        Some(id) => textures
            .get(id)
            .ok_or_else(|| CompileError::Definition(format!("Texture \"{id}\" not defined"))),
        None => textures
            .default_texture()
            .ok_or_else(|| CompileError::definition("Default texture not defined")),
    }
}

fn read_geometry(node: Node) -> Result<Geometry> {
    match reader::attr(node, "type") {
        Some("plane") => {
            let size = reader::vec2_attrs(node, "w", "h")
                .ok_or_else(|| CompileError::definition("Geometry size missing"))?;
            let w_segments =
                reader::int_attr(node, "w-segments").filter(|s| *s > 0).unwrap_or(1) as u32;
            let h_segments =
                reader::int_attr(node, "h-segments").filter(|s| *s > 0).unwrap_or(1) as u32;
            Ok(Geometry::plane(size, (w_segments, h_segments)))
        }
        other => Err(CompileError::Definition(format!(
            "Could not parse geometry type \"{}\"",
            other.unwrap_or("")
        ))),
    }
}

fn parse_collision(node: Node) -> Result<Vec<CollisionZone>> {
    let mut zones = Vec::new();
    let Some(collision_node) = reader::descendant_named(node, "collision") else {
        return Ok(zones);
    };
    for zone_node in reader::element_children(collision_node) {
        match zone_node.tag_name().name() {
            "rect" => {
                let rect = reader::rect(zone_node)
                    .ok_or_else(|| CompileError::definition("Collision rect missing size"))?;
                zones.push(CollisionZone::Rect { w: rect.w, h: rect.h, x: rect.x, y: rect.y });
            }
            "circ" => {
                let r = reader::float_attr(zone_node, "r")
                    .ok_or_else(|| CompileError::definition("Collision circle missing radius"))?;
                let x = reader::float_attr(zone_node, "x").unwrap_or(0.0);
                let y = reader::float_attr(zone_node, "y").unwrap_or(0.0);
                zones.push(CollisionZone::Circle { r, x, y });
            }
            other => {
                return Err(CompileError::Definition(format!("No collision type \"{other}\"")))
            }
        }
    }
    Ok(zones)
}

fn parse_events(node: Node) -> Result<Vec<EventBinding>> {
    match reader::descendant_named(node, "events") {
        Some(events_node) => events::compile(events_node, false),
        None => Ok(Vec::new()),
    }
}

fn parse_sequences(node: Node) -> Result<Vec<(String, Sequence)>> {
    match reader::descendant_named(node, "sequences") {
        Some(sequences_node) => sequence::compile(sequences_node),
        None => Ok(Vec::new()),
    }
}

// Routers compile in a bare engine with no packages loaded, so scripts can
// compute but never reach host state. The probe call rejects scripts that do
// not define route() returning a string.
fn script_router(id: &str, script: &str) -> Result<AnimationRouter> {
    let engine = Engine::new_raw();
    let ast = engine.compile(script).map_err(|err| {
        CompileError::Definition(format!("Animation router for \"{id}\" failed to parse: {err}"))
    })?;
    let mut scope = Scope::new();
    engine.call_fn::<ImmutableString>(&mut scope, &ast, "route", ()).map_err(|_| {
        CompileError::Definition(format!(
            "Animation router for \"{id}\" must define route() returning a string"
        ))
    })?;

    let shared: Rc<(Engine, AST)> = Rc::new((engine, ast));
    let label = id.to_string();
    Ok(AnimationRouter::new(move |_host| {
        let (engine, ast) = &*shared;
        let mut scope = Scope::new();
        match engine.call_fn::<ImmutableString>(&mut scope, ast, "route", ()) {
            Ok(animation) => Some(animation.to_string()),
            Err(err) => {
                log::warn!("animation router for \"{label}\" failed: {err}");
                None
            }
        }
    }))
}

fn span(node: Node) -> SourceSpan {
    let (line, column) = reader::location(node);
    SourceSpan {
        tag: node.tag_name().name().to_string(),
        range: node.range(),
        line,
        column,
    }
}
