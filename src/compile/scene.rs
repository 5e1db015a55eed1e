use std::collections::HashMap;

use futures::future::try_join_all;
use glam::{Vec2, Vec3};
use roxmltree::Node;

use crate::compile::entity::EntityCompiler;
use crate::compile::{camera, events, sequence, traits as trait_compile, Ctx};
use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::traits::{Climbable, DeathZone, Solid};
use crate::runtime::world::{
    Action, BehaviorKind, Checkpoint, PlacedBehavior, PlacedInstance, Scene,
};
use crate::runtime::{AudioHandle, CompiledEntity, Entity, EntityFactory, EntityTrait};

pub struct SceneCompiler<'a, 'input> {
    node: Node<'a, 'input>,
    ctx: Ctx,
}

impl<'a, 'input> SceneCompiler<'a, 'input> {
    pub fn new(node: Node<'a, 'input>, ctx: Ctx) -> Result<Self> {
        reader::ensure(node, "scene")?;
        Ok(SceneCompiler { node, ctx })
    }

    /// Builds the scene in one pass: resource loads run concurrently, then
    /// the world is populated and settled. Consuming `self` makes a second
    /// resolution unrepresentable.
    pub async fn compile(self) -> Result<Scene> {
        let mut scene = Scene::new();
        scene.name = reader::attr(self.node, "name").map(str::to_string);

        let (audio, objects) = futures::try_join!(self.parse_audio(), self.parse_pools())?;
        scene.audio = audio;

        if let Some(camera_node) = reader::child_named(self.node, "camera") {
            scene.camera = Some(camera::compile(camera_node)?);
        }
        if let Some(gravity_node) = reader::child_named(self.node, "gravity") {
            scene.world.gravity = reader::vec2_attrs(gravity_node, "x", "y")
                .ok_or_else(|| CompileError::definition("Gravity missing x/y"))?;
        }
        if let Some(events_node) = reader::child_named(self.node, "events") {
            self.parse_global_events(events_node, &mut scene)?;
            for binding in events::compile(events_node, true)? {
                scene.events.bind(binding.name, binding.action);
            }
        }
        if let Some(sequences_node) = reader::child_named(self.node, "sequences") {
            for (id, seq) in sequence::compile(sequences_node)? {
                scene.sequencer.add_sequence(id, seq);
            }
        }
        self.parse_checkpoints(&mut scene)?;
        self.parse_behaviors(&mut scene)?;
        self.parse_layout(&objects, &mut scene)?;
        scene.objects = objects;

        // One settling pass so placement side effects land before frame one.
        scene.world.simulate(0.0);
        Ok(scene)
    }

    // Every <objects> pool compiles concurrently; pools merge in document
    // order and a later definition silently shadows an earlier one, which is
    // worth a warning but not an error across pools.
    async fn parse_pools(&self) -> Result<HashMap<String, CompiledEntity>> {
        let mut compilers = Vec::new();
        for pool in reader::children_named(self.node, "objects") {
            compilers.push(EntityCompiler::new(pool, self.ctx.clone())?);
        }
        let sets = try_join_all(compilers.iter().map(|compiler| compiler.compile())).await?;

        let mut merged: HashMap<String, CompiledEntity> = HashMap::new();
        for set in sets {
            for (id, compiled) in set.iter() {
                if merged.insert(id.clone(), compiled.clone()).is_some() {
                    log::warn!("object \"{id}\" redefined by a later pool");
                }
            }
        }
        Ok(merged)
    }

    async fn parse_audio(&self) -> Result<HashMap<String, AudioHandle>> {
        let mut ids = Vec::new();
        let mut urls = Vec::new();
        if let Some(audio_node) = reader::child_named(self.node, "audio") {
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

    // `after > action` is the scene-end hook; only goto-scene is meaningful
    // there. Regular `<event>` children parse through the event compiler.
    fn parse_global_events(&self, events_node: Node, scene: &mut Scene) -> Result<()> {
        for when_node in reader::element_children(events_node) {
            let when = when_node.tag_name().name();
            if when != "after" && when != "before" {
                continue;
            }
            for action_node in reader::children_named(when_node, "action") {
                let kind = reader::attr(action_node, "type").unwrap_or("");
                if when == "after" && kind == "goto-scene" {
                    let id = reader::attr(action_node, "id").ok_or_else(|| {
                        CompileError::definition("Action \"goto-scene\" missing id")
                    })?;
                    scene.events.bind(Scene::EVENT_END, Action::GotoScene(id.to_string()));
                } else {
                    return Err(CompileError::Definition(format!(
                        "No matching event for {when} > {kind}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn parse_checkpoints(&self, scene: &mut Scene) -> Result<()> {
        let Some(list) = reader::child_named(self.node, "checkpoints") else {
            return Ok(());
        };
        for node in reader::children_named(list, "checkpoint") {
            let pos = reader::vec2_attrs(node, "x", "y")
                .ok_or_else(|| CompileError::definition("Checkpoint missing position"))?;
            let radius = reader::float_attr(node, "r").unwrap_or(Checkpoint::DEFAULT_RADIUS);
            scene.checkpoints.push(Checkpoint { pos, radius });
        }
        Ok(())
    }

    fn parse_behaviors(&self, scene: &mut Scene) -> Result<()> {
        let Some(layout_node) = reader::child_named(self.node, "layout") else {
            return Ok(());
        };
        let Some(behaviors_node) = reader::child_named(layout_node, "behaviors") else {
            return Ok(());
        };
        for category_node in reader::element_children(behaviors_node) {
            let tag = category_node.tag_name().name();
            let kind = match tag {
                "climbables" => BehaviorKind::Climbable,
                "deathzones" => BehaviorKind::DeathZone,
                "solids" => BehaviorKind::Solid,
                _ => {
                    return Err(CompileError::Definition(format!(
                        "Behavior \"{tag}\" not in behavior map"
                    )))
                }
            };
            for rect_node in reader::children_named(category_node, "rect") {
                let rect = reader::rect(rect_node)
                    .ok_or_else(|| CompileError::definition("Behavior rect missing size"))?;
                let mut entity = Entity::new();
                entity.apply_trait(behavior_trait(kind));
                entity.add_collision_rect(rect.w, rect.h, 0.0, 0.0);
                entity.position = Vec3::new(rect.x, rect.y, 0.0);
                let index = scene.world.add(entity);
                scene.behaviors.push(PlacedBehavior { category: kind, entity: index });
            }
        }
        Ok(())
    }

    fn parse_layout(
        &self,
        objects: &HashMap<String, CompiledEntity>,
        scene: &mut Scene,
    ) -> Result<()> {
        let Some(layout_node) = reader::child_named(self.node, "layout") else {
            return Ok(());
        };
        for pool in reader::children_named(layout_node, "objects") {
            for node in reader::children_named(pool, "object") {
                let id = reader::attr(node, "id")
                    .ok_or_else(|| CompileError::definition("Object id missing in layout"))?;
                let factory = self.resolve_object(objects, id)?;
                let mut instance = factory.create();
                instance.instance_id = reader::attr(node, "instance-id").map(str::to_string);
                if let Some(position) = reader::position(node) {
                    instance.position = position;
                }
                if let Some(dir) = reader::int_attr(node, "dir").filter(|d| *d != 0) {
                    instance.direction = Vec2::new(dir as f32, 0.0);
                }
                if let Some(scale) = reader::float_attr(node, "scale").filter(|s| *s != 0.0) {
                    if let Some(model) = instance.model.as_mut() {
                        model.geometry.scale(scale);
                    }
                }
                for trait_node in reader::descendants_named(node, "trait") {
                    let extra = trait_compile::compile(trait_node, &self.ctx)?;
                    instance.apply_trait(extra.create());
                }
                let index = scene.world.add(instance);
                scene.layout.push(PlacedInstance { object_id: id.to_string(), entity: index });
            }
        }
        Ok(())
    }

    fn resolve_object(
        &self,
        objects: &HashMap<String, CompiledEntity>,
        id: &str,
    ) -> Result<EntityFactory> {
        if let Some(compiled) = objects.get(id) {
            return Ok(compiled.factory.clone());
        }
        if let Some(factory) = self.ctx.resources.shared.find_object(id) {
            return Ok(factory);
        }
        Err(CompileError::Definition(format!("Object \"{id}\" not defined.")))
    }
}

fn behavior_trait(kind: BehaviorKind) -> Box<dyn EntityTrait> {
    match kind {
        BehaviorKind::Climbable => Box::new(Climbable),
        BehaviorKind::DeathZone => Box::new(DeathZone),
        BehaviorKind::Solid => Box::new(Solid { fixed: true, obstructs: true, ..Solid::default() }),
    }
}
