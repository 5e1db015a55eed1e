use glam::{Vec2, Vec3};
use roxmltree::Node;

use crate::compile::Ctx;
use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::traits::{Climbable, DeathZone, Door, Solid, Spawn, SpawnItem, Surfaces};
use crate::runtime::{PropertyValue, TraitFactory};

/// Compiles one `<trait>` element into a factory. Externally registered
/// names win over built-ins; every remaining attribute is offered to the
/// instance as a property, and unrecognized ones drop silently.
pub fn compile(node: Node, ctx: &Ctx) -> Result<TraitFactory> {
    reader::ensure(node, "trait")?;
    let name = reader::attr(node, "name")
        .or_else(|| reader::attr(node, "source"))
        .ok_or_else(|| CompileError::definition("Trait name missing"))?;

    let properties: Vec<(String, PropertyValue)> = node
        .attributes()
        .filter(|a| a.name() != "name" && a.name() != "source")
        .map(|a| (a.name().to_string(), reader::property_value(a.value())))
        .collect();

    let base = if let Some(registered) = ctx.resources.traits.resolve(name) {
        registered
    } else {
        match name {
            "climbable" => TraitFactory::new(|| Box::new(Climbable)),
            "death-zone" => TraitFactory::new(|| Box::new(DeathZone)),
            "solid" => solid_factory(node)?,
            "door" => door_factory(node),
            "spawn" => spawn_factory(node, ctx)?,
            _ => return Err(CompileError::Definition(format!("Trait \"{name}\" not defined"))),
        }
    };
    Ok(with_properties(base, properties))
}

fn with_properties(base: TraitFactory, properties: Vec<(String, PropertyValue)>) -> TraitFactory {
    if properties.is_empty() {
        return base;
    }
    TraitFactory::new(move || {
        let mut applied = base.create();
        for (name, value) in &properties {
            applied.set_property(name, value);
        }
        applied
    })
}

fn solid_factory(node: Node) -> Result<TraitFactory> {
    let attack = match reader::attr(node, "attack") {
        Some(raw) => parse_attack(raw)?,
        None => Surfaces::all(),
    };
    Ok(TraitFactory::new(move || Box::new(Solid { attack, ..Solid::default() })))
}

fn parse_attack(raw: &str) -> Result<Surfaces> {
    let mut surfaces = Surfaces::empty();
    for word in raw.split_whitespace() {
        let surface = Surfaces::from_word(word)
            .ok_or_else(|| CompileError::Definition(format!("No attack surface \"{word}\"")))?;
        surfaces |= surface;
    }
    Ok(surfaces)
}

fn door_factory(node: Node) -> TraitFactory {
    let direction = reader::child_named(node, "direction")
        .and_then(|d| reader::vec2_attrs(d, "x", "y"))
        .unwrap_or(Vec2::ZERO);
    TraitFactory::new(move || Box::new(Door { direction, one_way: false }))
}

// Spawn targets resolve while compiling, so a broken reference fails the
// document instead of the first spawn at runtime.
fn spawn_factory(node: Node, ctx: &Ctx) -> Result<TraitFactory> {
    let mut items = Vec::new();
    for item_node in reader::children_named(node, "item") {
        let event = reader::attr(item_node, "event")
            .ok_or_else(|| CompileError::definition("Spawn item missing event"))?;
        let object = reader::attr(item_node, "object")
            .ok_or_else(|| CompileError::definition("Spawn item missing object"))?;
        let factory = ctx.resources.shared.object(object)?;
        let offset = reader::child_named(item_node, "offset")
            .and_then(reader::position)
            .unwrap_or(Vec3::ZERO);
        items.push(SpawnItem { event: event.to_string(), factory, offset });
    }
    Ok(TraitFactory::new(move || Box::new(Spawn { items: items.clone() })))
}
