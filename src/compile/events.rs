use roxmltree::Node;

use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::world::{Action, EventBinding};

/// Reads `<event name>` children of an `<events>` element into bindings in
/// document order. `allow_goto` is set only for scene-level events, where
/// `goto-scene` is a legal action type.
pub fn compile(events_node: Node, allow_goto: bool) -> Result<Vec<EventBinding>> {
    reader::ensure(events_node, "events")?;
    let mut bindings = Vec::new();
    for event_node in reader::children_named(events_node, "event") {
        let name = reader::attr(event_node, "name")
            .ok_or_else(|| CompileError::definition("Event name missing"))?;
        for action_node in reader::children_named(event_node, "action") {
            bindings.push(EventBinding {
                name: name.to_string(),
                action: parse_action(action_node, allow_goto)?,
            });
        }
    }
    Ok(bindings)
}

pub fn parse_action(node: Node, allow_goto: bool) -> Result<Action> {
    let kind = reader::attr(node, "type")
        .ok_or_else(|| CompileError::definition("Action type missing"))?;
    let action = match kind {
        "play-audio" => Action::PlayAudio(required(node, kind, "id")?),
        "stop-audio" => Action::StopAudio(required(node, kind, "id")?),
        "emit" => Action::EmitEvent(required(node, kind, "name")?),
        "run-sequence" => Action::RunSequence(required(node, kind, "id")?),
        "goto-scene" if allow_goto => Action::GotoScene(required(node, kind, "id")?),
        _ => return Err(CompileError::Definition(format!("No action type \"{kind}\""))),
    };
    Ok(action)
}

fn required(node: Node, kind: &str, attr: &str) -> Result<String> {
    reader::attr(node, attr)
        .map(str::to_string)
        .ok_or_else(|| CompileError::Definition(format!("Action \"{kind}\" missing {attr}")))
}
