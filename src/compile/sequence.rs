use roxmltree::Node;

use crate::compile::events;
use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::world::{Sequence, SequenceStep};

/// Reads a `<sequences>` element into `(id, sequence)` pairs in document
/// order. Ids must be unique within the element.
pub fn compile(node: Node) -> Result<Vec<(String, Sequence)>> {
    reader::ensure(node, "sequences")?;
    let mut out: Vec<(String, Sequence)> = Vec::new();
    for sequence_node in reader::children_named(node, "sequence") {
        let id = reader::attr(sequence_node, "id")
            .ok_or_else(|| CompileError::definition("Sequence id missing"))?;
        if out.iter().any(|(existing, _)| existing == id) {
            return Err(CompileError::Definition(format!(
                "Sequence id \"{id}\" already defined"
            )));
        }
        let mut steps = Vec::new();
        for step_node in reader::element_children(sequence_node) {
            match step_node.tag_name().name() {
                "wait" => {
                    let duration = reader::float_attr(step_node, "duration").ok_or_else(|| {
                        CompileError::Definition(format!(
                            "Wait duration missing in sequence \"{id}\""
                        ))
                    })?;
                    steps.push(SequenceStep::Wait(duration));
                }
                "action" => steps.push(SequenceStep::Run(events::parse_action(step_node, false)?)),
                other => {
                    return Err(CompileError::Definition(format!(
                        "No sequence step \"{other}\""
                    )))
                }
            }
        }
        out.push((id.to_string(), Sequence { steps }));
    }
    Ok(out)
}
