use glam::Vec2;
use roxmltree::Node;

use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::animation::{Animation, Frame, UVRect};
use crate::runtime::DEFAULT_ID;

/// Compiles one `<animation>` element into a frame timeline. `texture_size`
/// is the pixel size of the texture the surrounding group selected; frame
/// offsets and sizes normalize against it.
pub fn compile(node: Node, texture_size: Vec2) -> Result<Animation> {
    reader::ensure(node, "animation")?;
    let id = reader::attr(node, "id").map(str::to_string);
    let group = reader::attr(node, "group").map(str::to_string);

    let frame_nodes: Vec<Node> = reader::descendants_named(node, "frame").collect();
    let mut frames = Vec::with_capacity(frame_nodes.len());
    let mut pending: Vec<Frame> = Vec::new();

    for (i, frame_node) in frame_nodes.iter().enumerate() {
        let frame = read_frame(*frame_node, texture_size, id.as_deref())?;
        frames.push(frame);

        if let Some(parent) = frame_node.parent().filter(|p| p.tag_name().name() == "loop") {
            pending.push(frame);
            // The loop closes when the next frame hangs off a different parent
            // (or there is no next frame).
            let next_parent = frame_nodes.get(i + 1).and_then(|n| n.parent());
            if next_parent != Some(parent) {
                let count = reader::int_attr(parent, "count").filter(|c| *c > 0).unwrap_or(1);
                for _ in 1..count {
                    frames.extend_from_slice(&pending);
                }
                pending.clear();
            }
        }
    }

    Ok(Animation { id, group, frames })
}

fn read_frame(frame_node: Node, texture_size: Vec2, id: Option<&str>) -> Result<Frame> {
    let label = id.unwrap_or(DEFAULT_ID);
    let offset = reader::vec2_attrs(frame_node, "x", "y").ok_or_else(|| {
        CompileError::Definition(format!("Frame offset missing in animation \"{label}\""))
    })?;
    let size = frame_size(frame_node).ok_or_else(|| {
        CompileError::Definition(format!("Frame size missing in animation \"{label}\""))
    })?;
    let duration = reader::float_attr(frame_node, "duration").filter(|d| *d != 0.0);
    Ok(Frame { uv: UVRect::from_pixels(offset, size, texture_size), duration })
}

// Size falls back from the frame to its parent (loop or animation) and then
// to the grandparent, so shared dimensions live on the enclosing element.
fn frame_size(frame_node: Node) -> Option<Vec2> {
    if let Some(size) = reader::vec2_attrs(frame_node, "w", "h") {
        return Some(size);
    }
    let parent = frame_node.parent()?;
    if let Some(size) = reader::vec2_attrs(parent, "w", "h") {
        return Some(size);
    }
    reader::vec2_attrs(parent.parent()?, "w", "h")
}
