use roxmltree::Node;

use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::animation::{AnimationSet, UVAnimator};

/// Builds the UV animator templates declared by `<face>` elements under a
/// geometry node. Faces address geometry slots through a JSON `index` list
/// and `<range>` children; a face with neither addresses every slot.
pub fn compile(geometry_node: Node, animations: &AnimationSet) -> Result<Vec<UVAnimator>> {
    let mut animators = Vec::new();
    for face_node in reader::descendants_named(geometry_node, "face") {
        animators.push(compile_face(face_node, animations)?);
    }
    Ok(animators)
}

fn compile_face(face_node: Node, animations: &AnimationSet) -> Result<UVAnimator> {
    let animation = match reader::attr(face_node, "animation") {
        Some(id) => animations
            .get(id)
            .ok_or_else(|| CompileError::Definition(format!("Animation \"{id}\" not defined")))?,
        None => animations
            .default_animation()
            .ok_or_else(|| CompileError::definition("Default animation not defined"))?,
    };

    let mut animator = UVAnimator::new(animation.clone());
    animator.time = reader::float_attr(face_node, "offset").unwrap_or(0.0);

    if let Some(raw) = reader::attr(face_node, "index") {
        let indices: Vec<usize> = serde_json::from_str(raw).map_err(|_| {
            CompileError::Definition(format!("Invalid face index list {raw:?}"))
        })?;
        animator.indices.extend(indices);
    }
    for range_node in reader::children_named(face_node, "range") {
        extend_with_range(&mut animator.indices, range_node)?;
    }
    Ok(animator)
}

fn extend_with_range(indices: &mut Vec<usize>, node: Node) -> Result<()> {
    let start = reader::int_attr(node, "start").unwrap_or(0);
    let end = reader::int_attr(node, "end")
        .ok_or_else(|| CompileError::definition("Face range missing end"))?;
    let step = reader::int_attr(node, "step").unwrap_or(1);
    if start < 0 || end < 0 || step < 1 {
        return Err(CompileError::Definition(format!(
            "Invalid face range {start}..{end} step {step}"
        )));
    }
    let mut i = start;
    while i < end {
        indices.push(i as usize);
        i += step;
    }
    Ok(())
}
