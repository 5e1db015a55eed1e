use glam::Vec3;
use roxmltree::Node;

use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::world::{Camera, CameraPath};

pub fn compile(node: Node) -> Result<Camera> {
    reader::ensure(node, "camera")?;
    let mut camera = Camera::new();
    if let Some(smoothing) = reader::float_attr(node, "smoothing") {
        camera.smoothing = smoothing;
    }
    for path_node in reader::children_named(node, "path") {
        let window = reader::child_named(path_node, "window")
            .ok_or_else(|| CompileError::definition("Camera path missing window"))?;
        let constraint = reader::child_named(path_node, "constraint")
            .ok_or_else(|| CompileError::definition("Camera path missing constraint"))?;
        camera.paths.push(CameraPath {
            window: corner_pair(window)?,
            constraint: corner_pair(constraint)?,
        });
    }
    Ok(camera)
}

// Corners share the z attribute: x1/y1 and x2/y2 sit at the same depth.
fn corner_pair(node: Node) -> Result<[Vec3; 2]> {
    let tag = node.tag_name().name();
    let first = reader::vec2_attrs(node, "x1", "y1");
    let second = reader::vec2_attrs(node, "x2", "y2");
    let (Some(first), Some(second)) = (first, second) else {
        return Err(CompileError::Definition(format!("Camera {tag} missing corners")));
    };
    let z = reader::float_attr(node, "z").unwrap_or(0.0);
    Ok([Vec3::new(first.x, first.y, z), Vec3::new(second.x, second.y, z)])
}
