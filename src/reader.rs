use glam::{Vec2, Vec3};
use roxmltree::Node;

use crate::error::{CompileError, Result};
use crate::runtime::PropertyValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
}

pub fn float_attr(node: Node, name: &str) -> Option<f32> {
    attr(node, name).and_then(|raw| raw.trim().parse::<f32>().ok()).filter(|v| v.is_finite())
}

pub fn int_attr(node: Node, name: &str) -> Option<i64> {
    attr(node, name).and_then(|raw| raw.trim().parse::<i64>().ok())
}

pub fn bool_attr(node: Node, name: &str) -> Option<bool> {
    match attr(node, name)?.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

pub fn vec2_attrs(node: Node, name_x: &str, name_y: &str) -> Option<Vec2> {
    let x = float_attr(node, name_x)?;
    let y = float_attr(node, name_y)?;
    Some(Vec2::new(x, y))
}

pub fn position(node: Node) -> Option<Vec3> {
    let xy = vec2_attrs(node, "x", "y")?;
    let z = float_attr(node, "z").unwrap_or(0.0);
    Some(Vec3::new(xy.x, xy.y, z))
}

pub fn rect(node: Node) -> Option<Rect> {
    let w = float_attr(node, "w")?;
    let h = float_attr(node, "h")?;
    let x = float_attr(node, "x").unwrap_or(0.0);
    let y = float_attr(node, "y").unwrap_or(0.0);
    Some(Rect { x, y, w, h })
}

pub fn ensure(node: Node, tag: &str) -> Result<()> {
    if node.is_element() && node.tag_name().name() == tag {
        Ok(())
    } else {
        Err(CompileError::Definition(format!("Node not <{tag}>")))
    }
}

pub fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

pub fn child_named<'a, 'input>(node: Node<'a, 'input>, tag: &'static str) -> Option<Node<'a, 'input>> {
    children_named(node, tag).next()
}

pub fn descendants_named<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

pub fn descendant_named<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> Option<Node<'a, 'input>> {
    descendants_named(node, tag).next()
}

pub fn element_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

pub fn location(node: Node) -> (u32, u32) {
    let pos = node.document().text_pos_at(node.range().start);
    (pos.row, pos.col)
}

pub fn property_value(raw: &str) -> PropertyValue {
    if let Ok(num) = raw.trim().parse::<f32>() {
        if num.is_finite() {
            return PropertyValue::Num(num);
        }
    }
    match raw {
        "true" => PropertyValue::Bool(true),
        "false" => PropertyValue::Bool(false),
        _ => PropertyValue::Str(raw.to_string()),
    }
}
