use futures::future::try_join_all;
use roxmltree::Node;

use crate::compile::Ctx;
use crate::error::{CompileError, Result};
use crate::reader;
use crate::runtime::animation::{TextureRecord, TextureSet};
use crate::runtime::DEFAULT_ID;

/// Scans `textures > texture` under the scope element and loads every image
/// concurrently. The first record parsed becomes the default unless an id
/// claims the default slot outright.
pub async fn compile(scope: Node<'_, '_>, ctx: &Ctx) -> Result<TextureSet> {
    let mut ids = Vec::new();
    let mut sizes = Vec::new();
    let mut urls = Vec::new();

    for pool in reader::descendants_named(scope, "textures") {
        for node in reader::children_named(pool, "texture") {
            let id = reader::attr(node, "id").unwrap_or(DEFAULT_ID).to_string();
            let src = reader::attr(node, "src").ok_or_else(|| {
                CompileError::Definition(format!("Texture src missing for \"{id}\""))
            })?;
            let size = reader::vec2_attrs(node, "w", "h").ok_or_else(|| {
                CompileError::Definition(format!("Texture size missing for \"{id}\""))
            })?;
            urls.push(ctx.resolve_url(src));
            ids.push(id);
            sizes.push(size);
        }
    }

    let handles = try_join_all(urls.iter().map(|url| ctx.media.load_texture(url)))
        .await
        .map_err(CompileError::from)?;

    let mut set = TextureSet::default();
    for ((id, size), handle) in ids.into_iter().zip(sizes).zip(handles) {
        set.insert(TextureRecord { id, handle, size });
    }
    Ok(set)
}
