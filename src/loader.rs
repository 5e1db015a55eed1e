use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Context;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use roxmltree::Document;

use crate::compile::scene::SceneCompiler;
use crate::compile::Ctx;
use crate::error::{CompileError, Result};
use crate::reader;
use crate::resources::{DocumentFetcher, MediaLoader, Resources};
use crate::runtime::world::Scene;

const MAX_REDIRECTS: usize = 8;

/// Resolves `value` against `base`: a value carrying a scheme passes
/// through untouched, anything else replaces the final path segment.
pub fn resolve_url(base: &str, value: &str) -> String {
    if value.contains("://") {
        return value.to_string();
    }
    match base.rfind('/') {
        Some(cut) => format!("{}{}", &base[..cut + 1], value),
        None => value.to_string(),
    }
}

/// Document fetcher over the local filesystem; URLs are plain paths.
pub struct FileFetcher;

impl DocumentFetcher for FileFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, anyhow::Result<String>> {
        async move {
            let text = std::fs::read_to_string(url).with_context(|| format!("reading {url}"))?;
            Ok(text)
        }
        .boxed_local()
    }
}

pub struct Loader {
    fetcher: Rc<dyn DocumentFetcher>,
    media: Rc<dyn MediaLoader>,
    resources: Rc<Resources>,
    scene_names: HashMap<String, String>,
}

impl Loader {
    pub fn new(
        fetcher: Rc<dyn DocumentFetcher>,
        media: Rc<dyn MediaLoader>,
        resources: Resources,
    ) -> Self {
        Loader { fetcher, media, resources: Rc::new(resources), scene_names: HashMap::new() }
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn register_scene(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.scene_names.insert(name.into(), url.into());
    }

    /// Fetches, parses and compiles the scene at `url`. A `<scene src>`
    /// indirection hands off to the referenced document.
    pub async fn load_scene(&self, url: &str) -> Result<Scene> {
        let mut url = url.to_string();
        for _ in 0..MAX_REDIRECTS {
            let text = self.fetcher.fetch(&url).await.map_err(CompileError::from)?;
            let doc = Document::parse(&text).map_err(|err| {
                CompileError::Definition(format!("Failed to parse \"{url}\": {err}"))
            })?;
            let root = doc.root_element();
            let scene_node = if root.tag_name().name() == "scene" {
                root
            } else {
                reader::descendant_named(root, "scene").ok_or_else(|| {
                    CompileError::Definition(format!("No <scene> element in \"{url}\""))
                })?
            };
            if let Some(src) = reader::attr(scene_node, "src") {
                url = resolve_url(&url, src);
                continue;
            }
            let ctx = Ctx::new(&url, self.resources.clone(), self.media.clone());
            return SceneCompiler::new(scene_node, ctx)?.compile().await;
        }
        Err(CompileError::Definition(format!("Too many src redirects loading \"{url}\"")))
    }

    pub async fn load_scene_by_name(&self, name: &str) -> Result<Scene> {
        let url = self.scene_names.get(name).cloned().ok_or_else(|| {
            CompileError::Definition(format!("No resource \"{name}\" of type scene"))
        })?;
        self.load_scene(&url).await
    }

    /// Synchronous entry for hosts without an executor.
    pub fn load_scene_blocking(&self, url: &str) -> Result<Scene> {
        pollster::block_on(self.load_scene(url))
    }
}
