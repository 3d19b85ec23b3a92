//! Mesh templates: one immutable scene graph per mesh path, shared by every
//! chunk that places the mesh.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::BoundingSphere;
use crate::scene::Node;

use super::compile::CompileQueue;

/// A loaded mesh. Never mutated after construction.
#[derive(Debug)]
pub struct Template {
    pub path: String,
    pub root: Arc<Node>,
    bound: BoundingSphere,
}

impl Template {
    pub fn new(path: impl Into<String>, root: Arc<Node>) -> Self {
        let bound = root.bound();
        Self {
            path: path.into(),
            root,
            bound,
        }
    }

    /// Bound of the template in its own space.
    pub fn bound(&self) -> BoundingSphere {
        self.bound
    }
}

/// Supplies templates by mesh path.
pub trait TemplateSource: Send + Sync {
    /// `compile` asks for the template's GPU resources to be prepared early.
    fn get_template(&self, path: &str, compile: bool) -> Result<Arc<Template>>;
}

type Loader = dyn Fn(&str) -> Result<Node> + Send + Sync;

/// Caches templates produced by a loader.
///
/// A template stays cached while anything else holds it: chunks keep the
/// templates they were built from, and [`TemplateCache::prune_unused`] only
/// drops templates the cache alone owns.
pub struct TemplateCache {
    loader: Box<Loader>,
    templates: RwLock<HashMap<String, Arc<Template>>>,
    compile_queue: Option<Arc<dyn CompileQueue>>,
}

impl TemplateCache {
    pub fn new(loader: impl Fn(&str) -> Result<Node> + Send + Sync + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            templates: RwLock::new(HashMap::new()),
            compile_queue: None,
        }
    }

    pub fn with_compile_queue(mut self, queue: Arc<dyn CompileQueue>) -> Self {
        self.compile_queue = Some(queue);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.templates.read().contains_key(path)
    }

    /// Drop templates nothing outside the cache refers to. Returns how many were dropped.
    pub fn prune_unused(&self) -> usize {
        let mut templates = self.templates.write();
        let before = templates.len();
        templates.retain(|_, t| Arc::strong_count(t) > 1);
        let pruned = before - templates.len();
        if pruned > 0 {
            log::debug!("Pruned {} unused templates, {} remain", pruned, templates.len());
        }
        pruned
    }

    pub fn clear(&self) {
        self.templates.write().clear();
    }

    fn load(&self, path: &str) -> Result<Arc<Template>> {
        let root = (self.loader)(path).map_err(|e| match e {
            e @ Error::TemplateLoad { .. } => e,
            other => Error::TemplateLoad {
                path: path.to_string(),
                reason: other.to_string(),
            },
        })?;
        Ok(Arc::new(Template::new(path, Arc::new(root))))
    }
}

impl TemplateSource for TemplateCache {
    fn get_template(&self, path: &str, compile: bool) -> Result<Arc<Template>> {
        if let Some(template) = self.templates.read().get(path) {
            return Ok(Arc::clone(template));
        }

        // Loaded without holding the lock; a racing loader of the same path loses.
        let loaded = self.load(path)?;
        let template = {
            let mut templates = self.templates.write();
            Arc::clone(templates.entry(path.to_string()).or_insert(loaded))
        };
        log::trace!("Loaded template {}", path);

        if compile {
            if let Some(queue) = &self.compile_queue {
                queue.enqueue(Arc::clone(&template.root));
            }
        }
        Ok(template)
    }
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("templates", &self.len())
            .field("compile_queue", &self.compile_queue.is_some())
            .finish()
    }
}
