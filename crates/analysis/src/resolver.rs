use std::collections::HashMap;

use tracelens_core::model::component::{ComponentRef, Layer};
use tracelens_core::repo::ComponentRegistry;

pub const UNKNOWN_COMPONENT: &str = "Unknown Component";

/// Outcome of mapping a logger name onto a registered component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentResolution {
    Resolved(ComponentRef),
    Unresolved,
}

impl ComponentResolution {
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved(c) => &c.name,
            Self::Unresolved => UNKNOWN_COMPONENT,
        }
    }

    pub fn layer(&self) -> Option<Layer> {
        match self {
            Self::Resolved(c) => Some(c.layer),
            Self::Unresolved => None,
        }
    }

    /// The component a timeline may attribute a log to: resolved and not
    /// in the filter layer.
    pub fn visible(&self) -> Option<&ComponentRef> {
        match self {
            Self::Resolved(c) if !c.layer.is_filtered() => Some(c),
            _ => None,
        }
    }
}

/// Splits `com.acme.OrderService` into `("com.acme", "OrderService")`.
pub fn split_logger(logger: &str) -> Option<(&str, &str)> {
    let (package, class) = logger.trim().rsplit_once('.')?;
    if package.is_empty() || class.is_empty() {
        return None;
    }
    Some((package, class))
}

/// Resolves a single logger. Registry failures degrade to `Unresolved`.
pub fn resolve<R>(registry: &R, logger: &str, project_id: &str) -> ComponentResolution
where
    R: ComponentRegistry + ?Sized,
{
    let Some((package, class)) = split_logger(logger) else {
        return ComponentResolution::Unresolved;
    };

    match registry.find_by_logger(project_id, package, class) {
        Ok(Some(component)) => ComponentResolution::Resolved(component.to_ref()),
        Ok(None) => ComponentResolution::Unresolved,
        Err(e) => {
            tracing::warn!(project_id, logger, error = ?e, "component lookup failed");
            ComponentResolution::Unresolved
        }
    }
}

/// Per-request memo over [`resolve`]; one registry lookup per distinct logger.
pub struct CachingResolver<'a, R: ?Sized> {
    registry: &'a R,
    project_id: &'a str,
    cache: HashMap<String, ComponentResolution>,
}

impl<'a, R> CachingResolver<'a, R>
where
    R: ComponentRegistry + ?Sized,
{
    pub fn new(registry: &'a R, project_id: &'a str) -> Self {
        Self {
            registry,
            project_id,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, logger: &str) -> &ComponentResolution {
        if !self.cache.contains_key(logger) {
            let resolution = resolve(self.registry, logger, self.project_id);
            self.cache.insert(logger.to_string(), resolution);
        }
        &self.cache[logger]
    }
}
