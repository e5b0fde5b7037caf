//! One node of a router's dispatch sequence.

use junction_core::JunctionResult;

use super::handler::Callback;
use super::pattern::{PathMatch, PathPattern};
use super::route::Route;

/// What a [`Layer`] runs once its pattern matches.
#[derive(Debug)]
pub enum LayerKind {
    /// A route: whole-path match, method-filtered.
    Route(Route),
    /// Middleware or a mounted router: prefix match, any method.
    Callback(Callback),
}

/// A compiled path pattern paired with what it dispatches to.
#[derive(Debug)]
pub struct Layer {
    pattern: PathPattern,
    kind: LayerKind,
}

impl Layer {
    /// Creates a layer.
    pub const fn new(pattern: PathPattern, kind: LayerKind) -> Self {
        Self { pattern, kind }
    }

    /// Returns the compiled pattern.
    pub const fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns what the layer dispatches to.
    pub const fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Returns the route, for route layers.
    pub const fn route(&self) -> Option<&Route> {
        match &self.kind {
            LayerKind::Route(route) => Some(route),
            LayerKind::Callback(_) => None,
        }
    }

    pub(crate) fn route_mut(&mut self) -> Option<&mut Route> {
        match &mut self.kind {
            LayerKind::Route(route) => Some(route),
            LayerKind::Callback(_) => None,
        }
    }

    /// Matches the layer's pattern against a path.
    ///
    /// # Errors
    ///
    /// Propagates decode failures from [`PathPattern::matches`].
    pub fn matches(&self, path: &str) -> JunctionResult<Option<PathMatch>> {
        self.pattern.matches(path)
    }
}
