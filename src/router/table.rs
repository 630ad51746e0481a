//! The routing table.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::parser::Method;
use crate::router::error::Error;
use crate::router::pattern::{split_path, Pattern};

/// A (method, pattern) binding to a handler.
#[derive(Debug, Clone)]
pub struct Route<H> {
    pub method: Method,
    pub pattern: Pattern,
    pub handler: H,
}

/// Outcome of a successful [`RouteTable::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<H> {
    /// The handler bound to the matched route.
    pub handler: H,
    /// Variables captured from the path, by name.
    pub path_params: HashMap<String, String>,
    /// The pattern that matched, as registered.
    pub pattern: String,
}

/// Maps (method, path pattern) pairs to handlers.
///
/// Routes are grouped by segment count, so a lookup only ever compares the
/// path against patterns of the same depth. Within a depth, routes are kept
/// sorted by [`Pattern::specificity_cmp`] with registration order breaking
/// ties, and the first route that matches both path and method wins.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    by_depth: HashMap<usize, Vec<Route<H>>>,
    identities: HashSet<(Method, String)>,
    normalize_trailing_slash: bool,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self {
            by_depth: HashMap::new(),
            identities: HashSet::new(),
            normalize_trailing_slash: false,
        }
    }
}

impl<H: Clone> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `/a/` and `/a` as the same path. Applies to routes registered
    /// from now on and to every lookup.
    pub fn set_normalize_trailing_slash(&mut self, enabled: bool) {
        self.normalize_trailing_slash = enabled;
    }

    /// Register a handler for `method` requests whose path matches `pattern`.
    ///
    /// The table is left untouched when this fails.
    pub fn register(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), Error> {
        let pattern = self.normalize(pattern);
        let identity = (method, pattern.to_string());
        if self.identities.contains(&identity) {
            return Err(Error::DuplicateRoute {
                method,
                pattern: pattern.to_string(),
            });
        }

        let pattern = Pattern::parse(pattern)?;
        let routes = self.by_depth.entry(pattern.depth()).or_default();
        // Insert after every route that is at least as specific, which keeps
        // registration order among equals.
        let position = routes
            .iter()
            .position(|route| pattern.specificity_cmp(&route.pattern).is_lt())
            .unwrap_or(routes.len());
        routes.insert(position, Route { method, pattern, handler });
        self.identities.insert(identity);
        Ok(())
    }

    /// Resolve a request path to a handler and its path parameters.
    ///
    /// `path` must not include the query string. Fails with
    /// [`Error::MethodNotAllowed`] when the path matches some route under a
    /// different method, and with [`Error::NotFound`] otherwise.
    pub fn resolve(&self, method: Method, path: &str) -> Result<MatchResult<H>, Error> {
        let lookup = self.normalize(path);
        let parts = split_path(lookup).ok_or_else(|| Error::NotFound(path.to_string()))?;
        let candidates = match self.by_depth.get(&parts.len()) {
            Some(routes) => routes,
            None => {
                debug!("No route of depth {} for {path}", parts.len());
                return Err(Error::NotFound(path.to_string()));
            }
        };

        let mut allowed = Vec::new();
        for route in candidates {
            let Some(path_params) = route.pattern.matches(&parts) else {
                continue;
            };
            if route.method == method {
                return Ok(MatchResult {
                    handler: route.handler.clone(),
                    path_params,
                    pattern: route.pattern.as_str().to_string(),
                });
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method);
            }
        }

        if allowed.is_empty() {
            Err(Error::NotFound(path.to_string()))
        } else {
            Err(Error::MethodNotAllowed {
                method,
                path: path.to_string(),
                allowed,
            })
        }
    }

    fn normalize<'a>(&self, path: &'a str) -> &'a str {
        if self.normalize_trailing_slash && path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        }
    }
}

impl<H> RouteTable<H> {
    /// All registered routes, grouped by depth.
    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        let mut depths: Vec<_> = self.by_depth.keys().copied().collect();
        depths.sort_unstable();
        depths
            .into_iter()
            .flat_map(move |depth| self.by_depth[&depth].iter())
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
