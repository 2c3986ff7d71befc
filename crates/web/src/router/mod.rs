//! Two-tier request routing.
//!
//! Constant paths live in a flat table keyed by method and full URL, looked
//! up in one shot with no normalization. Dynamic paths live in a prefix
//! tree whose nodes own ordered lists of typed templates: resolution walks
//! the tree toward the deepest matching node and only then tries templates,
//! earliest registration first. Behind both tiers, [`FallbackRoutes`] race
//! asynchronous existence probes for content that lives in a backing store
//! rather than the route table.

mod race;
mod template;

pub use race::{ExistenceCheck, FallbackRoutes, RouteProbe, first_existing};
pub use template::{ParamKind, PathTemplate, UID_MAX_LEN};

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use landing_http::grammar::MediaRange;

use crate::handler::PageHandler;

/// A `GET` route.
pub fn get(path: impl Into<RoutePath>, handler: impl PageHandler + 'static) -> Route {
    Route::new(Method::GET, path, handler)
}

/// A `POST` route.
pub fn post(path: impl Into<RoutePath>, handler: impl PageHandler + 'static) -> Route {
    Route::new(Method::POST, path, handler)
}

/// Human-readable route metadata, surfaced by [`RootRouter::routes`].
#[derive(Debug, Clone, Default)]
pub struct RouteDoc {
    pub summary: String,
    pub tags: Vec<String>,
}

/// Where a route lives: a constant path or a typed template.
pub enum RoutePath {
    Exact(String),
    Templated(PathTemplate),
}

impl From<&str> for RoutePath {
    fn from(path: &str) -> Self {
        RoutePath::Exact(path.to_owned())
    }
}

impl From<String> for RoutePath {
    fn from(path: String) -> Self {
        RoutePath::Exact(path)
    }
}

impl From<PathTemplate> for RoutePath {
    fn from(template: PathTemplate) -> Self {
        RoutePath::Templated(template)
    }
}

/// One registered route: the methods it answers, its path shape, the page
/// behind it and its negotiation lists.
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: RoutePath,
    pub(crate) handler: Arc<dyn PageHandler>,
    pub(crate) consumes: Option<Vec<MediaRange<'static>>>,
    pub(crate) produces: Vec<MediaRange<'static>>,
    pub(crate) doc: RouteDoc,
}

impl Route {
    pub fn new(method: Method, path: impl Into<RoutePath>, handler: impl PageHandler + 'static) -> Self {
        Self {
            methods: vec![method],
            path: path.into(),
            handler: Arc::new(handler),
            consumes: None,
            produces: vec![MediaRange::of("text", "html")],
            doc: RouteDoc::default(),
        }
    }

    /// Answers `method` as well. There is no implicit aliasing: a route
    /// that should serve `HEAD` says so here.
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Declares that this route ingests a request body, and which media
    /// types it takes.
    pub fn consumes(mut self, ranges: Vec<MediaRange<'static>>) -> Self {
        self.consumes = Some(ranges);
        self
    }

    /// Replaces the representations this route can produce, in server
    /// preference order. The default is HTML only.
    pub fn produces(mut self, ranges: Vec<MediaRange<'static>>) -> Self {
        self.produces = ranges;
        self
    }

    /// Attaches documentation metadata.
    pub fn describe(mut self, summary: impl Into<String>, tags: &[&str]) -> Self {
        self.doc = RouteDoc { summary: summary.into(), tags: tags.iter().map(|&tag| tag.to_owned()).collect() };
        self
    }

    pub fn doc(&self) -> &RouteDoc {
        &self.doc
    }

    pub fn handler(&self) -> &Arc<dyn PageHandler> {
        &self.handler
    }
}

/// A successful resolution: the matched route and its captured parameters.
pub struct Resolved<'router> {
    pub route: &'router Route,
    pub params: Vec<(String, String)>,
}

/// The route table behind a server: the flat constant tier plus the
/// template tree.
pub struct RootRouter {
    simple: HashMap<String, Arc<Route>>,
    tree: SubRouter,
    catalog: Vec<(String, Arc<Route>)>,
}

impl RootRouter {
    pub fn new() -> Self {
        Self { simple: HashMap::new(), tree: SubRouter::new(String::new()), catalog: Vec::new() }
    }

    /// Registers `route` under the subrouter chain named by `chain`,
    /// creating intermediate nodes on demand.
    ///
    /// A constant path turns into one flat entry per declared method, keyed
    /// by the full URL composed from the chain. A template is bound to the
    /// chain's resolved prefix and appended to that node's ordered list.
    pub fn route(mut self, chain: &[&str], mut route: Route) -> Self {
        let mut prefix = String::new();
        for segment in chain {
            prefix.push('/');
            prefix.push_str(segment);
        }

        let shape = match &mut route.path {
            RoutePath::Exact(path) => {
                *path = format!("{prefix}{path}");
                path.clone()
            }
            RoutePath::Templated(template) => {
                template.bind(prefix);
                template.to_string()
            }
        };

        let shared = Arc::new(route);
        match &shared.path {
            RoutePath::Exact(full) => {
                for method in &shared.methods {
                    self.simple.insert(format!("{method}: {full}"), Arc::clone(&shared));
                }
            }
            RoutePath::Templated(_) => {
                self.tree.descend(chain).templated.push(Arc::clone(&shared));
            }
        }

        let methods = shared.methods.iter().map(Method::as_str).collect::<Vec<_>>().join("|");
        self.catalog.push((format!("{methods} {shape}"), shared));
        self
    }

    /// Resolves `method` and the full request target, query string included.
    ///
    /// The flat tier is consulted first and matches the target byte for
    /// byte; on a miss the template tree takes over.
    pub fn resolve(&self, method: &Method, target: &str) -> Option<Resolved<'_>> {
        if let Some(route) = self.simple.get(&format!("{method}: {target}")) {
            return Some(Resolved { route: route.as_ref(), params: Vec::new() });
        }
        self.tree.resolve(method, target)
    }

    /// Every registered route in registration order, as a display shape
    /// plus its documentation.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &RouteDoc)> {
        self.catalog.iter().map(|(shape, route)| (shape.as_str(), &route.doc))
    }
}

impl Default for RootRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// One node of the template tree. `prefix` is the concatenation of every
/// ancestor segment, so a node can verify its whole path in one strip.
struct SubRouter {
    prefix: String,
    children: HashMap<String, SubRouter>,
    templated: Vec<Arc<Route>>,
}

impl SubRouter {
    fn new(prefix: String) -> Self {
        Self { prefix, children: HashMap::new(), templated: Vec::new() }
    }

    fn descend(&mut self, chain: &[&str]) -> &mut SubRouter {
        let mut node = self;
        for segment in chain {
            let prefix = format!("{}/{segment}", node.prefix);
            node = node.children.entry((*segment).to_owned()).or_insert_with(|| SubRouter::new(prefix));
        }
        node
    }

    fn resolve(&self, method: &Method, target: &str) -> Option<Resolved<'_>> {
        let rest = target.strip_prefix(self.prefix.as_str())?;

        // deeper nodes outrank any template at this level
        if let Some(tail) = rest.strip_prefix('/') {
            let end = tail.find(['/', '?']).unwrap_or(tail.len());
            if let Some(child) = self.children.get(&tail[..end]) {
                if let Some(resolved) = child.resolve(method, target) {
                    return Some(resolved);
                }
            }
        }

        for route in &self.templated {
            let RoutePath::Templated(template) = &route.path else { continue };
            if route.methods.contains(method) && template.matches(target) {
                let params = template.extract(target).unwrap_or_default();
                return Some(Resolved { route: route.as_ref(), params });
            }
        }
        None
    }
}
