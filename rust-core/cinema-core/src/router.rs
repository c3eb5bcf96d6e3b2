//! # Router
//!
//! Radix-trie routing with `matchit`, one trie per method. Besides matching,
//! the router answers which methods a path supports, which the server turns
//! into `405` and `OPTIONS` responses. `HEAD` is allowed wherever `GET` is.

use crate::error::{Error, Result};
use crate::route::RouteInfo;
use crate::types::ParamValue;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP PATCH
    Patch,
    /// HTTP DELETE
    Delete,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method, `None` for methods the router never serves
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }

    /// Upper-case method name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with its converted parameters
#[derive(Debug)]
pub struct Match {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Path parameters converted to their declared types
    pub typed_params: HashMap<String, ParamValue>,
}

impl Match {
    /// Get a parameter as i64
    ///
    /// `None` when the parameter is absent or did not parse as an integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.typed_params.get(name).and_then(ParamValue::as_int)
    }
}

/// Per-method storage for routes
#[derive(Clone)]
struct MethodRoutes {
    router: MatchitRouter<HandlerId>,
    routes: Vec<RouteInfo>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            router: MatchitRouter::new(),
            routes: Vec::new(),
        }
    }
}

/// HTTP router using radix trie
#[derive(Clone)]
pub struct Router {
    /// Per-method routers for efficient matching
    method_routes: HashMap<Method, MethodRoutes>,
    /// Counter for generating handler IDs
    next_handler_id: HandlerId,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_routes: HashMap::new(),
            next_handler_id: 0,
        }
    }

    /// Register a route with the given method and path pattern
    ///
    /// Supports typed parameters: `/genres/{id:int}/`
    ///
    /// # Returns
    ///
    /// The handler ID assigned to this route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// already registered for this method.
    pub fn add_route(&mut self, method: Method, path: &str) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;

        let route_info = RouteInfo::new(handler_id, path);

        let method_routes = self
            .method_routes
            .entry(method)
            .or_insert_with(MethodRoutes::new);

        method_routes
            .router
            .insert(route_info.match_pattern.clone(), handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        method_routes.routes.push(route_info);
        self.next_handler_id += 1;

        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// A typed parameter that fails conversion is kept as
    /// `ParamValue::String`, so handlers decide how to answer it.
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let method_routes = self.method_routes.get(&method).ok_or_else(not_found)?;
        let matched = method_routes.router.at(path).map_err(|_| not_found())?;
        let handler_id = *matched.value;

        let route_info = method_routes
            .routes
            .iter()
            .find(|r| r.handler_id == handler_id)
            .ok_or_else(not_found)?;

        Ok(Match {
            handler_id,
            typed_params: route_info.typed_params(matched.params.iter()),
        })
    }

    /// Methods with a route matching `path`, sorted
    ///
    /// `HEAD` is included whenever `GET` is. Empty when the path is unknown
    /// to every method.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .method_routes
            .iter()
            .filter(|(_, routes)| routes.router.at(path).is_ok())
            .map(|(method, _)| *method)
            .collect();
        if methods.contains(&Method::Get) && !methods.contains(&Method::Head) {
            methods.push(Method::Head);
        }
        methods.sort_unstable();
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_routing() {
        let mut router = Router::new();

        let id1 = router.add_route(Method::Get, "/").unwrap();
        let id2 = router.add_route(Method::Get, "/genres/").unwrap();
        let id3 = router.add_route(Method::Post, "/genres/").unwrap();

        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
        assert_eq!(id3, 2);

        let m = router.match_route(Method::Get, "/").unwrap();
        assert_eq!(m.handler_id, 0);

        let m = router.match_route(Method::Get, "/genres/").unwrap();
        assert_eq!(m.handler_id, 1);

        let m = router.match_route(Method::Post, "/genres/").unwrap();
        assert_eq!(m.handler_id, 2);
    }

    #[test]
    fn test_untyped_parameter_stays_text() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/actors/{id}/").unwrap();

        let m = router.match_route(Method::Get, "/actors/123/").unwrap();
        assert_eq!(
            m.typed_params.get("id"),
            Some(&ParamValue::String("123".to_string()))
        );
        assert_eq!(m.get_int("id"), None);
    }

    #[test]
    fn test_typed_int_parameter() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/movies/{id:int}/").unwrap();

        let m = router.match_route(Method::Get, "/movies/123/").unwrap();
        assert_eq!(m.typed_params.get("id"), Some(&ParamValue::Int(123)));
        assert_eq!(m.get_int("id"), Some(123));
    }

    #[test]
    fn test_invalid_type_fallback_to_string() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/movies/{id:int}/").unwrap();

        let m = router.match_route(Method::Get, "/movies/abc/").unwrap();
        assert_eq!(
            m.typed_params.get("id"),
            Some(&ParamValue::String("abc".to_string()))
        );
        assert_eq!(m.get_int("id"), None);
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/genres/").unwrap();
        assert!(router.add_route(Method::Get, "/genres/").is_err());

        // a failed registration does not consume an id
        assert_eq!(router.add_route(Method::Post, "/genres/").unwrap(), 1);
    }

    #[test]
    fn test_route_not_found() {
        let router = Router::new();
        let result = router.match_route(Method::Get, "/nonexistent/");
        assert!(result.is_err());
    }

    #[test]
    fn test_method_not_allowed() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/genres/").unwrap();

        let result = router.match_route(Method::Post, "/genres/");
        assert!(result.is_err());
    }

    #[test]
    fn test_allowed_methods() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/genres/").unwrap();
        router.add_route(Method::Post, "/genres/").unwrap();
        router.add_route(Method::Delete, "/genres/{id:int}/").unwrap();
        router.add_route(Method::Patch, "/genres/{id:int}/").unwrap();

        assert_eq!(
            router.allowed_methods("/genres/"),
            vec![Method::Get, Method::Post, Method::Head]
        );
        assert_eq!(
            router.allowed_methods("/genres/7/"),
            vec![Method::Patch, Method::Delete]
        );
        assert!(router.allowed_methods("/halls/").is_empty());
    }

    #[test]
    fn test_method_from_hyper() {
        assert_eq!(Method::from_hyper(&hyper::Method::PATCH), Some(Method::Patch));
        assert_eq!(Method::from_hyper(&hyper::Method::TRACE), None);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
