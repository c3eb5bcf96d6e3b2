//! # Route Patterns
//!
//! A registered path such as `/movies/{id:int}/` is kept as the pattern
//! matchit understands (`/movies/{id}/`) plus the declared type of each
//! parameter, applied once a request has matched.

use crate::router::HandlerId;
use crate::types::{parse_segment, ParamType, ParamValue};
use std::collections::HashMap;

/// One registered route
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Handler the route dispatches to
    pub handler_id: HandlerId,
    /// Pattern with type suffixes stripped, as inserted into matchit
    pub match_pattern: String,
    params: Vec<(String, ParamType)>,
}

impl RouteInfo {
    /// Parse `path`, keeping its leading and trailing slashes as written
    #[must_use]
    pub fn new(handler_id: HandlerId, path: &str) -> Self {
        let mut params = Vec::new();
        let match_pattern = path
            .split('/')
            .map(|segment| match parse_segment(segment) {
                Some((name, param_type)) => {
                    params.push((name.to_string(), param_type));
                    format!("{{{name}}}")
                }
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/");

        Self {
            handler_id,
            match_pattern,
            params,
        }
    }

    /// Declared type of parameter `name`, text when undeclared
    #[must_use]
    pub fn param_type(&self, name: &str) -> ParamType {
        self.params
            .iter()
            .find(|(declared, _)| declared == name)
            .map_or(ParamType::String, |(_, param_type)| *param_type)
    }

    /// Convert raw matched parameters to their declared types
    pub fn typed_params<'k, 'v>(
        &self,
        raw: impl Iterator<Item = (&'k str, &'v str)>,
    ) -> HashMap<String, ParamValue> {
        raw.map(|(name, value)| (name.to_string(), self.param_type(name).convert(value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_route() {
        let info = RouteInfo::new(0, "/genres/");
        assert_eq!(info.match_pattern, "/genres/");
        assert_eq!(info.param_type("id"), ParamType::String);
    }

    #[test]
    fn test_member_route() {
        let info = RouteInfo::new(3, "/cinema_halls/{id:int}/");
        assert_eq!(info.handler_id, 3);
        assert_eq!(info.match_pattern, "/cinema_halls/{id}/");
        assert_eq!(info.param_type("id"), ParamType::Int);
    }

    #[test]
    fn test_slashes_kept_as_written() {
        assert_eq!(RouteInfo::new(0, "/").match_pattern, "/");
        assert_eq!(RouteInfo::new(0, "/genres").match_pattern, "/genres");
    }

    #[test]
    fn test_typed_params() {
        let info = RouteInfo::new(0, "/actors/{id:int}/{slug}/");
        let typed = info.typed_params([("id", "7"), ("slug", "keanu")].into_iter());
        assert_eq!(typed.get("id"), Some(&ParamValue::Int(7)));
        assert_eq!(typed.get("slug"), Some(&ParamValue::String("keanu".to_string())));
    }
}
