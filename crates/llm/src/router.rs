//! Model router
//!
//! Maps an external model alias to a backend base URL and the model id the
//! backend actually serves. Built once at startup from configuration.

use mnemo_config::BackendRoute;

use crate::LlmError;

/// One resolved backend route
#[derive(Debug, Clone)]
pub struct Route {
    pub base_url: String,
    pub model: String,
}

/// Alias -> backend table, preserving registration order
#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    routes: Vec<(String, Route)>,
}

impl ModelRouter {
    pub fn from_backends(backends: &[BackendRoute]) -> Self {
        let routes = backends
            .iter()
            .map(|b| {
                (
                    b.alias.clone(),
                    Route {
                        base_url: b.url.trim_end_matches('/').to_string(),
                        model: b.model.clone(),
                    },
                )
            })
            .collect();
        Self { routes }
    }

    pub fn resolve(&self, alias: &str) -> Result<&Route, LlmError> {
        self.routes
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, route)| route)
            .ok_or_else(|| LlmError::UnknownModel(alias.to_string()))
    }

    /// Aliases deduplicated by backend URL, so each backend is listed once.
    /// The first alias registered for a backend wins.
    pub fn list(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        let mut names = Vec::new();
        for (alias, route) in &self.routes {
            if !seen.contains(&route.base_url.as_str()) {
                seen.push(route.base_url.as_str());
                names.push(alias.as_str());
            }
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(alias: &str, url: &str, model: &str) -> BackendRoute {
        BackendRoute {
            alias: alias.to_string(),
            url: url.to_string(),
            model: model.to_string(),
        }
    }

    fn router() -> ModelRouter {
        ModelRouter::from_backends(&[
            backend("qwen3-coder", "http://qwen:80", "qwen3-coder-next:q4_K_M"),
            backend("qwen3-coder-next", "http://qwen:80", "qwen3-coder-next:q4_K_M"),
            backend("deepseek-r1", "http://deepseek:80", "deepseek-r1:32b"),
            backend("deepseek", "http://deepseek:80", "deepseek-r1:32b"),
        ])
    }

    #[test]
    fn test_resolve_known_alias() {
        let r = router();
        let route = r.resolve("deepseek").unwrap();
        assert_eq!(route.base_url, "http://deepseek:80");
        assert_eq!(route.model, "deepseek-r1:32b");
    }

    #[test]
    fn test_resolve_unknown_alias() {
        let r = router();
        assert!(matches!(r.resolve("gpt-4"), Err(LlmError::UnknownModel(_))));
    }

    #[test]
    fn test_list_dedups_by_backend_url() {
        let r = router();
        assert_eq!(r.list(), vec!["qwen3-coder", "deepseek-r1"]);
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let r = ModelRouter::from_backends(&[backend("m", "http://host:1234/", "m:latest")]);
        assert_eq!(r.resolve("m").unwrap().base_url, "http://host:1234");
    }
}
