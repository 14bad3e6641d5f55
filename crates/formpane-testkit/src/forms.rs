use std::collections::{BTreeMap, BTreeSet};

use formpane_runtime::{FetchError, FormSource};

/// Form source backed by a map of resource path to template text.
#[derive(Debug, Default)]
pub struct StaticForms {
    templates: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    fetches: BTreeMap<String, usize>,
}

impl StaticForms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: &str, html: &str) -> Self {
        self.templates.insert(resource.to_string(), html.to_string());
        self
    }

    /// Fetches of `resource` fail with a 503 until [`restore`](Self::restore).
    pub fn fail(&mut self, resource: &str) {
        self.failing.insert(resource.to_string());
    }

    pub fn restore(&mut self, resource: &str) {
        self.failing.remove(resource);
    }

    pub fn fetch_count(&self, resource: &str) -> usize {
        self.fetches.get(resource).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.values().sum()
    }
}

impl FormSource for StaticForms {
    fn fetch(&mut self, resource: &str) -> Result<String, FetchError> {
        *self.fetches.entry(resource.to_string()).or_default() += 1;
        if self.failing.contains(resource) {
            return Err(FetchError::new(resource, "service unavailable").with_status(503));
        }
        self.templates
            .get(resource)
            .cloned()
            .ok_or_else(|| FetchError::new(resource, "not found").with_status(404))
    }
}
