//! Application state management

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::project::Project;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    projects: BTreeMap<String, Project>,
}

impl AppState {
    pub fn new(projects: BTreeMap<String, Project>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { projects }),
        }
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.inner.projects.get(name)
    }

    /// Configured project names, sorted
    pub fn project_names(&self) -> Vec<String> {
        self.inner.projects.keys().cloned().collect()
    }
}
