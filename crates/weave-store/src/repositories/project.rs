//! In-memory implementation of ProjectDirectory.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::info;
use weave_core::ids::{GroupName, ProjectKey};
use weave_core::ports::ProjectDirectory;
use weave_core::project::Project;
use weave_core::{Error, Result};

#[derive(Default)]
pub struct MemoryProjectDirectory {
    projects: RwLock<HashMap<ProjectKey, Project>>,
    groups: RwLock<BTreeSet<GroupName>>,
}

impl MemoryProjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a project. Its groups become known groups.
    pub async fn add_project(&self, project: Project) {
        self.groups.write().await.extend(project.group_names());
        info!(project = %project.key, groups = project.groups.len(), "Project registered");
        self.projects.write().await.insert(project.key.clone(), project);
    }

    /// Register a group that is not linked to any project.
    pub async fn add_group(&self, group: impl Into<String>) {
        self.groups.write().await.insert(GroupName::new(group));
    }
}

#[async_trait]
impl ProjectDirectory for MemoryProjectDirectory {
    async fn project(&self, key: &ProjectKey) -> Result<Project> {
        self.projects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ProjectNotFound(key.to_string()))
    }

    async fn known_groups(&self) -> Result<BTreeSet<GroupName>> {
        Ok(self.groups.read().await.clone())
    }
}
