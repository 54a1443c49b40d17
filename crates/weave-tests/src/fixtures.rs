//! Test fixtures for creating sample data.

use weave_core::permission::{PermissionEntry, PermissionLevel};
use weave_core::project::{Project, RepositoryLink};

pub const PROJECT_KEY: &str = "WEAVE";
pub const OWNER_GROUP: &str = "a-owners";
pub const DEV_GROUP: &str = "b-devs";
pub const OPS_GROUP: &str = "c-ops";

/// Factory for creating test projects.
pub struct ProjectFixture;

impl ProjectFixture {
    /// Project owned by one group with two more groups at read-execute and a
    /// single pipeline `pip1`.
    pub fn standard() -> Project {
        Project::new(PROJECT_KEY, "Weave project")
            .with_group(PermissionEntry::new(OWNER_GROUP, PermissionLevel::ReadWriteExecute))
            .with_group(PermissionEntry::new(DEV_GROUP, PermissionLevel::ReadExecute))
            .with_group(PermissionEntry::new(OPS_GROUP, PermissionLevel::ReadExecute))
            .with_pipeline("pip1")
    }

    /// Standard project linked to a repository.
    pub fn with_repository() -> Project {
        Self::standard().with_repository(RepositoryLink::new("github", "weave/workflows"))
    }
}

/// Factory for flat workflow documents.
pub struct DocumentFixture;

impl DocumentFixture {
    /// Single-node workflow.
    pub fn single(name: &str) -> String {
        format!("name: {name}\nversion: v2.0\nworkflow:\n  pip1:\n    pipeline: pip1\n")
    }

    /// Single-node workflow with an explicit permission block.
    pub fn single_with_permissions(name: &str, permissions: &[(&str, u8)]) -> String {
        let mut doc = Self::single(name);
        if permissions.is_empty() {
            doc.push_str("permissions: {}\n");
            return doc;
        }
        doc.push_str("permissions:\n");
        for (group, level) in permissions {
            doc.push_str(&format!("  {group}: {level}\n"));
        }
        doc
    }

    /// Four builds converging on `join`; `fork` hangs off one deploy only.
    pub fn scenario_a() -> String {
        r#"name: test_1
version: v1.0
workflow:
  build_admin-panel-api:
    depends_on:
    - root
    pipeline: pip1
  build_admin-panel-ui:
    depends_on:
    - root
    pipeline: pip1
  build_cache-manager:
    depends_on:
    - root
    pipeline: pip1
  build_health-checker:
    depends_on:
    - root
    pipeline: pip1
  deploy_admin-panel-api_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_admin-panel-api_prod:
    depends_on:
    - fork
    pipeline: pip1
  deploy_admin-panel-ui_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_admin-panel-ui_prod:
    depends_on:
    - fork
    pipeline: pip1
  deploy_cache-manager_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_cache-manager_prod:
    depends_on:
    - fork
    pipeline: pip1
  deploy_health-checker_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_health-checker_prod:
    depends_on:
    - fork
    pipeline: pip1
  join:
    depends_on:
    - build_admin-panel-api
    - build_admin-panel-ui
    - build_cache-manager
    - build_health-checker
    conditions:
      script: return cds_status == "Success" and cds_manual == "true" -- and (cds_manual
        == "true" or git_branch == "master" or git_branch:find("^release/") ~= nil)
  fork:
    depends_on:
    - deploy_admin-panel-api_dev
    conditions:
      script: return cds_status == "Success" and cds_manual == "true"
  root:
    pipeline: pip1
    payload:
      git.branch: master
metadata:
  default_tags: git.branch,git.tag
"#
        .to_string()
    }

    /// Same shape as scenario A, but the dev deploys all converge on `join_2`.
    pub fn scenario_b() -> String {
        r#"name: test_1
version: v1.0
workflow:
  build_admin-panel-api:
    depends_on:
    - root
    pipeline: pip1
  build_admin-panel-ui:
    depends_on:
    - root
    pipeline: pip1
  build_cache-manager:
    depends_on:
    - root
    pipeline: pip1
  build_health-checker:
    depends_on:
    - root
    pipeline: pip1
  deploy_admin-panel-api_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_admin-panel-api_prod:
    depends_on:
    - join_2
    pipeline: pip1
  deploy_admin-panel-ui_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_admin-panel-ui_prod:
    depends_on:
    - join_2
    pipeline: pip1
  deploy_cache-manager_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_cache-manager_prod:
    depends_on:
    - join_2
    pipeline: pip1
  deploy_health-checker_dev:
    depends_on:
    - join
    pipeline: pip1
  deploy_health-checker_prod:
    depends_on:
    - join_2
    pipeline: pip1
  join:
    depends_on:
    - build_admin-panel-api
    - build_admin-panel-ui
    - build_cache-manager
    - build_health-checker
    conditions:
      script: return cds_status == "Success" and cds_manual == "true" -- and (cds_manual
        == "true" or git_branch == "master" or git_branch:find("^release/") ~= nil)
  join_2:
    depends_on:
    - deploy_admin-panel-api_dev
    - deploy_admin-panel-ui_dev
    - deploy_cache-manager_dev
    - deploy_health-checker_dev
    conditions:
      script: return cds_status == "Success" and cds_manual == "true"
  root:
    pipeline: pip1
    payload:
      git.branch: master
metadata:
  default_tags: git.branch,git.tag
"#
        .to_string()
    }

    /// A node depending on a name that is never declared.
    pub fn unknown_predecessor() -> String {
        r#"name: broken
workflow:
  root:
    pipeline: pip1
  deploy:
    pipeline: pip1
    depends_on:
    - ghost
"#
        .to_string()
    }
}
