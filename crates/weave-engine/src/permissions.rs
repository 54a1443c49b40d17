//! Permission resolver.
//!
//! An import without a `permissions` block resets the workflow ACL to the
//! project defaults; an import with one replaces the ACL verbatim. The two
//! are never merged: omitting the project's own group from an explicit
//! block removes that group's access.

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};
use weave_core::graph::WorkflowGraph;
use weave_core::ids::GroupName;
use weave_core::permission::{AclSource, PermissionEntry, PermissionLevel};
use weave_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAcl {
    pub entries: Vec<PermissionEntry>,
    pub source: AclSource,
    /// Groups present now that were absent from the previous ACL.
    pub granted: Vec<GroupName>,
    /// Groups of the previous ACL that lost access.
    pub revoked: Vec<GroupName>,
}

impl ResolvedAcl {
    pub fn level_of(&self, group: &str) -> Option<PermissionLevel> {
        self.entries
            .iter()
            .find(|e| e.group.as_str() == group)
            .map(|e| e.level)
    }
}

#[derive(Debug, Clone)]
pub struct PermissionResolver {
    project_defaults: Vec<PermissionEntry>,
    known_groups: BTreeSet<GroupName>,
}

impl PermissionResolver {
    /// Resolver for a project's default group permissions. Those groups
    /// are always known.
    pub fn new(project_defaults: Vec<PermissionEntry>) -> Self {
        let known_groups = project_defaults.iter().map(|e| e.group.clone()).collect();
        Self {
            project_defaults,
            known_groups,
        }
    }

    /// Add groups that exist on the platform without being project defaults.
    pub fn with_known_groups(mut self, groups: impl IntoIterator<Item = GroupName>) -> Self {
        self.known_groups.extend(groups);
        self
    }

    /// Compute the final ACL.
    ///
    /// `explicit` is the document's permission block, `previous` the ACL
    /// currently stored for the workflow.
    #[instrument(skip_all, fields(explicit = explicit.is_some()))]
    pub fn resolve(
        &self,
        explicit: Option<&[PermissionEntry]>,
        previous: Option<&[PermissionEntry]>,
    ) -> Result<ResolvedAcl> {
        ensure_unique("project defaults", &self.project_defaults)?;

        let (entries, source) = match explicit {
            None => (self.project_defaults.clone(), AclSource::Inherited),
            Some(entries) => {
                ensure_unique("permissions", entries)?;
                let unknown = entries.iter().find(|e| !self.known_groups.contains(&e.group));
                if let Some(entry) = unknown {
                    return Err(Error::PermissionConflict(format!(
                        "unknown group '{}'",
                        entry.group
                    )));
                }
                (entries.to_vec(), AclSource::Explicit)
            }
        };

        if entries.is_empty() {
            return Err(Error::PermissionConflict(
                "no group would have access to the workflow".to_string(),
            ));
        }

        let previous = previous.unwrap_or_default();
        let before: HashSet<&GroupName> = previous.iter().map(|e| &e.group).collect();
        let after: HashSet<&GroupName> = entries.iter().map(|e| &e.group).collect();
        let granted = entries
            .iter()
            .filter(|e| !before.contains(&e.group))
            .map(|e| e.group.clone())
            .collect::<Vec<_>>();
        let revoked = previous
            .iter()
            .filter(|e| !after.contains(&e.group))
            .map(|e| e.group.clone())
            .collect::<Vec<_>>();

        debug!(
            source = ?source,
            groups = entries.len(),
            granted = granted.len(),
            revoked = revoked.len(),
            "Resolved workflow ACL"
        );

        Ok(ResolvedAcl {
            entries,
            source,
            granted,
            revoked,
        })
    }

    /// Resolve and attach the ACL to a graph, using the graph's current ACL
    /// as the previous one.
    pub fn apply(
        &self,
        graph: &mut WorkflowGraph,
        explicit: Option<&[PermissionEntry]>,
    ) -> Result<ResolvedAcl> {
        let previous = (!graph.acl.is_empty()).then(|| graph.acl.as_slice());
        let resolved = self.resolve(explicit, previous)?;
        graph.acl = resolved.entries.clone();
        Ok(resolved)
    }
}

fn ensure_unique(what: &str, entries: &[PermissionEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(&entry.group) {
            return Err(Error::PermissionConflict(format!(
                "group '{}' appears twice in {what}",
                entry.group
            )));
        }
    }
    Ok(())
}
