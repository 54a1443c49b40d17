//! Variable types.
//!
//! Secret-typed variables never travel in clear through the engine: the
//! gateway hands out [`PASSWORD_PLACEHOLDER`] unless a caller explicitly
//! asks for decryption with an authenticated identity.

use crate::ids::{GroupName, VariableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Fixed token returned in place of a secret value.
pub const PASSWORD_PLACEHOLDER: &str = "**********";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Text,
    Boolean,
    Number,
    Secret,
    Key,
}

impl VariableType {
    pub fn is_secret(self) -> bool {
        matches!(self, VariableType::Secret | VariableType::Key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Project,
    Application,
    Environment,
}

/// Address of a variable: scope, owning entity and variable name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableRef {
    pub scope: VariableScope,
    pub owner: String,
    pub name: String,
}

impl VariableRef {
    pub fn new(scope: VariableScope, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope,
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn application(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(VariableScope::Application, owner, name)
    }

    pub fn project(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(VariableScope::Project, owner, name)
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            VariableScope::Project => "project",
            VariableScope::Application => "application",
            VariableScope::Environment => "environment",
        };
        write!(f, "{}/{}/{}", scope, self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub var_type: VariableType,
    pub value: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl Variable {
    /// The value with secrets replaced by the placeholder.
    pub fn masked(mut self) -> Self {
        if self.var_type.is_secret() {
            self.value = PASSWORD_PLACEHOLDER.to_string();
        }
        self
    }

    pub fn is_masked(&self) -> bool {
        self.var_type.is_secret() && self.value == PASSWORD_PLACEHOLDER
    }
}

/// Authenticated identity presented by callers that need clear values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub username: String,
    pub groups: BTreeSet<GroupName>,
    pub authenticated: bool,
}

impl CallerIdentity {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: BTreeSet::new(),
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            username: "anonymous".to_string(),
            groups: BTreeSet::new(),
            authenticated: false,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(GroupName::new(group));
        self
    }
}
