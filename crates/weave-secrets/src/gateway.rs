//! Secret-aware variable gateway.
//!
//! Secret-typed values are sealed by the [`NativeVault`] as soon as they
//! are stored. Every read hands out the placeholder unless the caller
//! goes through the decrypting methods with an authorised identity.

use crate::vault::{NativeVault, Sealed};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use weave_core::ids::{GroupName, VariableId};
use weave_core::ports::VariableGateway;
use weave_core::variables::{
    CallerIdentity, PASSWORD_PLACEHOLDER, Variable, VariableRef, VariableScope, VariableType,
};
use weave_core::{Error, Result};

/// Gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Groups allowed to decrypt. Empty means any authenticated caller.
    pub authorised_groups: BTreeSet<GroupName>,
}

impl GatewayConfig {
    pub fn with_authorised_group(mut self, group: impl Into<String>) -> Self {
        self.authorised_groups.insert(GroupName::new(group));
        self
    }
}

enum StoredValue {
    Clear(String),
    Sealed(Sealed),
}

struct StoredVariable {
    id: VariableId,
    var_type: VariableType,
    value: StoredValue,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

pub struct SecretVariableGateway {
    vault: NativeVault,
    config: GatewayConfig,
    variables: RwLock<IndexMap<VariableRef, StoredVariable>>,
}

impl SecretVariableGateway {
    pub fn new(vault: NativeVault, config: GatewayConfig) -> Self {
        Self {
            vault,
            config,
            variables: RwLock::new(IndexMap::new()),
        }
    }

    /// Delete every variable of one owner. Returns how many were removed.
    pub async fn delete_owner(
        &self,
        scope: VariableScope,
        owner: &str,
        caller: &CallerIdentity,
    ) -> Result<usize> {
        Self::ensure_writer(caller)?;
        let mut variables = self.variables.write().await;
        let before = variables.len();
        variables.retain(|r, _| !(r.scope == scope && r.owner == owner));
        let removed = before - variables.len();
        info!(owner = %owner, removed, "Deleted owner variables");
        Ok(removed)
    }

    fn authorise(&self, caller: &CallerIdentity) -> Result<()> {
        if !caller.authenticated {
            warn!(user = %caller.username, "Rejected unauthenticated decryption request");
            return Err(Error::PermissionDenied(
                "decryption requires an authenticated caller".to_string(),
            ));
        }
        let authorised = &self.config.authorised_groups;
        if !authorised.is_empty() && authorised.is_disjoint(&caller.groups) {
            warn!(user = %caller.username, "Rejected decryption request outside authorised groups");
            return Err(Error::PermissionDenied(format!(
                "user '{}' may not decrypt variables",
                caller.username
            )));
        }
        Ok(())
    }

    fn ensure_writer(caller: &CallerIdentity) -> Result<()> {
        if caller.authenticated {
            Ok(())
        } else {
            Err(Error::PermissionDenied(
                "variable changes require an authenticated caller".to_string(),
            ))
        }
    }

    fn store_value(&self, var_type: VariableType, value: &str) -> Result<StoredValue> {
        if var_type.is_secret() {
            Ok(StoredValue::Sealed(self.vault.seal(value)?))
        } else {
            Ok(StoredValue::Clear(value.to_string()))
        }
    }

    fn clear_value(&self, stored: &StoredValue) -> Result<String> {
        match stored {
            StoredValue::Clear(value) => Ok(value.clone()),
            StoredValue::Sealed(sealed) => self.vault.open(sealed),
        }
    }

    fn masked(reference: &VariableRef, stored: &StoredVariable) -> Variable {
        let value = match &stored.value {
            StoredValue::Clear(value) => value.clone(),
            StoredValue::Sealed(_) => PASSWORD_PLACEHOLDER.to_string(),
        };
        Variable {
            id: stored.id,
            name: reference.name.clone(),
            var_type: stored.var_type,
            value,
            updated_at: stored.updated_at,
            updated_by: stored.updated_by.clone(),
        }
    }

    fn decrypted(&self, reference: &VariableRef, stored: &StoredVariable) -> Result<Variable> {
        Ok(Variable {
            value: self.clear_value(&stored.value)?,
            ..Self::masked(reference, stored)
        })
    }
}

#[async_trait]
impl VariableGateway for SecretVariableGateway {
    async fn get_masked(&self, reference: &VariableRef) -> Result<Variable> {
        let variables = self.variables.read().await;
        let stored = variables
            .get(reference)
            .ok_or_else(|| Error::VariableNotFound(reference.to_string()))?;
        Ok(Self::masked(reference, stored))
    }

    async fn get_decrypted(
        &self,
        reference: &VariableRef,
        caller: &CallerIdentity,
    ) -> Result<Variable> {
        self.authorise(caller)?;
        let variables = self.variables.read().await;
        let stored = variables
            .get(reference)
            .ok_or_else(|| Error::VariableNotFound(reference.to_string()))?;
        debug!(variable = %reference, user = %caller.username, "Variable decrypted");
        self.decrypted(reference, stored)
    }

    async fn list_masked(&self, scope: VariableScope, owner: &str) -> Result<Vec<Variable>> {
        let variables = self.variables.read().await;
        Ok(variables
            .iter()
            .filter(|(r, _)| r.scope == scope && r.owner == owner)
            .map(|(r, stored)| Self::masked(r, stored))
            .collect())
    }

    async fn list_decrypted(
        &self,
        scope: VariableScope,
        owner: &str,
        caller: &CallerIdentity,
    ) -> Result<Vec<Variable>> {
        self.authorise(caller)?;
        let variables = self.variables.read().await;
        variables
            .iter()
            .filter(|(r, _)| r.scope == scope && r.owner == owner)
            .map(|(r, stored)| self.decrypted(r, stored))
            .collect()
    }

    async fn insert(
        &self,
        reference: &VariableRef,
        var_type: VariableType,
        value: &str,
        caller: &CallerIdentity,
    ) -> Result<Variable> {
        Self::ensure_writer(caller)?;
        if reference.name.trim().is_empty() {
            return Err(Error::InvalidRequest("variable name is empty".to_string()));
        }

        let mut variables = self.variables.write().await;
        if variables.contains_key(reference) {
            return Err(Error::InvalidRequest(format!(
                "variable {reference} already exists"
            )));
        }
        let stored = StoredVariable {
            id: VariableId::new(),
            var_type,
            value: self.store_value(var_type, value)?,
            updated_at: Utc::now(),
            updated_by: Some(caller.username.clone()),
        };
        let variable = Self::masked(reference, &stored);
        variables.insert(reference.clone(), stored);

        info!(variable = %reference, var_type = ?var_type, "Variable created");
        Ok(variable)
    }

    async fn update(
        &self,
        reference: &VariableRef,
        var_type: VariableType,
        value: &str,
        caller: &CallerIdentity,
    ) -> Result<Variable> {
        Self::ensure_writer(caller)?;
        let mut variables = self.variables.write().await;
        let stored = variables
            .get_mut(reference)
            .ok_or_else(|| Error::VariableNotFound(reference.to_string()))?;

        // The placeholder means "unchanged" for secrets.
        let value = if var_type.is_secret() && value == PASSWORD_PLACEHOLDER {
            self.clear_value(&stored.value)?
        } else {
            value.to_string()
        };
        stored.value = self.store_value(var_type, &value)?;
        stored.var_type = var_type;
        stored.updated_at = Utc::now();
        stored.updated_by = Some(caller.username.clone());

        info!(variable = %reference, var_type = ?var_type, "Variable updated");
        Ok(Self::masked(reference, stored))
    }

    async fn delete(&self, reference: &VariableRef, caller: &CallerIdentity) -> Result<()> {
        Self::ensure_writer(caller)?;
        let mut variables = self.variables.write().await;
        variables
            .shift_remove(reference)
            .ok_or_else(|| Error::VariableNotFound(reference.to_string()))?;
        info!(variable = %reference, "Variable deleted");
        Ok(())
    }
}
