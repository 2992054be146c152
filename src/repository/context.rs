use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::Record;

/// The acting identity behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: Uuid) -> Self {
        Self { id, roles: Vec::new() }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Immutable (principal, parent) pair scoping authorization and queries.
///
/// No principal means an anonymous caller. Traversal never mutates a context;
/// it derives a new one with [`Context::descend`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    principal: Option<Principal>,
    parent: Option<Arc<Record>>,
}

impl Context {
    pub fn new(principal: Option<Principal>, parent: Option<Record>) -> Self {
        Self { principal, parent: parent.map(Arc::new) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: Principal) -> Self {
        Self::new(Some(principal), None)
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn principal_id(&self) -> Option<Uuid> {
        self.principal.as_ref().map(|p| p.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.principal.as_ref().is_some_and(|p| p.has_role(role))
    }

    pub fn parent(&self) -> Option<&Record> {
        self.parent.as_deref()
    }

    /// Same principal, scoped under `parent`
    pub fn descend(&self, parent: Record) -> Context {
        Context { principal: self.principal.clone(), parent: Some(Arc::new(parent)) }
    }

    /// Same principal, no parent
    pub fn detached(&self) -> Context {
        Context { principal: self.principal.clone(), parent: None }
    }
}
