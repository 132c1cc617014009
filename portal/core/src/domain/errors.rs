// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service-level error taxonomy for gadget lifecycle operations.

use crate::domain::access::AccessControlError;
use crate::domain::container::ContainerError;
use crate::domain::gadget::TenantId;
use crate::domain::portlet::{BuildError, PortletIdError};
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum GadgetError {
    #[error("A gadget is already registered for tenant {tenant_id} at {url}")]
    DuplicateRegistration { tenant_id: TenantId, url: String },

    #[error("Invalid gadget source definition at {url}: {reason}")]
    InvalidSourceDefinition { url: String, reason: String },

    #[error("At least one portlet category is required")]
    CategoryRequired,

    #[error("Gadget not found: {0}")]
    NotFound(String),

    #[error("System failure: {0}")]
    SystemFailure(String),
}

impl GadgetError {
    /// Validation errors are raised before any side effect
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GadgetError::DuplicateRegistration { .. }
                | GadgetError::InvalidSourceDefinition { .. }
                | GadgetError::CategoryRequired
        )
    }
}

impl From<RepositoryError> for GadgetError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => GadgetError::NotFound(what),
            other => GadgetError::SystemFailure(other.to_string()),
        }
    }
}

impl From<ContainerError> for GadgetError {
    fn from(err: ContainerError) -> Self {
        GadgetError::SystemFailure(err.to_string())
    }
}

impl From<AccessControlError> for GadgetError {
    fn from(err: AccessControlError) -> Self {
        GadgetError::SystemFailure(err.to_string())
    }
}

impl From<BuildError> for GadgetError {
    fn from(err: BuildError) -> Self {
        GadgetError::SystemFailure(err.to_string())
    }
}

impl From<PortletIdError> for GadgetError {
    fn from(err: PortletIdError) -> Self {
        GadgetError::SystemFailure(err.to_string())
    }
}

pub type GadgetResult<T> = Result<T, GadgetError>;
