// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Gadget Repository
//!
//! Production `GadgetRepository` implementation backed by the
//! `gadget_registrations` table via `sqlx`. Ids come from the
//! `gadget_registration_id_seq` sequence; the `(tenant_id, url)` unique
//! constraint turns a racing duplicate insert into `RepositoryError::Conflict`.
//! Categories are stored in their comma-delimited form.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::gadget::{
    ExternalId, GadgetId, GadgetRegistration, PortletCategories, TenantId,
};
use crate::domain::repository::{GadgetRepository, RepositoryError};

const SELECT_COLUMNS: &str =
    "SELECT id, external_id, tenant_id, url, display_name, categories, created_at, modified_at FROM gadget_registrations";

pub struct PostgresGadgetRepository {
    pool: PgPool,
}

impl PostgresGadgetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_registration(row: &PgRow) -> Result<GadgetRegistration, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let external_id: Uuid = row.try_get("external_id")?;
    let tenant_id: Uuid = row.try_get("tenant_id")?;
    let categories: String = row.try_get("categories")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let modified_at: DateTime<Utc> = row.try_get("modified_at")?;

    Ok(GadgetRegistration {
        id: GadgetId(id),
        external_id: ExternalId(external_id),
        tenant_id: TenantId(tenant_id),
        url: row.try_get("url")?,
        display_name: row.try_get("display_name")?,
        categories: PortletCategories::parse(&categories),
        created_at,
        modified_at,
    })
}

fn to_i64(value: usize, what: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Unknown(format!("{} out of range: {}", what, value)))
}

#[async_trait]
impl GadgetRepository for PostgresGadgetRepository {
    async fn next_id(&self) -> Result<GadgetId, RepositoryError> {
        let id: i64 = sqlx::query_scalar("SELECT nextval('gadget_registration_id_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(GadgetId(id))
    }

    async fn insert(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO gadget_registrations (
                id, external_id, tenant_id, url, display_name,
                categories, created_at, modified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(registration.id.0)
        .bind(registration.external_id.0)
        .bind(registration.tenant_id.0)
        .bind(&registration.url)
        .bind(&registration.display_name)
        .bind(registration.categories.to_delimited())
        .bind(registration.created_at)
        .bind(registration.modified_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE gadget_registrations
            SET display_name = $2, categories = $3, modified_at = $4
            WHERE id = $1
            "#,
        )
        .bind(registration.id.0)
        .bind(&registration.display_name)
        .bind(registration.categories.to_delimited())
        .bind(registration.modified_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("gadget {}", registration.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: GadgetId) -> Result<Option<GadgetRegistration>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_registration).transpose()
    }

    async fn find_by_tenant_and_url(
        &self,
        tenant_id: TenantId,
        url: &str,
    ) -> Result<Option<GadgetRegistration>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE tenant_id = $1 AND url = $2", SELECT_COLUMNS))
            .bind(tenant_id.0)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_registration).transpose()
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> Result<Option<GadgetRegistration>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{} WHERE external_id = $1 AND tenant_id = $2",
            SELECT_COLUMNS
        ))
        .bind(external_id.0)
        .bind(tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_registration).transpose()
    }

    async fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<GadgetRegistration>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE tenant_id = $1 ORDER BY id ASC OFFSET $2 LIMIT $3",
            SELECT_COLUMNS
        ))
        .bind(tenant_id.0)
        .bind(to_i64(offset, "offset")?)
        .bind(to_i64(limit, "limit")?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_registration).collect()
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<usize, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM gadget_registrations WHERE tenant_id = $1")
                .bind(tenant_id.0)
                .fetch_one(&self.pool)
                .await?;

        usize::try_from(count).map_err(|_| RepositoryError::Unknown(format!("negative count {}", count)))
    }

    async fn list_all(&self) -> Result<Vec<GadgetRegistration>, RepositoryError> {
        let rows = sqlx::query(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_registration).collect()
    }

    async fn delete(&self, id: GadgetId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM gadget_registrations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("gadget {}", id)));
        }
        Ok(())
    }
}
