// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gadget lifecycle commands
//!
//! Commands: register, update, deregister, deregister-all, list, show, reconcile

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use gadget_portal_core::application::BulkReport;
use gadget_portal_core::domain::gadget::{
    Actor, ExternalId, GadgetId, GadgetRegistration, PortletCategories, TenantId,
};
use gadget_portal_core::domain::portal_config::PortalConfigManifest;
use gadget_portal_core::domain::portlet::PortletId;

use crate::embedded;

#[derive(Subcommand)]
pub enum GadgetCommand {
    /// Register a gadget hosted at a URL
    Register {
        /// Owning tenant (defaults to the single-tenant id)
        #[arg(long)]
        tenant: Option<Uuid>,

        /// Gadget XML URL
        #[arg(long)]
        url: String,

        /// Comma-separated portlet categories
        #[arg(long)]
        categories: String,

        /// Use this external identifier instead of generating one
        #[arg(long)]
        external_id: Option<Uuid>,

        /// Grant group members view access
        #[arg(long)]
        group: bool,

        /// Grant guests view access
        #[arg(long)]
        guest: bool,
    },

    /// Replace a gadget's categories
    Update {
        #[arg(long)]
        id: i64,

        /// Comma-separated portlet categories
        #[arg(long)]
        categories: String,
    },

    /// Deregister a gadget and revoke its grants
    Deregister {
        #[arg(long)]
        id: i64,
    },

    /// Deregister every gadget of a tenant
    DeregisterAll {
        #[arg(long)]
        tenant: Uuid,
    },

    /// List a tenant's gadgets
    List {
        #[arg(long)]
        tenant: Option<Uuid>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show one gadget
    Show {
        #[arg(long)]
        id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-materialize every persisted gadget on this node
    Reconcile,
}

pub async fn handle_command(command: GadgetCommand, config: PortalConfigManifest) -> Result<()> {
    let portal = embedded::start_node(config).await?;
    let lifecycle = portal.lifecycle();
    let actor = Actor::new(current_user());

    match command {
        GadgetCommand::Register {
            tenant,
            url,
            categories,
            external_id,
            group,
            guest,
        } => {
            let mut actor = actor
                .with_group_permissions(group)
                .with_guest_permissions(guest);
            if let Some(external_id) = external_id {
                actor = actor.with_external_id(ExternalId(external_id));
            }

            let registration = lifecycle
                .register(
                    tenant_or_default(tenant),
                    &url,
                    PortletCategories::parse(&categories),
                    &actor,
                )
                .await
                .context("Failed to register gadget")?;

            println!(
                "{}",
                format!("✓ Gadget registered: {}", registration.id).green()
            );
            print_registration(&registration);
        }
        GadgetCommand::Update { id, categories } => {
            let registration = lifecycle
                .update(GadgetId(id), PortletCategories::parse(&categories), &actor)
                .await
                .context("Failed to update gadget")?;

            println!(
                "{}",
                format!("✓ Gadget {} deployed into: {}", id, registration.categories).green()
            );
        }
        GadgetCommand::Deregister { id } => {
            let registration = lifecycle
                .deregister(GadgetId(id))
                .await
                .context("Failed to deregister gadget")?;

            println!(
                "{}",
                format!("✓ Gadget deregistered: {} ({})", registration.id, registration.url).green()
            );
        }
        GadgetCommand::DeregisterAll { tenant } => {
            let report = lifecycle
                .deregister_all(TenantId(tenant))
                .await
                .context("Failed to deregister tenant gadgets")?;
            print_report(&report);
        }
        GadgetCommand::List {
            tenant,
            offset,
            limit,
        } => {
            let tenant = tenant_or_default(tenant);
            let total = lifecycle.count(tenant).await?;
            let registrations = lifecycle.list(tenant, offset, limit).await?;

            if registrations.is_empty() {
                println!("{}", "No gadgets found".yellow());
            } else {
                println!("{} of {} gadgets:", registrations.len(), total);
                println!("{:<8} {:<24} {:<24} {}", "ID", "NAME", "CATEGORIES", "URL");
                for registration in registrations {
                    println!(
                        "{:<8} {:<24} {:<24} {}",
                        registration.id,
                        registration.display_name.bold(),
                        registration.categories,
                        registration.url
                    );
                }
            }
        }
        GadgetCommand::Show { id, json } => {
            let registration = lifecycle.get(GadgetId(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&registration)?);
            } else {
                print_registration(&registration);
            }
        }
        GadgetCommand::Reconcile => {
            let report = lifecycle
                .materialize_all()
                .await
                .context("Failed to reconcile gadgets")?;
            print_report(&report);
        }
    }

    Ok(())
}

fn tenant_or_default(tenant: Option<Uuid>) -> TenantId {
    tenant.map(TenantId).unwrap_or_default()
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "gadgetctl".to_string())
}

fn print_registration(registration: &GadgetRegistration) {
    println!("  ID:          {}", registration.id);
    println!("  Name:        {}", registration.display_name.bold());
    println!("  URL:         {}", registration.url);
    println!("  Tenant:      {}", registration.tenant_id);
    println!("  External ID: {}", registration.external_id);
    println!(
        "  Portlet:     {}",
        PortletId::for_external_id(&registration.external_id)
    );
    println!("  Categories:  {}", registration.categories);
    println!("  Modified:    {}", registration.modified_at.to_rfc3339());
}

fn print_report(report: &BulkReport) {
    let summary = format!(
        "{}: {} processed, {} failed",
        report.operation, report.processed, report.failures
    );
    if report.is_clean() {
        println!("{}", format!("✓ {}", summary).green());
    } else {
        println!("{}", format!("⚠ {}", summary).yellow());
        for failure in &report.errors {
            println!("  {} {}", failure.gadget_id.to_string().red(), failure.message);
        }
    }
}
