//! Board view over packages grouped by status column.
//!
//! # Responsibility
//! - Query each configured column independently under one shared filter.
//! - Map packages to display summaries with resolved creator names.
//!
//! # Invariants
//! - Column order follows `KanbanConfig::columns`.
//! - `count` is the number of items returned, bounded by the column limit.
//! - `total_matching` is only populated when exact counts are enabled.

use crate::config::KanbanConfig;
use crate::model::package::{Package, PackageId, PackageStatus};
use crate::repo::package_repo::{PackageFilter, PackageListQuery};
use crate::repo::store::WorkflowStore;
use crate::service::error::WorkflowResult;
use log::info;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Card shown in one board column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub id: PackageId,
    pub sender_name: String,
    pub recipient_name: String,
    pub tracking_number: Option<String>,
    pub invoice_number: Option<String>,
    /// Formatted location, `Unassigned` when empty.
    pub location: String,
    pub memo: Option<String>,
    /// First 8 characters of the id, uppercased.
    pub transaction_id: String,
    pub flagged: bool,
    /// Actor display name, or the raw actor id when unknown.
    pub created_by_name: String,
    pub created_at: i64,
}

impl PackageSummary {
    fn from_package(package: &Package, names: &HashMap<String, String>) -> Self {
        Self {
            id: package.id,
            sender_name: package.sender_name.clone(),
            recipient_name: package.recipient_name.clone(),
            tracking_number: package.tracking_number.clone(),
            invoice_number: package.invoice_number.clone(),
            location: package.location.to_string(),
            memo: package.memo.clone(),
            transaction_id: package.short_transaction_id(),
            flagged: package.status == PackageStatus::Flagged,
            created_by_name: names
                .get(&package.created_by)
                .cloned()
                .unwrap_or_else(|| package.created_by.clone()),
            created_at: package.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanColumn {
    pub status: PackageStatus,
    pub label: String,
    pub color: String,
    pub count: u64,
    pub total_matching: Option<u64>,
    pub items: Vec<PackageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanBoard {
    pub columns: Vec<KanbanColumn>,
    /// Sum of column `count`.
    pub total_count: u64,
    /// Sum of column `total_matching`, when exact counts are enabled.
    pub total_matching: Option<u64>,
}

impl KanbanBoard {
    pub fn column(&self, status: PackageStatus) -> Option<&KanbanColumn> {
        self.columns.iter().find(|column| column.status == status)
    }
}

/// Builds boards from a workflow store.
pub struct KanbanAggregator<S: WorkflowStore> {
    store: S,
    config: KanbanConfig,
}

impl<S: WorkflowStore> KanbanAggregator<S> {
    pub fn new(store: S, config: KanbanConfig) -> Self {
        Self { store, config }
    }

    pub fn board(&self, filter: &PackageFilter) -> WorkflowResult<KanbanBoard> {
        let started_at = Instant::now();
        let mut fetched = Vec::with_capacity(self.config.columns.len());

        for column_spec in &self.config.columns {
            let query = PackageListQuery {
                filter: filter.clone(),
                status: Some(column_spec.status),
                include_deleted: false,
                limit: Some(self.config.column_limit),
                offset: 0,
            };
            let packages = self.store.list_packages(&query)?;
            let total_matching = if self.config.exact_counts {
                Some(self.store.count_packages(filter, Some(column_spec.status))?)
            } else {
                None
            };
            fetched.push((column_spec, packages, total_matching));
        }

        let actor_ids: Vec<String> = fetched
            .iter()
            .flat_map(|(_, packages, _)| packages.iter().map(|p| p.created_by.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = if actor_ids.is_empty() {
            HashMap::new()
        } else {
            self.store.actor_display_names(&actor_ids)?
        };

        let columns: Vec<KanbanColumn> = fetched
            .into_iter()
            .map(|(column_spec, packages, total_matching)| KanbanColumn {
                status: column_spec.status,
                label: column_spec.display_label().to_string(),
                color: column_spec.color.clone(),
                count: packages.len() as u64,
                total_matching,
                items: packages
                    .iter()
                    .map(|package| PackageSummary::from_package(package, &names))
                    .collect(),
            })
            .collect();

        let total_count = columns.iter().map(|column| column.count).sum();
        let total_matching = if self.config.exact_counts {
            Some(columns.iter().filter_map(|column| column.total_matching).sum())
        } else {
            None
        };

        info!(
            "event=kanban_board module=service status=ok columns={} total_count={} duration_ms={}",
            columns.len(),
            total_count,
            started_at.elapsed().as_millis()
        );

        Ok(KanbanBoard {
            columns,
            total_count,
            total_matching,
        })
    }
}
