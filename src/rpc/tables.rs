// src/rpc/tables.rs

//! `CreateTable`, `AlterTable`, `TruncateTable`, `DeleteTable`,
//! `GetTableSchema`, `ListTables` (spec.md §6). `core::ddl::table` owns the
//! metadata-only half of alter/truncate; this layer owns the per-tablet RPC
//! fan-out those operations need once a tserver proxy is available, the
//! same split the teacher draws between "what changes the catalog" and
//! "what tells a tserver about it" (grounded on `core::heartbeat::report`'s
//! own task-dispatch helpers).

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::core::ddl::table::{self, AlterTableStep};
use crate::core::entities::types::{ColumnSchema, ReplicationInfo, Schema, TableType};
use crate::core::ids::{NamespaceId, TableId, TablegroupId};
use crate::core::state::MasterState;
use crate::core::tasks::alter_table::AlterTableTask;
use crate::core::tasks::framework::{RetryPolicy, run_with_retry};
use crate::core::tasks::truncate_tablet::TruncateTabletTask;
use crate::rpc::envelope::{ApiError, ApiResult};

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(crate::core::errors::CatalogError::InvalidArgument(format!("malformed {what} id '{raw}'"))))
}

fn retry_policy_for(state: &MasterState, cfg: &crate::config::MasterConfig) -> RetryPolicy {
    let _ = state;
    RetryPolicy {
        max_attempts: cfg.async_task_max_retries,
        initial_backoff: Duration::from_millis(cfg.async_task_initial_backoff_ms),
        max_backoff: Duration::from_millis(cfg.async_task_max_backoff_ms),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTableBody {
    pub name: String,
    pub namespace_id: String,
    pub table_type: TableType,
    pub schema: Schema,
    pub num_tablets: Option<usize>,
    pub replication_info: Option<ReplicationInfo>,
    #[serde(default)]
    pub colocated: bool,
    pub tablegroup_id: Option<String>,
    pub index_of: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTableResponse {
    pub table_id: String,
}

pub async fn create_table(State(state): State<Arc<MasterState>>, Json(body): Json<CreateTableBody>) -> ApiResult<CreateTableResponse> {
    let namespace_id: NamespaceId = parse_id(&body.namespace_id, "namespace")?;
    let tablegroup_id = body.tablegroup_id.as_deref().map(|s| parse_id::<TablegroupId>(s, "tablegroup")).transpose()?;
    let index_of = body.index_of.as_deref().map(|s| parse_id::<TableId>(s, "table")).transpose()?;

    let id = table::create_table(
        &state,
        table::CreateTableRequest {
            name: body.name,
            namespace_id,
            table_type: body.table_type,
            schema: body.schema,
            num_tablets: body.num_tablets,
            replication_info: body.replication_info,
            colocated: body.colocated,
            tablegroup_id,
            index_of,
        },
    )
    .await?;
    Ok(Json(CreateTableResponse { table_id: id.to_string() }))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlterTableStepBody {
    AddColumn { column: ColumnSchema },
    DropColumn { name: String },
    RenameColumn { from: String, to: String },
}

impl From<AlterTableStepBody> for AlterTableStep {
    fn from(b: AlterTableStepBody) -> Self {
        match b {
            AlterTableStepBody::AddColumn { column } => AlterTableStep::AddColumn(column),
            AlterTableStepBody::DropColumn { name } => AlterTableStep::DropColumn(name),
            AlterTableStepBody::RenameColumn { from, to } => AlterTableStep::RenameColumn { from, to },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AlterTableBody {
    #[serde(default)]
    pub steps: Vec<AlterTableStepBody>,
    pub new_wal_retention_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AlterTableResponse {
    pub new_version: u64,
}

pub async fn alter_table(
    State(state): State<Arc<MasterState>>,
    Path(id): Path<String>,
    Json(body): Json<AlterTableBody>,
) -> ApiResult<AlterTableResponse> {
    let table_id: TableId = parse_id(&id, "table")?;
    let steps: Vec<AlterTableStep> = body.steps.into_iter().map(Into::into).collect();
    let new_version = table::alter_table(&state, table_id, steps, body.new_wal_retention_secs).await?;

    if let Some(info) = state.catalog.lock().tables_by_id.get(&table_id).cloned() {
        let cfg = state.config.read().await.clone();
        let policy = retry_policy_for(&state, &cfg);
        for tablet in info.get_tablets(false) {
            if let Some(leader) = tablet.get_leader() {
                let task = AlterTableTask::new(table_id, leader, tablet.id, new_version, None, state.tserver_proxy.clone());
                info.add_task(task.clone());
                let table_for_retry = info.clone();
                let policy = policy.clone();
                tokio::spawn(async move {
                    run_with_retry(task, policy, || {
                        table_for_retry.metadata().read().state == crate::core::entities::types::TableState::Deleting
                    })
                    .await;
                });
            }
        }
    }

    Ok(Json(AlterTableResponse { new_version }))
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

pub async fn truncate_table(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<EmptyResponse> {
    let table_id: TableId = parse_id(&id, "table")?;
    table::truncate_table(&state, table_id).await?;

    if let Some(info) = state.catalog.lock().tables_by_id.get(&table_id).cloned() {
        let cfg = state.config.read().await.clone();
        let policy = retry_policy_for(&state, &cfg);
        for tablet in info.get_tablets(false) {
            if let Some(leader) = tablet.get_leader() {
                let task = TruncateTabletTask::new(table_id, leader, tablet.id, state.tserver_proxy.clone());
                info.add_task(task.clone());
                let table_for_retry = info.clone();
                let policy = policy.clone();
                tokio::spawn(async move {
                    run_with_retry(task, policy, || {
                        table_for_retry.metadata().read().state == crate::core::entities::types::TableState::Deleting
                    })
                    .await;
                });
            }
        }
    }

    Ok(Json(EmptyResponse {}))
}

pub async fn delete_table(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<EmptyResponse> {
    let table_id: TableId = parse_id(&id, "table")?;
    table::delete_table(&state, table_id).await?;
    Ok(Json(EmptyResponse {}))
}

#[derive(Debug, Serialize)]
pub struct TableSchemaResponse {
    pub table_id: String,
    pub name: String,
    pub schema: Schema,
    pub version: u64,
    pub state: crate::core::entities::types::TableState,
}

pub async fn get_table_schema(State(state): State<Arc<MasterState>>, Path(id): Path<String>) -> ApiResult<TableSchemaResponse> {
    let table_id: TableId = parse_id(&id, "table")?;
    let info = state
        .catalog
        .lock()
        .tables_by_id
        .get(&table_id)
        .cloned()
        .ok_or_else(|| ApiError(crate::core::errors::CatalogError::NotFound(format!("table {table_id}"))))?;
    let meta = info.metadata().read();
    Ok(Json(TableSchemaResponse {
        table_id: table_id.to_string(),
        name: meta.name.clone(),
        schema: meta.schema.clone(),
        version: meta.version,
        state: meta.state,
    }))
}

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub id: String,
    pub name: String,
    pub state: crate::core::entities::types::TableState,
}

pub async fn list_tables(State(state): State<Arc<MasterState>>) -> ApiResult<Vec<TableSummary>> {
    let out: Vec<TableSummary> = state
        .catalog
        .lock()
        .tables_by_id
        .iter()
        .map(|(id, info)| {
            let meta = info.metadata().read();
            TableSummary { id: id.to_string(), name: meta.name.clone(), state: meta.state }
        })
        .collect();
    Ok(Json(out))
}
