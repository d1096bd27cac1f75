// tests/integration/ddl_lifecycle_test.rs

//! Concrete end-to-end scenarios 1-3 from spec.md §8.

use catalog_manager::core::assignment::run_assignment_pass;
use catalog_manager::core::ddl::table::{AlterTableStep, alter_table, create_table, delete_table, CreateTableRequest};
use catalog_manager::core::entities::types::{ColumnSchema, TableState, TableType};

use crate::integration::harness::{create_test_namespace, create_test_table, leader_ready_state, register_tservers};

/// Scenario 1: create a 4-tablet, RF=3 table against 3 tservers in one
/// zone; after the assignment pipeline runs, every tablet has 3 replicas.
#[tokio::test]
async fn create_table_then_locations_shows_every_tablet_fully_replicated() {
    let state = leader_ready_state().await;
    register_tservers(&state, 3, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let table_id = create_test_table(&state, ns, "users", 4, 3).await;

    run_assignment_pass(&state).await.unwrap();

    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    let tablets = table.get_tablets(false);
    assert_eq!(tablets.len(), 4);
    for tablet in &tablets {
        assert_eq!(tablet.get_replica_locations().len(), 3, "tablet {} should have 3 replicas", tablet.id);
    }
}

/// Scenario 2 (partial — no backfill engine is modeled, spec.md §1 Non-goals):
/// creating an index table bumps the base table's `indexes[]` once the index
/// is linked via `index_of`.
#[tokio::test]
async fn create_index_table_registers_on_base_table() {
    let state = leader_ready_state().await;
    register_tservers(&state, 3, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let base_id = create_test_table(&state, ns, "users", 1, 3).await;

    let index_id = create_table(
        &state,
        CreateTableRequest {
            name: "users_by_email".into(),
            namespace_id: ns,
            table_type: TableType::IndexTable,
            schema: catalog_manager::core::entities::types::Schema {
                columns: vec![ColumnSchema { id: 0, name: "email".into(), data_type: "text".into(), is_key: true, is_hash_key: true, is_nullable: false }],
                next_column_id: 1,
            },
            num_tablets: Some(1),
            replication_info: Some(catalog_manager::core::entities::types::ReplicationInfo::simple(3)),
            colocated: false,
            tablegroup_id: None,
            index_of: Some(base_id),
        },
    )
    .await
    .unwrap();

    let base = state.catalog.lock().tables_by_id.get(&base_id).cloned().unwrap();
    let indexes = base.metadata().read().indexes.clone();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].table_id, index_id);
}

/// Alter bumps `version` strictly (invariant, spec.md §8) and the table
/// moves ALTERING then back to RUNNING once the simulated tablet catches up.
#[tokio::test]
async fn alter_table_bumps_version_and_enters_altering() {
    let state = leader_ready_state().await;
    register_tservers(&state, 3, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let table_id = create_test_table(&state, ns, "users", 1, 3).await;

    let version_before = { state.catalog.lock().tables_by_id.get(&table_id).unwrap().metadata().read().version };

    let new_version = alter_table(
        &state,
        table_id,
        vec![AlterTableStep::AddColumn(ColumnSchema { id: 1, name: "email".into(), data_type: "text".into(), is_key: false, is_hash_key: false, is_nullable: true })],
        None,
    )
    .await
    .unwrap();

    assert!(new_version > version_before);
    let table = state.catalog.lock().tables_by_id.get(&table_id).cloned().unwrap();
    assert_eq!(table.metadata().read().state, TableState::Altering);
    assert!(table.metadata().read().fully_applied_schema.is_some());
}

/// Scenario 3: `DeleteTable(base)` recursively descends into the base
/// table's own indexes (spec.md §4.5 step 2), transitioning both indexes to
/// DELETING alongside the base in a single call.
#[tokio::test]
async fn delete_table_cascades_to_indexes() {
    let state = leader_ready_state().await;
    register_tservers(&state, 3, "zone1");
    let ns = create_test_namespace(&state, "sys").await;
    let base_id = create_test_table(&state, ns, "users", 1, 3).await;

    let mut index_ids = Vec::new();
    for name in ["users_by_email", "users_by_name"] {
        let index_id = create_table(
            &state,
            CreateTableRequest {
                name: name.into(),
                namespace_id: ns,
                table_type: TableType::IndexTable,
                schema: catalog_manager::core::entities::types::Schema {
                    columns: vec![ColumnSchema { id: 0, name: "key".into(), data_type: "text".into(), is_key: true, is_hash_key: true, is_nullable: false }],
                    next_column_id: 1,
                },
                num_tablets: Some(1),
                replication_info: Some(catalog_manager::core::entities::types::ReplicationInfo::simple(3)),
                colocated: false,
                tablegroup_id: None,
                index_of: Some(base_id),
            },
        )
        .await
        .unwrap();
        index_ids.push(index_id);
    }

    delete_table(&state, base_id).await.unwrap();

    assert_eq!(state.catalog.lock().tables_by_id.get(&base_id).unwrap().metadata().read().state, TableState::Deleting);
    for index_id in index_ids {
        assert_eq!(
            state.catalog.lock().tables_by_id.get(&index_id).unwrap().metadata().read().state,
            TableState::Deleting,
            "index {index_id} should have been cascaded to DELETING by its base table's deletion"
        );
    }
}
