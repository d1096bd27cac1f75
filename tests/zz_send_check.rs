fn assert_send<T: Send>(_: T) {}
fn check(state: std::sync::Arc<catalog_manager::core::state::MasterState>) {
    assert_send(catalog_manager::rpc::tablegroups::delete_tablegroup(
        axum::extract::State(state.clone()),
        axum::extract::Path("1".to_string()),
    ));
}
