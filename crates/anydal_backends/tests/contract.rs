//! Every backend against the shared CRUD contract.

mod common;

use anydal_core::{DaoConfig, GenericDao};
use anydal_testkit::{contract, init_tracing};

#[test]
fn sqlite_meets_the_contract() {
    init_tracing();
    contract::run_all(|| Box::new(common::sql_dao()) as Box<dyn GenericDao>);
}

#[test]
fn sqlite_without_transactional_create_meets_the_contract() {
    init_tracing();
    contract::run_all(|| {
        Box::new(common::sql_dao().with_config(DaoConfig::new().transactional_create(false)))
            as Box<dyn GenericDao>
    });
}

#[test]
fn document_store_meets_the_contract() {
    init_tracing();
    contract::run_all(|| Box::new(common::document_dao()) as Box<dyn GenericDao>);
}

#[test]
fn keyvalue_store_meets_the_contract() {
    init_tracing();
    contract::run_all(|| Box::new(common::keyvalue_dao()) as Box<dyn GenericDao>);
}

#[test]
fn every_backend_honors_a_non_key_filter_on_create() {
    init_tracing();
    contract::create_honors_the_key_filter(&common::sql_dao_keyed_by_name());
    contract::create_honors_the_key_filter(
        &common::sql_dao_keyed_by_name().with_config(DaoConfig::new().transactional_create(false)),
    );
    contract::create_honors_the_key_filter(&common::document_dao_keyed_by_name());
    contract::create_honors_the_key_filter(&common::keyvalue_dao_keyed_by_name());
}
