//! The backend-independent CRUD contract.
//!
//! Every check takes a DAO whose key filter matches on [`FIXTURE_KEY`] and
//! whose [`FIXTURE_STORAGE`] starts out empty. Checks panic on the first
//! violation, so they are called straight from `#[test]` functions:
//!
//! ```rust,ignore
//! #[test]
//! fn sqlite_meets_the_contract() {
//!     anydal_testkit::contract::run_all(|| Box::new(sqlite_dao()));
//! }
//! ```

use crate::fixtures::{fixture_records, ids, seed, FIXTURE_KEY, FIXTURE_STORAGE};
use crate::oracle;
use anydal_bo::GenericBo;
use anydal_core::{DaoError, FilterKind, FilterNode, GenericDao, Operator, SortingSpec};
use anydal_storage::CallContext;
use serde_json::{json, Value};

fn bo(value: Value) -> GenericBo {
    GenericBo::from_value(value)
}

fn by_key(id: &str) -> FilterNode {
    FilterNode::eq(FIXTURE_KEY, id)
}

fn fetch(dao: &dyn GenericDao, ctx: &CallContext, id: &str) -> Option<Value> {
    dao.fetch_one(ctx, FIXTURE_STORAGE, Some(&by_key(id)))
        .expect("fetch_one failed")
        .map(|found| found.snapshot())
}

/// Fetches the ids of every record matching `filter`, in id order.
pub fn fetch_ids(dao: &dyn GenericDao, ctx: &CallContext, filter: &FilterNode) -> Vec<String> {
    let found = dao
        .fetch_many(
            ctx,
            FIXTURE_STORAGE,
            Some(filter),
            &SortingSpec::new().asc(FIXTURE_KEY),
            0,
            0,
        )
        .unwrap_or_else(|e| panic!("fetch_many({filter}) failed: {e}"));
    ids(&found)
}

/// Ids of the fixture records the oracle selects for `filter`.
pub fn expected_ids(filter: &FilterNode) -> Vec<String> {
    let records = fixture_records();
    let selected: Vec<GenericBo> = oracle::select(filter, &records)
        .into_iter()
        .cloned()
        .collect();
    ids(&selected)
}

/// Filters over the fixture covering every node kind and every operator.
pub fn sample_filters() -> Vec<FilterNode> {
    vec![
        FilterNode::eq("id", "4"),
        FilterNode::ne("rank", 4),
        FilterNode::gt("rank", 6),
        FilterNode::ge("id", "8"),
        FilterNode::lt("score", 3),
        FilterNode::le("name", "record-2"),
        FilterNode::compare_fields("rank", Operator::Less, "score"),
        FilterNode::compare_fields("score", Operator::Equal, "rank"),
        FilterNode::is_null("tag"),
        FilterNode::is_not_null("tag"),
        FilterNode::And(vec![FilterNode::ge("id", "3"), FilterNode::lt("id", "8")]),
        FilterNode::Or(vec![
            FilterNode::eq("id", "1"),
            FilterNode::And(vec![FilterNode::gt("rank", 7), FilterNode::is_not_null("tag")]),
        ]),
    ]
}

/// A second create with a taken key fails with the sentinel and leaves the
/// stored record alone.
pub fn create_rejects_duplicates(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    let first = bo(json!({"id": "1", "name": "first"}));
    assert_eq!(dao.create(&ctx, FIXTURE_STORAGE, &first).expect("create failed"), 1);

    let err = dao
        .create(&ctx, FIXTURE_STORAGE, &bo(json!({"id": "1", "name": "second"})))
        .expect_err("duplicate create succeeded");
    assert!(
        matches!(err, DaoError::DuplicateEntry),
        "expected DuplicateEntry, got {err:?}"
    );
    assert_eq!(fetch(dao, &ctx, "1"), Some(json!({"id": "1", "name": "first"})));
}

/// Create honors a key filter that names a field other than the storage's
/// own key.
///
/// Takes a DAO whose key filter matches on `name` instead of
/// [`FIXTURE_KEY`], over an empty [`FIXTURE_STORAGE`].
pub fn create_honors_the_key_filter(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    let first = bo(json!({"id": "1", "name": "shared"}));
    assert_eq!(dao.create(&ctx, FIXTURE_STORAGE, &first).expect("create failed"), 1);

    let err = dao
        .create(&ctx, FIXTURE_STORAGE, &bo(json!({"id": "2", "name": "shared"})))
        .expect_err("create matching the key filter succeeded");
    assert!(
        matches!(err, DaoError::DuplicateEntry),
        "expected DuplicateEntry, got {err:?}"
    );
    assert_eq!(fetch(dao, &ctx, "2"), None);

    let other = bo(json!({"id": "2", "name": "other"}));
    assert_eq!(dao.create(&ctx, FIXTURE_STORAGE, &other).expect("create failed"), 1);
}

/// Operations on an absent record report zero or nothing, never an error.
pub fn misses_are_not_errors(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    let ghost = bo(json!({"id": "404", "name": "ghost"}));
    assert_eq!(dao.update(&ctx, FIXTURE_STORAGE, &ghost).expect("update failed"), 0);
    assert_eq!(dao.delete(&ctx, FIXTURE_STORAGE, &ghost).expect("delete failed"), 0);
    assert_eq!(fetch(dao, &ctx, "404"), None);
    let none = dao
        .fetch_many(&ctx, FIXTURE_STORAGE, None, &SortingSpec::new(), 0, 0)
        .expect("fetch_many failed");
    assert!(none.is_empty());
}

/// Update replaces the whole record; delete removes it once.
pub fn update_replaces_and_delete_removes(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    dao.create(&ctx, FIXTURE_STORAGE, &bo(json!({"id": "7", "name": "a", "tag": "t"})))
        .expect("create failed");

    let updated = bo(json!({"id": "7", "name": "b"}));
    assert_eq!(dao.update(&ctx, FIXTURE_STORAGE, &updated).expect("update failed"), 1);
    assert_eq!(fetch(dao, &ctx, "7"), Some(json!({"id": "7", "name": "b"})));

    assert_eq!(dao.delete(&ctx, FIXTURE_STORAGE, &updated).expect("delete failed"), 1);
    assert_eq!(dao.delete(&ctx, FIXTURE_STORAGE, &updated).expect("delete failed"), 0);
    assert_eq!(fetch(dao, &ctx, "7"), None);
}

/// Save inserts a missing record and fully replaces an existing one.
pub fn save_inserts_then_replaces(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    let full = bo(json!({"id": "1", "name": "a", "tag": "x"}));
    assert_eq!(dao.save(&ctx, FIXTURE_STORAGE, &full).expect("save failed"), 1);
    assert_eq!(fetch(dao, &ctx, "1"), Some(json!({"id": "1", "name": "a", "tag": "x"})));

    let fewer = bo(json!({"id": "1", "name": "b"}));
    assert_eq!(dao.save(&ctx, FIXTURE_STORAGE, &fewer).expect("save failed"), 1);
    assert_eq!(fetch(dao, &ctx, "1"), Some(json!({"id": "1", "name": "b"})));
}

/// Sorting, offset and limit apply after the filter.
pub fn paging_honors_sort_offset_and_limit(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    seed(dao, &ctx);
    let filter = FilterNode::And(vec![FilterNode::gt("id", "3"), FilterNode::le("id", "8")]);
    let newest_first = SortingSpec::new().desc("id");
    let page = |offset: u64, limit: u64| {
        let found = dao
            .fetch_many(&ctx, FIXTURE_STORAGE, Some(&filter), &newest_first, offset, limit)
            .expect("fetch_many failed");
        ids(&found)
    };

    assert_eq!(page(1, 3), ["7", "6", "5"]);
    assert_eq!(page(0, 0), ["8", "7", "6", "5", "4"]);
    assert_eq!(page(3, 0), ["5", "4"]);
    assert!(page(5, 2).is_empty());
}

/// Every sample filter selects exactly what the oracle selects.
pub fn filters_agree_with_oracle(dao: &dyn GenericDao) {
    let ctx = CallContext::background();
    seed(dao, &ctx);

    let samples = sample_filters();
    for kind in FilterKind::ALL {
        assert!(
            samples.iter().any(|f| f.kind() == kind),
            "no sample filter of kind {kind:?}"
        );
    }
    for filter in &samples {
        assert_eq!(
            fetch_ids(dao, &ctx, filter),
            expected_ids(filter),
            "filter {filter} disagrees with the oracle"
        );
    }
    assert_eq!(
        fetch_ids(
            dao,
            &ctx,
            &FilterNode::And(vec![FilterNode::ge("id", "3"), FilterNode::lt("id", "8")])
        ),
        ["3", "4", "5", "6", "7"]
    );
}

/// Runs every check, each against a fresh DAO from `make`.
pub fn run_all(make: impl Fn() -> Box<dyn GenericDao>) {
    create_rejects_duplicates(make().as_ref());
    misses_are_not_errors(make().as_ref());
    update_replaces_and_delete_removes(make().as_ref());
    save_inserts_then_replaces(make().as_ref());
    paging_honors_sort_offset_and_limit(make().as_ref());
    filters_agree_with_oracle(make().as_ref());
}
