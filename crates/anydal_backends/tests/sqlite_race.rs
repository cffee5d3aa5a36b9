//! Two connections to one SQLite file racing to create the same record.

mod common;

use anydal_bo::GenericBo;
use anydal_core::{DaoError, GenericDao};
use anydal_storage::CallContext;
use anydal_testkit::{init_tracing, TempSqlite, FIXTURE_STORAGE};
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn exactly_one_concurrent_create_wins() {
    init_tracing();
    let db = TempSqlite::new();

    for round in 0..20 {
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|writer| {
                let dao = common::sql_dao_on(db.connect());
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let record = GenericBo::from_value(json!({
                        "id": format!("race-{round}"),
                        "name": format!("writer-{writer}"),
                    }));
                    barrier.wait();
                    dao.create(&CallContext::background(), FIXTURE_STORAGE, &record)
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("writer panicked"))
            .collect();

        let created = results.iter().filter(|r| matches!(r, Ok(1))).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(DaoError::DuplicateEntry)))
            .count();
        assert_eq!((created, duplicates), (1, 1), "round {round}: {results:?}");
    }

    let dao = common::sql_dao_on(db.connect());
    let stored = dao
        .fetch_many(
            &CallContext::background(),
            FIXTURE_STORAGE,
            None,
            &anydal_core::SortingSpec::new(),
            0,
            0,
        )
        .unwrap();
    assert_eq!(stored.len(), 20);
}
