use bson::{Bson, doc};
use recordqa::executor::execute;
use recordqa::{DirectiveParser, Executor, MemoryStore, QaError, ScopeId, StructuredQuery};
use std::sync::Arc;

fn executor() -> Executor {
    let store = MemoryStore::with_documents(
        "patients",
        vec![
            doc! {"id": 7, "name": "Ann", "age": 34},
            doc! {"id": 8, "name": "Bob", "age": 61},
            doc! {"id": 9, "name": "Cid", "age": 47},
        ],
    );
    Executor::new(Arc::new(store), DirectiveParser::new("patients"), "id")
}

#[test]
fn find_one_returns_at_most_one_record() {
    let out = executor().try_run(r#"db.patients.findOne({"age": {"$gt": 40}})"#, None).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get_str("name").unwrap(), "Bob");
    let out = executor().try_run(r#"db.patients.findOne({"id": 70})"#, None).unwrap();
    assert!(out.is_empty());
}

#[test]
fn count_is_a_single_record() {
    let out = executor().try_run(r#"db.patients.countDocuments({"age": {"$gt": 40}})"#, None).unwrap();
    assert_eq!(out, vec![doc! {"count": Bson::Int64(2)}]);
}

#[test]
fn scope_confines_every_form() {
    let exec = executor();
    let scope = ScopeId::from(9);
    let out = exec.try_run("db.patients.find({})", Some(&scope)).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get_str("name").unwrap(), "Cid");
    let out = exec.try_run(r#"db.patients.findOne({"id": 7})"#, Some(&scope)).unwrap();
    assert_eq!(out[0].get_str("name").unwrap(), "Cid");
    let out = exec.try_run(r#"db.patients.countDocuments({})"#, Some(&scope)).unwrap();
    assert_eq!(out, vec![doc! {"count": Bson::Int64(1)}]);
    let out = exec.try_run(r#"db.patients.aggregate([{"$project": {"name": 1, "_id": 0}}])"#, Some(&scope)).unwrap();
    assert_eq!(out, vec![doc! {"name": "Cid"}]);
}

#[test]
fn plan_shows_scoped_query_without_running_it() {
    let q = executor().plan(r#"db.patients.find({"age": 34}, {"name": 1})"#, Some(&ScopeId::from(8))).unwrap();
    assert_eq!(q, StructuredQuery::Find { filter: doc! {"age": 34, "id": 8}, projection: Some(doc! {"name": 1}) });
}

#[test]
fn failures_become_empty_outcomes() {
    let exec = executor();
    let out = exec.run("db.patients.deleteMany({})", None);
    assert!(out.is_empty());
    assert!(matches!(out.failure, Some(QaError::UnsupportedOperation(_))));

    let out = exec.run(r#"db.patients.find({"id": )"#, None);
    assert!(out.is_empty());
    assert!(matches!(out.failure, Some(QaError::MalformedArgument { .. })));

    let out = exec.run(r#"db.patients.find({"id": {"$bogus": 1}})"#, None);
    assert!(out.is_empty());
    assert!(matches!(out.failure, Some(QaError::StoreFailure(_))));
}

#[test]
fn execute_dispatches_structured_queries() {
    let store = MemoryStore::with_documents("patients", vec![doc! {"id": 1}, doc! {"id": 2}]);
    let out = execute(&store, &StructuredQuery::Find { filter: doc! {}, projection: None }).unwrap();
    assert_eq!(out.len(), 2);
    let out = execute(&store, &StructuredQuery::Aggregate { pipeline: vec![] }).unwrap();
    assert_eq!(out.len(), 2);
}
