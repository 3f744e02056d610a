use bson::Bson;
use proptest::prelude::*;
use recordqa::scope::apply_scope;
use recordqa::{DirectiveParser, OperationKind, QaError, ScopeId, SpanMode, StructuredQuery, reconstruct};

fn any_mode() -> impl Strategy<Value = SpanMode> {
    prop_oneof![Just(SpanMode::Lexical), Just(SpanMode::Balanced)]
}

fn any_kind() -> impl Strategy<Value = OperationKind> {
    prop::sample::select(OperationKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn parser_never_panics(q in ".{0,200}", mode in any_mode()) {
        let p = DirectiveParser::new("patients").with_mode(mode);
        if let Ok(d) = p.parse(&q) {
            let _ = reconstruct(&d);
        }
    }

    #[test]
    fn prefixed_noise_never_panics(kind in any_kind(), tail in "[\\[\\](){}\"' a-z0-9:,]{0,60}", mode in any_mode()) {
        let p = DirectiveParser::new("patients").with_mode(mode);
        let q = format!("{}{tail}", p.prefix(kind));
        match p.parse(&q) {
            Ok(d) => prop_assert_eq!(d.kind, kind),
            Err(e) => {
                let expected_kind = matches!(e, QaError::MalformedArgument { .. } | QaError::UnsupportedOperation(_));
                prop_assert!(expected_kind)
            }
        }
    }

    #[test]
    fn find_one_is_never_find(id in any::<i32>(), mode in any_mode()) {
        let p = DirectiveParser::new("patients").with_mode(mode);
        let q = format!("db.patients.findOne({{\"id\": {id}}})");
        let d = p.parse(&q).unwrap();
        prop_assert_eq!(d.kind, OperationKind::FindOne);
        let rebuilt = reconstruct(&d).unwrap();
        prop_assert!(
            matches!(rebuilt, StructuredQuery::FindOne { .. }),
            "expected FindOne, got {:?}",
            rebuilt
        );
    }

    #[test]
    fn scope_always_wins(generated in any::<i32>(), scope in any::<i32>(), extra in "[a-z]{1,8}") {
        let q = StructuredQuery::Find { filter: bson::doc! {"id": generated, (extra.clone()): 1}, projection: None };
        let scoped = apply_scope(q, Some(&ScopeId::from(scope)), "id");
        let filter = scoped.filter().unwrap();
        prop_assert_eq!(filter.get("id"), Some(&Bson::Int32(scope)));
    }

    #[test]
    fn aggregate_scope_is_first_stage(n in 0usize..5, scope in "[A-Z]-[0-9]{1,4}") {
        let pipeline = (0..n).map(|i| bson::doc! {"$skip": i as i32}).collect();
        let scoped = apply_scope(StructuredQuery::Aggregate { pipeline }, Some(&ScopeId::from(scope.as_str())), "pid");
        let StructuredQuery::Aggregate { pipeline } = scoped else { panic!("kind changed") };
        prop_assert_eq!(pipeline.len(), n + 1);
        prop_assert_eq!(&pipeline[0], &bson::doc! {"$match": {"pid": scope}});
    }
}
