use recordqa::{DirectiveParser, OperationKind, QaError, SpanMode};

fn parser() -> DirectiveParser {
    DirectiveParser::new("patients")
}

#[test]
fn each_operation_is_recognized() {
    let cases = [
        ("db.patients.aggregate([{\"$match\": {}}])", OperationKind::Aggregate, "{\"$match\": {}}"),
        ("db.patients.find({\"age\": 3})", OperationKind::Find, "{\"age\": 3}"),
        ("db.patients.findOne({\"id\": 7})", OperationKind::FindOne, "{\"id\": 7}"),
        ("db.patients.countDocuments({})", OperationKind::CountDocuments, "{}"),
    ];
    for (q, kind, span) in cases {
        let d = parser().parse(q).unwrap();
        assert_eq!(d.kind, kind, "{q}");
        assert_eq!(d.span, span, "{q}");
    }
}

#[test]
fn find_one_is_never_classified_as_find() {
    let d = parser().parse("db.patients.findOne({})").unwrap();
    assert_eq!(d.kind, OperationKind::FindOne);
    let d = parser().parse("db.patients.find({})").unwrap();
    assert_eq!(d.kind, OperationKind::Find);
}

#[test]
fn unknown_prefixes_are_unsupported() {
    for q in [
        "db.patients.insertOne({})",
        "db.doctors.find({})",
        "DB.patients.find({})",
        "db.patients.findOneAndUpdate({}, {})",
        "SELECT * FROM patients",
        "",
    ] {
        assert!(matches!(parser().parse(q), Err(QaError::UnsupportedOperation(_))), "{q}");
    }
}

#[test]
fn collection_name_is_configurable() {
    let p = DirectiveParser::new("doctors");
    assert_eq!(p.prefix(OperationKind::CountDocuments), "db.doctors.countDocuments");
    assert!(p.parse("db.doctors.find()").is_ok());
    assert!(p.parse("db.patients.find()").is_err());
}

#[test]
fn lexical_span_runs_to_last_closing_delimiter() {
    let d = parser().parse("db.patients.find({\"a\": 1}).limit(5)").unwrap();
    assert_eq!(d.span, "{\"a\": 1}).limit(5");
}

#[test]
fn balanced_span_stops_at_matching_delimiter() {
    let p = parser().with_mode(SpanMode::Balanced);
    let d = p.parse("db.patients.find({\"a\": 1}).limit(5)").unwrap();
    assert_eq!(d.span, "{\"a\": 1}");
    let d = p.parse("db.patients.find({\"note\": \"uses (parens)\"})").unwrap();
    assert_eq!(d.span, "{\"note\": \"uses (parens)\"}");
    assert!(matches!(p.parse("db.patients.find({\"a\": 1}"), Err(QaError::MalformedArgument { .. })));
}

#[test]
fn empty_and_whitespace_spans() {
    assert_eq!(parser().parse("db.patients.find()").unwrap().span, "");
    assert_eq!(parser().parse("db.patients.find(   )").unwrap().span, "");
    assert_eq!(parser().parse("  db.patients.countDocuments({})\n").unwrap().span, "{}");
}

#[test]
fn missing_or_reversed_delimiters_are_malformed() {
    for q in ["db.patients.find", "db.patients.aggregate({})", "db.patients.find)("] {
        assert!(matches!(parser().parse(q), Err(QaError::MalformedArgument { .. })), "{q}");
    }
}
