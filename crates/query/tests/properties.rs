use sheetquery_query::{
    evaluate, find_contradictions, stack, Condition, EvalError, Logic, Operator,
};
use sheetquery_sheet::{Book, CellValue, JoinType, Sheet};

fn sheet(name: &str, csv: &str) -> Sheet {
    let mut sheet = Sheet::from_csv_str(csv).unwrap();
    sheet.set_name(name);
    sheet
}

#[test]
fn test_exact_value_always_matches_its_row() {
    let s = sheet("S", "code,amount\nA-1,10\nb-2,20.5\nC 3,abc\n");
    for row in 0..s.row_count() {
        for column in ["code", "amount"] {
            let value = s.get_by_name(row, column).unwrap().as_str();
            for operator in [Operator::Contains, Operator::Equals] {
                let mask = evaluate(&s, column, operator, &value).unwrap();
                assert_eq!(mask.len(), s.row_count());
                assert!(mask[row], "{column} {operator} {value} missed row {row}");
            }
        }
    }
}

#[test]
fn test_missing_column_gives_all_false_mask() {
    let s = sheet("S", "a\n1\n2\n");
    let mask = evaluate(&s, "b", Operator::Equals, "1").unwrap();
    assert_eq!(mask.len(), 2);
    assert!(!mask.any());
}

#[test]
fn test_align_columns_is_idempotent() {
    let tables = vec![
        sheet("A", "id,x\n1,2\n"),
        sheet("B", "y,id\n3,4\n"),
        sheet("C", "z\n5\n"),
    ];
    let once = Book::align_columns(&tables).unwrap();
    let twice = Book::align_columns(&once).unwrap();
    for (a, b) in once.iter().zip(&twice) {
        assert_eq!(a.column_names(), b.column_names());
        assert_eq!(a.data(), b.data());
    }
    // nothing present in an input is dropped
    for table in &once {
        assert_eq!(table.col_count(), 4);
    }
}

#[test]
fn test_common_columns_of_one_table() {
    let t = sheet("T", "c,a,b\n1,2,3\n");
    assert_eq!(Book::common_columns(&[&t]), t.column_names());
    assert!(Book::common_columns(&[]).is_empty());
}

#[test]
fn test_stack_of_disjoint_tables() {
    let a = sheet("A", "x\n1\n2\n");
    let b = sheet("B", "y\n3\n");
    let stacked = stack(&[a, b], "data source").unwrap().unwrap();

    assert_eq!(stacked.column_names(), &["data source", "x", "y"]);
    assert_eq!(stacked.row_count(), 3);
    assert_eq!(stacked.get_by_name(0, "y").unwrap(), &CellValue::Null);
    assert_eq!(stacked.get_by_name(2, "x").unwrap(), &CellValue::Null);
    assert_eq!(stacked.get_by_name(2, "y").unwrap(), &CellValue::Int(3));
}

#[test]
fn test_range_contradiction_found_statically() {
    let conditions = vec![
        Condition::new("x", Operator::Greater, "10"),
        Condition::new("x", Operator::Less, "5").with_logic(Logic::And),
    ];
    let refs: Vec<&Condition> = conditions.iter().collect();
    let found = find_contradictions(&refs);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].column, "x");
}

#[test]
fn test_alternatives_are_not_contradictions() {
    let conditions = vec![
        Condition::new("x", Operator::Greater, "10"),
        Condition::new("x", Operator::Less, "5").with_logic(Logic::Or),
    ];
    let refs: Vec<&Condition> = conditions.iter().collect();
    assert!(find_contradictions(&refs).is_empty());
}

#[test]
fn test_inverted_numeric_between_is_invalid_range() {
    let s = sheet("S", "x\n1\n7\n");
    let err = evaluate(&s, "x", Operator::Between, "10, 5").unwrap_err();
    assert!(matches!(err, EvalError::InvalidRange { .. }));

    let mask = evaluate(&s, "x", Operator::Between, "5, 10").unwrap();
    assert_eq!(mask.iter().collect::<Vec<_>>(), vec![false, true]);
}

#[test]
fn test_join_row_bounds() {
    let left = sheet("L", "id,a\n1,x\n2,y\n3,z\n");
    let right = sheet("R", "id,b\n2,p\n3,q\n4,r\n5,s\n");

    let inner = left.join(&right, "id", JoinType::Inner).unwrap();
    assert!(inner.row_count() <= left.row_count().min(right.row_count()));
    assert_eq!(inner.row_count(), 2);

    let left_join = left.join(&right, "id", JoinType::Left).unwrap();
    assert!(left_join.row_count() >= left.row_count());

    let outer = left.join(&right, "id", JoinType::Outer).unwrap();
    assert_eq!(outer.row_count(), 5);
}
