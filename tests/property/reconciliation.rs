//! Operation-name reconciliation properties

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use querylab::facts::{
    select_operation_name, OperationFact, OperationKind, SourcePosition, SourceRange,
};

fn operations(names: &[Option<String>]) -> Vec<OperationFact> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| OperationFact {
            name: name.clone(),
            kind: OperationKind::Query,
            range: SourceRange {
                start: SourcePosition::new(i + 1, 1),
                end: SourcePosition::new(i + 1, 20),
            },
        })
        .collect()
}

fn names() -> impl Strategy<Value = Vec<Option<String>>> {
    vec(option::of("[A-D]"), 0..5)
}

#[test]
fn test_selection_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(names(), option::of("[A-E]"), names()),
            |(previous, desired, next)| {
                let previous = operations(&previous);
                let next = operations(&next);

                let first = select_operation_name(Some(&previous), desired.as_deref(), &next);
                let second = select_operation_name(Some(&previous), desired.as_deref(), &next);
                assert_eq!(first, second);

                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_selection_names_an_existing_operation() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(names(), option::of("[A-E]"), names()),
            |(previous, desired, next)| {
                let previous = operations(&previous);
                let next = operations(&next);
                let selected = select_operation_name(Some(&previous), desired.as_deref(), &next);

                if next.is_empty() {
                    assert_eq!(selected, None);
                } else {
                    assert!(next.iter().any(|op| op.name == selected));
                }

                // a name still present in the document always survives
                if let Some(desired) = &desired {
                    if next.iter().any(|op| op.name.as_ref() == Some(desired)) {
                        assert_eq!(selected.as_ref(), Some(desired));
                    }
                }

                Ok(())
            },
        )
        .unwrap();
}
