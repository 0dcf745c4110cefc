//! Round-trip properties of variables, snapshots and session identity

use proptest::collection::btree_map;
use proptest::option;
use proptest::prelude::*;
use querylab::session::{CookieStore, MemoryCookieStore, SessionState};
use querylab::snapshot::{decode, encode};
use querylab::{QueryDocument, SessionIdentity};
use serde_json::{Map, Value};
use std::sync::Arc;

fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,10}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn variables_text() -> impl Strategy<Value = String> {
    (btree_map("[a-z]{1,6}", json_scalar(), 0..5), any::<bool>()).prop_map(|(entries, pretty)| {
        let object = Value::Object(entries.into_iter().collect::<Map<String, Value>>());
        if pretty {
            serde_json::to_string_pretty(&object).unwrap()
        } else {
            object.to_string()
        }
    })
}

fn query_text() -> impl Strategy<Value = String> {
    ("[a-zA-Z ]{0,12}", "[a-z ]{0,12}").prop_map(|(head, body)| format!("{}{{ {} }}", head, body))
}

fn identity() -> impl Strategy<Value = SessionIdentity> {
    prop_oneof![
        Just(SessionIdentity::Browser),
        btree_map("[A-Z][A-Za-z-]{0,8}", "[a-z0-9=;]{0,8}", 0..4).prop_map(|headers| {
            SessionIdentity::Mobile {
                headers,
                cookie_snapshot: None,
            }
        }),
    ]
}

#[test]
fn test_variables_survive_snapshot_byte_for_byte() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(query_text(), variables_text()), |(text, variables)| {
            let document = QueryDocument::new(text).with_variables(variables.clone());
            assert!(document.to_request().is_ok());

            let payload = encode(&document, None, &SessionIdentity::Browser).unwrap();
            let decoded = decode(&payload).unwrap();
            assert_eq!(decoded.document.variables.as_deref(), Some(variables.as_str()));

            Ok(())
        })
        .unwrap();
}

#[test]
fn test_snapshot_round_trip_preserves_document_and_identity_kind() {
    let mut runner = proptest::test_runner::TestRunner::default();

    // responses are drawn without the mobile success marker, which alone reclassifies
    let response = option::of("[a-z0-9 {}:]{0,16}");
    let operation = option::of("[A-Z][a-z]{0,5}");

    runner
        .run(
            &(query_text(), option::of(variables_text()), operation, response, identity()),
            |(text, variables, operation_name, response, identity)| {
                let document = QueryDocument {
                    text,
                    variables,
                    operation_name,
                };

                let payload = encode(&document, response.as_deref(), &identity).unwrap();
                let decoded = decode(&payload).unwrap();

                assert_eq!(decoded.document, document);
                assert_eq!(decoded.response, response);
                assert_eq!(decoded.identity.is_mobile(), identity.is_mobile());
                assert_eq!(decoded.identity.headers(), identity.headers());
                assert!(decoded.from_snapshot);

                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_activate_then_deactivate_restores_cookies() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                btree_map("[a-z]{1,6}", "[a-zA-Z0-9]{1,8}", 0..6),
                btree_map("[A-Z]{1,6}", "[a-z]{0,6}", 0..3),
            ),
            |(cookies, headers)| {
                let line = cookies
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                let jar = Arc::new(MemoryCookieStore::from_cookie_string(&line));
                let before = jar.cookie_string();

                let mut session = SessionState::new(jar.clone());
                session.activate(headers);
                let restored = session.deactivate();

                assert_eq!(restored, cookies.len());
                assert_eq!(jar.cookie_string(), before);
                assert_eq!(session.identity(), &SessionIdentity::Browser);

                Ok(())
            },
        )
        .unwrap();
}
