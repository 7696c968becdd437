//! Property-based tests for the cookie codec, parameter coalescing and
//! method resolution.
//!
//! These hold for all generated inputs:
//! - A cookie written as a header and read back keeps its name and value
//! - A `Set-Cookie` value never exceeds `MAX_COOKIE_SIZE`, keeps every
//!   attribute, and never ends a value in half an escape
//! - Repeated parameter names coalesce into lists in receipt order
//! - Normalization never panics and only ever tunnels PUT or DELETE

use proptest::prelude::*;
use restgate_core::{
    normalize, Cookie, HttpError, HttpMethod, ParamValue, RequestData, TransportSignals,
    MAX_COOKIE_SIZE,
};

// Names never contain '=', values never contain '%': the codec leaves both
// characters alone, so they are the only inputs that cannot round-trip.
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,16}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ;,=!#$&()*+./:?@_~\t\\x{e9}\\x{fc}\\x{4e16}-]{0,64}"
}

// Mostly characters that expand to escapes, to push past the size ceiling.
fn long_value_strategy() -> impl Strategy<Value = String> {
    "[a-z ;,\\x{e9}\\x{4e16}]{0,3000}"
}

fn attributes_strategy() -> impl Strategy<Value = (Option<String>, Option<String>, bool, bool)> {
    (
        proptest::option::of("[a-z]{1,20}\\.com"),
        proptest::option::of("/[a-z]{0,20}"),
        any::<bool>(),
        any::<bool>(),
    )
}

fn with_attributes(
    cookie: Cookie,
    (domain, path, secure, http_only): &(Option<String>, Option<String>, bool, bool),
) -> Cookie {
    let mut cookie = cookie.with_secure(*secure).with_http_only(*http_only);
    if let Some(domain) = domain {
        cookie = cookie.with_domain(domain.clone());
    }
    if let Some(path) = path {
        cookie = cookie.with_path(path.clone());
    }
    cookie
}

fn method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("post".to_string()),
        Just("POST".to_string()),
        Just("PUT".to_string()),
        Just("DELETE".to_string()),
        Just("PATCH".to_string()),
        "[A-Za-z]{0,8}",
    ]
}

#[test]
fn prop_cookie_round_trips_through_request_header() {
    proptest!(|(name in name_strategy(), value in value_strategy())| {
        let header = Cookie::named(name.clone(), value.clone()).format_for_request_header();
        let parsed = Cookie::extract_from_header(&header);

        prop_assert_eq!(parsed.name(), Some(name.as_str()));
        prop_assert_eq!(parsed.value(), value.as_str());
    });
}

#[test]
fn prop_set_cookie_respects_size_ceiling() {
    proptest!(|(
        name in name_strategy(),
        value in long_value_strategy(),
        attrs in attributes_strategy()
    )| {
        let cookie = with_attributes(Cookie::named(name.clone(), value.clone()), &attrs);
        let header = cookie.format_for_response_header();

        // The same attributes on an empty value, without the `name=` prefix.
        let empty = with_attributes(Cookie::named(name.clone(), ""), &attrs)
            .format_for_response_header();
        let attributes = &empty[name.len() + 1..];

        prop_assert!(header.len() <= MAX_COOKIE_SIZE, "{} bytes", header.len());
        prop_assert!(header.ends_with(attributes));
        let prefix = format!("{name}=");
        prop_assert!(header.starts_with(&prefix));

        let untruncated = cookie.format_for_request_header();
        if untruncated.len() + attributes.len() <= MAX_COOKIE_SIZE {
            prop_assert_eq!(&header, &format!("{untruncated}{attributes}"));
        }

        // A kept escape is always whole.
        let pair = &header[..header.len() - attributes.len()];
        if let Some(pos) = pair.rfind('%') {
            prop_assert!(pos + 3 <= pair.len(), "split escape in {pair:?}");
        }
    });
}

#[test]
fn prop_parameters_coalesce_in_order() {
    proptest!(|(pairs in proptest::collection::vec(("[a-c]", "[a-z]{0,4}"), 0..20))| {
        let data: RequestData = pairs.iter().cloned().collect();

        for (name, value) in data.iter() {
            let expected: Vec<&str> = pairs
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
                .collect();
            prop_assert_eq!(value.values(), expected.clone());
            prop_assert_eq!(matches!(value, ParamValue::Single(_)), expected.len() == 1);
        }

        let mut names: Vec<&str> = pairs.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        prop_assert_eq!(data.len(), names.len());
    });
}

#[test]
fn prop_only_put_and_delete_tunnel() {
    proptest!(|(
        method in method_strategy(),
        method_override in proptest::option::of(method_strategy())
    )| {
        let signals = TransportSignals {
            method: Some(method.clone()),
            method_override: method_override.clone(),
            ..TransportSignals::default()
        };

        match normalize(&signals) {
            Ok(request) if request.is_tunnelled() => {
                prop_assert!(method.eq_ignore_ascii_case("POST"));
                prop_assert!(matches!(request.method(), HttpMethod::Put | HttpMethod::Delete));
            }
            Ok(request) => {
                prop_assert_eq!(request.method().as_str(), method.to_ascii_uppercase());
            }
            Err(err) => prop_assert!(matches!(err, HttpError::InvalidMethod(_))),
        }
    });
}
