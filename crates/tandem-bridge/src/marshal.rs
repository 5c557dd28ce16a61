//! Value marshaling between host and guest representations.
//!
//! Conversion is recursive and structure preserving: a nested host object
//! becomes a nested dictionary (or nested dynamic object) on the guest side,
//! and nested guest collections come back as nested host objects. Nothing is
//! flattened.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{BridgeError, BridgeResult};
use crate::guest::{DynamicObject, GuestValue, ParamKind};
use crate::value::HostValue;

/// Convert a host value for a guest parameter declared as `kind`.
#[must_use]
pub fn to_guest(value: &HostValue, kind: ParamKind) -> GuestValue {
    match value {
        HostValue::Null => GuestValue::Null,
        HostValue::Bool(b) => GuestValue::Bool(*b),
        HostValue::Number(n) => number_to_guest(*n),
        HostValue::String(s) => GuestValue::String(s.clone()),
        HostValue::Buffer(bytes) => GuestValue::Bytes(bytes.clone()),
        HostValue::Array(items) => {
            GuestValue::List(items.iter().map(|item| to_guest(item, kind)).collect())
        },
        HostValue::Object(map) => match kind {
            ParamKind::Dynamic => GuestValue::Dynamic(
                map.iter()
                    .map(|(k, v)| (k.clone(), to_guest(v, kind)))
                    .collect::<DynamicObject>(),
            ),
            ParamKind::Object | ParamKind::Dictionary => GuestValue::Dictionary(
                map.iter()
                    .map(|(k, v)| (k.clone(), to_guest(v, kind)))
                    .collect(),
            ),
        },
    }
}

/// Integral numbers that fit 32 bits become `Int`; everything else `Double`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_to_guest(n: f64) -> GuestValue {
    let in_range = n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX);
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.is_finite() && n.fract() == 0.0 && in_range && !negative_zero {
        GuestValue::Int(n as i32)
    } else {
        GuestValue::Double(n)
    }
}

/// Convert a guest value back to the host.
///
/// # Errors
///
/// Returns [`BridgeError::Runtime`] if the value (or anything nested in it)
/// is a guest object with no host mapping.
pub fn to_host(value: GuestValue) -> BridgeResult<HostValue> {
    let host = match value {
        GuestValue::Null => HostValue::Null,
        GuestValue::Bool(b) => HostValue::Bool(b),
        GuestValue::Int(n) => HostValue::Number(f64::from(n)),
        #[allow(clippy::cast_precision_loss)]
        GuestValue::Long(n) => HostValue::Number(n as f64),
        GuestValue::Double(n) => HostValue::Number(n),
        GuestValue::Char(c) => HostValue::String(c.to_string()),
        GuestValue::String(s) => HostValue::String(s),
        GuestValue::Bytes(bytes) => HostValue::Buffer(bytes),
        GuestValue::Guid(g) => HostValue::String(g.hyphenated().to_string()),
        GuestValue::Enum { member, .. } => HostValue::String(member),
        GuestValue::List(items) => HostValue::Array(
            items
                .into_iter()
                .map(to_host)
                .collect::<BridgeResult<Vec<_>>>()?,
        ),
        GuestValue::Dictionary(map) => HostValue::Object(map_to_host(map)?),
        GuestValue::Dynamic(object) => HostValue::Object(map_to_host(object.into_members())?),
        GuestValue::Opaque(type_name) => {
            trace!(type_name = %type_name, "guest value has no host mapping");
            return Err(BridgeError::Runtime {
                exception_type: None,
                message: format!(
                    "Unable to marshal a value of type '{type_name}' back to the host"
                ),
            });
        },
    };
    Ok(host)
}

fn map_to_host(map: BTreeMap<String, GuestValue>) -> BridgeResult<BTreeMap<String, HostValue>> {
    map.into_iter()
        .map(|(k, v)| to_host(v).map(|v| (k, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn nested_input() -> HostValue {
        HostValue::from(json!({ "nested": { "text": "Dynamic" }, "list": [1, "two"] }))
    }

    #[test]
    fn test_object_param_gets_dictionary() {
        let guest = to_guest(&nested_input(), ParamKind::Object);
        let GuestValue::Dictionary(map) = &guest else {
            panic!("expected dictionary, got {guest:?}");
        };
        let Some(GuestValue::Dictionary(inner)) = map.get("nested") else {
            panic!("nested object should stay a dictionary");
        };
        assert_eq!(inner.get("text"), Some(&GuestValue::from("Dynamic")));
    }

    #[test]
    fn test_dynamic_param_gets_structural_object() {
        let guest = to_guest(&nested_input(), ParamKind::Dynamic);
        let GuestValue::Dynamic(object) = &guest else {
            panic!("expected dynamic object, got {guest:?}");
        };
        assert_eq!(
            object.get_path("nested.text"),
            Some(&GuestValue::from("Dynamic"))
        );
        assert!(matches!(object.get("nested"), Some(GuestValue::Dynamic(_))));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(number_to_guest(42.0), GuestValue::Int(42));
        assert_eq!(number_to_guest(-7.0), GuestValue::Int(-7));
        assert_eq!(number_to_guest(1.5), GuestValue::Double(1.5));
        assert_eq!(
            number_to_guest(4_294_967_296.0),
            GuestValue::Double(4_294_967_296.0)
        );
        assert!(matches!(number_to_guest(-0.0), GuestValue::Double(_)));
        assert!(matches!(number_to_guest(f64::NAN), GuestValue::Double(_)));
    }

    #[test]
    fn test_primitives_round_trip() {
        for value in [
            HostValue::Null,
            HostValue::Bool(false),
            HostValue::Number(3.0),
            HostValue::Number(0.25),
            HostValue::from("text"),
            HostValue::buffer(vec![0u8, 1, 255]),
        ] {
            let back = to_host(to_guest(&value, ParamKind::Object)).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_nested_round_trip_through_dynamic() {
        let input = nested_input();
        let back = to_host(to_guest(&input, ParamKind::Dynamic)).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn test_guest_only_kinds_become_strings() {
        let guid = uuid::Uuid::nil();
        assert_eq!(
            to_host(GuestValue::Guid(guid)).unwrap(),
            HostValue::from("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(to_host(GuestValue::Char('x')).unwrap(), HostValue::from("x"));
        assert_eq!(
            to_host(GuestValue::Enum {
                type_name: "SqlDbType".into(),
                member: "Real".into()
            })
            .unwrap(),
            HostValue::from("Real")
        );
        assert_eq!(
            to_host(GuestValue::Long(1_099_511_627_776)).unwrap(),
            HostValue::Number(1_099_511_627_776.0)
        );
    }

    #[test]
    fn test_opaque_value_is_runtime_error() {
        let nested = GuestValue::List(vec![
            GuestValue::Int(1),
            GuestValue::Opaque("System.Object".into()),
        ]);
        let err = to_host(nested).unwrap_err();
        assert_eq!(err.kind(), Some(crate::error::ErrorKind::RuntimeError));
        assert!(err.to_string().contains("System.Object"));
    }
}
