//! Unique identifiers for operations.
//!
//! [`OperationId`] is a `domain-key` UUID wrapper: `Copy`, serialized as the
//! hyphenated UUID string, with `v4()`, `nil()` and `parse(&str)`.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(pub OperationIdDomain => OperationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_is_not_nil() {
        assert!(!OperationId::v4().is_nil());
    }

    #[test]
    fn v4_ids_are_distinct() {
        assert_ne!(OperationId::v4(), OperationId::v4());
    }

    #[test]
    fn display_parse_roundtrip() {
        let id = OperationId::v4();
        let parsed = OperationId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(OperationId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = OperationId::v4();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
