//! JSON codec for stored `User` records.

use crate::{CoreError, User};

/// Serialize a record into its stored JSON form.
pub fn encode(key: &str, user: &User) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(user).map_err(|e| CoreError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode stored bytes. Anything other than a JSON object is rejected;
/// absent fields default to empty strings and unknown fields are ignored.
pub fn decode(key: &str, bytes: &[u8]) -> Result<User, CoreError> {
    let corrupt = |reason: String| CoreError::CorruptRecord {
        key: key.to_string(),
        reason,
    };
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if !value.is_object() {
        return Err(corrupt("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_contract_field_names() {
        let user = User {
            first_name: "Ada".into(),
            allowed_banker_ids: "b1".into(),
            registration_id: "r1".into(),
            ..User::default()
        };
        let v: serde_json::Value = serde_json::from_slice(&encode("k", &user).unwrap()).unwrap();
        let obj = v.as_object().unwrap();
        let mut names: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "address",
                "bankerId",
                "docHash",
                "email",
                "firstName",
                "gender",
                "lastName",
                "phoneNumber",
                "registrationId"
            ]
        );
        assert_eq!(obj["firstName"], "Ada");
        assert_eq!(obj["bankerId"], "b1");
    }

    #[test]
    fn decodes_partial_and_reordered_objects() {
        let raw = br#"{"bankerId":"b1","email":"a@b","extra":42}"#;
        let user = decode("k", raw).unwrap();
        assert_eq!(user.allowed_banker_ids, "b1");
        assert_eq!(user.email, "a@b");
        assert_eq!(user.first_name, "");
        assert!(!user.has_document());
    }

    #[test]
    fn rejects_non_json_bytes() {
        let err = decode("bad", b"\x00\x01not json").unwrap_err();
        match err {
            CoreError::CorruptRecord { key, .. } => assert_eq!(key, "bad"),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }

    #[test]
    fn rejects_json_that_is_not_an_object() {
        assert!(matches!(
            decode("arr", b"[1,2,3]"),
            Err(CoreError::CorruptRecord { .. })
        ));
        assert!(matches!(
            decode("empty", b"[]"),
            Err(CoreError::CorruptRecord { .. })
        ));
        assert!(matches!(
            decode("num", b"17"),
            Err(CoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn rejects_non_string_field_values() {
        assert!(matches!(
            decode("k", br#"{"firstName": 7}"#),
            Err(CoreError::CorruptRecord { .. })
        ));
    }
}
