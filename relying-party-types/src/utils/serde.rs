//! Helpers for serde derives that follow the webauthn rule that unknown enum values must be
//! ignored rather than failing the whole message.

use serde::{Deserialize, Deserializer};

/// Deserialize `T`, falling back to `T::default()` when the value is not a known member.
pub fn ignore_unknown<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(T::deserialize(de).unwrap_or_default())
}

/// Deserialize an optional list while silently dropping members that fail to deserialize.
pub fn ignore_unknown_opt_vec<'de, D, T>(de: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(de)?;
    Ok(values.map(|list| {
        list.into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }))
}

/// (De)serialize a COSE algorithm as its IANA integer identifier.
pub mod i64_to_iana {
    use coset::iana::EnumI64;

    pub fn serialize<S, T>(value: &T, ser: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: EnumI64,
    {
        ser.serialize_i64(value.to_i64())
    }

    pub fn deserialize<'de, D, T>(de: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: EnumI64,
    {
        let value: i64 = serde::Deserialize::deserialize(de)?;

        T::from_i64(value).ok_or_else(|| {
            <D::Error as serde::de::Error>::invalid_value(
                serde::de::Unexpected::Signed(value),
                &"An iana::Algorithm value",
            )
        })
    }
}
