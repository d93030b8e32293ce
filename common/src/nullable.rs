use serde::{Deserialize, Deserializer};

/// Deserialize a nullable column as `T::default()`.
///
/// PostgREST returns `null` for empty array/text columns, which `#[serde(default)]`
/// alone does not accept.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
