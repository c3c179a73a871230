// Domain records - users, films and the read-only reference tables

pub mod film;
pub mod reference;
pub mod user;

pub use film::Film;
pub use reference::{Genre, Mpa};
pub use user::{Friend, User};

use serde::{Deserialize, Deserializer};

/// Identifier of every stored record
pub type EntityId = i64;

/// A record owned by a `Storage<T>`: it has a generated id and a kind name
/// used in log lines and error messages.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
}

/// Reads an explicit JSON `null` the same way as an absent field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
