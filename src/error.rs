use std::error::Error;
use std::fmt;

/// The key asked for by [`LockMap::get_required`] is not in the map.
///
/// [`LockMap::get_required`]: crate::LockMap::get_required
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyNotFound;

impl fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl Error for KeyNotFound {}
