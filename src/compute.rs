/// What [`LockMap::compute`] does with the entry once the transform returned.
///
/// [`LockMap::compute`]: crate::LockMap::compute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store the returned value, if there is one. An absent value leaves the
    /// map as it was.
    Keep,
    /// Remove the entry. Nothing happens if the key was absent.
    Delete,
}
