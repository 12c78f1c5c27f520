//! Conversation addressing.

use identity_store::{ChannelId, IdentityId};

/// Joins the two sorted participant ids.
pub const CHANNEL_SEPARATOR: char = '_';

/// Whether `id` can take part in a channel name.
///
/// An id holding the separator would make two different pairs share a
/// channel, e.g. `a_b` + `c` and `a` + `b_c`.
pub fn is_addressable(id: &IdentityId) -> bool {
    !id.as_str().is_empty() && !id.as_str().contains(CHANNEL_SEPARATOR)
}

/// The channel two identities share. Symmetric in its arguments.
///
/// Both ids must pass [`is_addressable`].
pub fn canonicalize(a: &IdentityId, b: &IdentityId) -> ChannelId {
    debug_assert!(
        is_addressable(a) && is_addressable(b),
        "channel participant ids must not contain '{}'",
        CHANNEL_SEPARATOR
    );
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    ChannelId::from(format!("{}{}{}", first, CHANNEL_SEPARATOR, second))
}
