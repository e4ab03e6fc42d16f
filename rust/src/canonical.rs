//! Stable identities for direct-message pairs.
//!
//! A DM between two users is addressed by the same id no matter which side
//! computes it: `DM_` followed by the sorted participant names joined with `_`.

use thiserror::Error;

pub const DM_PREFIX: &str = "DM_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    /// Our own username is not known yet; the entry is unavailable for now.
    #[error("self identity is not available")]
    MissingIdentity,
    #[error("participant name is empty")]
    EmptyUser,
}

/// Compute the canonical DM id for `self_user` talking to `other_user`.
///
/// The participants form a set, so `canonical_dm_id(A, A)` is `DM_A`.
pub fn canonical_dm_id(
    self_user: Option<&str>,
    other_user: &str,
) -> Result<String, CanonicalizeError> {
    let self_user = self_user
        .filter(|s| !s.trim().is_empty())
        .ok_or(CanonicalizeError::MissingIdentity)?;
    if other_user.trim().is_empty() {
        return Err(CanonicalizeError::EmptyUser);
    }

    let mut participants = vec![self_user, other_user];
    participants.sort_unstable();
    participants.dedup();
    Ok(format!("{DM_PREFIX}{}", participants.join("_")))
}

pub fn is_dm_id(id: &str) -> bool {
    id.starts_with(DM_PREFIX)
}
