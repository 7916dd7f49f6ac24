use serde::{Deserialize, Serialize};

/// Server-wide user ranks, lowest to highest.
///
/// A session's rank is read from the user store at authentication time and
/// stays fixed for the lifetime of the session; a rank change takes effect
/// on reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Guest,
    Visitor,
    Moderator,
    Admin,
    Owner,
}

impl Rank {
    /// Check whether this rank may mute other users
    pub fn can_mute(&self) -> bool {
        *self >= Rank::Moderator
    }

    /// Check whether this rank may ban other users
    pub fn can_ban(&self) -> bool {
        *self >= Rank::Admin
    }

    /// Check whether this rank may change another user's rank
    pub fn can_assign_rank(&self) -> bool {
        *self >= Rank::Admin
    }
}

/// Identity returned by the auth collaborator on successful token
/// verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub rank: Rank,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, rank: Rank) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::Owner > Rank::Admin);
        assert!(Rank::Admin > Rank::Moderator);
        assert!(Rank::Moderator > Rank::Visitor);
        assert!(Rank::Visitor > Rank::Guest);
    }

    #[test]
    fn test_rank_capabilities() {
        assert!(Rank::Moderator.can_mute());
        assert!(!Rank::Moderator.can_ban());
        assert!(Rank::Admin.can_ban());
        assert!(Rank::Admin.can_assign_rank());
        assert!(!Rank::Visitor.can_mute());
        assert!(Rank::Owner.can_ban());
    }
}
