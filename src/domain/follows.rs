//! Follow edges between users.

use crate::domain::{error::DomainError, types::UserId};

/// A directed "follower receives author's posts" relationship.
///
/// Construction rejects self-follow; the `follows` table carries the same
/// rule as a CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    follower: UserId,
    author: UserId,
}

impl FollowEdge {
    pub fn new(follower: UserId, author: UserId) -> Result<Self, DomainError> {
        if follower == author {
            return Err(DomainError::invariant("users cannot follow themselves"));
        }
        Ok(Self { follower, author })
    }

    pub fn follower(&self) -> UserId {
        self.follower
    }

    pub fn author(&self) -> UserId {
        self.author
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_follow_is_rejected() {
        assert!(FollowEdge::new(UserId(7), UserId(7)).is_err());
    }

    #[test]
    fn edge_keeps_direction() {
        let edge = FollowEdge::new(UserId(1), UserId(2)).unwrap();
        assert_eq!(edge.follower(), UserId(1));
        assert_eq!(edge.author(), UserId(2));
    }
}
