//! Friend requests and the friendship relation derived from them.
//!
//! A single directed row per request is the only record of a friendship: once
//! its status is [`FriendRequestStatus::Accepted`], sender and recipient are
//! friends. Every friendship query therefore has to look at both columns.

use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FriendRequestMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum FriendRequestAction {
    Accept,
    Decline,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct FriendRequest {
    pub id: Id<FriendRequestMarker>,
    pub sender_id: Id<UserMarker>,
    pub recipient_id: Id<UserMarker>,
    pub status: FriendRequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A validated `(sender, recipient)` pair for a new request.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct CreateFriendRequest {
    sender: Id<UserMarker>,
    recipient: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Users cannot send friend requests to themselves")]
pub struct SelfFriendRequestError;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum FriendRequestError {
    #[error("Only the recipient may answer a friend request")]
    NotRecipient,
    #[error("Only the sender or the recipient may remove a friendship")]
    NotParticipant,
    #[error("A {from} friend request cannot be {}", .action.past_tense())]
    InvalidTransition {
        from: FriendRequestStatus,
        action: FriendRequestAction,
    },
    #[error("The friend request was not accepted, so there is no friendship to remove")]
    NotAccepted,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown friend request status: {0}")]
pub struct UnknownFriendRequestStatusError(String);

impl CreateFriendRequest {
    pub fn new(
        sender: Id<UserMarker>,
        recipient: Id<UserMarker>,
    ) -> Result<Self, SelfFriendRequestError> {
        if sender == recipient {
            Err(SelfFriendRequestError)
        } else {
            Ok(Self { sender, recipient })
        }
    }

    #[must_use]
    pub fn sender(self) -> Id<UserMarker> {
        self.sender
    }

    #[must_use]
    pub fn recipient(self) -> Id<UserMarker> {
        self.recipient
    }
}

impl FriendRequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Declined => "declined",
        }
    }

    /// Whether a request in this status blocks a new request between the same users.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            FriendRequestStatus::Pending | FriendRequestStatus::Accepted
        )
    }

    /// The status reached by applying `action`.
    ///
    /// Repeating the action that produced the current status is allowed and
    /// leaves the status unchanged.
    pub fn apply(self, action: FriendRequestAction) -> Result<Self, FriendRequestError> {
        match (self, action) {
            (
                FriendRequestStatus::Pending | FriendRequestStatus::Accepted,
                FriendRequestAction::Accept,
            ) => Ok(FriendRequestStatus::Accepted),
            (
                FriendRequestStatus::Pending | FriendRequestStatus::Declined,
                FriendRequestAction::Decline,
            ) => Ok(FriendRequestStatus::Declined),
            (from, action) => Err(FriendRequestError::InvalidTransition { from, action }),
        }
    }
}

impl Display for FriendRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendRequestStatus {
    type Err = UnknownFriendRequestStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FriendRequestStatus::Pending),
            "accepted" => Ok(FriendRequestStatus::Accepted),
            "declined" => Ok(FriendRequestStatus::Declined),
            other => Err(UnknownFriendRequestStatusError(other.to_owned())),
        }
    }
}

impl FriendRequestAction {
    #[must_use]
    pub fn past_tense(self) -> &'static str {
        match self {
            FriendRequestAction::Accept => "accepted",
            FriendRequestAction::Decline => "declined",
        }
    }
}

impl FriendRequest {
    #[must_use]
    pub fn involves(&self, user: Id<UserMarker>) -> bool {
        self.sender_id == user || self.recipient_id == user
    }

    /// The participant that is not `user`, or `None` if `user` is not part of this request.
    #[must_use]
    pub fn other_party(&self, user: Id<UserMarker>) -> Option<Id<UserMarker>> {
        if self.sender_id == user {
            Some(self.recipient_id)
        } else if self.recipient_id == user {
            Some(self.sender_id)
        } else {
            None
        }
    }

    /// Validates that `actor` may apply `action` and returns the resulting status.
    ///
    /// The actor is checked before the current status, so a non-recipient is
    /// always refused with [`FriendRequestError::NotRecipient`].
    pub fn transition(
        &self,
        actor: Id<UserMarker>,
        action: FriendRequestAction,
    ) -> Result<FriendRequestStatus, FriendRequestError> {
        if actor != self.recipient_id {
            return Err(FriendRequestError::NotRecipient);
        }

        self.status.apply(action)
    }

    /// Validates that `actor` may dissolve the friendship this request represents.
    pub fn check_removal(&self, actor: Id<UserMarker>) -> Result<(), FriendRequestError> {
        if !self.involves(actor) {
            return Err(FriendRequestError::NotParticipant);
        }
        if self.status != FriendRequestStatus::Accepted {
            return Err(FriendRequestError::NotAccepted);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        friend_request::{
            CreateFriendRequest, FriendRequest, FriendRequestAction, FriendRequestError,
            FriendRequestStatus,
        },
    };
    use time::macros::datetime;

    fn request(status: FriendRequestStatus) -> FriendRequest {
        FriendRequest {
            id: Id::new(1),
            sender_id: Id::new(10),
            recipient_id: Id::new(20),
            status,
            created_at: datetime!(2025-03-01 09:00 UTC),
            updated_at: datetime!(2025-03-01 09:00 UTC),
        }
    }

    #[test]
    fn no_self_requests() {
        assert!(CreateFriendRequest::new(Id::new(3), Id::new(3)).is_err());

        let create = CreateFriendRequest::new(Id::new(3), Id::new(4)).unwrap();
        assert_eq!(create.sender(), Id::new(3));
        assert_eq!(create.recipient(), Id::new(4));
    }

    #[test]
    fn recipient_transitions() {
        let recipient = Id::new(20);

        assert_eq!(
            request(FriendRequestStatus::Pending).transition(recipient, FriendRequestAction::Accept),
            Ok(FriendRequestStatus::Accepted)
        );
        assert_eq!(
            request(FriendRequestStatus::Pending).transition(recipient, FriendRequestAction::Decline),
            Ok(FriendRequestStatus::Declined)
        );
        assert_eq!(
            request(FriendRequestStatus::Accepted).transition(recipient, FriendRequestAction::Accept),
            Ok(FriendRequestStatus::Accepted)
        );
        assert_eq!(
            request(FriendRequestStatus::Declined).transition(recipient, FriendRequestAction::Decline),
            Ok(FriendRequestStatus::Declined)
        );
        assert_eq!(
            request(FriendRequestStatus::Declined).transition(recipient, FriendRequestAction::Accept),
            Err(FriendRequestError::InvalidTransition {
                from: FriendRequestStatus::Declined,
                action: FriendRequestAction::Accept
            })
        );
        assert_eq!(
            request(FriendRequestStatus::Accepted).transition(recipient, FriendRequestAction::Decline),
            Err(FriendRequestError::InvalidTransition {
                from: FriendRequestStatus::Accepted,
                action: FriendRequestAction::Decline
            })
        );
    }

    #[test]
    fn only_the_recipient_answers() {
        let statuses = [
            FriendRequestStatus::Pending,
            FriendRequestStatus::Accepted,
            FriendRequestStatus::Declined,
        ];
        let actions = [FriendRequestAction::Accept, FriendRequestAction::Decline];

        for status in statuses {
            for action in actions {
                for actor in [Id::new(10), Id::new(99)] {
                    assert_eq!(
                        request(status).transition(actor, action),
                        Err(FriendRequestError::NotRecipient)
                    );
                }
            }
        }
    }

    #[test]
    fn removal() {
        let accepted = request(FriendRequestStatus::Accepted);
        assert_eq!(accepted.check_removal(Id::new(10)), Ok(()));
        assert_eq!(accepted.check_removal(Id::new(20)), Ok(()));
        assert_eq!(
            accepted.check_removal(Id::new(30)),
            Err(FriendRequestError::NotParticipant)
        );
        assert_eq!(
            request(FriendRequestStatus::Pending).check_removal(Id::new(10)),
            Err(FriendRequestError::NotAccepted)
        );
    }

    #[test]
    fn other_party() {
        let request = request(FriendRequestStatus::Accepted);
        assert_eq!(request.other_party(Id::new(10)), Some(Id::new(20)));
        assert_eq!(request.other_party(Id::new(20)), Some(Id::new(10)));
        assert_eq!(request.other_party(Id::new(30)), None);
    }

    #[test]
    fn status_strings() {
        for status in [
            FriendRequestStatus::Pending,
            FriendRequestStatus::Accepted,
            FriendRequestStatus::Declined,
        ] {
            assert_eq!(status.as_str().parse::<FriendRequestStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<FriendRequestStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&FriendRequestStatus::Accepted).unwrap(),
            "\"accepted\""
        );
    }
}
