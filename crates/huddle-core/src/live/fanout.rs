//! Event fanout policy.
//!
//! Pure mapping from a committed chat mutation to the live events it causes
//! and the users each event goes to. `chat` is always the post-mutation view,
//! so a removed or departed user is no longer among its members.

use huddle_types::chat::ChatView;
use huddle_types::event::LiveEvent;
use huddle_types::user::UserId;

/// A committed mutation, as far as notification is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    MessageAppended { actor: UserId },
    GroupCreated,
    GroupEdited,
    GroupPhotoRemoved,
    MemberAdded { user_id: UserId },
    MemberRemoved { user_id: UserId },
    MemberLeft { user_id: UserId },
}

/// One event and the users who should receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub targets: Vec<UserId>,
    pub event: LiveEvent,
}

/// Compute every delivery for `action` on `chat`. Deliveries with no
/// targets are omitted.
pub fn plan(action: &ChatAction, chat: &ChatView) -> Vec<Delivery> {
    let admin = chat.admin_id();
    let members_except = |excluded: &[Option<UserId>]| -> Vec<UserId> {
        chat.member_ids()
            .filter(|id| !excluded.contains(&Some(*id)))
            .collect()
    };

    let deliveries = match *action {
        ChatAction::MessageAppended { actor } => vec![Delivery {
            targets: members_except(&[Some(actor)]),
            event: LiveEvent::MessageReceived { chat: chat.clone() },
        }],
        ChatAction::GroupCreated => vec![Delivery {
            targets: members_except(&[admin]),
            event: LiveEvent::GroupCreated { chat: chat.clone() },
        }],
        ChatAction::GroupEdited => vec![Delivery {
            targets: members_except(&[admin]),
            event: LiveEvent::GroupEdited { chat: chat.clone() },
        }],
        ChatAction::GroupPhotoRemoved => vec![Delivery {
            targets: members_except(&[admin]),
            event: LiveEvent::GroupPhotoRemoved { chat: chat.clone() },
        }],
        ChatAction::MemberAdded { user_id } => vec![
            Delivery {
                targets: vec![user_id],
                event: LiveEvent::AddedToGroup { chat: chat.clone() },
            },
            Delivery {
                targets: members_except(&[admin, Some(user_id)]),
                event: LiveEvent::OtherUserAdded {
                    chat: chat.clone(),
                    user_id,
                },
            },
        ],
        ChatAction::MemberRemoved { user_id } => vec![
            Delivery {
                targets: vec![user_id],
                event: LiveEvent::RemovedFromGroup { chat: chat.clone() },
            },
            Delivery {
                targets: members_except(&[admin, Some(user_id)]),
                event: LiveEvent::OtherUserRemoved {
                    chat: chat.clone(),
                    user_id,
                },
            },
        ],
        ChatAction::MemberLeft { user_id } => vec![Delivery {
            targets: members_except(&[admin, Some(user_id)]),
            event: LiveEvent::UserLeft {
                chat: chat.clone(),
                user_id,
            },
        }],
    };

    deliveries
        .into_iter()
        .filter(|d| !d.targets.is_empty())
        .collect()
}

/// Typing indicators go to every member except the typist.
pub fn typing_targets(members: &[UserId], typist: &UserId) -> Vec<UserId> {
    members.iter().filter(|id| *id != typist).copied().collect()
}
