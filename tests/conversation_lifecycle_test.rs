mod common;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::{metadata, seed_user, setup};
use conversation_service::models::conversation::{
    ConversationContext, ConversationFilters, ConversationType, ParticipantFlags,
};
use conversation_service::AppError;

#[tokio::test]
async fn new_direct_conversation_with_opener() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");

    let out = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), Some("Hi there"))
        .await
        .expect("create failed");

    assert!(!out.is_existing);
    let conv = &out.conversation;
    assert_eq!(conv.kind, ConversationType::Direct);
    assert_eq!(conv.message_count, 1);
    assert_eq!(conv.last_message.as_ref().unwrap().content, "Hi there");
    assert_eq!(conv.participant(u1).unwrap().display_name, "Alice Smith");
    assert_eq!(conv.participant(u2).unwrap().unread_count, 1);
    assert_eq!(conv.participant(u1).unwrap().unread_count, 0);
    assert_eq!(
        conv.participant(u2).unwrap().last_read_at,
        DateTime::<Utc>::UNIX_EPOCH
    );
    assert!(conv.participant(u1).unwrap().last_read_at > DateTime::<Utc>::UNIX_EPOCH);

    let opener = out.message.expect("opener message missing");
    assert_eq!(opener.content, "Hi there");
    assert_eq!(opener.sender_id, u1);
    assert!(opener.is_read_by(u1));
}

#[tokio::test]
async fn repeated_create_reuses_existing_thread() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");

    let first = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap();
    assert!(!first.is_existing);

    let second = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap();
    assert!(second.is_existing);
    assert_eq!(second.conversation.id, first.conversation.id);

    // same pair from the other side lands on the same thread
    let reversed = env
        .conversations
        .create_conversation(u2, u1, None, metadata(), None)
        .await
        .unwrap();
    assert!(reversed.is_existing);
    assert_eq!(reversed.conversation.id, first.conversation.id);

    let listed = env
        .conversations
        .get_conversations(u1, ConversationFilters::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn context_scopes_deduplication() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");
    let ctx = ConversationContext {
        context_type: "listing".to_string(),
        reference_id: "listing-42".to_string(),
    };

    let plain = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap();
    let scoped = env
        .conversations
        .create_conversation(u1, u2, Some(ctx.clone()), metadata(), None)
        .await
        .unwrap();

    assert!(!scoped.is_existing);
    assert_ne!(scoped.conversation.id, plain.conversation.id);
    assert_eq!(scoped.conversation.kind, ConversationType::Marketplace);

    let again = env
        .conversations
        .create_conversation(u1, u2, Some(ctx), metadata(), None)
        .await
        .unwrap();
    assert!(again.is_existing);
    assert_eq!(again.conversation.id, scoped.conversation.id);
}

#[tokio::test]
async fn non_participant_is_denied() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");
    let u3 = seed_user(&env, "Mallory Intruder");

    let conv = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap()
        .conversation;

    let err = env
        .conversations
        .get_conversation(conv.id, u3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = env
        .conversations
        .update_conversation(
            conv.id,
            u3,
            ParticipantFlags {
                is_pinned: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn self_conversation_is_rejected() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");

    let err = env
        .conversations
        .create_conversation(u1, u1, None, metadata(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn unknown_users_get_fallback_snapshots() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let stranger = Uuid::new_v4();

    let conv = env
        .conversations
        .create_conversation(u1, stranger, None, metadata(), None)
        .await
        .unwrap()
        .conversation;

    let p = conv.participant(stranger).unwrap();
    assert_eq!(p.display_name, "User");
    assert_eq!(p.role, "customer");
}

#[tokio::test]
async fn flags_are_scoped_to_the_calling_participant() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");

    let conv = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap()
        .conversation;

    let updated = env
        .conversations
        .update_conversation(
            conv.id,
            u1,
            ParticipantFlags {
                is_pinned: Some(true),
                is_muted: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.participant(u1).unwrap().is_pinned);
    assert!(updated.participant(u1).unwrap().is_muted);
    assert!(!updated.participant(u2).unwrap().is_pinned);

    let pinned_filter = ConversationFilters {
        pinned: Some(true),
        ..Default::default()
    };
    let for_u1 = env
        .conversations
        .get_conversations(u1, pinned_filter.clone())
        .await
        .unwrap();
    assert_eq!(for_u1.len(), 1);
    let for_u2 = env
        .conversations
        .get_conversations(u2, pinned_filter)
        .await
        .unwrap();
    assert!(for_u2.is_empty());
}

#[tokio::test]
async fn delete_archives_only_the_callers_view() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");

    let conv = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap()
        .conversation;
    env.messages
        .send_message(conv.id, u2, "ping", Vec::new(), None)
        .await
        .unwrap();
    assert_eq!(env.conversations.get_unread_count(u1).await.unwrap(), 1);

    env.conversations
        .delete_conversation(conv.id, u1)
        .await
        .unwrap();

    // archived view stops counting toward the unread badge
    assert_eq!(env.conversations.get_unread_count(u1).await.unwrap(), 0);

    let view = env.conversations.get_conversation(conv.id, u2).await.unwrap();
    assert!(view.participant(u1).unwrap().is_archived);
    assert!(!view.participant(u2).unwrap().is_archived);

    let visible = env
        .conversations
        .get_conversations(
            u1,
            ConversationFilters {
                archived: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn search_matches_peer_name_and_last_message() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let bob = seed_user(&env, "Bob Jones");
    let carol = seed_user(&env, "Carol Reyes");

    let with_bob = env
        .conversations
        .create_conversation(u1, bob, None, metadata(), None)
        .await
        .unwrap()
        .conversation;
    let with_carol = env
        .conversations
        .create_conversation(u1, carol, None, metadata(), None)
        .await
        .unwrap()
        .conversation;
    env.messages
        .send_message(with_carol.id, carol, "see you at the harbor", Vec::new(), None)
        .await
        .unwrap();

    let by_name = env
        .conversations
        .get_conversations(
            u1,
            ConversationFilters {
                search: Some("jones".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, with_bob.id);

    let by_content = env
        .conversations
        .get_conversations(
            u1,
            ConversationFilters {
                search: Some("HARBOR".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_content.len(), 1);
    assert_eq!(by_content[0].id, with_carol.id);
}

#[tokio::test]
async fn unread_only_filter_and_activity_ordering() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let bob = seed_user(&env, "Bob Jones");
    let carol = seed_user(&env, "Carol Reyes");

    let with_bob = env
        .conversations
        .create_conversation(u1, bob, None, metadata(), None)
        .await
        .unwrap()
        .conversation;
    let with_carol = env
        .conversations
        .create_conversation(u1, carol, None, metadata(), None)
        .await
        .unwrap()
        .conversation;

    // activity in the older thread moves it to the top
    env.messages
        .send_message(with_bob.id, bob, "hello again", Vec::new(), None)
        .await
        .unwrap();

    let listed = env
        .conversations
        .get_conversations(u1, ConversationFilters::default())
        .await
        .unwrap();
    assert_eq!(listed[0].id, with_bob.id);
    assert_eq!(listed[1].id, with_carol.id);

    let unread = env
        .conversations
        .get_conversations(
            u1,
            ConversationFilters {
                unread_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, with_bob.id);
}

#[tokio::test]
async fn mark_as_read_resets_badge_and_fans_out_receipts() {
    let env = setup();
    let u1 = seed_user(&env, "Alice Smith");
    let u2 = seed_user(&env, "Bob Jones");

    let conv = env
        .conversations
        .create_conversation(u1, u2, None, metadata(), None)
        .await
        .unwrap()
        .conversation;
    for i in 0..3 {
        env.messages
            .send_message(conv.id, u2, &format!("note {i}"), Vec::new(), None)
            .await
            .unwrap();
    }

    let view = env.conversations.get_conversation(conv.id, u1).await.unwrap();
    assert_eq!(view.participant(u1).unwrap().unread_count, 3);

    let outcome = env.conversations.mark_as_read(conv.id, u1).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.marked_count, 1);

    let view = env.conversations.get_conversation(conv.id, u1).await.unwrap();
    assert_eq!(view.participant(u1).unwrap().unread_count, 0);
    assert_eq!(env.conversations.get_unread_count(u1).await.unwrap(), 0);

    let page = env
        .messages
        .get_messages(conv.id, u1, None, None)
        .await
        .unwrap();
    assert!(page.messages.iter().all(|m| m.is_read_by(u1)));

    // outsider cannot mark someone else's thread
    let u3 = seed_user(&env, "Mallory Intruder");
    let err = env.conversations.mark_as_read(conv.id, u3).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}
