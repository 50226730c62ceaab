//! Integration tests for card create/read/update/delete semantics.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use common::TestContext;
use pretty_assertions::assert_eq;

use card_reviewer_backend::error::ApiError;
use card_reviewer_backend::models::{CardPayload, FieldValue};

fn validation_fields(err: ApiError) -> Vec<(String, Vec<String>)> {
    match err {
        ApiError::Validation(errors) => errors
            .fields()
            .map(|field| (field.to_string(), errors.get(field).unwrap().to_vec()))
            .collect(),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_applies_defaults_and_trims() {
    let ctx = TestContext::new().await;
    let before = Utc::now() - chrono::Duration::seconds(1);

    let card = ctx.create_card("  hola ", " hello  ").await;

    assert_eq!(card.text, "hola");
    assert_eq!(card.translation, "hello");
    assert_eq!(card.image_path, None);
    assert!(!card.remembered);
    assert!(card.active);
    assert_eq!(card.created_at, card.updated_at);
    assert!(card.met_at >= before);
    assert!(card.met_at <= Utc::now() + chrono::Duration::seconds(1));
}

#[tokio::test]
async fn test_create_keeps_supplied_review_state() {
    let ctx = TestContext::new().await;

    let card = ctx
        .create_card_with("gato", "2023-04-05 06:07:08 UTC", true, false)
        .await;

    assert_eq!(
        card_core::timestamp::format(&card.met_at),
        "2023-04-05 06:07:08 UTC"
    );
    assert!(card.remembered);
    assert!(!card.active);
}

#[tokio::test]
async fn test_create_missing_field_names_exactly_that_field() {
    let ctx = TestContext::new().await;

    let mut payload = CardPayload::new("hola", "hello");
    payload.text = FieldValue::Absent;
    let err = ctx.cards.create_card(&payload).await.unwrap_err();
    assert_eq!(
        validation_fields(err),
        vec![("text".to_string(), vec!["cannot be null".to_string()])]
    );

    let mut payload = CardPayload::new("hola", "hello");
    payload.translation = FieldValue::Absent;
    let err = ctx.cards.create_card(&payload).await.unwrap_err();
    assert_eq!(
        validation_fields(err),
        vec![("translation".to_string(), vec!["cannot be null".to_string()])]
    );
}

#[tokio::test]
async fn test_create_reports_every_invalid_field() {
    let ctx = TestContext::new().await;

    let payload = CardPayload {
        text: FieldValue::Present("   ".to_string()),
        translation: FieldValue::WrongType,
        met_at: FieldValue::Present("2024-13-01 00:00:00 UTC".to_string()),
        remembered: FieldValue::Null,
        active: FieldValue::WrongType,
    };
    let err = ctx.cards.create_card(&payload).await.unwrap_err();

    assert_eq!(
        validation_fields(err),
        vec![
            ("active".to_string(), vec!["should be Boolean".to_string()]),
            ("met_at".to_string(), vec!["invalid date format".to_string()]),
            ("remembered".to_string(), vec!["should be Boolean".to_string()]),
            ("text".to_string(), vec!["cannot be blank".to_string()]),
            ("translation".to_string(), vec!["should be a string".to_string()]),
        ]
    );
    assert!(ctx.cards.list_cards().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_text_rejected() {
    let ctx = TestContext::new().await;
    ctx.create_card("Hola", "Hello").await;

    let err = ctx
        .cards
        .create_card(&CardPayload::new(" Hola ", "Hi"))
        .await
        .unwrap_err();

    assert_eq!(
        validation_fields(err),
        vec![("text".to_string(), vec!["should be unique".to_string()])]
    );
    assert_eq!(ctx.cards.list_cards().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_may_keep_own_text() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("Hola", "Hello").await;

    let updated = ctx
        .cards
        .update_card(card.id, &CardPayload::new("Hola", "Hi there"))
        .await
        .unwrap();

    assert_eq!(updated.text, "Hola");
    assert_eq!(updated.translation, "Hi there");
}

#[tokio::test]
async fn test_update_to_other_cards_text_rejected() {
    let ctx = TestContext::new().await;
    ctx.create_card("uno", "one").await;
    let dos = ctx.create_card("dos", "two").await;

    let err = ctx
        .cards
        .update_card(dos.id, &CardPayload::new("uno", "two"))
        .await
        .unwrap_err();

    assert_eq!(
        validation_fields(err),
        vec![("text".to_string(), vec!["should be unique".to_string()])]
    );
    assert_eq!(ctx.cards.get_card(dos.id).await.unwrap().text, "dos");
}

#[tokio::test]
async fn test_identical_update_keeps_updated_at() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("hola", "hello").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let same = ctx
        .cards
        .update_card(card.id, &CardPayload::new("hola", "hello").with_active(true))
        .await
        .unwrap();
    assert_eq!(same.updated_at, card.updated_at);

    // Review bookkeeping is not an edit either.
    let reviewed = ctx
        .cards
        .update_card(
            card.id,
            &CardPayload::new("hola", "hello")
                .with_remembered(true)
                .with_met_at("2030-01-01 00:00:00 UTC"),
        )
        .await
        .unwrap();
    assert!(reviewed.remembered);
    assert_eq!(reviewed.updated_at, card.updated_at);
}

#[tokio::test]
async fn test_significant_update_advances_updated_at() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("hola", "hello").await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    let translated = ctx
        .cards
        .update_card(card.id, &CardPayload::new("hola", "hi"))
        .await
        .unwrap();
    assert!(translated.updated_at > card.updated_at);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let deactivated = ctx
        .cards
        .update_card(card.id, &CardPayload::new("hola", "hi").with_active(false))
        .await
        .unwrap();
    assert!(deactivated.updated_at > translated.updated_at);
    assert!(deactivated.updated_at >= deactivated.created_at);
}

#[tokio::test]
async fn test_update_requires_text_and_translation() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("perro", "dog").await;

    let payload = CardPayload {
        active: FieldValue::Present(false),
        ..CardPayload::default()
    };
    let err = ctx.cards.update_card(card.id, &payload).await.unwrap_err();

    assert_eq!(
        validation_fields(err),
        vec![
            ("text".to_string(), vec!["cannot be null".to_string()]),
            ("translation".to_string(), vec!["cannot be null".to_string()]),
        ]
    );
    let stored = ctx.cards.get_card(card.id).await.unwrap();
    assert!(stored.active);
    assert_eq!(stored.updated_at, card.updated_at);
}

#[tokio::test]
async fn test_update_keeps_review_state_left_out() {
    let ctx = TestContext::new().await;
    let card = ctx
        .create_card_with("perro", "2022-02-02 02:02:02 UTC", true, false)
        .await;

    let updated = ctx
        .cards
        .update_card(card.id, &CardPayload::new("perro", "hound"))
        .await
        .unwrap();

    assert_eq!(updated.translation, "hound");
    assert_eq!(updated.met_at, card.met_at);
    assert!(updated.remembered);
    assert!(!updated.active);
}

#[tokio::test]
async fn test_update_unknown_card_not_found() {
    let ctx = TestContext::new().await;

    let err = ctx
        .cards
        .update_card(42, &CardPayload::new("hola", "hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_then_get_not_found() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("hola", "hello").await;

    ctx.cards.delete_card(card.id).await.unwrap();

    assert!(matches!(
        ctx.cards.get_card(card.id).await.unwrap_err(),
        ApiError::NotFound(_)
    ));
    assert!(matches!(
        ctx.cards.delete_card(card.id).await.unwrap_err(),
        ApiError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let ctx = TestContext::new().await;
    let first = ctx.create_card("uno", "one").await;
    ctx.cards.delete_card(first.id).await.unwrap();

    let second = ctx.create_card("dos", "two").await;
    assert!(second.id > first.id);
}

#[tokio::test]
async fn test_change_counter_counts_committed_mutations_only() {
    let ctx = TestContext::new().await;
    assert_eq!(ctx.db.change_counter(), 0);

    let card = ctx.create_card("hola", "hello").await;
    assert_eq!(ctx.db.change_counter(), 1);

    ctx.cards
        .update_card(card.id, &CardPayload::new("hola", "hi"))
        .await
        .unwrap();
    assert_eq!(ctx.db.change_counter(), 2);

    // Failed operations leave it alone.
    ctx.cards
        .create_card(&CardPayload::new("hola", "again"))
        .await
        .unwrap_err();
    ctx.cards.delete_card(999).await.unwrap_err();
    assert_eq!(ctx.db.change_counter(), 2);

    ctx.cards.delete_card(card.id).await.unwrap();
    assert_eq!(ctx.db.change_counter(), 3);
}

#[tokio::test]
async fn test_list_in_insertion_order() {
    let ctx = TestContext::new().await;
    for text in ["c", "a", "b"] {
        ctx.create_card(text, "x").await;
    }

    let texts: Vec<String> = ctx
        .cards
        .list_cards()
        .await
        .unwrap()
        .iter()
        .map(|card| card.text.clone())
        .collect();

    assert_eq!(texts, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_concurrent_creates_with_same_text_admit_one() {
    let ctx = TestContext::new().await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cards = ctx.cards.clone();
            tokio::spawn(async move {
                cards
                    .create_card(&CardPayload::new("hola", format!("hello {}", i)))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert_eq!(
                validation_fields(err),
                vec![("text".to_string(), vec!["should be unique".to_string()])]
            ),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(ctx.db.change_counter(), 1);
}

#[tokio::test]
async fn test_concurrent_updates_to_one_card_all_apply() {
    let ctx = TestContext::new().await;
    let card = ctx.create_card("hola", "hello").await;
    let base = ctx.db.change_counter();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cards = ctx.cards.clone();
            tokio::spawn(async move {
                cards
                    .update_card(card.id, &CardPayload::new("hola", format!("v{}", i)))
                    .await
            })
        })
        .collect();

    let mut written = HashSet::new();
    for handle in handles {
        written.insert(handle.await.unwrap().unwrap().translation);
    }

    assert_eq!(written.len(), 8);
    assert_eq!(ctx.db.change_counter(), base + 8);
    let stored = ctx.cards.get_card(card.id).await.unwrap();
    assert!(written.contains(&stored.translation));
}
