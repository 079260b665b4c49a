mod common;

use common::ScriptedClient;
use feedsync::domain::{ApiError, EntityId, LocalId, MutationStatus, Placement, ReasonCode, ToggleState, ToggleTarget};
use feedsync::transport::ThreadRef;
use feedsync::{
    handle_event, ActionKind, Comment, Config, Event, InteractionStore, MutationOutcome, OptimisticMutationEngine,
    RateDecision, RateLimiter, SubjectId, SyncError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn engine(client: Arc<ScriptedClient>, config: &Config) -> Arc<OptimisticMutationEngine> {
    let limiter = Arc::new(RateLimiter::from_config(config));
    Arc::new(OptimisticMutationEngine::new(client, limiter, config))
}

fn post_store(ids: &[&str]) -> InteractionStore {
    let comments = ids
        .iter()
        .map(|id| Comment::persisted(*id, SubjectId::new("author"), format!("text {id}")))
        .collect();
    InteractionStore::with_comments(ThreadRef::Post("p1".into()), comments)
}

fn u1() -> SubjectId {
    SubjectId::new("u1")
}

#[tokio::test(start_paused = true)]
async fn sixth_comment_within_a_minute_is_rate_limited() {
    let client = ScriptedClient::echo();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&[]);

    for i in 0..5 {
        handle_event(&engine, &store, &u1(), &Event::DraftChanged(format!("comment {i}")))
            .await
            .expect("draft");
        let outcome = handle_event(&engine, &store, &u1(), &Event::Submit).await.expect("allowed");
        assert!(matches!(outcome, MutationOutcome::Created(_)), "comment {i}");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    store.set_draft("one too many");
    let err = handle_event(&engine, &store, &u1(), &Event::Submit).await.expect_err("sixth denied");
    match err {
        SyncError::RateLimited { action, retry_after } => {
            assert_eq!(action, ActionKind::PostComment);
            assert_eq!(retry_after, Duration::from_secs(50));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.len(), 5);
    assert!(store.comments().iter().all(|c| c.status == MutationStatus::Confirmed));
    assert_eq!(store.draft(), "one too many");
    assert!(store.last_error().is_some());
    assert_eq!(client.requests().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn confirmation_replaces_placeholder_at_the_same_index() {
    let client = ScriptedClient::manual();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&["c1", "c2"]);

    let first = tokio::spawn({
        let (engine, store) = (engine.clone(), store.clone());
        async move { engine.submit_create(&store, &u1(), Placement::Root, "first!").await }
    });
    let first_request = client.next_pending().await;

    let second = tokio::spawn({
        let (engine, store) = (engine.clone(), store.clone());
        async move { engine.submit_create(&store, &SubjectId::new("u2"), Placement::Root, "second").await }
    });
    let second_request = client.next_pending().await;

    let comments = store.comments();
    assert_eq!(comments.len(), 4);
    assert!(comments[2].is_pending() && comments[3].is_pending());
    assert_eq!(comments[2].text, "first!");
    assert_eq!(first_request.request.param_str("postId"), Some("p1"));

    first_request.respond(Ok(serde_json::json!({ "_id": "c3", "userId": "u1", "content": "first!" })));
    let outcome = first.await.expect("task").expect("confirmed");
    let MutationOutcome::Created(confirmed) = outcome else {
        panic!("expected created outcome");
    };
    assert_eq!(confirmed.id, EntityId::persisted("c3"));

    let comments = store.comments();
    assert_eq!(comments[2], confirmed);
    assert!(comments[3].is_pending());

    second_request.respond(Ok(serde_json::json!({ "id": "c4", "authorId": "u2", "text": "second" })));
    second.await.expect("task").expect("confirmed");
    assert_eq!(store.comments()[3].id, EntityId::persisted("c4"));
    assert_eq!(engine.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_create_restores_list_and_draft() {
    let client = ScriptedClient::manual();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&["c1", "c2"]);
    let before = store.comments();
    store.set_draft("hello there");

    let task = tokio::spawn({
        let (engine, store) = (engine.clone(), store.clone());
        async move { handle_event(&engine, &store, &u1(), &Event::Submit).await }
    });
    let pending = client.next_pending().await;
    assert_eq!(store.len(), 3);
    assert_eq!(store.draft(), "");

    pending.respond(Err(ApiError::Network("connection reset".into())));
    let err = task.await.expect("task").expect_err("create fails");

    assert!(matches!(err, SyncError::Transport(ApiError::Network(_))));
    assert_eq!(store.comments(), before);
    assert_eq!(store.draft(), "hello there");
    assert_eq!(store.last_error().as_deref(), Some("Something went wrong. Please try again."));
}

#[tokio::test(start_paused = true)]
async fn failed_reply_removes_only_the_reply() {
    let client = ScriptedClient::failing(ApiError::Status { code: 500, message: String::new() });
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&["c1", "c2"]);
    store.set_draft("agreed");

    let event = Event::Reply { parent: EntityId::persisted("c2") };
    let err = handle_event(&engine, &store, &u1(), &event).await.expect_err("reply fails");
    assert!(err.is_retryable());

    let requests = client.requests();
    let (request, _) = &requests[0];
    assert_eq!(request.param_str("parentId"), Some("c2"));
    assert!(store.comments().iter().all(|c| c.replies.is_empty()));
    assert_eq!(store.len(), 2);
    assert_eq!(store.draft(), "agreed");
}

#[tokio::test(start_paused = true)]
async fn reply_to_unconfirmed_parent_sends_nothing() {
    let client = ScriptedClient::echo();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&["c1"]);
    store.set_draft("hi");

    let event = Event::Reply { parent: EntityId::Temporary(LocalId::new(42)) };
    let err = handle_event(&engine, &store, &u1(), &event).await.expect_err("rejected");

    assert!(matches!(err, SyncError::InvalidTarget(_)));
    assert!(client.requests().is_empty());
    assert_eq!(store.draft(), "hi");
}

#[tokio::test(start_paused = true)]
async fn invalid_input_never_reaches_the_network_or_the_limiter() {
    let client = ScriptedClient::echo();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&[]);

    for _ in 0..10 {
        let err = engine
            .submit_create(&store, &u1(), Placement::Root, "  <>  ")
            .await
            .expect_err("empty after sanitizing");
        assert!(matches!(err, SyncError::Validation(ref invalid) if invalid.reason == ReasonCode::Empty));
    }
    assert_eq!(store.last_error().as_deref(), Some("Comment cannot be empty."));

    let too_long = "x".repeat(1_001);
    let err = engine.submit_create(&store, &u1(), Placement::Root, &too_long).await.expect_err("too long");
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(client.requests().is_empty());

    for i in 0..5 {
        engine
            .submit_create(&store, &u1(), Placement::Root, &format!("ok {i}"))
            .await
            .expect("quota untouched by rejected input");
    }
}

#[tokio::test(start_paused = true)]
async fn messages_use_the_conversation_endpoint_and_message_rules() {
    let client = ScriptedClient::echo();
    let engine = engine(client.clone(), &Config::default());
    let store = InteractionStore::new(ThreadRef::Conversation("dm-7".into()));

    let outcome = engine
        .submit_create(&store, &u1(), Placement::Root, "  hey <b>you</b> ")
        .await
        .expect("message sent");

    let MutationOutcome::Created(message) = outcome else {
        panic!("expected created outcome");
    };
    assert_eq!(message.text, "hey byou/b");
    let requests = client.requests();
    let (request, _) = &requests[0];
    assert_eq!(request.param_str("conversationId"), Some("dm-7"));
    assert_eq!(request.param_str("text"), Some("hey byou/b"));

    let long_message = "m".repeat(1_500);
    engine
        .submit_create(&store, &u1(), Placement::Root, &long_message)
        .await
        .expect("messages allow more than comments");
}

#[tokio::test(start_paused = true)]
async fn toggle_state_follows_parity_of_successful_flips() {
    for flips in 0..6_i64 {
        let client = ScriptedClient::echo();
        let engine = engine(client.clone(), &Config::default());
        let store = post_store(&[]);
        let target = ToggleTarget::like("p1");
        store.set_toggle_state(target.clone(), ToggleState::new(false, 10));

        for _ in 0..flips {
            let outcome = handle_event(&engine, &store, &u1(), &Event::ToggleLike { entity: "p1".into() })
                .await
                .expect("toggle accepted");
            assert!(matches!(outcome, MutationOutcome::Toggled(_)));
        }

        let odd = flips % 2 == 1;
        assert_eq!(store.toggle_state(&target), ToggleState::new(odd, 10 + i64::from(odd)));
    }
}

#[tokio::test(start_paused = true)]
async fn failed_toggle_restores_flag_and_counter() {
    let client = ScriptedClient::failing(ApiError::Network("offline".into()));
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&[]);
    let target = ToggleTarget::star("p1");
    store.set_toggle_state(target.clone(), ToggleState::new(true, 7));

    let err = handle_event(&engine, &store, &u1(), &Event::ToggleStar { entity: "p1".into() })
        .await
        .expect_err("toggle fails");

    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(store.toggle_state(&target), ToggleState::new(true, 7));
    assert!(store.last_error().is_some());

    handle_event(&engine, &store, &u1(), &Event::DismissError).await.expect("dismiss");
    assert_eq!(store.last_error(), None);
}

#[tokio::test(start_paused = true)]
async fn duplicate_toggle_while_in_flight_is_ignored() {
    let client = ScriptedClient::manual();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&[]);
    let target = ToggleTarget::like("p1");

    let first = tokio::spawn({
        let (engine, store, target) = (engine.clone(), store.clone(), target.clone());
        async move { engine.submit_toggle(&store, &u1(), target).await }
    });
    let pending = client.next_pending().await;
    assert_eq!(store.toggle_state(&target), ToggleState::new(true, 1));
    assert_eq!(engine.in_flight_count(), 1);

    let duplicate = engine.submit_toggle(&store, &u1(), target.clone()).await.expect("no error");
    assert_eq!(duplicate, MutationOutcome::Ignored);
    assert_eq!(store.toggle_state(&target), ToggleState::new(true, 1));

    pending.respond(Ok(serde_json::Value::Null));
    let outcome = first.await.expect("task").expect("toggled");
    assert_eq!(outcome, MutationOutcome::Toggled(ToggleState::new(true, 1)));
    assert_eq!(engine.in_flight_count(), 0);
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_create_rolls_back() {
    let client = ScriptedClient::manual();
    let mut config = Config::default();
    config.request_timeout_ms = Some(5_000);
    let engine = engine(client.clone(), &config);
    let store = post_store(&["c1"]);

    let err = engine
        .submit_create(&store, &u1(), Placement::Root, "anyone there?")
        .await
        .expect_err("times out");

    assert!(matches!(err, SyncError::Transport(ApiError::Timeout(d)) if d == Duration::from_secs(5)));
    assert_eq!(store.len(), 1);
    assert_eq!(store.draft(), "anyone there?");
    assert!(client.take_pending()[0].is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn replies_to_missing_parents_use_no_quota() {
    let client = ScriptedClient::echo();
    let engine = engine(client.clone(), &Config::default());
    let store = post_store(&["c1"]);
    let gone = Placement::Reply { parent: EntityId::persisted("gone") };

    for _ in 0..5 {
        let err = engine.submit_create(&store, &u1(), gone.clone(), "hi").await.expect_err("missing parent");
        assert!(matches!(err, SyncError::InvalidTarget(_)));
    }
    assert!(client.requests().is_empty());

    let reply = Placement::Reply { parent: EntityId::persisted("c1") };
    let outcome = engine.submit_create(&store, &u1(), reply, "hi").await.expect("quota untouched");
    assert!(matches!(outcome, MutationOutcome::Created(_)));
    assert_eq!(store.comments()[0].replies.len(), 1);
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_create_while_in_flight_is_ignored() {
    let client = ScriptedClient::manual();
    let config = Config::default();
    let limiter = Arc::new(RateLimiter::from_config(&config));
    let engine = Arc::new(OptimisticMutationEngine::new(client.clone(), limiter.clone(), &config));
    let store = post_store(&["c1"]);

    let first = tokio::spawn({
        let (engine, store) = (engine.clone(), store.clone());
        async move { engine.submit_create(&store, &u1(), Placement::Root, "first!").await }
    });
    let pending = client.next_pending().await;
    assert_eq!(store.len(), 2);

    store.set_draft("still typing");
    let duplicate = engine
        .submit_create(&store, &u1(), Placement::Root, "first!")
        .await
        .expect("no error");
    assert_eq!(duplicate, MutationOutcome::Ignored);
    assert_eq!(store.len(), 2);
    assert_eq!(store.draft(), "still typing");
    assert_eq!(store.last_error(), None);

    pending.respond(Ok(serde_json::json!({ "id": "c2", "authorId": "u1", "text": "first!" })));
    first.await.expect("task").expect("confirmed");
    assert_eq!(client.requests().len(), 1);

    let decision = limiter.check_at(&u1(), ActionKind::PostComment, Instant::now());
    assert_eq!(decision, RateDecision::Allowed { remaining: 3 });
}
