//! Two or more signed-in clients sharing one in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chat_session::{canonicalize, ChatError, ChatSession, Composer, DirectoryService};
use identity_store::{AppId, DocumentPath, IdentityId, MemoryIdentityStore, Message};
use phone_auth::{
    AuthController, AuthState, Country, ScriptedChallengeProvider, SessionContext,
    DEFAULT_SCRIPTED_CODE,
};

const APP: &str = "chat-test";
const WAIT: Duration = Duration::from_secs(2);

struct Client {
    controller: AuthController,
    ctx: SessionContext,
}

impl Client {
    fn id(&self) -> IdentityId {
        self.ctx.user_id().clone()
    }
}

fn us() -> Country {
    Country::new("United States", "+1")
}

async fn sign_in(store: &Arc<MemoryIdentityStore>, local_number: &str, name: &str) -> Client {
    let mut controller = AuthController::new(
        AppId::from(APP),
        Arc::new(ScriptedChallengeProvider::new()),
        store.clone(),
    );
    controller.submit_phone(&us(), local_number).await.unwrap();
    let state = controller.submit_code(DEFAULT_SCRIPTED_CODE).await.unwrap();
    assert_eq!(state, AuthState::VerifiedProfileMissing);
    controller.complete_profile(name).await.unwrap();

    let ctx = controller.session().unwrap();
    Client { controller, ctx }
}

async fn wait_for_messages(session: &mut ChatSession, count: usize) -> Vec<Message> {
    tokio::time::timeout(WAIT, async {
        loop {
            if session.messages().len() >= count {
                return session.messages().to_vec();
            }
            session.next_update().await.expect("message stream ended");
        }
    })
    .await
    .expect("timed out waiting for messages")
}

async fn wait_for_roster(directory: &mut DirectoryService, count: usize) -> Vec<IdentityId> {
    tokio::time::timeout(WAIT, async {
        loop {
            let roster = directory.next_roster().await.expect("directory stream ended");
            if roster.len() >= count {
                return roster.iter().map(|entry| entry.id.clone()).collect();
            }
        }
    })
    .await
    .expect("timed out waiting for roster")
}

#[tokio::test]
async fn hello_reaches_both_sides_once() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "555 000 1111", "Alice").await;
    let bob = sign_in(&store, "555-000-2222", "Bob").await;

    let mut alice_chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    let mut bob_chat = ChatSession::open(&bob.ctx, &alice.id()).await.unwrap();
    assert_eq!(alice_chat.channel(), bob_chat.channel());
    assert_eq!(alice_chat.channel(), &canonicalize(&alice.id(), &bob.id()));

    let sent = alice_chat.send("hello").unwrap().await.unwrap();
    assert_eq!(sent.sender_id, alice.id());

    for chat in [&mut alice_chat, &mut bob_chat] {
        let messages = wait_for_messages(chat, 1).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].sender_id, alice.id());
        assert_eq!(messages[0].id, sent.id);
    }

    let stored = store
        .channel_messages(&AppId::from(APP), alice_chat.channel())
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn reopening_a_pair_sees_history() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut first = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    first.send("before").unwrap().await.unwrap();
    first.close();

    let mut again = ChatSession::open(&bob.ctx, &alice.id()).await.unwrap();
    let messages = wait_for_messages(&mut again, 1).await;
    assert_eq!(messages[0].text, "before");
}

#[tokio::test]
async fn messages_render_in_server_order() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let alice_chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    let bob_chat = ChatSession::open(&bob.ctx, &alice.id()).await.unwrap();

    alice_chat.send("one").unwrap().await.unwrap();
    bob_chat.send("two").unwrap().await.unwrap();
    alice_chat.send("three").unwrap().await.unwrap();

    let mut observer = ChatSession::open(&bob.ctx, &alice.id()).await.unwrap();
    let messages = wait_for_messages(&mut observer, 3).await;
    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert!(messages.windows(2).all(|pair| pair[0].sent_at < pair[1].sent_at));
    assert_eq!(messages[1].sender_id, bob.id());
}

#[tokio::test]
async fn redelivered_snapshots_do_not_duplicate() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    chat.send("a").unwrap().await.unwrap();
    chat.send("b").unwrap().await.unwrap();
    wait_for_messages(&mut chat, 2).await;

    let path = DocumentPath::messages(&AppId::from(APP), chat.channel()).unwrap();
    assert!(store.redeliver(&path));
    assert!(store.redeliver(&path));

    for _ in 0..2 {
        let messages = tokio::time::timeout(WAIT, chat.next_update())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(messages.len(), 2);
    }
}

#[tokio::test]
async fn blank_messages_are_not_written() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;
    let chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    let writes = store.write_count();

    assert!(matches!(chat.send(""), Err(ChatError::Validation(_))));
    assert!(matches!(chat.send("  \n "), Err(ChatError::Validation(_))));

    let mut composer = Composer::new();
    composer.set_text("   ");
    assert!(matches!(
        chat.send_draft(&mut composer),
        Err(ChatError::Validation(_))
    ));
    assert_eq!(composer.text(), "   ");
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn talking_to_yourself_is_rejected() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;

    let result = ChatSession::open(&alice.ctx, &alice.id()).await;
    assert!(matches!(result, Err(ChatError::Validation(_))));
}

#[tokio::test]
async fn failed_send_restores_the_draft() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;
    let chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();

    let mut composer = Composer::new();
    composer.set_text("hello");
    store.fail_next_writes(1);

    let pending = chat.send_draft(&mut composer).unwrap();
    assert_eq!(composer.text(), "");
    assert_eq!(pending.text(), "hello");

    let error = pending.await.unwrap_err();
    assert_eq!(error.unsent_text(), Some("hello"));
    assert!(composer.restore(&error));
    assert_eq!(composer.text(), "hello");
    assert_eq!(composer.failed(), &["hello".to_string()]);

    let stored = store
        .channel_messages(&AppId::from(APP), chat.channel())
        .unwrap();
    assert!(stored.is_empty());

    let sent = chat.send_draft(&mut composer).unwrap().await.unwrap();
    assert_eq!(sent.text, "hello");
}

#[tokio::test]
async fn directory_lists_everyone_but_yourself() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;
    let carol = sign_in(&store, "5550003333", "Carol").await;

    let mut directory = DirectoryService::new(alice.ctx.clone());
    directory.start().await.unwrap();
    directory.start().await.unwrap();

    let ids = wait_for_roster(&mut directory, 2).await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&bob.id()));
    assert!(ids.contains(&carol.id()));
    assert!(!ids.contains(&alice.id()));

    let dave = sign_in(&store, "5550004444", "Dave").await;
    let ids = wait_for_roster(&mut directory, 3).await;
    assert!(ids.contains(&dave.id()));
    assert!(!ids.contains(&alice.id()));

    let names: Vec<&str> = directory
        .roster()
        .sorted_by_name()
        .into_iter()
        .map(|entry| entry.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Bob", "Carol", "Dave"]);
}

#[tokio::test]
async fn stop_and_close_are_idempotent() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut directory = DirectoryService::new(alice.ctx.clone());
    directory.start().await.unwrap();
    directory.stop();
    directory.stop();
    assert!(!directory.is_running());
    assert!(directory.next_roster().await.is_none());

    let mut chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    chat.close();
    chat.close();
    assert!(!chat.is_open());
    assert!(chat.next_update().await.is_none());

    let sent = chat.send("still delivered").unwrap().await.unwrap();
    let stored = store
        .channel_messages(&AppId::from(APP), chat.channel())
        .unwrap();
    assert_eq!(stored, vec![sent]);
}

#[tokio::test]
async fn sign_out_refuses_further_access() {
    let store = Arc::new(MemoryIdentityStore::new());
    let mut alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut directory = DirectoryService::new(alice.ctx.clone());
    directory.start().await.unwrap();
    let mut chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();

    alice.controller.sign_out().await.unwrap();
    assert_eq!(alice.controller.state(), AuthState::Unauthenticated);
    assert!(alice.controller.session().is_err());

    assert!(matches!(chat.send("hi"), Err(ChatError::NotAuthenticated)));
    assert!(chat.next_update().await.is_none());
    assert!(directory.next_roster().await.is_none());
    assert!(matches!(
        directory.start().await,
        Err(ChatError::NotAuthenticated)
    ));
    assert!(matches!(
        ChatSession::open(&alice.ctx, &bob.id()).await,
        Err(ChatError::NotAuthenticated)
    ));

    let store_messages = store
        .channel_messages(&AppId::from(APP), &canonicalize(&alice.id(), &bob.id()))
        .unwrap();
    assert!(store_messages.is_empty());
}

#[tokio::test]
async fn sign_out_wakes_a_waiting_reader() {
    let store = Arc::new(MemoryIdentityStore::new());
    let mut alice = sign_in(&store, "5550001111", "Alice").await;
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
    chat.next_update().await.unwrap();

    let reader = tokio::spawn(async move { chat.next_update().await.is_none() });
    tokio::task::yield_now().await;

    alice.controller.sign_out().await.unwrap();
    let ended = tokio::time::timeout(WAIT, reader).await.unwrap().unwrap();
    assert!(ended);
}

#[tokio::test]
async fn restored_session_can_chat() {
    let store = Arc::new(MemoryIdentityStore::new());
    let provider = ScriptedChallengeProvider::new();
    let bob = sign_in(&store, "5550002222", "Bob").await;

    let mut first = AuthController::new(AppId::from(APP), Arc::new(provider.clone()), store.clone());
    first.submit_phone(&us(), "5550001111").await.unwrap();
    first.submit_code(DEFAULT_SCRIPTED_CODE).await.unwrap();
    first.complete_profile("Alice").await.unwrap();
    drop(first);

    let mut restored = AuthController::new(AppId::from(APP), Arc::new(provider), store.clone());
    assert_eq!(restored.restore().await.unwrap(), AuthState::Ready);

    let ctx = restored.session().unwrap();
    let chat = ChatSession::open(&ctx, &bob.id()).await.unwrap();
    let sent = chat.send("back again").unwrap().await.unwrap();
    assert_eq!(&sent.sender_id, ctx.user_id());
}

#[tokio::test]
async fn ids_holding_the_separator_cannot_open_a_conversation() {
    let store = Arc::new(MemoryIdentityStore::new());
    let alice = sign_in(&store, "5550001111", "Alice").await;

    for peer in ["a_b", "", "_"] {
        assert!(matches!(
            ChatSession::open(&alice.ctx, &IdentityId::from(peer)).await,
            Err(ChatError::Validation(_))
        ));
    }
}

#[test]
fn send_outside_a_runtime_fails_without_panicking() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MemoryIdentityStore::new());
    let (alice, chat) = runtime.block_on(async {
        let alice = sign_in(&store, "5550001111", "Alice").await;
        let bob = sign_in(&store, "5550002222", "Bob").await;
        let chat = ChatSession::open(&alice.ctx, &bob.id()).await.unwrap();
        (alice, chat)
    });

    match chat.send("hi") {
        Err(ChatError::SendFailed { text, .. }) => assert_eq!(text, "hi"),
        other => panic!("expected SendFailed, got {:?}", other),
    }

    let mut composer = Composer::new();
    composer.set_text("draft");
    assert!(matches!(
        chat.send_draft(&mut composer),
        Err(ChatError::SendFailed { .. })
    ));
    assert_eq!(composer.text(), "draft");
    assert_eq!(composer.failed(), &["draft".to_string()]);

    let stored = store
        .channel_messages(&AppId::from(APP), chat.channel())
        .unwrap();
    assert!(stored.is_empty());
    drop((alice, chat));
}

#[tokio::test]
async fn contexts_only_come_from_a_ready_controller() {
    let store = Arc::new(MemoryIdentityStore::new());
    let mut controller = AuthController::new(
        AppId::from(APP),
        Arc::new(ScriptedChallengeProvider::new()),
        store.clone(),
    );
    assert!(controller.session().is_err());

    controller.submit_phone(&us(), "5550001111").await.unwrap();
    controller.submit_code(DEFAULT_SCRIPTED_CODE).await.unwrap();
    assert_eq!(controller.state(), AuthState::VerifiedProfileMissing);
    assert!(controller.session().is_err());

    controller.complete_profile("Alice").await.unwrap();
    assert!(controller.session().unwrap().is_active());
}
