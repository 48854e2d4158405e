use async_trait::async_trait;
use parking_lot::Mutex;
use pewter::core::{BoxedAdapter, MemoryStorage, Storage};
use pewter::prelude::*;
use pewter::runtime::ConfigLoader;

#[derive(Default)]
struct Outbox(Mutex<Vec<(Source, Vec<String>)>>);

struct RecordingAdapter {
    outbox: Arc<Outbox>,
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self) -> AdapterResult<()> {
        Ok(())
    }

    async fn send_messages(&self, target: &Source, strings: &[String]) -> AdapterResult<()> {
        self.outbox.0.lock().push((target.clone(), strings.to_vec()));
        Ok(())
    }
}

async fn remember(response: Response) -> Result<(), BoxError> {
    let thing = response.captures().get(1).unwrap_or_default().trim().to_string();
    let mut user = response
        .users()
        .find_by_id(&response.user().id)
        .await?
        .unwrap_or_else(|| response.user().clone());
    user.metadata.insert("information".to_string(), thing.clone());
    response.users().save(&user).await?;
    response.reply(format!("I have stored {thing} for future reference."));
    Ok(())
}

fn setup() -> (Arc<Registry>, Arc<Outbox>) {
    let registry = Arc::new(Registry::new());
    let outbox = Arc::new(Outbox::default());
    let shared = Arc::clone(&outbox);
    registry
        .register_adapter(
            "recording",
            Arc::new(move |_ctx: AdapterContext| -> AdapterResult<BoxedAdapter> {
                Ok(Arc::new(RecordingAdapter {
                    outbox: Arc::clone(&shared),
                }))
            }),
        )
        .unwrap();
    registry
        .configure(|tree| tree.set("robot.adapter", "recording"))
        .unwrap();
    registry
        .register_handler_with("remember", |h| {
            h.route(
                Route::new(r"(?i)^remember\sthis\s(.+)$", "remember", remember)
                    .unwrap()
                    .command(true),
            )
        })
        .unwrap();
    (registry, outbox)
}

fn carl(body: &str) -> Message {
    Message::new(body, Source::new(User::new("1", "Carl")).room("#lobby"))
}

#[tokio::test]
async fn test_remember_reaches_storage() {
    let (registry, outbox) = setup();
    let storage = Arc::new(MemoryStorage::new());
    let robot = Robot::builder(registry, RunMode::Test)
        .config_loader(ConfigLoader::new().without_env())
        .storage(storage.clone())
        .build();

    robot.start().await.unwrap();
    robot.receive(carl("Pewter: remember this blue").directed()).await;

    let sent = outbox.0.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.room.as_deref(), Some("#lobby"));
    assert!(sent[0].1[0].contains("blue"));

    let stored = storage.hgetall("pewter:users:id:1").await.unwrap();
    assert_eq!(stored.get("information").map(String::as_str), Some("blue"));
    assert_eq!(stored.get("name").map(String::as_str), Some("Carl"));

    robot.stop().await.unwrap();
    assert_eq!(robot.state(), RobotState::Stopped);
}

#[tokio::test]
async fn test_undirected_command_is_unhandled() {
    let (registry, outbox) = setup();
    let unhandled = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&unhandled);
    registry.register_hook(
        HookEvent::UnhandledMessage,
        Arc::new(move |_: &HookPayload| -> HookResult<()> {
            *counter.lock() += 1;
            Ok(())
        }),
    );

    let robot = Robot::builder(registry, RunMode::Test)
        .config_loader(ConfigLoader::new().without_env())
        .build();
    robot.start().await.unwrap();
    robot.receive(carl("remember this blue")).await;

    assert!(outbox.0.lock().is_empty());
    assert_eq!(*unhandled.lock(), 1);
}
