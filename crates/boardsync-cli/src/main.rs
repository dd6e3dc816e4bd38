use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use boardsync_core::app::{BoardEngine, EngineBuilder, EngineConfig, StorageMode, SyncHandle, SyncLoop};
use boardsync_core::domain::{Board, BoardId};
use boardsync_core::impls::{FileDeviceStorage, InMemoryBoardStore, MemoryDeviceStorage, NotifyingStore, RelayHub};
use boardsync_core::ports::{Clock, DeviceStorage, IdGenerator, SystemClock, UlidGenerator};
use boardsync_core::reconcile::MoveRequest;

/// 1 クライアント分（エンジン + 同期ループ）
struct Client {
    name: &'static str,
    engine: BoardEngine,
    sync: SyncHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = load_config()?;
    tracing::info!(?config, "boardsync demo starting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

    // サーバー側: 共有ストア + リレー
    let shared = Arc::new(InMemoryBoardStore::with_board(
        config.default_board()?,
        config.limits,
        Arc::clone(&clock),
    ));
    let hub = Arc::new(RelayHub::new(Arc::clone(&ids), config.relay_capacity));
    let board_id = ids.generate_board_id();

    let alice = connect("alice", &config, &shared, &hub, board_id, device_for("alice")?).await?;
    let bob = connect("bob", &config, &shared, &hub, board_id, device_for("bob")?).await?;

    // alice: 作成 → 編集（ここで初めてストアへ）→ 移動
    let draft = alice.engine.create_task()?;
    tracing::info!(client = alice.name, task_id = %draft, "provisional task, nothing sent yet");
    alice.engine.edit_task(draft, "Write the release notes")?;
    alice.engine.flush().await;

    let board = alice.engine.board();
    let (task_id, column) = board
        .ordered_columns()
        .find_map(|c| c.task_order.first().map(|id| (*id, c.slug.clone())))
        .context("alice's task is missing")?;
    let done = board
        .column_order
        .last()
        .cloned()
        .context("board has no columns")?;
    alice.engine.move_task(MoveRequest {
        task_id,
        source_column: column,
        source_index: 0,
        dest_column: done,
        dest_index: 0,
    })?;

    // bob: カラムを追加
    bob.engine.add_column("Review")?;
    alice.engine.flush().await;
    bob.engine.flush().await;

    // 相手側の再取得を少し待つ
    tokio::time::sleep(Duration::from_millis(100)).await;
    for client in [&alice, &bob] {
        client.engine.flush().await;
        print_board(client.name, &client.engine.board());
    }

    // 上限を超えるカラムはローカルで拒否される
    for name in ["QA", "Blocked", "Icebox"] {
        if let Err(err) = alice.engine.add_column(name) {
            tracing::warn!(client = alice.name, column = name, error = %err, "column rejected");
        }
    }
    alice.engine.flush().await;

    for client in [alice, bob] {
        println!(
            "{} status: {}",
            client.name,
            serde_json::to_string_pretty(&client.engine.status())?
        );
        client.sync.shutdown_and_join().await;
        client.engine.shutdown().await;
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("boardsync_core=debug,boardsync_cli=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// `BOARDSYNC_CONFIG` に JSON ファイルのパスがあれば読む
fn load_config() -> anyhow::Result<EngineConfig> {
    let Ok(path) = env::var("BOARDSYNC_CONFIG") else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    EngineConfig::from_json_str(&json).with_context(|| format!("parsing {path}"))
}

/// `BOARDSYNC_DEVICE_DIR` があればクライアントごとのサブディレクトリに保存する
fn device_for(name: &str) -> anyhow::Result<Arc<dyn DeviceStorage>> {
    match env::var("BOARDSYNC_DEVICE_DIR") {
        Ok(dir) => {
            let storage = FileDeviceStorage::new(std::path::Path::new(&dir).join(name))?;
            Ok(Arc::new(storage))
        }
        Err(_) => Ok(Arc::new(MemoryDeviceStorage::new())),
    }
}

async fn connect(
    name: &'static str,
    config: &EngineConfig,
    shared: &Arc<InMemoryBoardStore>,
    hub: &Arc<RelayHub>,
    board_id: BoardId,
    device: Arc<dyn DeviceStorage>,
) -> anyhow::Result<Client> {
    let connection = hub.connect();
    let store = NotifyingStore::new(shared.clone(), hub.clone(), board_id, connection);
    let engine = EngineBuilder::new()
        .store(Arc::new(store))
        .device(device)
        .config(config.clone())
        .mode(StorageMode::Synced)
        .build()?;
    engine.hydrate().await?;
    let sync = SyncLoop::spawn(hub.clone(), board_id, connection, engine.invalidator());
    tracing::info!(client = name, %connection, "client connected");
    Ok(Client { name, engine, sync })
}

fn print_board(name: &str, board: &Board) {
    println!("== {name} ==");
    for column in board.ordered_columns() {
        let titles: Vec<&str> = column
            .task_order
            .iter()
            .filter_map(|id| board.task(*id))
            .map(|t| t.title.as_str())
            .collect();
        println!("  [{}] {}: {:?}", column.position, column.display_name, titles);
    }
}
