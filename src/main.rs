//! Notify Center CLI
//!
//! 运营后台通知中心客户端 (store + 推送同步 + TUI)

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use notify_center::{
    cli::{output, SendArgs},
    spawn_push_loop, ApiClient, ClientConfig, LongPollTransport, NotificationApi,
    NotificationStore, PushLoopConfig, PushTransport,
};

#[derive(Parser)]
#[command(name = "ncen")]
#[command(about = "Notify Center - 运营后台通知中心客户端")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 打开通知中心 TUI（铃铛面板）
    Tui,
    /// 分页列出通知
    List {
        /// 页码（从 1 开始）
        #[arg(long, short, default_value = "1")]
        page: u32,
        /// 每页条数
        #[arg(long, short, default_value = "20")]
        limit: u32,
        /// 只看未读
        #[arg(long)]
        unread_only: bool,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 查看未读数量
    Unread {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 标记单条已读
    Read {
        /// 通知 ID
        id: String,
    },
    /// 全部标记已读
    ReadAll,
    /// 删除通知
    Delete {
        /// 通知 ID
        id: String,
    },
    /// 管理端发送通知
    Send(SendArgs),
    /// 前台监听推送并打印新通知
    Watch {
        /// 单次长轮询等待（秒）
        #[arg(long, short, default_value = "55")]
        timeout: u64,
    },
    /// 注册推送 token
    RegisterToken,
    /// 订阅主题
    Subscribe {
        /// 主题名
        topic: String,
    },
    /// 退订主题
    Unsubscribe {
        /// 主题名
        topic: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::auto_load()?;

    match cli.command {
        Commands::Tui => {
            let api = Arc::new(ApiClient::new(&config)?);
            let store = NotificationStore::new(api, config.page_size);
            let transport: Option<Arc<dyn PushTransport>> = match LongPollTransport::new(&config) {
                Ok(transport) => Some(Arc::new(transport)),
                Err(e) => {
                    warn!(error = %e, "push transport unavailable, TUI runs without push");
                    None
                }
            };
            notify_center::tui::run(store, transport).await?;
        }
        Commands::List { page, limit, unread_only, json } => {
            let api = ApiClient::new(&config)?;
            let result = api.list(page, limit, unread_only).await?;
            output::print_page(&result, json)?;
        }
        Commands::Unread { json } => {
            let api = ApiClient::new(&config)?;
            let count = api.unread_count().await?;
            output::print_unread_count(count, json)?;
        }
        Commands::Read { id } => {
            let api = Arc::new(ApiClient::new(&config)?);
            let store = NotificationStore::new(api, config.page_size);
            store.mark_as_read(&id).await?;
            println!("✅ 已标记已读: {}", id);
        }
        Commands::ReadAll => {
            let api = Arc::new(ApiClient::new(&config)?);
            let store = NotificationStore::new(api, config.page_size);
            store.mark_all_as_read().await?;
            println!("✅ 已全部标记已读");
        }
        Commands::Delete { id } => {
            let api = Arc::new(ApiClient::new(&config)?);
            let store = NotificationStore::new(api, config.page_size);
            store.delete_notification(&id).await?;
            println!("✅ 已删除: {}", id);
        }
        Commands::Send(args) => {
            let api = ApiClient::new(&config)?;
            let request = args.into_request()?;
            api.send(&request).await?;
            println!("✅ 通知已发送");
        }
        Commands::Watch { timeout } => {
            watch(&config, timeout).await?;
        }
        Commands::RegisterToken => {
            let api = Arc::new(ApiClient::new(&config)?);
            let store = NotificationStore::new(api, config.page_size);
            let transport = LongPollTransport::new(&config)?;
            match store.register_push_token(&transport).await? {
                Some(token) => println!("✅ 推送 token 已注册: {}", token),
                None => println!("⚠ 推送不可用，跳过注册"),
            }
        }
        Commands::Subscribe { topic } => {
            let api = ApiClient::new(&config)?;
            api.subscribe_topic(&topic).await?;
            println!("✅ 已订阅主题: {}", topic);
        }
        Commands::Unsubscribe { topic } => {
            let api = ApiClient::new(&config)?;
            api.unsubscribe_topic(&topic).await?;
            println!("✅ 已退订主题: {}", topic);
        }
    }

    Ok(())
}

/// headless 监听：store + 推送循环，新通知打印到终端
async fn watch(config: &ClientConfig, timeout: u64) -> Result<()> {
    let api = Arc::new(ApiClient::new(config)?);
    let store = NotificationStore::new(api, config.page_size);
    let transport: Arc<dyn PushTransport> = Arc::new(LongPollTransport::new(config)?);

    match store.register_push_token(transport.as_ref()).await {
        Ok(Some(token)) => info!(token = %token, "push token registered"),
        Ok(None) => warn!("push permission unavailable, watching poll only"),
        Err(e) => warn!(error = %e, "push token registration failed"),
    }

    if let Err(e) = store.refresh().await {
        warn!(error = %e, "initial refresh failed");
    }

    // 最新一条变化时打印（推送前插或刷新换页都会触发）
    let last_seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(
        store.snapshot().notifications.first().map(|n| n.id.clone()),
    ));
    let printer_last = last_seen.clone();
    let _subscription = store.subscribe(move |snapshot| {
        let mut last = printer_last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = snapshot.notifications.first().map(|n| n.id.clone());
        if current != *last {
            if let Some(n) = snapshot.notifications.first() {
                println!("{}", output::format_notification_row(n));
            }
            *last = current;
        }
    });

    println!("🔔 正在监听推送 (Ctrl+C 退出)，当前未读 {}", store.snapshot().unread_count);

    let cancel = CancellationToken::new();
    let handle = spawn_push_loop(
        store.clone(),
        transport,
        PushLoopConfig::default().with_await_timeout(Duration::from_secs(timeout + 20)),
        cancel.clone(),
    );

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    let _ = handle.await;
    println!("已停止监听");
    Ok(())
}
