use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use unfurler_core::app::{
    AppError, Dispatch, RequestContext, build_registry, do_post, handle_oauth_callback, run_job,
};
use unfurler_core::config::Config;
use unfurler_core::impls::{
    InMemoryKnowledgeBase, InMemoryOAuth2Provider, InMemoryPropertyStore, InMemoryScheduler,
    RecordingChatClient,
};
use unfurler_core::ports::{FixedClock, Member, Post, UlidGenerator};

const TEAM: &str = "docs";
const USER: &str = "U024BE7LH";
const CHANNEL: &str = "C123ABC456";

/// JSON ログ。RUST_LOG で絞り込み（既定 info）
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .try_init();
}

/// 環境変数が無ければデモ用の値を使う
fn demo_config() -> Result<Config, AppError> {
    let config = Config::from_lookup(|name| {
        env::var(name).ok().or_else(|| match name {
            "VERIFICATION_TOKEN" => Some("demo-token".to_string()),
            "SLACK_CLIENT_ID" | "SLACK_CLIENT_SECRET" | "ESA_CLIENT_ID" | "ESA_CLIENT_SECRET" => {
                Some(format!("demo-{}", name.to_lowercase()))
            }
            _ => None,
        })
    })?;
    Ok(config)
}

fn demo_post(number: u64, title: &str) -> Post {
    let author = Member {
        name: "Demo Author".to_string(),
        screen_name: "author".to_string(),
        icon: "https://img.esa.io/uploads/production/users/1/icon/thumb_m.png".to_string(),
    };
    Post {
        number,
        name: title.to_string(),
        full_name: format!("notes/{title}"),
        wip: false,
        body_md: "# Overview\n* one\n* two".to_string(),
        body_html: "<h1>Overview</h1>".to_string(),
        created_at: "2024-01-01T12:00:00+09:00".to_string(),
        message: "Create post.".to_string(),
        url: format!("https://{TEAM}.esa.io/posts/{number}"),
        updated_at: None,
        revision_number: 1,
        created_by: author.clone(),
        updated_by: Some(author),
    }
}

fn link_shared(event_id: &str, token: &str, urls: &[String]) -> String {
    let links: Vec<_> = urls.iter().map(|url| json!({ "url": url })).collect();
    json!({
        "type": "event_callback",
        "token": token,
        "event_id": event_id,
        "event": {
            "type": "link_shared",
            "channel": CHANNEL,
            "user": USER,
            "message_ts": "1700000000.000100",
            "links": links,
        },
    })
    .to_string()
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();

    // (A) ports を組み立てる
    let config = demo_config()?;
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let ids = Arc::new(UlidGenerator::new(clock.clone()));
    let scheduler = Arc::new(
        InMemoryScheduler::new(ids.clone(), clock.clone()).with_max_triggers(config.max_triggers),
    );
    let script_properties = Arc::new(InMemoryPropertyStore::new());
    let oauth = Arc::new(InMemoryOAuth2Provider::new(Arc::new(
        InMemoryPropertyStore::new(),
    )));
    let chat = Arc::new(RecordingChatClient::new());
    let knowledge_base = Arc::new(InMemoryKnowledgeBase::new());
    knowledge_base.insert_post(TEAM, demo_post(1, "design")).await;
    knowledge_base.insert_post(TEAM, demo_post(2, "runbook")).await;

    let ctx = RequestContext {
        config: config.clone(),
        script_properties,
        scheduler: scheduler.clone(),
        clock: clock.clone(),
        ids,
        chat: chat.clone(),
        knowledge_base,
        oauth: oauth.clone(),
    };
    let registry = build_registry(&ctx)?;

    // (B) 未認可の利用者がリンクを共有 → 認可プロンプト
    let first = format!("https://{TEAM}.esa.io/posts/1");
    do_post(&ctx, &link_shared("Ev01", &config.verification_token, &[first.clone()])).await?;

    // (C) 「Yes」ボタン → 認可コールバック → 保留していた URL を展開
    let form = json!({ "message_ts": "1700000000.000100", "url": first }).to_string();
    let button = json!({
        "type": "block_actions",
        "token": config.verification_token,
        "user": { "id": USER },
        "channel": { "id": CHANNEL },
        "response_url": "https://hooks.slack.test/actions/1",
        "actions": [{ "action_id": "auth", "value": form }],
    });
    do_post(&ctx, &button.to_string()).await?;
    oauth
        .authorize(TEAM, USER, "demo-access-token")
        .await
        .map_err(AppError::from)?;
    handle_oauth_callback(&ctx, TEAM, USER).await?;

    // (D) 複数リンク → 1 件ずつ job にする。再送は Duplicate
    let urls = [first, format!("https://{TEAM}.esa.io/posts/2")];
    let event = link_shared("Ev02", &config.verification_token, &urls);
    do_post(&ctx, &event).await?;
    let resent = do_post(&ctx, &event).await?;
    info!(duplicate = resent == Dispatch::Duplicate, "event re-delivered");

    // (E) 発火をシミュレート（期限切れの trigger も含めるため時計を進める）
    clock.advance(Duration::hours(1));
    for trigger in scheduler.fire_due().await {
        run_job(&ctx, &registry, &trigger.handler).await?;
    }

    let counts = ctx.broker().counts().await?;
    println!("counts: {}", serde_json::to_string(&counts).unwrap_or_default());
    for call in chat.calls().await {
        println!("{call:?}");
    }
    Ok(())
}
