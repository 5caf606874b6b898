//! Events - 受信リクエストの処理
//!
//! # フロー
//! ```text
//! do_post ─▶ handle ─┬─ url_verification ─▶ Challenge
//!                    ├─ event_callback ──▶ 重複チェック ─▶ link_shared ─▶ マーカー
//!                    └─ block_actions ───▶ handle_button
//! ```
//!
//! 失敗時は AsyncLogJob を enqueue してからエラーを返します。

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::context::RequestContext;
use super::error::AppError;
use super::jobs::{AsyncLogJob, ChatUnfurlJob, ExpireAuthPromptJob};
use super::payload::{AuthForm, BlockActions, CallbackEvent, Inbound, LinkSharedEvent};
use crate::domain::{EventId, TriggerId};
use crate::ports::{ChatClient, KnowledgeBaseConnector, OAuth2Service, PropertyStore};
use crate::unfurl::{create_unfurls, get_team};

pub const UNSUPPORTED_URL_MESSAGE: &str = "This URL is not supported";
pub const AUTH_PROMPT_MESSAGE: &str =
    "That looks like a esa link. Would you like to unfurling esa's URL";
pub const PENDING_AUTH_PREFIX: &str = "pending#";

/// 受信リクエストの処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// URL 検証への応答
    Challenge(String),
    Processed,
    /// 処理済みイベントの再送。副作用は実行していない
    Duplicate,
}

/// 「Yes」ボタン押下から認可コールバックまで保持するフォーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuth {
    pub channel: String,
    pub message_ts: String,
    pub url: String,
    pub response_url: String,
    /// プロンプトを自動で消す遅延 job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<TriggerId>,
}

pub fn pending_auth_key(team: &str, user: &str) -> String {
    format!("{PENDING_AUTH_PREFIX}{team}_{user}")
}

/// エントリポイント
///
/// エラーは AsyncLogJob で非同期に記録してから呼び出し元へ返します。
pub async fn do_post(ctx: &RequestContext, body: &str) -> Result<Dispatch, AppError> {
    let result = match serde_json::from_str::<Inbound>(body) {
        Ok(inbound) => handle(ctx, inbound).await,
        Err(err) => Err(AppError::from(err)),
    };

    if let Err(err) = &result {
        let job = AsyncLogJob {
            message: err.to_string(),
            stack: err.chain(),
        };
        if let Err(log_err) = ctx.broker().enqueue(&job).await {
            warn!(error = %log_err, "failed to enqueue async log");
        }
    }
    result
}

pub async fn handle(ctx: &RequestContext, inbound: Inbound) -> Result<Dispatch, AppError> {
    if inbound.token() != ctx.config.verification_token {
        return Err(AppError::Unauthorized);
    }

    match inbound {
        Inbound::UrlVerification { challenge, .. } => Ok(Dispatch::Challenge(challenge)),
        Inbound::EventCallback {
            event_id, event, ..
        } => {
            let event_id = EventId::new(event_id);
            let guard = ctx.guard();
            if guard.check(&event_id).await? {
                info!(event_id = %event_id, "duplicate event");
                return Ok(Dispatch::Duplicate);
            }

            match event {
                CallbackEvent::LinkShared(event) => link_shared(ctx, &event).await?,
                CallbackEvent::Unsupported => {
                    return Err(AppError::InvalidPayload(format!(
                        "no handler for event {event_id}"
                    )));
                }
            }

            guard.mark_processed(&event_id).await?;
            Ok(Dispatch::Processed)
        }
        Inbound::BlockActions(actions) => {
            handle_button(ctx, &actions).await?;
            Ok(Dispatch::Processed)
        }
    }
}

/// 未認可なら認可プロンプト、リンク 1 件ならその場で展開、複数なら 1 件ずつ job にする
pub async fn link_shared(ctx: &RequestContext, event: &LinkSharedEvent) -> Result<(), AppError> {
    let Some(first) = event.links.first() else {
        return Err(AppError::InvalidPayload("link_shared without links".to_string()));
    };
    let Some(team) = get_team(&first.url) else {
        return post_unsupported(ctx, &event.channel, &event.user).await;
    };

    if !ctx.esa_oauth(team, &event.user).has_access().await? {
        return post_auth_prompt(ctx, &event.channel, &event.user, &event.message_ts, &first.url)
            .await;
    }

    if let [link] = event.links.as_slice() {
        return do_unfurls(ctx, &event.channel, &event.user, &event.message_ts, &link.url).await;
    }

    let broker = ctx.broker();
    for link in &event.links {
        broker
            .enqueue(&ChatUnfurlJob {
                channel: event.channel.clone(),
                user: event.user.clone(),
                message_ts: event.message_ts.clone(),
                url: link.url.clone(),
            })
            .await?;
    }
    Ok(())
}

/// URL を展開して投稿する。展開できなければ「対応していない URL」を本人にだけ返す
pub async fn do_unfurls(
    ctx: &RequestContext,
    channel: &str,
    user: &str,
    message_ts: &str,
    url: &str,
) -> Result<(), AppError> {
    let Some(team) = get_team(url) else {
        return post_unsupported(ctx, channel, user).await;
    };
    let Some(token) = ctx.esa_oauth(team, user).access_token().await? else {
        // job の発火までに認可が外れた
        return post_auth_prompt(ctx, channel, user, message_ts, url).await;
    };

    let client = ctx.knowledge_base.connect(team, &token);
    let unfurls = create_unfurls(client.as_ref(), url).await?;
    if unfurls.is_empty() {
        return post_unsupported(ctx, channel, user).await;
    }

    ctx.chat.chat_unfurl(channel, message_ts, &unfurls).await?;
    debug!(channel = %channel, message_ts = %message_ts, url = %url, "unfurled");
    Ok(())
}

/// `auth`: 古い認可を消し、コールバック後に使うフォームを保存する
/// それ以外: プロンプト（ephemeral message）を消す
pub async fn handle_button(ctx: &RequestContext, actions: &BlockActions) -> Result<(), AppError> {
    let Some(action) = actions.actions.first() else {
        return Err(AppError::InvalidPayload("block_actions without actions".to_string()));
    };

    if action.action_id != "auth" {
        ctx.chat
            .respond(&actions.response_url, &json!({ "delete_original": true }))
            .await?;
        return Ok(());
    }

    let form: AuthForm = serde_json::from_str(action.value.as_deref().unwrap_or_default())?;
    let user = actions.user.id.as_str();
    let Some(team) = get_team(&form.url).map(str::to_string) else {
        return Err(AppError::InvalidPayload(format!("not a team url: {}", form.url)));
    };
    let Some(channel) = &actions.channel else {
        return Err(AppError::InvalidPayload("auth action without channel".to_string()));
    };

    ctx.esa_oauth(&team, user).reset().await?;

    let key = pending_auth_key(&team, user);
    let broker = ctx.broker();
    // 押し直された場合は前回の自動削除を取り消す
    if let Some(expiry) = load_pending(ctx, &key).await?.and_then(|p| p.expiry) {
        broker.cancel(expiry).await?;
    }

    let expire_at = ctx.clock.now() + ctx.config.auth_prompt_ttl;
    let expiry = broker
        .perform_later(
            &ExpireAuthPromptJob {
                team: team.clone(),
                user: user.to_string(),
                response_url: actions.response_url.clone(),
            },
            expire_at,
        )
        .await?;

    let pending = PendingAuth {
        channel: channel.id.clone(),
        message_ts: form.message_ts,
        url: form.url,
        response_url: actions.response_url.clone(),
        expiry: Some(expiry),
    };
    ctx.script_properties
        .set(&key, &serde_json::to_string(&pending)?)
        .await?;
    info!(team = %team, user = %user, "waiting for authorization callback");
    Ok(())
}

/// 認可コールバック成功後: 保留していた URL を展開し、プロンプトを消す
///
/// 保留中のフォームが無ければ false。
pub async fn handle_oauth_callback(
    ctx: &RequestContext,
    team: &str,
    user: &str,
) -> Result<bool, AppError> {
    let key = pending_auth_key(team, user);
    let Some(pending) = load_pending(ctx, &key).await? else {
        return Ok(false);
    };

    do_unfurls(ctx, &pending.channel, user, &pending.message_ts, &pending.url).await?;
    ctx.chat
        .respond(&pending.response_url, &json!({ "delete_original": true }))
        .await?;

    if let Some(expiry) = pending.expiry {
        ctx.broker().cancel(expiry).await?;
    }
    ctx.script_properties.delete(&key).await?;
    Ok(true)
}

pub(crate) async fn load_pending(
    ctx: &RequestContext,
    key: &str,
) -> Result<Option<PendingAuth>, AppError> {
    match ctx.script_properties.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

async fn post_unsupported(ctx: &RequestContext, channel: &str, user: &str) -> Result<(), AppError> {
    ctx.chat
        .post_ephemeral(channel, user, UNSUPPORTED_URL_MESSAGE, None)
        .await?;
    Ok(())
}

async fn post_auth_prompt(
    ctx: &RequestContext,
    channel: &str,
    user: &str,
    message_ts: &str,
    url: &str,
) -> Result<(), AppError> {
    let team = get_team(url).unwrap_or_default();
    let authorization_url = ctx.esa_oauth(team, user).authorization_url();
    let form = AuthForm {
        message_ts: message_ts.to_string(),
        url: url.to_string(),
    };
    let blocks = auth_blocks(&authorization_url, &serde_json::to_string(&form)?);

    ctx.chat.post_ephemeral(channel, user, "", Some(blocks)).await?;
    info!(team = %team, user = %user, "authorization prompt posted");
    Ok(())
}

fn auth_blocks(authorization_url: &str, form: &str) -> Value {
    json!([
        {
            "type": "context",
            "elements": [{ "type": "mrkdwn", "text": AUTH_PROMPT_MESSAGE }],
        },
        {
            "type": "actions",
            "elements": [
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Yes, please" },
                    "value": form,
                    "url": authorization_url,
                    "style": "primary",
                    "action_id": "auth",
                },
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "No, thanks" },
                    "value": "{ \"no\": true }",
                    "action_id": "no",
                },
            ],
        },
    ])
}
