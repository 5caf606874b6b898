//! DuplicateEventGuard - 受信イベントの重複処理を防ぐ
//!
//! chat プラットフォームは応答が遅いと同じイベントを再送してきます。
//! イベント ID ごとのマーカーを property store に置き、
//! 二度目以降の受信では副作用を実行せずに「重複」を呼び出し元へ返します。
//!
//! # 呼び出し側の契約
//! 1. 副作用の前に `check`。true なら重複として扱う（黙って無視しない）
//! 2. 副作用を開始した後で `mark_processed`
//!
//! 開始した書き込み自体が失敗した場合でもマーカーが残ると、
//! 正当な再送まで抑止されることがあります（既知の制約）。

use std::sync::Arc;

use tracing::debug;

use crate::domain::EventId;
use crate::ports::{Clock, PropertyStore, StoreError};

pub const EVENT_PREFIX: &str = "event#";

/// マーカーは明示的には失効させません（保持期間はストア側に任せる）
#[derive(Clone)]
pub struct DuplicateEventGuard {
    store: Arc<dyn PropertyStore>,
    clock: Arc<dyn Clock>,
}

impl DuplicateEventGuard {
    pub fn new(store: Arc<dyn PropertyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn marker_key(event_id: &EventId) -> String {
        format!("{EVENT_PREFIX}{event_id}")
    }

    /// 既に処理済みなら true
    pub async fn check(&self, event_id: &EventId) -> Result<bool, StoreError> {
        let marker = self.store.get(&Self::marker_key(event_id)).await?;
        Ok(marker.is_some())
    }

    /// 処理済みマーカーを書く。値は処理時刻（RFC 3339）
    pub async fn mark_processed(&self, event_id: &EventId) -> Result<(), StoreError> {
        let at = self.clock.now().to_rfc3339();
        self.store.set(&Self::marker_key(event_id), &at).await?;
        debug!(event_id = %event_id, processed_at = %at, "event marked as processed");
        Ok(())
    }
}
