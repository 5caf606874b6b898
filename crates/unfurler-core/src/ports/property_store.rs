//! PropertyStore port - 文字列 key/value の永続化
//!
//! job レコードと重複イベントのマーカーを保存します。
//! プラットフォームにはスクリプト全体のスコープと利用者ごとのスコープがあり、
//! どちらも同じ操作セットで扱います。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("property store unavailable: {0}")]
    Unavailable(String),
}

/// PropertyStore は key → value の永続化
///
/// # 設計原則
/// - 長時間のロックは持たない。排他は `compare_and_swap` だけで行う
/// - 1 操作 = 1 往復（無期限にブロックしない）
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// 存在しない key の削除はエラーにしない
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// 現在値が `expected` と一致するときだけ `value` を書き込む
    ///
    /// デフォルト実装は read → compare → write の非アトミックな近似です。
    /// アトミックな check-and-set を持つストアは override してください。
    /// 近似の場合に残る競合は、呼び出し側の read-back 検証で狭めます。
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError> {
        let current = self.get(key).await?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }

    /// `prefix` で始まる key だけを返す
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let keys = self.keys().await?;
        Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }
}
