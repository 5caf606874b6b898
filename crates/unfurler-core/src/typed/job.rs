//! Job trait - 型付き job パラメータの定義
//!
//! # 学習ポイント
//! - Associated Constants (`const HANDLER`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::HandlerName;

/// Job は handler 名とパラメータ型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct NotifyJob {
///     message: String,
/// }
///
/// impl Job for NotifyJob {
///     const HANDLER: &'static str = "notify";
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize`: property store への保存のため
/// - `DeserializeOwned`: 発火後の再入時に復元するため
/// - `Send + Sync + 'static`: Arc に格納して tokio タスク間で共有するため
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 発火時のエントリポイント名。保存済みレコードから参照されるので変更しないこと
    const HANDLER: &'static str;

    fn handler_name() -> HandlerName {
        HandlerName::new(Self::HANDLER)
    }
}
