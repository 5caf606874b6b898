//! App - アプリケーション層
//!
//! ports と broker を組み合わせて、chat プラットフォームからのリクエストと
//! scheduler の発火を処理します。
//!
//! # 主要コンポーネント
//! - **RequestContext**: 1 invocation 分の依存関係
//! - **events**: 受信リクエスト（URL 検証、link_shared、ボタン、認可コールバック）
//! - **jobs**: 発火時の job handler と dispatch table
//! - **RegistryBuilder**: dispatch table の構築と起動時検証

pub mod builder;
pub mod context;
pub mod error;
pub mod events;
pub mod jobs;
pub mod payload;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, RegistryBuilder};
pub use self::context::RequestContext;
pub use self::error::AppError;
pub use self::events::{
    Dispatch, PendingAuth, UNSUPPORTED_URL_MESSAGE, do_post, do_unfurls, handle,
    handle_button, handle_oauth_callback, link_shared, pending_auth_key,
};
pub use self::jobs::{
    AsyncLogJob, ChatUnfurlJob, ExpireAuthPromptJob, build_registry, run_job,
};
pub use self::payload::{
    AuthForm, BlockActions, ButtonAction, CallbackEvent, IdRef, Inbound, LinkSharedEvent,
    SharedLink,
};
