//! unfurler-core
//!
//! Core building blocks for the link-unfurling service.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, handler_name, fire_at, job, errors）
//! - **ports**: 抽象化レイヤー（PropertyStore, Scheduler, Clock, ChatClient, KnowledgeBaseClient, OAuth2）
//! - **typed**: 型付き Job API（Job trait, JobHandler trait, JobRegistry, JobCodec）
//! - **broker**: JobBroker（enqueue / consume_job / cancel）と DuplicateEventGuard
//! - **unfurl**: URL 解析とプレビュー（Block Kit）の生成
//! - **app**: アプリケーションロジック（RequestContext, events, jobs, RegistryBuilder）
//! - **impls**: 実装（InMemoryPropertyStore など開発用）
//! - **config / observability**: 設定と状態集計

pub mod app;
pub mod broker;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;
pub mod unfurl;
