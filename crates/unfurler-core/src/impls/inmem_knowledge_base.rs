//! InMemoryKnowledgeBase - 開発用のナレッジベース

use crate::domain::ClientError;
use crate::ports::{Comment, KnowledgeBaseClient, KnowledgeBaseConnector, Post};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct TeamContents {
    posts: HashMap<u64, Post>,
    comments: HashMap<u64, Comment>,
}

/// チームごとの記事・コメントを保持
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    teams: Arc<Mutex<HashMap<String, TeamContents>>>,
    /// 設定されている間、すべての取得がこのエラーで失敗する
    failure: Arc<Mutex<Option<ClientError>>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_post(&self, team: &str, post: Post) {
        let mut teams = self.teams.lock().await;
        teams
            .entry(team.to_string())
            .or_default()
            .posts
            .insert(post.number, post);
    }

    pub async fn insert_comment(&self, team: &str, comment: Comment) {
        let mut teams = self.teams.lock().await;
        teams
            .entry(team.to_string())
            .or_default()
            .comments
            .insert(comment.id, comment);
    }

    /// API 障害をシミュレート（`None` で復旧）
    pub async fn fail_with(&self, failure: Option<ClientError>) {
        *self.failure.lock().await = failure;
    }
}

impl KnowledgeBaseConnector for InMemoryKnowledgeBase {
    fn connect(&self, team: &str, _access_token: &str) -> Arc<dyn KnowledgeBaseClient> {
        Arc::new(InMemoryKnowledgeBaseClient {
            team: team.to_string(),
            teams: self.teams.clone(),
            failure: self.failure.clone(),
        })
    }
}

struct InMemoryKnowledgeBaseClient {
    team: String,
    teams: Arc<Mutex<HashMap<String, TeamContents>>>,
    failure: Arc<Mutex<Option<ClientError>>>,
}

impl InMemoryKnowledgeBaseClient {
    async fn check_available(&self) -> Result<(), ClientError> {
        match self.failure.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KnowledgeBaseClient for InMemoryKnowledgeBaseClient {
    fn team(&self) -> &str {
        &self.team
    }

    async fn get_post(&self, number: u64) -> Result<Option<Post>, ClientError> {
        self.check_available().await?;
        let teams = self.teams.lock().await;
        Ok(teams
            .get(&self.team)
            .and_then(|t| t.posts.get(&number))
            .cloned())
    }

    async fn get_comment(&self, id: u64) -> Result<Option<Comment>, ClientError> {
        self.check_available().await?;
        let teams = self.teams.lock().await;
        Ok(teams
            .get(&self.team)
            .and_then(|t| t.comments.get(&id))
            .cloned())
    }
}
