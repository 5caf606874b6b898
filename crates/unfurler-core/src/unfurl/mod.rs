//! Unfurl - ナレッジベース URL のプレビュー生成
//!
//! URL を解析し、記事またはコメントを取得して chat.unfurl 用の payload を作ります。
//! 対応しない URL や存在しないリソースは空の `Unfurls` になり、
//! 呼び出し側が「This URL is not supported」を表示します。

pub mod blocks;
pub mod url;

pub use self::blocks::{comment_blocks, extract_image, head, post_blocks};
pub use self::url::{UnfurlTarget, classify, get_team};

use tracing::debug;

use crate::domain::ClientError;
use crate::ports::{KnowledgeBaseClient, Unfurls};

pub async fn create_unfurls(
    client: &dyn KnowledgeBaseClient,
    url: &str,
) -> Result<Unfurls, ClientError> {
    let mut unfurls = Unfurls::new();

    match classify(client.team(), url) {
        Some(UnfurlTarget::Comment { post, comment }) => {
            // タイトルに記事名を使うので、記事も取れたときだけ展開する
            if let Some(comment) = client.get_comment(comment).await? {
                if let Some(post) = client.get_post(post).await? {
                    unfurls.insert(url.to_string(), comment_blocks(&comment, &post));
                }
            }
        }
        Some(UnfurlTarget::Post { number }) => {
            if let Some(post) = client.get_post(number).await? {
                unfurls.insert(url.to_string(), post_blocks(&post));
            }
        }
        None => {}
    }

    if unfurls.is_empty() {
        debug!(url = %url, team = client.team(), "nothing to unfurl");
    }
    Ok(unfurls)
}

#[cfg(test)]
mod tests {
    use super::blocks::fixtures::{comment, post};
    use super::*;
    use crate::impls::InMemoryKnowledgeBase;
    use crate::ports::KnowledgeBaseConnector;

    async fn knowledge_base() -> InMemoryKnowledgeBase {
        let kb = InMemoryKnowledgeBase::new();
        kb.insert_post("team", post("https://team.esa.io/posts/4")).await;
        kb.insert_comment("team", comment("https://team.esa.io/posts/4#comment-123"))
            .await;
        kb
    }

    #[tokio::test]
    async fn test_post_url_is_unfurled() {
        let kb = knowledge_base().await;
        let client = kb.connect("team", "token");
        let url = "https://team.esa.io/posts/4";

        let unfurls = create_unfurls(client.as_ref(), url).await.unwrap();

        assert_eq!(unfurls.len(), 1);
        assert_eq!(unfurls[url], post_blocks(&post(url)));
    }

    #[tokio::test]
    async fn test_comment_url_is_unfurled_with_post_title() {
        let kb = knowledge_base().await;
        let client = kb.connect("team", "token");
        let url = "https://team.esa.io/posts/4#comment-123";

        let unfurls = create_unfurls(client.as_ref(), url).await.unwrap();

        let text = unfurls[url]["blocks"][1]["text"]["text"].as_str().unwrap();
        assert!(text.ends_with("|[WIP] 日報/2015/05/09/hi! #api #dev>"));
    }

    #[tokio::test]
    async fn test_missing_or_foreign_resources_yield_nothing() {
        let kb = knowledge_base().await;
        let client = kb.connect("team", "token");

        for url in [
            "https://team.esa.io/posts/999",
            "https://team.esa.io/posts/4#comment-999",
            "https://team.esa.io/posts/5#comment-123",
            "https://other.esa.io/posts/4",
            "https://team.esa.io/members/taea",
        ] {
            let unfurls = create_unfurls(client.as_ref(), url).await.unwrap();
            assert!(unfurls.is_empty(), "{url}");
        }
    }
}
