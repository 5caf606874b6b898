//! ナレッジベース URL の解析
//!
//! - 記事: `https://<team>.esa.io/posts/<number>`
//! - コメント: `https://<team>.esa.io/posts/<number>#comment-<id>`

use std::sync::OnceLock;

use regex::Regex;

/// 展開対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfurlTarget {
    Post { number: u64 },
    Comment { post: u64, comment: u64 },
}

struct UrlPatterns {
    team: Regex,
    target: Regex,
}

fn url_patterns() -> &'static UrlPatterns {
    static PATTERNS: OnceLock<UrlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| UrlPatterns {
        team: Regex::new(r"^https://([^/]+)\.esa\.io/").expect("static pattern"),
        target: Regex::new(r"^https://([^/]+)\.esa\.io/posts/(\d+)(?:#comment-(\d+))?")
            .expect("static pattern"),
    })
}

/// URL のサブドメインからチーム名を取り出す
pub fn get_team(url: &str) -> Option<&str> {
    let captures = url_patterns().team.captures(url)?;
    captures.get(1).map(|team| team.as_str())
}

/// `team` の記事・コメント URL なら展開対象を返す
pub fn classify(team: &str, url: &str) -> Option<UnfurlTarget> {
    let captures = url_patterns().target.captures(url)?;
    if &captures[1] != team {
        return None;
    }

    let number = captures[2].parse().ok()?;
    match captures.get(3) {
        Some(comment) => Some(UnfurlTarget::Comment {
            post: number,
            comment: comment.as_str().parse().ok()?,
        }),
        None => Some(UnfurlTarget::Post { number }),
    }
}
