//! 記事・コメントの Block Kit 表現
//!
//! # 構成
//! 1. context: 作成者アイコン + メンバーリンク（記事はコミットメッセージも）
//! 2. section: タイトルリンク + 本文の先頭 `BODY_PREVIEW_LINES` 行
//! 3. context: フッター + 更新者アイコン + 更新日時
//! 4. image: 本文中の最初の画像（絵文字と data URI は除く）

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};

use super::url::get_team;
use crate::ports::{Comment, Post};

/// 本文プレビューの最大行数
pub const BODY_PREVIEW_LINES: usize = 10;

struct ImagePatterns {
    tag: Regex,
    src: Regex,
    alt: Regex,
    emoji: Regex,
}

fn image_patterns() -> &'static ImagePatterns {
    static PATTERNS: OnceLock<ImagePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ImagePatterns {
        tag: Regex::new(r"(?is)<img.*?>").expect("static pattern"),
        src: Regex::new(r#"src=["'](.*?)["']"#).expect("static pattern"),
        alt: Regex::new(r#"alt=["'](.*?)["']"#).expect("static pattern"),
        emoji: Regex::new(r#"class="emoji""#).expect("static pattern"),
    })
}

pub fn post_blocks(post: &Post) -> Value {
    let updater_icon = post
        .updated_by
        .as_ref()
        .map_or(&post.created_by.icon, |member| &member.icon);

    let mut blocks = vec![
        json!({
            "type": "context",
            "elements": [
                { "type": "image", "image_url": post.created_by.icon, "alt_text": "created_by" },
                { "type": "mrkdwn", "text": format!("*{}*", member_link(&post.url, &post.created_by.screen_name)) },
                { "type": "mrkdwn", "text": post.message },
            ],
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("<{}|{}>", post.url, post_title(post)) },
            "fields": [
                { "type": "mrkdwn", "text": head(&post.body_md, BODY_PREVIEW_LINES) },
            ],
        }),
        json!({
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": post_footer(post) },
                { "type": "image", "image_url": updater_icon, "alt_text": "updated_by" },
                { "type": "mrkdwn", "text": post.updated_at.as_deref().unwrap_or(&post.created_at) },
            ],
        }),
    ];
    blocks.extend(extract_image(&post.body_html));

    json!({ "blocks": blocks })
}

pub fn comment_blocks(comment: &Comment, post: &Post) -> Value {
    let author = &comment.created_by;

    let mut blocks = vec![
        json!({
            "type": "context",
            "elements": [
                { "type": "image", "image_url": author.icon, "alt_text": "commented on" },
                { "type": "mrkdwn", "text": format!("*{}*", member_link(&comment.url, &author.screen_name)) },
            ],
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("{} commented on <{}|{}>", author.screen_name, comment.url, post_title(post)),
            },
            "fields": [
                { "type": "mrkdwn", "text": head(&comment.body_md, BODY_PREVIEW_LINES) },
            ],
        }),
        json!({
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!("Created by {}", member_link(&comment.url, &author.screen_name)) },
                { "type": "image", "image_url": author.icon, "alt_text": "created_by" },
                { "type": "mrkdwn", "text": comment.updated_at.as_deref().unwrap_or(&comment.created_at) },
            ],
        }),
    ];
    blocks.extend(extract_image(&comment.body_html));

    json!({ "blocks": blocks })
}

/// 先頭 `lines` 行
pub fn head(text: &str, lines: usize) -> String {
    text.split('\n').take(lines).collect::<Vec<_>>().join("\n")
}

/// 本文 HTML から最初の表示可能な画像を image block として取り出す
///
/// src が http(s) でないもの（data URI など）と絵文字は飛ばします。
/// alt が無ければ `alt_text` は付けません。
pub fn extract_image(html: &str) -> Option<Value> {
    let patterns = image_patterns();

    patterns.tag.find_iter(html).find_map(|tag| {
        let tag = tag.as_str();
        let src = patterns.src.captures(tag)?.get(1)?.as_str();
        if !(src.starts_with("http://") || src.starts_with("https://"))
            || patterns.emoji.is_match(tag)
        {
            return None;
        }

        let mut image = json!({ "type": "image", "image_url": src });
        if let Some(alt) = patterns.alt.captures(tag).and_then(|c| c.get(1)) {
            image["alt_text"] = Value::from(alt.as_str());
        }
        Some(image)
    })
}

fn post_title(post: &Post) -> String {
    if post.wip {
        format!("[WIP] {}", post.full_name)
    } else {
        post.full_name.clone()
    }
}

fn member_link(url: &str, screen_name: &str) -> String {
    let team = get_team(url).unwrap_or_default();
    format!("<https://{team}.esa.io/members/{screen_name}|{screen_name}>")
}

fn post_footer(post: &Post) -> String {
    match &post.updated_by {
        Some(updater) if post.revision_number > 1 => format!(
            "Updated by {} (<{}/revisions/{}|diff>)",
            member_link(&post.url, &updater.screen_name),
            post.url,
            post.revision_number
        ),
        _ => format!(
            "Created by {}",
            member_link(&post.url, &post.created_by.screen_name)
        ),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::ports::{Comment, Member, Post};

    pub const FUKAYATSU_ICON: &str =
        "http://img.esa.io/uploads/production/users/1/icon/thumb_m_402685a258cf2a33c1d6c13a89adec92.png";
    pub const TAEA_ICON: &str =
        "https://img.esa.io/uploads/production/users/2/icon/thumb_m_2690997f07b7de3014a36d90827603d6.jpg";

    pub fn fukayatsu() -> Member {
        Member {
            name: "Atsuo Fukaya".to_string(),
            screen_name: "fukayatsu".to_string(),
            icon: FUKAYATSU_ICON.to_string(),
        }
    }

    pub fn taea() -> Member {
        Member {
            name: "TAEKO AKATSUKA".to_string(),
            screen_name: "taea".to_string(),
            icon: TAEA_ICON.to_string(),
        }
    }

    pub fn post(url: &str) -> Post {
        Post {
            number: 4,
            name: "hi!".to_string(),
            full_name: "日報/2015/05/09/hi! #api #dev".to_string(),
            wip: true,
            body_md: "# Getting Started".to_string(),
            body_html: "<h1 id=\"1-0-0\" name=\"1-0-0\">\n<a class=\"anchor\" href=\"#1-0-0\"><i class=\"fa fa-link\"></i></a>Getting Started</h1>\n".to_string(),
            created_at: "2015-05-09T11:54:50+09:00".to_string(),
            message: "Add Getting Started section".to_string(),
            url: url.to_string(),
            updated_at: Some("2015-05-09T11:54:51+09:00".to_string()),
            revision_number: 1,
            created_by: fukayatsu(),
            updated_by: Some(fukayatsu()),
        }
    }

    pub fn comment(url: &str) -> Comment {
        Comment {
            id: 123,
            body_md: "読みたい".to_string(),
            body_html: "<p>読みたい</p>".to_string(),
            created_at: "2014-05-13T16:17:42+09:00".to_string(),
            updated_at: Some("2014-05-18T23:02:29+09:00".to_string()),
            url: url.to_string(),
            created_by: taea(),
        }
    }
}
