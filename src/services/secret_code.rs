//! secret code 提取
//!
//! 纯函数，不访问网络。抓取哪个页面由 [`scrape_target_url`] 决定，
//! 抓到的文本交给 [`extract_secret_code`]。

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;

use crate::models::DataSourceDescriptor;
use crate::services::plan_interpreter::resolve_url;

/// 文本中找不到任何记号时返回的占位值
pub const UNKNOWN_CODE: &str = "UNKNOWN_CODE";

const SCRAPE_SEGMENT: &str = "demo-scrape";
const SCRAPE_DATA_SEGMENT: &str = "demo-scrape-data";

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("标签正则无效"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("空白正则无效"))
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)secret\s+code(?:\s+is)?[^A-Za-z0-9]+([A-Za-z0-9_-]{4,})")
            .expect("secret code 正则无效")
    })
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9_-]+").expect("记号正则无效"))
}

/// 去掉标签并压缩空白
pub fn normalize_page_text(raw: &str) -> String {
    let without_tags = tag_pattern().replace_all(raw, " ");
    whitespace_pattern()
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// 匹配 "secret code [is] <分隔符> <code>"
pub fn find_secret_code(text: &str) -> Option<&str> {
    code_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 文本中最后一个字母数字记号
pub fn last_token(text: &str) -> Option<&str> {
    token_pattern().find_iter(text).last().map(|m| m.as_str())
}

/// 从渲染后的页面文本中取出 secret code
///
/// 依次尝试短语匹配、最后一个记号，都没有时返回 [`UNKNOWN_CODE`]。
pub fn extract_secret_code(raw: &str) -> String {
    let text = normalize_page_text(raw);
    find_secret_code(&text)
        .or_else(|| last_token(&text))
        .unwrap_or(UNKNOWN_CODE)
        .to_string()
}

/// 决定要抓取的页面
///
/// 1. 题目路径里有 `demo-scrape` 时换成 `demo-scrape-data`，保留查询参数
/// 2. 否则用规划中的第一个数据源
/// 3. 都没有时抓题目页面本身
pub fn scrape_target_url(quiz_url: &str, data_sources: &[DataSourceDescriptor]) -> String {
    if let Ok(mut url) = Url::parse(quiz_url) {
        let path = url.path().to_string();
        if path.contains(SCRAPE_SEGMENT) && !path.contains(SCRAPE_DATA_SEGMENT) {
            url.set_path(&path.replace(SCRAPE_SEGMENT, SCRAPE_DATA_SEGMENT));
            return url.to_string();
        }
    }

    match data_sources.first() {
        Some(source) => resolve_url(quiz_url, &source.url).unwrap_or_else(|_| source.url.clone()),
        None => quiz_url.to_string(),
    }
}
