/// 文本处理辅助函数
///
/// 处理 LLM 输出里常见的包装标记

/// 去掉 ``` 包装行
///
/// 只有当文本以 ``` 开头时才处理，去掉所有以 ``` 开头的行。
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// 按字符数截取前缀（不追加省略号）
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
