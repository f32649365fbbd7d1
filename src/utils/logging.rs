/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use std::time::Duration;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// 优先读取 `RUST_LOG`，未设置时默认 `info`，详细模式下为 `debug`。
/// 重复调用不会报错（测试中也可以直接调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 答题服务启动 - {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("⏱️ 时间预算: {} 秒", config.time_limit_secs);
    info!("🤖 模型: {}", config.llm_model_name);
    info!("📡 监听地址: {}", config.bind_addr);
    info!("{}", "=".repeat(60));
}

/// 记录单步开始
pub fn log_step_start(step_index: usize, quiz_url: &str, remaining: Duration) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[第 {} 步] 🔗 {} (剩余时间 {:.1} 秒)",
        step_index,
        quiz_url,
        remaining.as_secs_f64()
    );
}

/// 记录整条链路完成
pub fn log_run_complete(steps: usize, failed: bool, elapsed: Duration) {
    info!("\n{}", "=".repeat(60));
    info!("📊 链路结束");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("步骤数: {}", steps);
    info!("耗时: {:.1} 秒", elapsed.as_secs_f64());
    if failed {
        info!("❌ 最后一步失败");
    } else {
        info!("✅ 最后一步已提交");
    }
    info!("{}", "=".repeat(60));
}

/// 以 debug 级别输出生成的代码
pub fn log_generated_code(code: &str) {
    debug!("\n======= GENERATED CODE START =======\n{}\n======= GENERATED CODE END =======", code);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("你好世界", 2), "你好...");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
