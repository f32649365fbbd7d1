//! 单步上下文
//!
//! 封装"我正在处理第几步、哪个地址、以谁的身份提交"这一信息

use std::fmt::Display;

use crate::models::AnswerMeta;

/// 单步上下文
#[derive(Debug, Clone)]
pub struct StepCtx {
    /// 步骤序号（从1开始，仅用于日志显示）
    pub step_index: usize,

    /// 当前题目地址
    pub quiz_url: String,

    pub email: String,
    pub secret: String,
}

impl StepCtx {
    pub fn new(step_index: usize, quiz_url: String, email: String, secret: String) -> Self {
        Self {
            step_index,
            quiz_url,
            email,
            secret,
        }
    }

    /// 暴露给生成代码的身份信息
    pub fn meta(&self) -> AnswerMeta {
        AnswerMeta {
            email: self.email.clone(),
            secret: self.secret.clone(),
            quiz_url: self.quiz_url.clone(),
        }
    }
}

impl Display for StepCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[第 {} 步 {}]", self.step_index, self.quiz_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_meta() {
        let ctx = StepCtx::new(
            2,
            "https://quiz.example/q/2".to_string(),
            "a@b.c".to_string(),
            "s".to_string(),
        );
        assert_eq!(ctx.to_string(), "[第 2 步 https://quiz.example/q/2]");
        assert_eq!(ctx.meta().quiz_url, "https://quiz.example/q/2");
    }
}
