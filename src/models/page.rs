use serde::{Deserialize, Serialize};

/// 页面上的链接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// 渲染后的题目页面
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPage {
    pub url: String,
    pub body_text: String,
    #[serde(default)]
    pub links: Vec<PageLink>,
}

/// 暴露给生成代码的身份信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMeta {
    pub email: String,
    pub secret: String,
    pub quiz_url: String,
}
