//! LLM 服务 - 业务能力层
//!
//! 只负责把提示词发送给兼容 OpenAI 的聊天接口并取回文本，
//! 提示词的内容由调用方（文档生成）决定。

use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;

/// 支持性文档的写作要求
pub const DOCUMENT_SYSTEM_PROMPT: &str =
    "You write concise, factual supporting statements for job applications. \
     Use only experience that appears in the resume.";

/// 生成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    settings: CompletionSettings,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            settings: CompletionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn settings(&self) -> CompletionSettings {
        self.settings
    }

    /// 发送一次对话，返回去掉首尾空白的回复
    pub async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        debug!(
            "📨 请求 {}，提示词 {} 字符",
            self.model_name,
            prompt.chars().count()
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(build_messages(prompt, system)?)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM 请求失败 ({}): {}", self.model_name, e);
            anyhow!("LLM 请求失败: {}", e)
        })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("LLM 没有返回文本"))?;

        debug!("📩 收到回复 {} 字符", text.chars().count());
        Ok(text)
    }
}

/// 系统消息（可选）在前，用户消息在后
fn build_messages(prompt: &str, system: Option<&str>) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?,
        ));
    }
    messages.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?,
    ));
    Ok(messages)
}
