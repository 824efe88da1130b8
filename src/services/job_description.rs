//! 支持性文档生成 - 业务能力层
//!
//! 用提取到的职位描述和简历生成 "Supporting information" 文本。
//! 生成失败不会变成错误，而是返回一段说明文字。

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::services::diagnostics::sanitize;
use crate::services::llm_service::{LlmService, DOCUMENT_SYSTEM_PROMPT};

/// 默认提示词模板
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Write the supporting information section of a job application.
Use only experience that appears in the resume and address the requirements of the job.

Resume:
{resume}

Job description:
{job_description}
";

const EMPTY_INPUT_NOTICE: &str = "Resume and job description must not be empty.";

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// 生成支持性文档，永远返回文本
    async fn generate(&self, job_description: &str) -> String;
}

/// 填充模板中的 `{resume}` 与 `{job_description}`
pub fn render_prompt(template: &str, resume: &str, job_description: &str) -> String {
    template
        .replace("{resume}", resume)
        .replace("{job_description}", job_description)
}

/// 基于 LLM 的文档生成
pub struct LlmDocumentGenerator {
    llm: LlmService,
    resume: String,
    template: String,
}

impl LlmDocumentGenerator {
    pub fn new(llm: LlmService, resume: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            llm,
            resume: resume.into(),
            template: template.into(),
        }
    }

    /// 按配置创建，未启用时返回 `None`
    pub fn from_config(config: &Config) -> AppResult<Option<Self>> {
        if !config.document_generation_enabled() {
            return Ok(None);
        }
        let Some(resume_path) = config.resume_path.as_deref() else {
            return Ok(None);
        };

        let resume = read_text(Path::new(resume_path))?;
        let template = match config.prompt_template_path.as_deref() {
            Some(path) => read_text(Path::new(path))?,
            None => DEFAULT_PROMPT_TEMPLATE.to_string(),
        };

        info!("📝 已启用支持性文档生成 (模型: {})", config.llm_model_name);
        Ok(Some(Self::new(LlmService::new(config), resume, template)))
    }
}

#[async_trait]
impl DocumentGenerator for LlmDocumentGenerator {
    async fn generate(&self, job_description: &str) -> String {
        if self.resume.trim().is_empty() || job_description.trim().is_empty() {
            return EMPTY_INPUT_NOTICE.to_string();
        }

        let prompt = render_prompt(&self.template, &self.resume, job_description);
        debug!("文档生成提示词长度: {} 字符", prompt.len());

        match self.llm.complete(&prompt, Some(DOCUMENT_SYSTEM_PROMPT)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("⚠️ 生成支持性文档失败: {}", e);
                format!("An error occurred: {}", e)
            }
        }
    }
}

/// 写入 `<dir>/supporting_<id>.txt`
///
/// 没有数字编号的草稿以完整 URL 为 id，文件名中的非法字符替换为 `_`
pub fn write_supporting_document(dir: &Path, draft_id: &str, text: &str) -> AppResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| AppError::output(dir, e))?;
    let path = dir.join(format!("supporting_{}.txt", sanitize(draft_id)));
    fs::write(&path, text).map_err(|e| AppError::output(&path, e))?;
    Ok(path)
}

fn read_text(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|source| {
        ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_fills_placeholders() {
        let prompt = render_prompt("R={resume}; J={job_description}; R={resume}", "cv", "nurse");
        assert_eq!(prompt, "R=cv; J=nurse; R=cv");
    }

    #[tokio::test]
    async fn test_empty_inputs_degrade_to_notice() {
        let config = Config {
            llm_api_key: "unused".to_string(),
            llm_api_base_url: "http://127.0.0.1:9/v1".to_string(),
            ..Config::default()
        };
        let generator =
            LlmDocumentGenerator::new(LlmService::new(&config), "my resume", DEFAULT_PROMPT_TEMPLATE);
        assert_eq!(generator.generate("   ").await, EMPTY_INPUT_NOTICE);
    }

    #[test]
    fn test_disabled_without_resume() {
        let config = Config {
            llm_api_key: "key".to_string(),
            ..Config::default()
        };
        assert!(LlmDocumentGenerator::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_missing_resume_file_is_config_error() {
        let config = Config {
            llm_api_key: "key".to_string(),
            resume_path: Some("/nonexistent/resume.txt".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            LlmDocumentGenerator::from_config(&config),
            Err(AppError::Config(ConfigError::FileReadFailed { .. }))
        ));
    }

    #[test]
    fn test_write_supporting_document() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let path = write_supporting_document(&out, "4242", "text").unwrap();
        assert_eq!(path, out.join("supporting_4242.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), "text");
    }

    #[test]
    fn test_url_id_becomes_single_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_supporting_document(
            dir.path(),
            "https://apps.trac.jobs/application/draft-abc",
            "text",
        )
        .unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "supporting_https___apps_trac_jobs_application_draft-abc.txt"
        );
        assert!(path.is_file());
    }
}
