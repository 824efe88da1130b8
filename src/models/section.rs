//! 表单分区目录
//!
//! 目录是配置而不是状态：描述一份草稿要依次经过哪些分区，
//! 每个分区用哪一套步骤协议。

use serde::Serialize;

use crate::config::SectionSettings;

/// 分区使用的步骤协议
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SectionKind {
    /// 读取 "About this job" 弹窗
    JobDescription,
    PersonalDetails,
    References,
    EqualOpportunities,
    /// 打开编辑器并连续点击 "Save & next"
    Generic {
        max_advances: usize,
        /// 完成后刷新页面以显示后续分区
        reveals_hidden: bool,
    },
}

/// 分区描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionDescriptor {
    pub key: String,
    pub kind: SectionKind,
    /// 失败时是否终止整份草稿
    pub required: bool,
}

impl SectionDescriptor {
    pub fn new(key: impl Into<String>, kind: SectionKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// 有序的分区目录
#[derive(Debug, Clone, Serialize)]
pub struct SectionCatalogue {
    pub sections: Vec<SectionDescriptor>,
    /// 终止边界（不处理）
    pub boundary: String,
}

impl SectionCatalogue {
    pub fn new(sections: Vec<SectionDescriptor>, boundary: impl Into<String>) -> Self {
        Self {
            sections,
            boundary: boundary.into(),
        }
    }

    /// 四个详细分区 + 配置中的通用分区
    pub fn from_settings(settings: &SectionSettings) -> Self {
        let mut sections = vec![
            SectionDescriptor::new("job-description", SectionKind::JobDescription).optional(),
            SectionDescriptor::new("persdetails", SectionKind::PersonalDetails),
            SectionDescriptor::new("references", SectionKind::References),
            SectionDescriptor::new("equalops", SectionKind::EqualOpportunities),
        ];
        sections.extend(settings.generic_sections.iter().map(|key| {
            SectionDescriptor::new(
                key.clone(),
                SectionKind::Generic {
                    max_advances: settings.max_advances,
                    reveals_hidden: *key == settings.reveal_after,
                },
            )
        }));
        Self::new(sections, settings.boundary.clone())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.key.as_str()).collect()
    }
}

impl Default for SectionCatalogue {
    fn default() -> Self {
        Self::from_settings(&SectionSettings::default())
    }
}
