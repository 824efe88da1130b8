//! 分区步骤标记
//!
//! 每个分区一个枚举，`next()` 就是它的转移表。
//! 标记是重试的恢复点：失败后从当前标记重新执行，已完成的步骤不会重复。

use std::fmt::{Debug, Display};

pub trait Marker: Copy + Eq + Debug + Display + Send + Sync + 'static {
    const START: Self;
    const COMPLETE: Self;

    /// 下一步；`COMPLETE` 的下一步仍是 `COMPLETE`
    fn next(self) -> Self;

    fn is_complete(self) -> bool {
        self == Self::COMPLETE
    }
}

macro_rules! display_as_debug {
    ($($ty:ty),*) => {
        $(impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Debug::fmt(self, f)
            }
        })*
    };
}

/// "About this job" 弹窗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDescriptionMarker {
    OpenModal,
    Read,
    Close,
    Complete,
}

impl Marker for JobDescriptionMarker {
    const START: Self = Self::OpenModal;
    const COMPLETE: Self = Self::Complete;

    fn next(self) -> Self {
        match self {
            Self::OpenModal => Self::Read,
            Self::Read => Self::Close,
            Self::Close | Self::Complete => Self::Complete,
        }
    }
}

/// 个人信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalDetailsMarker {
    OpenEditor,
    PreferredEmployment,
    SaveAndNext,
    RecordQuestions,
    FinalSave,
    MarkComplete,
    Complete,
}

impl Marker for PersonalDetailsMarker {
    const START: Self = Self::OpenEditor;
    const COMPLETE: Self = Self::Complete;

    fn next(self) -> Self {
        match self {
            Self::OpenEditor => Self::PreferredEmployment,
            Self::PreferredEmployment => Self::SaveAndNext,
            Self::SaveAndNext => Self::RecordQuestions,
            Self::RecordQuestions => Self::FinalSave,
            Self::FinalSave => Self::MarkComplete,
            Self::MarkComplete | Self::Complete => Self::Complete,
        }
    }
}

/// 推荐人
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencesMarker {
    ExpandCard,
    OpenEditor,
    Submit,
    MarkComplete,
    Complete,
}

impl Marker for ReferencesMarker {
    const START: Self = Self::ExpandCard;
    const COMPLETE: Self = Self::Complete;

    fn next(self) -> Self {
        match self {
            Self::ExpandCard => Self::OpenEditor,
            Self::OpenEditor => Self::Submit,
            Self::Submit => Self::MarkComplete,
            Self::MarkComplete | Self::Complete => Self::Complete,
        }
    }
}

/// 平等机会问卷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualOpportunitiesMarker {
    OpenEditor,
    AdvanceIntro,
    SelectSource,
    AdvanceSource,
    Declaration,
    FinalSave,
    CloseModal,
    Complete,
}

impl Marker for EqualOpportunitiesMarker {
    const START: Self = Self::OpenEditor;
    const COMPLETE: Self = Self::Complete;

    fn next(self) -> Self {
        match self {
            Self::OpenEditor => Self::AdvanceIntro,
            Self::AdvanceIntro => Self::SelectSource,
            Self::SelectSource => Self::AdvanceSource,
            Self::AdvanceSource => Self::Declaration,
            Self::Declaration => Self::FinalSave,
            Self::FinalSave => Self::CloseModal,
            Self::CloseModal | Self::Complete => Self::Complete,
        }
    }
}

/// 通用分区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericMarker {
    OpenEditor,
    Advance,
    Reveal,
    Complete,
}

impl Marker for GenericMarker {
    const START: Self = Self::OpenEditor;
    const COMPLETE: Self = Self::Complete;

    fn next(self) -> Self {
        match self {
            Self::OpenEditor => Self::Advance,
            Self::Advance => Self::Reveal,
            Self::Reveal | Self::Complete => Self::Complete,
        }
    }
}

display_as_debug!(
    JobDescriptionMarker,
    PersonalDetailsMarker,
    ReferencesMarker,
    EqualOpportunitiesMarker,
    GenericMarker
);

/// 从 START 走到 COMPLETE 的完整路径
pub fn path<M: Marker>() -> Vec<M> {
    let mut steps = vec![M::START];
    let mut current = M::START;
    while !current.is_complete() {
        current = current.next();
        steps.push(current);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_details_path() {
        use PersonalDetailsMarker::*;
        assert_eq!(
            path::<PersonalDetailsMarker>(),
            vec![
                OpenEditor,
                PreferredEmployment,
                SaveAndNext,
                RecordQuestions,
                FinalSave,
                MarkComplete,
                Complete
            ]
        );
    }

    #[test]
    fn test_every_path_terminates() {
        assert_eq!(path::<JobDescriptionMarker>().len(), 4);
        assert_eq!(path::<ReferencesMarker>().len(), 5);
        assert_eq!(path::<EqualOpportunitiesMarker>().len(), 8);
        assert_eq!(path::<GenericMarker>().len(), 4);
    }

    #[test]
    fn test_complete_is_absorbing() {
        assert_eq!(GenericMarker::Complete.next(), GenericMarker::Complete);
        assert!(ReferencesMarker::Complete.is_complete());
        assert!(!ReferencesMarker::Submit.is_complete());
    }

    #[test]
    fn test_display_uses_variant_name() {
        assert_eq!(EqualOpportunitiesMarker::SelectSource.to_string(), "SelectSource");
    }
}
