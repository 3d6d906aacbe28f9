//! 阶段表 (Stage Tables)
//!
//! 每种组件类型 (Servlet / Filter / Listener) 的模拟反序列化与初始化阶段。
//!
//! 设计目标:
//! 1. 单一数据源 - 所有阶段在 definitions.rs 中定义
//! 2. 一个通用追踪算法消费阶段表，而不是三份重复实现
//! 3. 阶段顺序固定，追踪结果可复现

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tracer::ComponentKind;

pub mod definitions;

/// 步骤严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepSeverity {
    /// 常规生命周期步骤
    Info,
    /// 反射或未校验的操作
    Warning,
    /// 真实场景下可导致任意代码执行
    Error,
}

impl StepSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepSeverity::Info => "INFO",
            StepSeverity::Warning => "WARNING",
            StepSeverity::Error => "ERROR",
        }
    }

    /// Marker used by the text report
    pub fn icon(&self) -> &'static str {
        match self {
            StepSeverity::Info => "✅",
            StepSeverity::Warning => "⚠️",
            StepSeverity::Error => "🔴",
        }
    }
}

impl std::fmt::Display for StepSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阶段定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    /// 阶段唯一标识符 (同一组件类型内)
    pub name: &'static str,
    /// 阶段描述
    pub description: &'static str,
    /// 静态风险表给出的严重级别
    pub severity: StepSeverity,
    /// 附加说明 (涉及的 API 等)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'static str>,
}

/// 获取某组件类型的阶段表
pub fn stages_for(kind: ComponentKind) -> &'static [StageDefinition] {
    match kind {
        ComponentKind::Servlet => definitions::SERVLET_STAGES,
        ComponentKind::Filter => definitions::FILTER_STAGES,
        ComponentKind::Listener => definitions::LISTENER_STAGES,
    }
}

/// 阶段表统计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub kind: ComponentKind,
    pub total: usize,
    pub info_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
}

/// 统计某组件类型各严重级别的阶段数量
pub fn stats(kind: ComponentKind) -> StageStats {
    let stages = stages_for(kind);
    let count = |severity: StepSeverity| stages.iter().filter(|s| s.severity == severity).count();

    StageStats {
        kind,
        total: stages.len(),
        info_count: count(StepSeverity::Info),
        warning_count: count(StepSeverity::Warning),
        error_count: count(StepSeverity::Error),
    }
}

/// All stage tables keyed by component kind, for the `stages` command and `/api/stages`
pub fn catalog_json() -> Value {
    let mut catalog = serde_json::Map::new();
    for kind in ComponentKind::ALL {
        catalog.insert(
            kind.as_str().to_string(),
            json!({
                "stages": stages_for(kind),
                "stats": stats(kind),
            }),
        );
    }
    Value::Object(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_kind_has_stages() {
        for kind in ComponentKind::ALL {
            assert!(!stages_for(kind).is_empty(), "{kind} should have stages");
        }
    }

    #[test]
    fn test_stage_names_unique_per_kind() {
        for kind in ComponentKind::ALL {
            let names: HashSet<_> = stages_for(kind).iter().map(|s| s.name).collect();
            assert_eq!(names.len(), stages_for(kind).len(), "duplicate stage name in {kind}");
        }
    }

    #[test]
    fn test_stats_add_up() {
        for kind in ComponentKind::ALL {
            let s = stats(kind);
            assert_eq!(s.info_count + s.warning_count + s.error_count, s.total);
        }
    }

    #[test]
    fn test_servlet_stage_order() {
        let names: Vec<&str> = stages_for(ComponentKind::Servlet).iter().map(|s| s.name).collect();
        insta::assert_json_snapshot!(names, @r###"
        [
          "class-loading",
          "instantiation",
          "field-injection",
          "session-restore",
          "init-callback",
          "service-registration"
        ]
        "###);
    }

    #[test]
    fn test_severity_serializes_upper_case() {
        assert_eq!(serde_json::to_value(StepSeverity::Warning).unwrap(), json!("WARNING"));
        assert_eq!(StepSeverity::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_catalog_contains_all_kinds() {
        let catalog = catalog_json();
        for kind in ComponentKind::ALL {
            let entry = &catalog[kind.as_str()];
            assert!(entry["stages"].is_array());
            assert_eq!(entry["stats"]["total"], json!(stages_for(kind).len()));
        }
    }
}
