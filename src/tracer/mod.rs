//! 反序列化追踪器 (Deserialization Tracer)
//!
//! 按固定顺序模拟 Servlet / Filter / Listener 的反序列化与初始化阶段，
//! 并为每次追踪生成安全评估。
//!
//! - 一个通用算法 (`DeserializationTracer::trace`) 消费阶段表
//! - 每次调用互相独立，没有跨调用共享的可变状态
//! - 评分在局部累加器中进行，结束时物化为不可变结果

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TraceError;
use crate::stages::{self, StageDefinition, StepSeverity};

pub mod assessment;

pub use assessment::{RiskLevel, ScoringPolicy, SecurityAssessment};
use assessment::ScoreAccumulator;

// ============================================================================
// Component kinds
// ============================================================================

/// 组件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Servlet,
    Filter,
    Listener,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [ComponentKind::Servlet, ComponentKind::Filter, ComponentKind::Listener];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Servlet => "servlet",
            ComponentKind::Filter => "filter",
            ComponentKind::Listener => "listener",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentKind::Servlet => "Servlet",
            ComponentKind::Filter => "Filter",
            ComponentKind::Listener => "Listener",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "servlet" => Ok(ComponentKind::Servlet),
            "filter" => Ok(ComponentKind::Filter),
            "listener" => Ok(ComponentKind::Listener),
            _ => Err(TraceError::UnsupportedComponentKind(s.to_string())),
        }
    }
}

/// 追踪目标: 单个组件类型，或全部 (`all_components`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTarget {
    Component(ComponentKind),
    All,
}

impl TraceTarget {
    /// Value of the `type` discriminator in JSON bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceTarget::Component(kind) => kind.as_str(),
            TraceTarget::All => "all_components",
        }
    }
}

impl FromStr for TraceTarget {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "all_components" => Ok(TraceTarget::All),
            _ => s.parse().map(TraceTarget::Component),
        }
    }
}

// ============================================================================
// Trace records
// ============================================================================

/// 追踪中的一个步骤，追加后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    /// 1-based position in the trace
    pub step: usize,
    pub name: &'static str,
    pub description: &'static str,
    pub component_type: ComponentKind,
    pub severity: StepSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'static str>,
}

/// 一次追踪的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    #[serde(rename = "type")]
    kind: ComponentKind,
    /// 仅在追踪 web.xml 声明的组件时设置
    #[serde(skip_serializing_if = "Option::is_none")]
    component_name: Option<String>,
    execution_steps: Vec<ExecutionStep>,
    security_assessment: SecurityAssessment,
}

impl TraceResult {
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn component_name(&self) -> Option<&str> {
        self.component_name.as_deref()
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.execution_steps
    }

    pub fn assessment(&self) -> &SecurityAssessment {
        &self.security_assessment
    }

    pub fn warning_count(&self) -> usize {
        self.count_severity(StepSeverity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count_severity(StepSeverity::Error)
    }

    fn count_severity(&self, severity: StepSeverity) -> usize {
        self.execution_steps.iter().filter(|s| s.severity == severity).count()
    }

    pub(crate) fn with_component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }
}

// ============================================================================
// Tracers
// ============================================================================

/// 通用追踪器: 任一组件类型 + 评分策略
#[derive(Debug, Clone, Copy)]
pub struct DeserializationTracer {
    kind: ComponentKind,
    policy: ScoringPolicy,
}

impl DeserializationTracer {
    pub fn new(kind: ComponentKind) -> Self {
        Self::with_policy(kind, ScoringPolicy::default())
    }

    pub fn with_policy(kind: ComponentKind, policy: ScoringPolicy) -> Self {
        Self { kind, policy }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn stages(&self) -> &'static [StageDefinition] {
        stages::stages_for(self.kind)
    }

    /// 执行一次完整追踪
    pub fn trace(&self) -> TraceResult {
        let stages = self.stages();
        let mut steps = Vec::with_capacity(stages.len());
        let mut acc = ScoreAccumulator::new(self.policy);

        for (idx, stage) in stages.iter().enumerate() {
            debug!(kind = %self.kind, stage = stage.name, severity = %stage.severity, "trace step");
            steps.push(ExecutionStep {
                step: idx + 1,
                name: stage.name,
                description: stage.description,
                component_type: self.kind,
                severity: stage.severity,
                detail: stage.detail,
            });
            acc.record(stage.severity);
        }

        let assessment = acc.finish();
        info!(
            kind = %self.kind,
            steps = steps.len(),
            score = assessment.score(),
            risk = %assessment.risk_level(),
            "trace completed"
        );

        TraceResult {
            kind: self.kind,
            component_name: None,
            execution_steps: steps,
            security_assessment: assessment,
        }
    }
}

/// Servlet 追踪器
#[derive(Debug, Clone, Copy, Default)]
pub struct ServletTracer {
    policy: ScoringPolicy,
}

impl ServletTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn trace_servlet_deserialization(&self) -> TraceResult {
        DeserializationTracer::with_policy(ComponentKind::Servlet, self.policy).trace()
    }
}

/// Filter 追踪器
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterTracer {
    policy: ScoringPolicy,
}

impl FilterTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn trace_filter_deserialization(&self) -> TraceResult {
        DeserializationTracer::with_policy(ComponentKind::Filter, self.policy).trace()
    }
}

/// Listener 追踪器
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerTracer {
    policy: ScoringPolicy,
}

impl ListenerTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn trace_listener_deserialization(&self) -> TraceResult {
        DeserializationTracer::with_policy(ComponentKind::Listener, self.policy).trace()
    }
}

// ============================================================================
// Combined run (all_components)
// ============================================================================

/// 三类组件的合并追踪结果 (顺序固定: servlet, filter, listener)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedTrace {
    results: Vec<TraceResult>,
}

impl CombinedTrace {
    pub fn results(&self) -> &[TraceResult] {
        &self.results
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&TraceResult> {
        self.results.iter().find(|r| r.kind() == kind)
    }

    pub fn steps(&self) -> impl Iterator<Item = &ExecutionStep> {
        self.results.iter().flat_map(|r| r.steps())
    }

    pub fn total_steps(&self) -> usize {
        self.results.iter().map(|r| r.steps().len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().map(TraceResult::warning_count).sum()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(TraceResult::error_count).sum()
    }

    /// 最低分 + 最高风险
    pub fn assessment(&self) -> SecurityAssessment {
        SecurityAssessment::combine(self.results.iter().map(TraceResult::assessment))
    }
}

/// 并行追踪全部组件类型
pub fn trace_all(policy: &ScoringPolicy) -> CombinedTrace {
    let results = ComponentKind::ALL[..]
        .par_iter()
        .map(|kind| DeserializationTracer::with_policy(*kind, *policy).trace())
        .collect();

    CombinedTrace { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("servlet".parse::<ComponentKind>().unwrap(), ComponentKind::Servlet);
        assert_eq!(" Filter ".parse::<ComponentKind>().unwrap(), ComponentKind::Filter);
        assert!(matches!(
            "valve".parse::<ComponentKind>(),
            Err(TraceError::UnsupportedComponentKind(s)) if s == "valve"
        ));
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("all".parse::<TraceTarget>().unwrap(), TraceTarget::All);
        assert_eq!("all_components".parse::<TraceTarget>().unwrap(), TraceTarget::All);
        assert_eq!(
            "listener".parse::<TraceTarget>().unwrap(),
            TraceTarget::Component(ComponentKind::Listener)
        );
        assert!("everything".parse::<TraceTarget>().is_err());
        assert_eq!(TraceTarget::All.as_str(), "all_components");
    }

    #[test]
    fn test_servlet_trace_default_policy() {
        let result = ServletTracer::new().trace_servlet_deserialization();

        assert_eq!(result.kind(), ComponentKind::Servlet);
        assert_eq!(result.steps().len(), 6);
        assert_eq!(result.warning_count(), 2);
        assert_eq!(result.error_count(), 1);
        // 2 × 10 + 25
        assert_eq!(result.assessment().score(), 55);
        assert_eq!(result.assessment().risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_filter_trace_default_policy() {
        let result = FilterTracer::new().trace_filter_deserialization();

        assert_eq!(result.steps().len(), 5);
        assert_eq!(result.error_count(), 0);
        assert_eq!(result.assessment().score(), 80);
        assert_eq!(result.assessment().risk_level(), RiskLevel::Medium);
    }

    #[test]
    fn test_listener_trace_default_policy() {
        let result = ListenerTracer::new().trace_listener_deserialization();

        assert_eq!(result.steps().len(), 5);
        assert_eq!(result.warning_count(), 1);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.assessment().score(), 65);
        assert_eq!(result.assessment().risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_steps_are_numbered_and_tagged() {
        for kind in ComponentKind::ALL {
            let result = DeserializationTracer::new(kind).trace();
            for (idx, step) in result.steps().iter().enumerate() {
                assert_eq!(step.step, idx + 1);
                assert_eq!(step.component_type, kind);
            }
        }
    }

    #[test]
    fn test_custom_policy_changes_score() {
        let policy = ScoringPolicy {
            warning_penalty: 5,
            error_penalty: 60,
            ..ScoringPolicy::default()
        };
        let result = ServletTracer::with_policy(policy).trace_servlet_deserialization();
        assert_eq!(result.assessment().score(), 30);
        assert_eq!(result.assessment().risk_level(), RiskLevel::Critical);
    }

    #[test]
    fn test_trace_all_order_and_totals() {
        let combined = trace_all(&ScoringPolicy::default());
        let kinds: Vec<_> = combined.results().iter().map(TraceResult::kind).collect();

        assert_eq!(kinds, ComponentKind::ALL.to_vec());
        assert_eq!(combined.total_steps(), 16);
        assert_eq!(combined.steps().count(), 16);
        assert_eq!(combined.warning_count(), 5);
        assert_eq!(combined.error_count(), 2);
        assert_eq!(combined.assessment().score(), 55);
        assert_eq!(combined.assessment().risk_level(), RiskLevel::High);
        assert!(combined.get(ComponentKind::Filter).is_some());
    }

    #[test]
    fn test_result_serialization_shape() {
        let json = serde_json::to_value(ServletTracer::new().trace_servlet_deserialization()).unwrap();

        assert_eq!(json["type"], "servlet");
        assert!(json.get("componentName").is_none());
        assert_eq!(json["executionSteps"][0]["componentType"], "servlet");
        assert_eq!(json["executionSteps"][0]["severity"], "INFO");
        assert_eq!(json["securityAssessment"]["riskLevel"], "HIGH");
    }
}
