//! 追踪报告
//!
//! 将 `TraceResult` / `CombinedTrace` 转为 HTTP 层与 CLI 使用的 JSON 信封和文本输出。

use chrono::Utc;
use serde_json::{json, Value};

use crate::tracer::{
    trace_all, CombinedTrace, DeserializationTracer, ExecutionStep, ScoringPolicy, SecurityAssessment,
    TraceResult, TraceTarget,
};

/// 单个组件或全部组件的追踪报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceReport {
    Single(TraceResult),
    Combined(CombinedTrace),
}

/// 按目标执行追踪
pub fn run(target: TraceTarget, policy: &ScoringPolicy) -> TraceReport {
    match target {
        TraceTarget::Component(kind) => TraceReport::Single(DeserializationTracer::with_policy(kind, *policy).trace()),
        TraceTarget::All => TraceReport::Combined(trace_all(policy)),
    }
}

impl TraceReport {
    pub fn target(&self) -> TraceTarget {
        match self {
            TraceReport::Single(r) => TraceTarget::Component(r.kind()),
            TraceReport::Combined(_) => TraceTarget::All,
        }
    }

    pub fn assessment(&self) -> SecurityAssessment {
        match self {
            TraceReport::Single(r) => r.assessment().clone(),
            TraceReport::Combined(c) => c.assessment(),
        }
    }

    pub fn steps(&self) -> Vec<&ExecutionStep> {
        match self {
            TraceReport::Single(r) => r.steps().iter().collect(),
            TraceReport::Combined(c) => c.steps().collect(),
        }
    }

    pub fn warning_count(&self) -> usize {
        match self {
            TraceReport::Single(r) => r.warning_count(),
            TraceReport::Combined(c) => c.warning_count(),
        }
    }

    pub fn error_count(&self) -> usize {
        match self {
            TraceReport::Single(r) => r.error_count(),
            TraceReport::Combined(c) => c.error_count(),
        }
    }

    /// HTTP 响应体
    ///
    /// 字段: status, type, executionSteps, securityAssessment,
    /// warningCount, errorCount, totalSteps, timestamp；
    /// all_components 额外包含 components。
    pub fn to_json(&self) -> Value {
        let steps = self.steps();
        let mut body = json!({
            "status": "success",
            "type": self.target().as_str(),
            "executionSteps": steps,
            "securityAssessment": self.assessment(),
            "warningCount": self.warning_count(),
            "errorCount": self.error_count(),
            "totalSteps": steps.len(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        if let TraceReport::Combined(combined) = self {
            let components: serde_json::Map<String, Value> = combined
                .results()
                .iter()
                .map(|r| (r.kind().as_str().to_string(), result_summary(r)))
                .collect();
            body["components"] = Value::Object(components);
        }

        body
    }

    /// 人类可读格式
    pub fn to_text(&self) -> String {
        match self {
            TraceReport::Single(r) => render_result_text(r),
            TraceReport::Combined(c) => {
                let mut out = String::new();
                for r in c.results() {
                    out.push_str(&render_result_text(r));
                    out.push('\n');
                }
                let overall = c.assessment();
                out.push_str(&format!(
                    "========================================\n\
                    All components: {} steps, {} warnings, {} errors\n\
                    Overall score: {}/100 ({})\n",
                    c.total_steps(),
                    c.warning_count(),
                    c.error_count(),
                    overall.score(),
                    overall.risk_level()
                ));
                out
            }
        }
    }
}

/// Per-result JSON used inside `components` and by the descriptor command
pub fn result_summary(result: &TraceResult) -> Value {
    let mut value = json!({
        "type": result.kind().as_str(),
        "executionSteps": result.steps(),
        "securityAssessment": result.assessment(),
        "warningCount": result.warning_count(),
        "errorCount": result.error_count(),
        "totalSteps": result.steps().len(),
    });
    if let Some(name) = result.component_name() {
        value["componentName"] = json!(name);
    }
    value
}

pub fn render_result_text(result: &TraceResult) -> String {
    let mut out = match result.component_name() {
        Some(name) => format!("🔬 {} Deserialization Trace: {}\n", result.kind().display_name(), name),
        None => format!("🔬 {} Deserialization Trace\n", result.kind().display_name()),
    };
    out.push_str("----------------------------------------\n");

    for step in result.steps() {
        out.push_str(&format!(
            "{:>2}. {} [{}] {} - {}\n",
            step.step,
            step.severity.icon(),
            step.severity,
            step.name,
            step.description
        ));
        if let Some(detail) = step.detail {
            out.push_str(&format!("      ↳ {detail}\n"));
        }
    }

    let a = result.assessment();
    out.push_str("----------------------------------------\n");
    out.push_str(&format!(
        "Score: {}/100 | Risk: {} | Warnings: {} | Errors: {}\n",
        a.score(),
        a.risk_level(),
        result.warning_count(),
        result.error_count()
    ));
    out.push_str(&format!("💡 {}\n", a.recommendation()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::ComponentKind;

    #[test]
    fn test_single_envelope() {
        let report = run(TraceTarget::Component(ComponentKind::Filter), &ScoringPolicy::default());
        let body = report.to_json();

        assert_eq!(body["status"], "success");
        assert_eq!(body["type"], "filter");
        assert_eq!(body["totalSteps"], 5);
        assert_eq!(body["executionSteps"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["securityAssessment"]["securityScore"], 80);
        assert!(body.get("components").is_none());
        assert!(body["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_combined_envelope() {
        let report = run(TraceTarget::All, &ScoringPolicy::default());
        let body = report.to_json();

        assert_eq!(body["type"], "all_components");
        assert_eq!(body["totalSteps"], 16);

        let per_kind: u64 = ComponentKind::ALL
            .iter()
            .map(|k| body["components"][k.as_str()]["totalSteps"].as_u64().unwrap())
            .sum();
        assert_eq!(per_kind, 16);
    }

    #[test]
    fn test_text_output() {
        let report = run(TraceTarget::Component(ComponentKind::Servlet), &ScoringPolicy::default());
        let text = report.to_text();

        assert!(text.contains("Servlet Deserialization Trace"));
        assert!(text.contains("session-restore"));
        assert!(text.contains("Score: 55/100"));

        let all = run(TraceTarget::All, &ScoringPolicy::default()).to_text();
        assert!(all.contains("All components: 16 steps"));
    }
}
