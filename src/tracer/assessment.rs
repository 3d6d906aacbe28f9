//! 安全评估 (Security Assessment)
//!
//! 评分规则 (默认值，可通过配置覆盖):
//! - WARNING 阶段扣 10 分，累计扣分达到 medium_threshold 时风险升为 MEDIUM
//! - ERROR 阶段扣 25 分，风险至少为 HIGH；累计扣分达到 critical_threshold 时为 CRITICAL
//! - 最终分数限制在 [0, 100]
//!
//! 这些数值只是演示用的启发式规则，不代表真实的漏洞模型。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stages::StepSeverity;

/// 风险级别 (有序: LOW < MEDIUM < HIGH < CRITICAL)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// 每个风险级别对应一条固定建议
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "No security issues detected; the component lifecycle uses safe defaults.",
            RiskLevel::Medium => "Review reflective initialization and validate configuration parameters before use.",
            RiskLevel::High => "Restrict deserialization to an allow-list of classes and never run callbacks on untrusted state.",
            RiskLevel::Critical => "Disable deserialization of untrusted data immediately; this component permits arbitrary code execution.",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty constants and risk thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub warning_penalty: u32,
    pub error_penalty: u32,
    pub medium_threshold: u32,
    pub critical_threshold: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            warning_penalty: 10,
            error_penalty: 25,
            medium_threshold: 10,
            critical_threshold: 50,
        }
    }
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.medium_threshold == 0 {
            return Err(ConfigError::Invalid("scoring.medium_threshold must be > 0".into()));
        }
        if self.critical_threshold == 0 {
            return Err(ConfigError::Invalid("scoring.critical_threshold must be > 0".into()));
        }
        if self.critical_threshold < self.medium_threshold {
            return Err(ConfigError::Invalid(format!(
                "scoring.critical_threshold ({}) must not be below scoring.medium_threshold ({})",
                self.critical_threshold, self.medium_threshold
            )));
        }
        Ok(())
    }
}

/// 安全评估结果
///
/// 只能通过追踪运行 (或 `Default`) 产生，对外只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessment {
    #[serde(rename = "securityScore")]
    score: u8,
    risk_level: RiskLevel,
    recommendation: &'static str,
}

impl Default for SecurityAssessment {
    fn default() -> Self {
        Self::from_parts(100, RiskLevel::Low)
    }
}

impl SecurityAssessment {
    fn from_parts(score: u8, risk_level: RiskLevel) -> Self {
        Self {
            score: score.min(100),
            risk_level,
            recommendation: risk_level.recommendation(),
        }
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn recommendation(&self) -> &str {
        self.recommendation
    }

    /// 合并多个评估: 取最低分、最高风险
    ///
    /// An empty input yields the default assessment.
    pub fn combine<'a, I>(assessments: I) -> Self
    where
        I: IntoIterator<Item = &'a SecurityAssessment>,
    {
        let mut score = 100u8;
        let mut risk = RiskLevel::Low;
        for a in assessments {
            score = score.min(a.score);
            risk = risk.max(a.risk_level);
        }
        Self::from_parts(score, risk)
    }
}

/// 追踪过程中的局部累加器，结束时物化为不可变的 `SecurityAssessment`
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoreAccumulator {
    policy: ScoringPolicy,
    penalty: u32,
    errors: usize,
    risk: RiskLevel,
}

impl ScoreAccumulator {
    pub(crate) fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            penalty: 0,
            errors: 0,
            risk: RiskLevel::Low,
        }
    }

    pub(crate) fn record(&mut self, severity: StepSeverity) {
        match severity {
            StepSeverity::Info => return,
            StepSeverity::Warning => {
                self.penalty = self.penalty.saturating_add(self.policy.warning_penalty);
                if self.penalty >= self.policy.medium_threshold {
                    self.risk = self.risk.max(RiskLevel::Medium);
                }
            }
            StepSeverity::Error => {
                self.penalty = self.penalty.saturating_add(self.policy.error_penalty);
                self.errors += 1;
                self.risk = self.risk.max(RiskLevel::High);
            }
        }

        // CRITICAL 需要至少一个 ERROR 阶段
        if self.errors > 0 && self.penalty >= self.policy.critical_threshold {
            self.risk = RiskLevel::Critical;
        }
    }

    pub(crate) fn finish(self) -> SecurityAssessment {
        let score = 100 - self.penalty.min(100);
        SecurityAssessment::from_parts(score as u8, self.risk)
    }
}
