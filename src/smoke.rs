//! 冒烟测试 (Smoke Test)
//!
//! 顺序请求运行中的追踪服务，检查状态码并在 JSON/HTML 响应中匹配关键子串。

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::server::visualize::PAGE_TITLE;

/// 从响应中提取安全评分
static SCORE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#""securityScore"\s*:\s*(\d+)"#).unwrap());

#[derive(Debug, Error)]
pub enum SmokeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// 单项检查定义
#[derive(Debug, Clone, Copy)]
pub struct SmokeCheck {
    pub name: &'static str,
    pub path: &'static str,
    pub expected_status: u16,
    /// 响应体中必须出现的子串
    pub expect: &'static [&'static str],
    /// 是否校验 securityScore 在 [0, 100]
    pub check_score: bool,
}

pub const CHECKS: &[SmokeCheck] = &[
    SmokeCheck {
        name: "health",
        path: "/health",
        expected_status: 200,
        expect: &[r#""status":"ok""#],
        check_score: false,
    },
    SmokeCheck {
        name: "servlet trace",
        path: "/api/trace/servlet",
        expected_status: 200,
        expect: &[r#""status":"success""#, r#""type":"servlet""#, r#""executionSteps""#, r#""securityAssessment""#],
        check_score: true,
    },
    SmokeCheck {
        name: "filter trace",
        path: "/api/trace/filter",
        expected_status: 200,
        expect: &[r#""status":"success""#, r#""type":"filter""#, r#""executionSteps""#, r#""securityAssessment""#],
        check_score: true,
    },
    SmokeCheck {
        name: "listener trace",
        path: "/api/trace/listener",
        expected_status: 200,
        expect: &[r#""status":"success""#, r#""type":"listener""#, r#""executionSteps""#, r#""securityAssessment""#],
        check_score: true,
    },
    SmokeCheck {
        name: "all components trace",
        path: "/api/trace/all",
        expected_status: 200,
        expect: &[r#""status":"success""#, r#""type":"all_components""#, r#""components""#],
        check_score: true,
    },
    SmokeCheck {
        name: "stage catalog",
        path: "/api/stages",
        expected_status: 200,
        expect: &[r#""servlet""#, r#""filter""#, r#""listener""#],
        check_score: false,
    },
    SmokeCheck {
        name: "visualization",
        path: "/visualize",
        expected_status: 200,
        expect: &[PAGE_TITLE, "security-score"],
        check_score: true,
    },
    SmokeCheck {
        name: "unknown kind rejected",
        path: "/api/trace/valve",
        expected_status: 400,
        expect: &[r#""status":"error""#],
        check_score: false,
    },
];

/// 单项检查结果
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub path: &'static str,
    pub status: Option<u16>,
    pub passed: bool,
    pub failures: Vec<String>,
    pub elapsed_ms: u64,
}

/// 根据状态码和响应体判定检查结果 (不涉及网络)
pub fn evaluate(check: &SmokeCheck, status: u16, body: &str) -> Vec<String> {
    let mut failures = Vec::new();

    if status != check.expected_status {
        failures.push(format!("expected status {}, got {}", check.expected_status, status));
    }

    for needle in check.expect {
        if !body.contains(needle) {
            failures.push(format!("missing '{needle}' in response body"));
        }
    }

    if check.check_score {
        let mut found = false;
        for caps in SCORE_REGEX.captures_iter(body) {
            found = true;
            match caps[1].parse::<u32>() {
                Ok(score) if score <= 100 => {}
                _ => failures.push(format!("securityScore {} out of range [0, 100]", &caps[1])),
            }
        }
        // HTML 页面使用 security-score 元素
        if !found && !body.contains("security-score") {
            failures.push("no securityScore found".to_string());
        }
    }

    failures
}

/// 冒烟测试报告
#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<CheckOutcome>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }

    pub fn to_text(&self) -> String {
        let mut out = format!("🧪 Smoke Test: {}\n----------------------------------------\n", self.base_url);
        for o in &self.outcomes {
            let status = o.status.map(|s| s.to_string()).unwrap_or_else(|| "---".to_string());
            out.push_str(&format!(
                "{} {:<24} {:<22} {} ({} ms)\n",
                if o.passed { "✅" } else { "❌" },
                o.name,
                o.path,
                status,
                o.elapsed_ms
            ));
            for f in &o.failures {
                out.push_str(&format!("      ↳ {f}\n"));
            }
        }
        out.push_str("----------------------------------------\n");
        out.push_str(&format!(
            "{} passed, {} failed\n",
            self.outcomes.len() - self.failed_count(),
            self.failed_count()
        ));
        out
    }
}

/// 冒烟测试客户端
#[derive(Debug, Clone)]
pub struct SmokeClient {
    base_url: String,
    client: reqwest::Client,
}

impl SmokeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SmokeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn run_check(&self, check: &SmokeCheck) -> CheckOutcome {
        let url = format!("{}{}", self.base_url, check.path);
        let start = Instant::now();
        debug!(%url, "smoke request");

        let (status, failures) = match self.client.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => (Some(status), evaluate(check, status, &body)),
                    Err(e) => (Some(status), vec![format!("failed to read body: {e}")]),
                }
            }
            Err(e) => (None, vec![format!("request failed: {e}")]),
        };

        let outcome = CheckOutcome {
            name: check.name,
            path: check.path,
            status,
            passed: failures.is_empty(),
            failures,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if outcome.passed {
            info!(check = check.name, "smoke check passed");
        } else {
            warn!(check = check.name, failures = ?outcome.failures, "smoke check failed");
        }
        outcome
    }

    /// 顺序执行全部检查
    pub async fn run_all(&self) -> SmokeReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(CHECKS.len());
        for check in CHECKS {
            outcomes.push(self.run_check(check).await);
        }

        SmokeReport {
            base_url: self.base_url.clone(),
            started_at,
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str) -> &'static SmokeCheck {
        CHECKS.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_evaluate_success_body() {
        let body = r#"{"status":"success","type":"servlet","executionSteps":[],"securityAssessment":{"securityScore":55}}"#;
        assert!(evaluate(check("servlet trace"), 200, body).is_empty());
    }

    #[test]
    fn test_evaluate_wrong_status_and_missing_field() {
        let body = r#"{"status":"success","type":"filter"}"#;
        let failures = evaluate(check("servlet trace"), 500, body);

        assert!(failures.iter().any(|f| f.contains("expected status 200")));
        assert!(failures.iter().any(|f| f.contains(r#""type":"servlet""#)));
        assert!(failures.iter().any(|f| f.contains("securityScore")));
    }

    #[test]
    fn test_evaluate_score_out_of_range() {
        let body = r#"{"status":"success","type":"listener","executionSteps":[],"securityAssessment":{"securityScore": 140}}"#;
        let failures = evaluate(check("listener trace"), 200, body);
        assert_eq!(failures, vec!["securityScore 140 out of range [0, 100]".to_string()]);
    }

    #[test]
    fn test_evaluate_checks_every_score() {
        let body = r#"{"status":"success","type":"all_components","components":{"filter":{"securityAssessment":{"securityScore":70}},"listener":{"securityAssessment":{"securityScore":250}}},"securityAssessment":{"securityScore":101}}"#;
        let failures = evaluate(check("all components trace"), 200, body);
        assert_eq!(
            failures,
            vec![
                "securityScore 250 out of range [0, 100]".to_string(),
                "securityScore 101 out of range [0, 100]".to_string(),
            ]
        );
    }

    #[test]
    fn test_evaluate_html_page() {
        let body = format!(r#"<h1>{PAGE_TITLE}</h1><span id="security-score">55</span>"#);
        assert!(evaluate(check("visualization"), 200, &body).is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = SmokeClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_report_summary() {
        let report = SmokeReport {
            base_url: "http://localhost:8080".into(),
            started_at: Utc::now(),
            outcomes: vec![
                CheckOutcome {
                    name: "health",
                    path: "/health",
                    status: Some(200),
                    passed: true,
                    failures: vec![],
                    elapsed_ms: 1,
                },
                CheckOutcome {
                    name: "servlet trace",
                    path: "/api/trace/servlet",
                    status: None,
                    passed: false,
                    failures: vec!["request failed: connection refused".into()],
                    elapsed_ms: 2,
                },
            ],
        };

        assert!(!report.passed());
        assert_eq!(report.failed_count(), 1);
        assert!(report.to_text().contains("1 passed, 1 failed"));
    }
}
