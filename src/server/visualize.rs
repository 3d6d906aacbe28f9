//! 追踪可视化页面 (HTML)

use crate::report::TraceReport;
use crate::stages::StepSeverity;
use crate::tracer::RiskLevel;

pub const PAGE_TITLE: &str = "Component Deserialization Trace Visualization";

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #222; }
h1 { font-size: 1.6rem; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
th, td { border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; }
th { background: #f4f4f4; }
.sev-INFO { color: #2e7d32; }
.sev-WARNING { color: #ef6c00; font-weight: bold; }
.sev-ERROR { color: #c62828; font-weight: bold; }
.risk { display: inline-block; padding: 0.2rem 0.6rem; border-radius: 4px; color: #fff; }
.risk-LOW { background: #2e7d32; }
.risk-MEDIUM { background: #f9a825; }
.risk-HIGH { background: #ef6c00; }
.risk-CRITICAL { background: #c62828; }
.detail { color: #666; font-size: 0.85rem; }
"#;

/// Minimal escaping for text nodes and attribute values
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn risk_badge(risk: RiskLevel) -> String {
    format!(r#"<span class="risk risk-{0}">{0}</span>"#, risk.as_str())
}

fn severity_cell(severity: StepSeverity) -> String {
    format!(r#"<td class="sev-{0}">{0}</td>"#, severity.as_str())
}

pub fn render_page(report: &TraceReport) -> String {
    let assessment = report.assessment();
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{PAGE_TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{PAGE_TITLE}</h1>\n"));
    html.push_str(&format!(
        "<p>Target: <code>{}</code> | Steps: {} | Warnings: {} | Errors: {}</p>\n",
        report.target().as_str(),
        report.steps().len(),
        report.warning_count(),
        report.error_count()
    ));
    html.push_str(&format!(
        "<h2>Security Score: <span id=\"security-score\">{}</span>/100 {}</h2>\n<p>{}</p>\n",
        assessment.score(),
        risk_badge(assessment.risk_level()),
        escape(assessment.recommendation())
    ));

    html.push_str("<table>\n<thead><tr><th>#</th><th>Component</th><th>Stage</th><th>Severity</th><th>Description</th></tr></thead>\n<tbody>\n");
    for step in report.steps() {
        html.push_str("<tr>");
        html.push_str(&format!("<td>{}</td>", step.step));
        html.push_str(&format!("<td>{}</td>", step.component_type.display_name()));
        html.push_str(&format!("<td><code>{}</code></td>", escape(step.name)));
        html.push_str(&severity_cell(step.severity));
        html.push_str(&format!("<td>{}", escape(step.description)));
        if let Some(detail) = step.detail {
            html.push_str(&format!("<div class=\"detail\">{}</div>", escape(detail)));
        }
        html.push_str("</td></tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");

    if let TraceReport::Combined(combined) = report {
        html.push_str("<h2>Per Component</h2>\n<table>\n<thead><tr><th>Component</th><th>Steps</th><th>Score</th><th>Risk</th></tr></thead>\n<tbody>\n");
        for r in combined.results() {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                r.kind().display_name(),
                r.steps().len(),
                r.assessment().score(),
                risk_badge(r.assessment().risk_level())
            ));
        }
        html.push_str("</tbody>\n</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report;
    use crate::tracer::{ComponentKind, ScoringPolicy, TraceTarget};

    #[test]
    fn test_page_has_heading_and_steps() {
        let report = report::run(TraceTarget::All, &ScoringPolicy::default());
        let html = render_page(&report);

        assert!(html.contains(&format!("<h1>{PAGE_TITLE}</h1>")));
        assert!(html.contains("Per Component"));
        assert!(html.contains("callback-dispatch"));
        assert!(html.contains(r#"<span id="security-score">55</span>"#));
    }

    #[test]
    fn test_single_page_has_no_component_table() {
        let report = report::run(TraceTarget::Component(ComponentKind::Filter), &ScoringPolicy::default());
        let html = render_page(&report);

        assert!(!html.contains("Per Component"));
        assert!(html.contains("risk-MEDIUM"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
