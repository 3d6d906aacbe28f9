//! CLI 模式处理器
//!
//! 默认输出人类可读格式，使用 --json 参数可输出 JSON 格式

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::descriptor;
use crate::report::{self, render_result_text, result_summary};
use crate::server::TraceServer;
use crate::smoke::SmokeClient;
use crate::stages;
use crate::tracer::{ComponentKind, TraceTarget};

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 🛰️ 启动嵌入式追踪服务
    Serve {
        /// 监听地址 (覆盖配置文件)
        #[arg(long)]
        host: Option<String>,

        /// 监听端口 (覆盖配置文件)
        #[arg(short, long)]
        port: Option<u16>,

        /// 启用 CORS
        #[arg(long)]
        cors: bool,
    },

    /// 🔬 追踪组件反序列化: servlet, filter, listener, all
    Trace {
        #[arg(default_value = "all")]
        target: String,
    },

    /// 📋 列出各组件类型的阶段表
    Stages,

    /// 📂 查找 WEB-INF/web.xml 并追踪其中声明的组件
    Descriptor {
        /// 项目路径
        #[arg(short, long, default_value = ".")]
        path: String,
    },

    /// 🧪 对运行中的服务执行冒烟测试
    Smoke {
        /// 服务地址 (覆盖配置文件)
        #[arg(long)]
        base_url: Option<String>,
    },
}

/// 处理 CLI 命令
///
/// json_output: 是否输出 JSON 格式（默认 false，输出人类可读格式）
pub fn handle_command(cmd: Command, json_output: bool, config: AppConfig) -> Result<()> {
    let result = match cmd {
        Command::Serve { host, port, cors } => {
            let mut settings = config.server.clone();
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            settings.cors |= cors;

            let server = TraceServer::new(settings, config.scoring);
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime
                .block_on(server.run())
                .with_context(|| format!("trace server on {} failed", server.http_url()))?;
            return Ok(());
        }

        Command::Trace { target } => trace_command(&target, json_output, &config),

        Command::Stages => Ok(if json_output {
            stages::catalog_json()
        } else {
            json!(stages_text())
        }),

        Command::Descriptor { path } => descriptor_command(&path, json_output, &config),

        Command::Smoke { base_url } => smoke_command(base_url, json_output, &config),
    };

    // 输出结果
    match result {
        Ok(value) => {
            if json_output {
                // JSON 格式：包装 success 字段
                let output = json!({
                    "success": true,
                    "data": value
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_value(&value);
            }
            Ok(())
        }
        Err(e) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&error_envelope(&e))?);
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

/// 冒烟测试失败，携带完整报告
#[derive(Debug, thiserror::Error)]
#[error("smoke test failed: {failed} of {total} checks failed")]
struct SmokeFailure {
    failed: usize,
    total: usize,
    report: Value,
}

/// JSON 错误输出；冒烟测试失败时附带各项检查结果
fn error_envelope(e: &anyhow::Error) -> Value {
    let mut output = json!({
        "success": false,
        "error": format!("{e:#}")
    });
    if let Some(failure) = e.downcast_ref::<SmokeFailure>() {
        output["data"] = failure.report.clone();
    }
    output
}

/// 打印 Value，智能处理字符串和其他类型
fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{s}"),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

fn trace_command(target: &str, json_output: bool, config: &AppConfig) -> Result<Value> {
    let target: TraceTarget = target.parse()?;
    let report = report::run(target, &config.scoring);

    Ok(if json_output {
        report.to_json()
    } else {
        json!(report.to_text())
    })
}

fn stages_text() -> String {
    let mut out = String::from("📋 Stage Tables\n");
    for kind in ComponentKind::ALL {
        let s = stages::stats(kind);
        out.push_str(&format!(
            "----------------------------------------\n{} ({} stages: {} INFO, {} WARNING, {} ERROR)\n",
            kind.display_name(),
            s.total,
            s.info_count,
            s.warning_count,
            s.error_count
        ));
        for (idx, stage) in stages::stages_for(kind).iter().enumerate() {
            out.push_str(&format!(
                "{:>2}. {} [{}] {} - {}\n",
                idx + 1,
                stage.severity.icon(),
                stage.severity,
                stage.name,
                stage.description
            ));
        }
    }
    out
}

fn descriptor_command(path: &str, json_output: bool, config: &AppConfig) -> Result<Value> {
    let root = Path::new(path);
    let descriptors = descriptor::find_descriptors(root)?;
    if descriptors.is_empty() {
        bail!("no WEB-INF/web.xml found under {path}");
    }

    let mut traces = Vec::with_capacity(descriptors.len());
    for file in &descriptors {
        let trace = descriptor::trace_descriptor_file(file, &config.scoring)
            .with_context(|| format!("failed to trace {}", file.display()))?;
        traces.push(trace);
    }

    if json_output {
        let files: Vec<Value> = traces
            .iter()
            .map(|t| {
                json!({
                    "path": t.path.display().to_string(),
                    "components": t.results.iter().map(result_summary).collect::<Vec<_>>(),
                })
            })
            .collect();
        return Ok(json!({ "descriptors": files }));
    }

    let mut out = String::new();
    for t in &traces {
        out.push_str(&format!(
            "📂 {} ({} components)\n========================================\n",
            t.path.display(),
            t.results.len()
        ));
        for r in &t.results {
            out.push_str(&render_result_text(r));
            out.push('\n');
        }
    }
    Ok(json!(out))
}

fn smoke_command(base_url: Option<String>, json_output: bool, config: &AppConfig) -> Result<Value> {
    let base_url = base_url.unwrap_or_else(|| config.smoke.base_url.clone());
    let client = SmokeClient::new(base_url, Duration::from_secs(config.smoke.timeout_secs))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let report = runtime.block_on(client.run_all());

    if !report.passed() {
        if !json_output {
            print!("{}", report.to_text());
        }
        return Err(SmokeFailure {
            failed: report.failed_count(),
            total: report.outcomes.len(),
            report: serde_json::to_value(&report)?,
        }
        .into());
    }

    Ok(if json_output {
        serde_json::to_value(&report)?
    } else {
        json!(report.to_text())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_command_json() {
        let value = trace_command("servlet", true, &AppConfig::default()).unwrap();
        assert_eq!(value["type"], "servlet");
        assert_eq!(value["status"], "success");
    }

    #[test]
    fn test_trace_command_unknown_kind() {
        let err = trace_command("valve", false, &AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("valve"));
    }

    #[test]
    fn test_stages_text_lists_every_kind() {
        let text = stages_text();
        for kind in ComponentKind::ALL {
            assert!(text.contains(kind.display_name()));
        }
        assert!(text.contains("callback-dispatch"));
    }

    #[test]
    fn test_failed_smoke_envelope_keeps_report() {
        // 绑定后立即释放，端口上没有服务
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = smoke_command(Some(format!("http://{addr}")), true, &AppConfig::default()).unwrap_err();
        let output = error_envelope(&err);

        assert_eq!(output["success"], false);
        assert!(output["error"].as_str().unwrap().starts_with("smoke test failed"));
        let outcomes = output["data"]["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), crate::smoke::CHECKS.len());
        assert!(outcomes.iter().all(|o| !o["failures"].as_array().unwrap().is_empty()));
    }

    #[test]
    fn test_error_envelope_without_report() {
        let output = error_envelope(&anyhow::anyhow!("boom"));
        assert_eq!(output, json!({ "success": false, "error": "boom" }));
    }

    #[test]
    fn test_descriptor_command_without_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let err = descriptor_command(dir.path().to_str().unwrap(), false, &AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no WEB-INF/web.xml"));
    }
}
