// ============================================================================
// Servlet Trace - Library Interface
// ============================================================================
//
// Web 组件反序列化追踪器: 模拟 Servlet / Filter / Listener 的
// 反序列化与初始化阶段，并给出启发式安全评分。
// The binary (main.rs) drives these modules through `cli`.

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod report;
pub mod server;
pub mod smoke;
pub mod stages;
pub mod tracer;

pub use error::{ConfigError, TraceError};
pub use tracer::{
    trace_all, CombinedTrace, ComponentKind, DeserializationTracer, ExecutionStep, FilterTracer, ListenerTracer,
    RiskLevel, ScoringPolicy, SecurityAssessment, ServletTracer, TraceResult, TraceTarget,
};
