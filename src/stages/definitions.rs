//! 阶段定义
//!
//! 所有阶段在此集中定义，确保单一数据源。
//! 严重级别来自静态风险表: 大多数阶段为 INFO，
//! 反射或未校验操作为 WARNING，可导致任意代码执行的为 ERROR。

use super::{StageDefinition, StepSeverity};

// ============================================================================
// Servlet
// ============================================================================

pub static SERVLET_STAGES: &[StageDefinition] = &[
    StageDefinition {
        name: "class-loading",
        description: "Load servlet class through the web application ClassLoader",
        severity: StepSeverity::Info,
        detail: Some("WebappClassLoader#loadClass"),
    },
    StageDefinition {
        name: "instantiation",
        description: "Instantiate servlet through its reflective no-arg constructor",
        severity: StepSeverity::Warning,
        detail: Some("java.lang.reflect.Constructor#newInstance (unchecked class)"),
    },
    StageDefinition {
        name: "field-injection",
        description: "Populate @Resource / @Inject fields reflectively",
        severity: StepSeverity::Warning,
        detail: Some("java.lang.reflect.Field#set bypasses access checks"),
    },
    StageDefinition {
        name: "session-restore",
        description: "Restore persisted servlet state via ObjectInputStream#readObject",
        severity: StepSeverity::Error,
        detail: Some("untrusted byte stream may trigger a gadget chain"),
    },
    StageDefinition {
        name: "init-callback",
        description: "Invoke init(ServletConfig) lifecycle callback",
        severity: StepSeverity::Info,
        detail: None,
    },
    StageDefinition {
        name: "service-registration",
        description: "Register url-pattern mapping and mark servlet ready for service()",
        severity: StepSeverity::Info,
        detail: None,
    },
];

// ============================================================================
// Filter
// ============================================================================

pub static FILTER_STAGES: &[StageDefinition] = &[
    StageDefinition {
        name: "class-loading",
        description: "Load filter class through the web application ClassLoader",
        severity: StepSeverity::Info,
        detail: Some("WebappClassLoader#loadClass"),
    },
    StageDefinition {
        name: "chain-registration",
        description: "Register filter in the FilterChain for its url-pattern / dispatcher types",
        severity: StepSeverity::Info,
        detail: None,
    },
    StageDefinition {
        name: "config-injection",
        description: "Inject FilterConfig init-params without validation",
        severity: StepSeverity::Warning,
        detail: Some("FilterConfig#getInitParameter values used as-is"),
    },
    StageDefinition {
        name: "dofilter-setup",
        description: "Wrap request/response for doFilter, accepting unvalidated input",
        severity: StepSeverity::Warning,
        detail: Some("HttpServletRequestWrapper exposes raw parameters"),
    },
    StageDefinition {
        name: "init-callback",
        description: "Invoke init(FilterConfig) lifecycle callback",
        severity: StepSeverity::Info,
        detail: None,
    },
];

// ============================================================================
// Listener
// ============================================================================

pub static LISTENER_STAGES: &[StageDefinition] = &[
    StageDefinition {
        name: "class-loading",
        description: "Load listener class through the web application ClassLoader",
        severity: StepSeverity::Info,
        detail: Some("WebappClassLoader#loadClass"),
    },
    StageDefinition {
        name: "event-registration",
        description: "Register listener for context / session / request events",
        severity: StepSeverity::Info,
        detail: None,
    },
    StageDefinition {
        name: "attribute-binding",
        description: "Bind session attributes restored from the session store",
        severity: StepSeverity::Warning,
        detail: Some("HttpSessionBindingListener#valueBound on restored objects"),
    },
    StageDefinition {
        name: "callback-dispatch",
        description: "Dispatch sessionDidActivate on deserialized attribute objects",
        severity: StepSeverity::Error,
        detail: Some("HttpSessionActivationListener runs attacker-controlled code paths"),
    },
    StageDefinition {
        name: "context-initialized",
        description: "Invoke contextInitialized(ServletContextEvent) callback",
        severity: StepSeverity::Info,
        detail: None,
    },
];
