// ============================================================================
// 部署描述符 (WEB-INF/web.xml) - 发现已声明的组件
// ============================================================================
//
// 解析 <servlet>, <filter>, <listener> 声明，并按组件类型运行追踪器。
// 只读取声明本身，不加载或检查任何类。

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::TraceError;
use crate::tracer::{ComponentKind, DeserializationTracer, ScoringPolicy, TraceResult};

/// web.xml 中声明的组件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredComponent {
    pub kind: ComponentKind,
    /// `<servlet-name>` / `<filter-name>`; listeners have none
    pub name: Option<String>,
    pub class_name: String,
}

impl DeclaredComponent {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.class_name),
            None => self.class_name.clone(),
        }
    }
}

/// Helper struct for building DeclaredComponent during parsing
struct PartialComponent {
    kind: ComponentKind,
    name: Option<String>,
    class_name: Option<String>,
}

impl PartialComponent {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: None,
            class_name: None,
        }
    }

    fn assign(&mut self, element: &str, text: &str) {
        match (self.kind, element) {
            (ComponentKind::Servlet, "servlet-name") | (ComponentKind::Filter, "filter-name") => {
                self.name = Some(text.to_string());
            }
            (ComponentKind::Servlet, "servlet-class")
            | (ComponentKind::Filter, "filter-class")
            | (ComponentKind::Listener, "listener-class") => {
                self.class_name = Some(text.to_string());
            }
            (ComponentKind::Servlet, "jsp-file") if self.class_name.is_none() => {
                self.class_name = Some(text.to_string());
            }
            _ => {}
        }
    }

    fn into_component(self) -> Result<DeclaredComponent, TraceError> {
        let Some(class_name) = self.class_name else {
            return Err(missing_class(self.kind, self.name.as_deref()));
        };

        Ok(DeclaredComponent {
            kind: self.kind,
            name: self.name,
            class_name,
        })
    }
}

fn missing_class(kind: ComponentKind, name: Option<&str>) -> TraceError {
    TraceError::MalformedInput(format!(
        "<{}> declaration{} without <{}-class>",
        kind,
        name.map(|n| format!(" '{n}'")).unwrap_or_default(),
        kind
    ))
}

fn declaration_kind(element: &str) -> Option<ComponentKind> {
    match element {
        "servlet" => Some(ComponentKind::Servlet),
        "filter" => Some(ComponentKind::Filter),
        "listener" => Some(ComponentKind::Listener),
        _ => None,
    }
}

/// Parse web.xml content and extract servlet, filter and listener declarations
///
/// - `<servlet-mapping>` / `<filter-mapping>` are ignored
/// - A `<servlet>` backed by `<jsp-file>` uses the JSP path as its class name
/// - A declaration without its class element is `MalformedInput`
pub fn parse_web_xml(content: &str) -> Result<Vec<DeclaredComponent>, TraceError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut components = Vec::new();
    let mut buf = Vec::new();

    let mut current: Option<PartialComponent> = None;
    // 当前子元素及其累积文本 (Text / CData 可能被注释拆成多段)
    let mut current_element: Option<String> = None;
    let mut element_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if current.is_none() {
                    if let Some(kind) = declaration_kind(&name) {
                        current = Some(PartialComponent::new(kind));
                    }
                } else {
                    current_element = Some(name);
                    element_text.clear();
                }
            }
            Ok(Event::Empty(ref e)) => {
                // <listener/> 等自闭合声明没有 class 元素
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if current.is_none() {
                    if let Some(kind) = declaration_kind(&name) {
                        return Err(missing_class(kind, None));
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if let Some(partial) = current.as_mut() {
                    if current_element.as_deref() == Some(name.as_str()) {
                        partial.assign(&name, element_text.trim());
                    }
                }

                let closes_current = current
                    .as_ref()
                    .is_some_and(|c| declaration_kind(&name) == Some(c.kind));
                if closes_current {
                    if let Some(partial) = current.take() {
                        let component = partial.into_component()?;
                        debug!(kind = %component.kind, class = %component.class_name, "declared component");
                        components.push(component);
                    }
                }
                current_element = None;
                element_text.clear();
            }
            Ok(Event::Text(ref e)) => {
                if current_element.is_some() {
                    let text = e.unescape().map_err(|e| TraceError::MalformedInput(e.to_string()))?;
                    element_text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if current_element.is_some() {
                    let raw: &[u8] = e;
                    let text = std::str::from_utf8(raw).map_err(|e| TraceError::MalformedInput(e.to_string()))?;
                    element_text.push_str(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TraceError::MalformedInput(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(partial) = current {
        return Err(TraceError::MalformedInput(format!(
            "unexpected end of descriptor inside <{}>",
            partial.kind
        )));
    }

    Ok(components)
}

/// 递归查找 `WEB-INF/web.xml`
pub fn find_descriptors(root: &Path) -> Result<Vec<PathBuf>, TraceError> {
    if !root.exists() {
        return Err(TraceError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "path not found"),
        });
    }

    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == "web.xml")
        .filter(|e| {
            e.path()
                .parent()
                .and_then(|p| p.file_name())
                .is_some_and(|dir| dir == "WEB-INF")
        })
        .map(|e| e.into_path())
        .collect();

    found.sort();
    Ok(found)
}

/// 追踪单个声明的组件，结果带上组件名称
pub fn trace_declared(component: &DeclaredComponent, policy: &ScoringPolicy) -> TraceResult {
    DeserializationTracer::with_policy(component.kind, *policy)
        .trace()
        .with_component_name(component.label())
}

/// 一个描述符文件的追踪结果
#[derive(Debug, Clone)]
pub struct DescriptorTrace {
    pub path: PathBuf,
    pub results: Vec<TraceResult>,
}

pub fn trace_descriptor_file(path: &Path, policy: &ScoringPolicy) -> Result<DescriptorTrace, TraceError> {
    let content = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let components = parse_web_xml(&content)?;
    if components.is_empty() {
        warn!(path = %path.display(), "descriptor declares no components");
    }

    let results = components.iter().map(|c| trace_declared(c, policy)).collect();
    Ok(DescriptorTrace {
        path: path.to_path_buf(),
        results,
    })
}
