use crate::table::{KEY_HEADER, VALUE_HEADER};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One deserialized API entity with its keys in response order.
pub type ResourceRecord = Map<String, Value>;

/// A renderable region of the dashboard. Each region owns one version token.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Region {
    ClusterInfo,
    Namespaces,
    Nodes,
    PersistentVolumes,
    Pods,
    Events,
    PodDetail,
}

impl Region {
    pub const ALL: [Self; 7] = [
        Self::ClusterInfo,
        Self::Namespaces,
        Self::Nodes,
        Self::PersistentVolumes,
        Self::Pods,
        Self::Events,
        Self::PodDetail,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::ClusterInfo => "Cluster Info",
            Self::Namespaces => "Namespaces",
            Self::Nodes => "Nodes",
            Self::PersistentVolumes => "Persistent Volumes",
            Self::Pods => "Pods",
            Self::Events => "Events",
            Self::PodDetail => "Pod Description",
        }
    }
}

/// A single GET the dashboard knows how to issue.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum FetchRequest {
    ClusterInfo,
    Namespaces,
    Nodes,
    PersistentVolumes,
    Events,
    Pods { namespace: String },
    PodDetail(PodRef),
}

impl FetchRequest {
    pub fn region(&self) -> Region {
        match self {
            Self::ClusterInfo => Region::ClusterInfo,
            Self::Namespaces => Region::Namespaces,
            Self::Nodes => Region::Nodes,
            Self::PersistentVolumes => Region::PersistentVolumes,
            Self::Events => Region::Events,
            Self::Pods { .. } => Region::Pods,
            Self::PodDetail(_) => Region::PodDetail,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::ClusterInfo => "/api/v1/cluster-info".to_string(),
            Self::Namespaces => "/api/v1/namespaces".to_string(),
            Self::Nodes => "/api/v1/nodes".to_string(),
            Self::PersistentVolumes => "/api/v1/persistentvolumes".to_string(),
            Self::Events => "/api/v1/events".to_string(),
            Self::Pods { namespace } => format!("/api/v1/namespaces/{namespace}/pods"),
            Self::PodDetail(pod) => format!("/api/v1/namespaces/{}/pods/{}", pod.namespace, pod.name),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for PodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PodActionKind {
    Restart,
    ScaleToZero,
}

impl PodActionKind {
    /// Action segment of the endpoint path, also used in notices.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::ScaleToZero => "scale",
        }
    }

    pub fn progressive(self) -> &'static str {
        match self {
            Self::Restart => "restarting",
            Self::ScaleToZero => "scaling",
        }
    }

    pub fn outcome(self) -> &'static str {
        match self {
            Self::Restart => "restarted",
            Self::ScaleToZero => "scaled to 0",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodAction {
    pub kind: PodActionKind,
    pub pod: PodRef,
}

impl PodAction {
    pub fn path(&self) -> String {
        format!(
            "/api/v1/namespaces/{}/pods/{}/{}",
            self.pod.namespace,
            self.pod.name,
            self.kind.verb()
        )
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TableRow {
    pub cells: Vec<String>,
    /// Raw values captured for presented columns, keyed by header.
    pub data: BTreeMap<String, String>,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            data: BTreeMap::new(),
        }
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Header row plus stringified rows, derived from one collection or record.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RenderedTable {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl RenderedTable {
    pub fn is_key_value(&self) -> bool {
        self.headers == [KEY_HEADER, VALUE_HEADER]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|candidate| candidate == header)
    }

    pub fn cell(&self, row: usize, header: &str) -> Option<&str> {
        let column = self.column_index(header)?;
        self.rows
            .get(row)
            .and_then(|row| row.cells.get(column))
            .map(String::as_str)
    }

    /// Replaces every cell of `header` with its presented form, keeping the raw cell in `data`.
    pub fn present_column<F>(&mut self, header: &str, present: F)
    where
        F: Fn(&str) -> String,
    {
        let Some(column) = self.column_index(header) else {
            return;
        };

        for row in &mut self.rows {
            let Some(cell) = row.cells.get_mut(column) else {
                continue;
            };
            let raw = std::mem::take(cell);
            *cell = present(&raw);
            row.data.insert(header.to_string(), raw);
        }
    }
}

/// Sections of a pod description, each already rendered.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PodDescription {
    pub name: String,
    pub sections: Vec<(String, RenderedTable)>,
}

impl PodDescription {
    pub fn title(&self) -> String {
        format!("Pod Description for pod: {}", self.name)
    }

    /// Lines the description occupies when laid out: a heading, an optional
    /// column line, the rows and a blank separator per section.
    pub fn line_count(&self) -> usize {
        self.sections
            .iter()
            .map(|(_, table)| 2 + table.rows.len() + usize::from(!table.is_key_value()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FetchRequest, PodAction, PodActionKind, PodDescription, PodRef, Region, RenderedTable,
        TableRow,
    };
    use crate::table::build_key_value_table;

    #[test]
    fn request_paths_follow_the_rest_layout() {
        assert_eq!(FetchRequest::Events.path(), "/api/v1/events");
        assert_eq!(
            FetchRequest::Pods {
                namespace: "kube-system".to_string()
            }
            .path(),
            "/api/v1/namespaces/kube-system/pods"
        );
        assert_eq!(
            FetchRequest::PodDetail(PodRef::new("default", "web-0")).path(),
            "/api/v1/namespaces/default/pods/web-0"
        );
        assert_eq!(
            FetchRequest::PersistentVolumes.region(),
            Region::PersistentVolumes
        );
    }

    #[test]
    fn action_paths_use_kind_endpoint() {
        let action = PodAction {
            kind: PodActionKind::ScaleToZero,
            pod: PodRef::new("ns", "p1"),
        };
        assert_eq!(action.path(), "/api/v1/namespaces/ns/pods/p1/scale");
    }

    #[test]
    fn present_column_keeps_raw_value() {
        let mut table = RenderedTable {
            headers: vec!["reason".to_string(), "timestamp".to_string()],
            rows: vec![TableRow::new(vec![
                "Pulled".to_string(),
                "2024-01-01T00:00:00Z".to_string(),
            ])],
        };

        table.present_column("timestamp", |raw| format!("<{raw}>"));
        table.present_column("missing", |_| "never".to_string());

        assert_eq!(table.cell(0, "timestamp"), Some("<2024-01-01T00:00:00Z>"));
        assert_eq!(table.rows[0].data("timestamp"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(table.cell(0, "reason"), Some("Pulled"));
    }

    #[test]
    fn description_line_count_includes_headings_and_separators() {
        let metadata = serde_json::json!({"name": "web-0", "namespace": "ns"});
        let containers = RenderedTable {
            headers: vec!["name".to_string(), "image".to_string()],
            rows: vec![TableRow::new(vec!["app".to_string(), "nginx".to_string()])],
        };
        let description = PodDescription {
            name: "web-0".to_string(),
            sections: vec![
                (
                    "Metadata".to_string(),
                    build_key_value_table(metadata.as_object().expect("object")),
                ),
                ("Containers".to_string(), containers),
            ],
        };

        // 1 heading + 2 rows + 1 blank, then 1 heading + 1 column line + 1 row + 1 blank.
        assert_eq!(description.line_count(), 8);
    }
}
