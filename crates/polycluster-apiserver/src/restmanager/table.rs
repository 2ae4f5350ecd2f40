//! Table rendering for `Accept: application/json;as=Table` requests.

use chrono::{DateTime, Utc};
use polycluster_kernel::apis::{GroupResource, ResourceScheme, extract_cluster_name};
use serde::Serialize;
use serde_json::{Value, json};

pub const TABLE_KIND: &str = "Table";
pub const TABLE_API_VERSION: &str = "meta.k8s.io/v1";

/// Built-in resources that keep the generic name/age table even though their
/// group is registered.
const DEFAULT_TABLE_RESOURCES: &[(&str, &str)] = &[
    ("", "limitranges"),
    ("rbac.authorization.k8s.io", "roles"),
    ("rbac.authorization.k8s.io", "clusterroles"),
    ("storage.k8s.io", "csistoragecapacities"),
];

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub format: String,
    pub description: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<Value>,
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub metadata: Value,
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Columns
// ─────────────────────────────────────────────────────────────────────────────

/// How a cell value is taken from an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Name,
    Age,
    /// JSON pointer into the object; `<none>` when absent.
    Field(&'static str),
    /// `ready/total`, both JSON pointers, missing counts as 0.
    Ratio(&'static str, &'static str),
    ReadyContainers,
    Restarts,
    PodStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    name: &'static str,
    type_: &'static str,
    format: &'static str,
    description: &'static str,
    cell: Cell,
}

const fn column(name: &'static str, type_: &'static str, cell: Cell) -> Column {
    Column {
        name,
        type_,
        format: "",
        description: "",
        cell,
    }
}

const NAME: Column = Column {
    format: "name",
    description: "Name must be unique within a namespace.",
    ..column("Name", "string", Cell::Name)
};
const AGE: Column = Column {
    description: "CreationTimestamp is a timestamp representing the server time when this object was created.",
    ..column("Age", "string", Cell::Age)
};

const DEFAULT_COLUMNS: &[Column] = &[NAME, AGE];

const POD_COLUMNS: &[Column] = &[
    NAME,
    column("Ready", "string", Cell::ReadyContainers),
    column("Status", "string", Cell::PodStatus),
    column("Restarts", "string", Cell::Restarts),
    AGE,
];
const DEPLOYMENT_COLUMNS: &[Column] = &[
    NAME,
    column("Ready", "string", Cell::Ratio("/status/readyReplicas", "/spec/replicas")),
    column("Up-to-date", "integer", Cell::Field("/status/updatedReplicas")),
    column("Available", "integer", Cell::Field("/status/availableReplicas")),
    AGE,
];
const STATEFULSET_COLUMNS: &[Column] = &[
    NAME,
    column("Ready", "string", Cell::Ratio("/status/readyReplicas", "/spec/replicas")),
    AGE,
];
const REPLICASET_COLUMNS: &[Column] = &[
    NAME,
    column("Desired", "integer", Cell::Field("/spec/replicas")),
    column("Current", "integer", Cell::Field("/status/replicas")),
    column("Ready", "integer", Cell::Field("/status/readyReplicas")),
    AGE,
];
const DAEMONSET_COLUMNS: &[Column] = &[
    NAME,
    column("Desired", "integer", Cell::Field("/status/desiredNumberScheduled")),
    column("Current", "integer", Cell::Field("/status/currentNumberScheduled")),
    column("Ready", "integer", Cell::Field("/status/numberReady")),
    AGE,
];
const JOB_COLUMNS: &[Column] = &[
    NAME,
    column("Completions", "string", Cell::Ratio("/status/succeeded", "/spec/completions")),
    AGE,
];
const SERVICE_COLUMNS: &[Column] = &[
    NAME,
    column("Type", "string", Cell::Field("/spec/type")),
    column("Cluster-IP", "string", Cell::Field("/spec/clusterIP")),
    AGE,
];
const NAMESPACE_COLUMNS: &[Column] = &[
    NAME,
    column("Status", "string", Cell::Field("/status/phase")),
    AGE,
];
const NODE_COLUMNS: &[Column] = &[
    NAME,
    column("Version", "string", Cell::Field("/status/nodeInfo/kubeletVersion")),
    AGE,
];

fn type_specific_columns(gr: &GroupResource) -> &'static [Column] {
    match (gr.group.as_str(), gr.resource.as_str()) {
        ("", "pods") => POD_COLUMNS,
        ("", "services") => SERVICE_COLUMNS,
        ("", "namespaces") => NAMESPACE_COLUMNS,
        ("", "nodes") => NODE_COLUMNS,
        ("apps", "deployments") => DEPLOYMENT_COLUMNS,
        ("apps", "statefulsets") => STATEFULSET_COLUMNS,
        ("apps", "replicasets") => REPLICASET_COLUMNS,
        ("apps", "daemonsets") => DAEMONSET_COLUMNS,
        ("batch", "jobs") => JOB_COLUMNS,
        _ => DEFAULT_COLUMNS,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TableConvertor
// ─────────────────────────────────────────────────────────────────────────────

/// Table strategy of one resource, fixed when its binding is wired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableConvertor {
    /// Name and age only.
    Default { resource: GroupResource },
    /// Resource-specific columns.
    TypeSpecific {
        resource: GroupResource,
        columns: &'static [Column],
    },
}

impl TableConvertor {
    pub fn for_resource(gr: &GroupResource, scheme: &dyn ResourceScheme) -> Self {
        let denied = DEFAULT_TABLE_RESOURCES
            .iter()
            .any(|(group, resource)| gr.group == *group && gr.resource == *resource);
        if !scheme.is_group_registered(&gr.group) || denied {
            return Self::Default {
                resource: gr.clone(),
            };
        }
        Self::TypeSpecific {
            resource: gr.clone(),
            columns: type_specific_columns(gr),
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default { .. })
    }

    fn columns(&self) -> &'static [Column] {
        match self {
            Self::Default { .. } => DEFAULT_COLUMNS,
            Self::TypeSpecific { columns, .. } => *columns,
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.name).collect()
    }

    /// Render `objects`.  Unscoped requests span several clusters and get a
    /// leading `Cluster` column.
    pub fn convert_to_table(&self, objects: &[Value], with_cluster: bool) -> Table {
        self.convert_to_table_at(objects, with_cluster, Utc::now())
    }

    pub(crate) fn convert_to_table_at(
        &self,
        objects: &[Value],
        with_cluster: bool,
        now: DateTime<Utc>,
    ) -> Table {
        let columns = self.columns();

        let mut column_definitions = Vec::with_capacity(columns.len() + 1);
        if with_cluster {
            column_definitions.push(TableColumnDefinition {
                name: "Cluster".to_string(),
                type_: "string".to_string(),
                format: String::new(),
                description: "Cluster the object was collected from.".to_string(),
                priority: 0,
            });
        }
        column_definitions.extend(columns.iter().map(|c| TableColumnDefinition {
            name: c.name.to_string(),
            type_: c.type_.to_string(),
            format: c.format.to_string(),
            description: c.description.to_string(),
            priority: 0,
        }));

        let rows = objects
            .iter()
            .map(|object| {
                let mut cells = Vec::with_capacity(column_definitions.len());
                if with_cluster {
                    cells.push(Value::String(extract_cluster_name(object).to_string()));
                }
                cells.extend(columns.iter().map(|c| cell_value(c.cell, object, now)));
                TableRow {
                    cells,
                    object: partial_object_metadata(object),
                }
            })
            .collect();

        Table {
            metadata: json!({}),
            column_definitions,
            rows,
        }
    }
}

fn partial_object_metadata(object: &Value) -> Value {
    json!({
        "kind": "PartialObjectMetadata",
        "apiVersion": TABLE_API_VERSION,
        "metadata": object.get("metadata").cloned().unwrap_or_else(|| json!({})),
    })
}

fn cell_value(cell: Cell, object: &Value, now: DateTime<Utc>) -> Value {
    match cell {
        Cell::Name => object
            .pointer("/metadata/name")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
        Cell::Age => Value::String(age(object, now)),
        Cell::Field(pointer) => match object.pointer(pointer) {
            Some(Value::Null) | None => Value::String("<none>".to_string()),
            Some(value) => value.clone(),
        },
        Cell::Ratio(ready, total) => {
            let count = |p: &str| object.pointer(p).and_then(Value::as_i64).unwrap_or(0);
            Value::String(format!("{}/{}", count(ready), count(total)))
        }
        Cell::ReadyContainers => {
            let total = object
                .pointer("/spec/containers")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            let ready = container_statuses(object)
                .filter(|s| s.get("ready").and_then(Value::as_bool) == Some(true))
                .count();
            Value::String(format!("{ready}/{total}"))
        }
        Cell::Restarts => {
            let restarts: i64 = container_statuses(object)
                .filter_map(|s| s.get("restartCount").and_then(Value::as_i64))
                .sum();
            Value::from(restarts)
        }
        Cell::PodStatus => {
            let status = object
                .pointer("/metadata/deletionTimestamp")
                .map(|_| "Terminating")
                .or_else(|| object.pointer("/status/reason").and_then(Value::as_str))
                .or_else(|| object.pointer("/status/phase").and_then(Value::as_str))
                .unwrap_or("Unknown");
            Value::String(status.to_string())
        }
    }
}

fn container_statuses(object: &Value) -> impl Iterator<Item = &Value> {
    object
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn age(object: &Value, now: DateTime<Utc>) -> String {
    object
        .pointer("/metadata/creationTimestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|created| human_duration(now.signed_duration_since(created.with_timezone(&Utc))))
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// Short human form, as `kubectl get` prints ages.
fn human_duration(d: chrono::Duration) -> String {
    let seconds = d.num_seconds();
    if seconds < 0 {
        return "<invalid>".to_string();
    }
    if seconds < 120 {
        return format!("{seconds}s");
    }
    let minutes = d.num_minutes();
    if minutes < 10 {
        let s = seconds % 60;
        return if s == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m{s}s")
        };
    }
    if minutes < 180 {
        return format!("{minutes}m");
    }
    let hours = d.num_hours();
    if hours < 48 {
        return format!("{hours}h");
    }
    format!("{}d", d.num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restmanager::BuiltinResourceScheme;
    use polycluster_kernel::apis::SHADOW_ANNOTATION_CLUSTER_NAME;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn denylisted_and_unregistered_groups_use_default_table() {
        let scheme = BuiltinResourceScheme::new();
        for (group, resource) in DEFAULT_TABLE_RESOURCES {
            let convertor = TableConvertor::for_resource(&GroupResource::new(*group, *resource), &scheme);
            assert!(convertor.is_default(), "{group}/{resource}");
        }
        let crd = TableConvertor::for_resource(&GroupResource::new("example.io", "widgets"), &scheme);
        assert!(crd.is_default());
        assert_eq!(crd.column_names(), vec!["Name", "Age"]);

        let roles = TableConvertor::for_resource(
            &GroupResource::new("rbac.authorization.k8s.io", "roles"),
            &scheme,
        );
        let table = roles.convert_to_table_at(
            &[json!({"metadata": {"name": "reader", "creationTimestamp": "2024-05-10T11:59:18Z"}})],
            false,
            now(),
        );
        assert_eq!(table.column_definitions[1].name, "Age");
        assert_eq!(table.rows[0].cells, vec![json!("reader"), json!("42s")]);

        let pods = TableConvertor::for_resource(&GroupResource::new("", "pods"), &scheme);
        assert!(!pods.is_default());
        assert_eq!(pods.column_names(), vec!["Name", "Ready", "Status", "Restarts", "Age"]);

        let secrets = TableConvertor::for_resource(&GroupResource::new("", "secrets"), &scheme);
        assert_eq!(secrets.column_names(), vec!["Name", "Age"]);
    }

    #[test]
    fn pod_rows_and_cluster_column() {
        let scheme = BuiltinResourceScheme::new();
        let convertor = TableConvertor::for_resource(&GroupResource::new("", "pods"), &scheme);
        let pod = json!({
            "metadata": {
                "name": "web-0",
                "creationTimestamp": "2024-05-10T09:00:00Z",
                "annotations": {(SHADOW_ANNOTATION_CLUSTER_NAME): "east"}
            },
            "spec": {"containers": [{"name": "a"}, {"name": "b"}]},
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"ready": true, "restartCount": 2},
                    {"ready": false, "restartCount": 1}
                ]
            }
        });

        let table = convertor.convert_to_table_at(&[pod.clone()], true, now());
        assert_eq!(table.column_definitions[0].name, "Cluster");
        assert_eq!(
            table.rows[0].cells,
            vec![json!("east"), json!("web-0"), json!("1/2"), json!("Running"), json!(3), json!("3h")]
        );
        assert_eq!(table.rows[0].object["kind"], "PartialObjectMetadata");

        let table = convertor.convert_to_table_at(&[pod], false, now());
        assert_eq!(table.column_definitions[0].name, "Name");
        assert_eq!(table.rows[0].cells.len(), 5);
    }

    #[test]
    fn human_durations() {
        assert_eq!(human_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(human_duration(chrono::Duration::seconds(190)), "3m10s");
        assert_eq!(human_duration(chrono::Duration::minutes(45)), "45m");
        assert_eq!(human_duration(chrono::Duration::hours(5)), "5h");
        assert_eq!(human_duration(chrono::Duration::days(9)), "9d");
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let convertor = TableConvertor::TypeSpecific {
            resource: GroupResource::new("", "services"),
            columns: SERVICE_COLUMNS,
        };
        let table = convertor.convert_to_table_at(&[json!({"metadata": {"name": "db"}})], false, now());
        assert_eq!(
            table.rows[0].cells,
            vec![json!("db"), json!("<none>"), json!("<none>"), json!("<unknown>")]
        );
    }
}
