use crate::spec::{MergeSchema, StrategicMerge};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const AUTH_METHOD_TRUST: &str = "trust";

/// Global cluster document.
///
/// Field names follow the layout the control plane writes. Fields this
/// crate does not know about are carried in `extra` and written back as-is.
/// Decode from bytes (or [`crate::spec::decode_value`]), not `from_value`:
/// flattened fields cannot buffer 128-bit integers taken from a `Value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterData {
    pub format_version: u32,
    pub replicas: u32,
    pub pg_su_username: String,
    pub pg_su_password: String,
    pub pg_su_auth_method: String,
    pub pg_repl_username: String,
    pub pg_repl_password: String,
    pub pg_repl_auth_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stolon_spec: Option<StolonSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClusterData {
    pub fn su_password_required(&self) -> bool {
        self.pg_su_auth_method != AUTH_METHOD_TRUST
    }
}

/// Coordinates of one replication group's own stolon store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RepGroup {
    pub stolon_name: String,
    pub store_endpoints: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_backend: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepGroup {
    pub fn store_backend_or_default(&self) -> &str {
        self.store_backend
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("etcdv3")
    }
}

/// Current leader of a replication group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Master {
    pub listen_address: String,
    pub port: String,
}

pub type RepGroups = BTreeMap<i32, RepGroup>;
pub type Masters = BTreeMap<i32, Master>;

/// Stolon cluster specification. Every field may be unset, meaning the
/// group keeps its own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StolonSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_keeper_removal_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_standbys: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_standbys_per_sender: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_standby_lag: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronous_replication: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_synchronous_standbys: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_synchronous_standbys: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_wal_senders: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_master_replication_slots: Option<Vec<String>>,
    #[serde(default, rename = "usePgrewind", skip_serializing_if = "Option::is_none")]
    pub use_pg_rewind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_pg_parameters: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(
        default,
        rename = "defaultSUReplAccessMode",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_su_repl_access_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_pg_restart: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_parameters: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "pgHBA", skip_serializing_if = "Option::is_none")]
    pub pg_hba: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StrategicMerge for StolonSpec {
    fn merge_schema() -> MergeSchema {
        MergeSchema::new()
            .replace("pgHBA")
            .replace("additionalMasterReplicationSlots")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::patch_typed;
    use serde_json::json;

    #[test]
    fn test_cluster_data_layout() {
        let raw = json!({
            "FormatVersion": 1,
            "PgSuUsername": "postgres",
            "PgSuPassword": "secret",
            "PgSuAuthMethod": "md5",
            "StolonSpec": {"initMode": "new", "pgParameters": {"max_connections": "200"}},
            "Ladle": {"PlacementPolicy": "clustered"}
        });

        let cldata: ClusterData = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(cldata.pg_su_username, "postgres");
        assert!(cldata.su_password_required());
        let spec = cldata.stolon_spec.as_ref().unwrap();
        assert_eq!(spec.init_mode.as_deref(), Some("new"));
        assert!(cldata.extra.contains_key("Ladle"));

        let encoded = serde_json::to_value(&cldata).unwrap();
        assert_eq!(encoded["Ladle"], raw["Ladle"]);
        assert_eq!(encoded["StolonSpec"], raw["StolonSpec"]);
    }

    #[test]
    fn test_stolon_spec_keeps_unknown_fields_verbatim() {
        let raw = br#"{"initMode":"new","big":123456789012345678901234567890,"zKnob":{"z":1,"a":2},"ratio":0.10}"#;
        let base: StolonSpec = serde_json::from_slice(raw).unwrap();

        let patched = patch_typed(&base, &json!({"maxStandbys": 2})).unwrap();
        let encoded = String::from_utf8(serde_json::to_vec(&patched).unwrap()).unwrap();

        assert_eq!(
            encoded,
            r#"{"maxStandbys":2,"initMode":"new","big":123456789012345678901234567890,"zKnob":{"z":1,"a":2},"ratio":0.10}"#
        );
    }

    #[test]
    fn test_empty_document_is_valid() {
        let cldata: ClusterData = serde_json::from_str("{}").unwrap();
        assert_eq!(cldata, ClusterData::default());
    }

    #[test]
    fn test_rep_groups_use_numeric_keys() {
        let raw = r#"{"2":{"StolonName":"s2","StoreEndpoints":"http://e2:2379"},
                      "1":{"StolonName":"s1","StoreEndpoints":"http://e1:2379"}}"#;
        let groups: RepGroups = serde_json::from_str(raw).unwrap();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(groups[&1].store_backend_or_default(), "etcdv3");
    }

    #[test]
    fn test_patch_stolon_spec() {
        let base = StolonSpec {
            init_mode: Some("new".to_string()),
            synchronous_replication: Some(true),
            pg_hba: Some(vec!["host all all 0.0.0.0/0 md5".to_string()]),
            pg_parameters: Some(BTreeMap::from([
                ("max_connections".to_string(), "100".to_string()),
                ("work_mem".to_string(), "4MB".to_string()),
            ])),
            ..Default::default()
        };

        let patched = patch_typed(
            &base,
            &json!({
                "synchronousReplication": null,
                "pgParameters": {"work_mem": "8MB"},
                "pgHBA": ["local all all trust"]
            }),
        )
        .unwrap();

        assert_eq!(patched.init_mode.as_deref(), Some("new"));
        assert_eq!(patched.synchronous_replication, None);
        assert_eq!(patched.pg_hba, Some(vec!["local all all trust".to_string()]));
        let params = patched.pg_parameters.unwrap();
        assert_eq!(params["max_connections"], "100");
        assert_eq!(params["work_mem"], "8MB");
    }
}
