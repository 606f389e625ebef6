use crate::cluster::{ClusterData, Master, RepGroup};
use crate::error::{HodgeError, Result};
use crate::group::MasterSource;
use std::collections::BTreeMap;

/// libpq connection options for a replication group's master.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams(BTreeMap<String, String>);

impl ConnectionParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Render as a libpq keyword/value connection string.
    pub fn to_connstr(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}={}", key, quote_conn_value(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_conn_value(value: &str) -> String {
    let needs_quotes =
        value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Superuser connection options for `master`. Trust clusters never carry a password.
pub fn superuser_connection_params(cldata: &ClusterData, master: &Master) -> ConnectionParams {
    let mut params = BTreeMap::from([
        ("user".to_string(), cldata.pg_su_username.clone()),
        ("dbname".to_string(), "postgres".to_string()),
        ("host".to_string(), master.listen_address.clone()),
        ("port".to_string(), master.port.clone()),
    ]);
    if cldata.su_password_required() {
        params.insert("password".to_string(), cldata.pg_su_password.clone());
    }
    ConnectionParams(params)
}

pub async fn resolve_superuser_connection(
    masters: &dyn MasterSource,
    rgid: i32,
    rg: &RepGroup,
    cldata: &ClusterData,
) -> Result<ConnectionParams> {
    let master = masters
        .get_master(rgid, rg)
        .await?
        .ok_or(HodgeError::NoMaster(rgid))?;

    Ok(superuser_connection_params(cldata, &master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticMasters(Option<Master>);

    #[async_trait]
    impl MasterSource for StaticMasters {
        async fn get_master(&self, _rgid: i32, _rg: &RepGroup) -> Result<Option<Master>> {
            Ok(self.0.clone())
        }
    }

    fn master() -> Master {
        Master {
            listen_address: "10.0.0.5".to_string(),
            port: "5433".to_string(),
        }
    }

    fn cluster_data(auth_method: &str) -> ClusterData {
        ClusterData {
            pg_su_username: "postgres".to_string(),
            pg_su_password: "s3cret".to_string(),
            pg_su_auth_method: auth_method.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_trust_omits_password() {
        let masters = StaticMasters(Some(master()));
        let params =
            resolve_superuser_connection(&masters, 1, &RepGroup::default(), &cluster_data("trust"))
                .await
                .unwrap();

        assert!(!params.contains("password"));
        assert_eq!(params.get("user"), Some("postgres"));
        assert_eq!(params.get("dbname"), Some("postgres"));
        assert_eq!(params.get("host"), Some("10.0.0.5"));
        assert_eq!(params.get("port"), Some("5433"));
    }

    #[tokio::test]
    async fn test_password_included_otherwise() {
        let masters = StaticMasters(Some(master()));
        let params =
            resolve_superuser_connection(&masters, 1, &RepGroup::default(), &cluster_data("md5"))
                .await
                .unwrap();
        assert_eq!(params.get("password"), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_no_master() {
        let err = resolve_superuser_connection(
            &StaticMasters(None),
            4,
            &RepGroup::default(),
            &cluster_data("md5"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HodgeError::NoMaster(4)));
    }

    #[test]
    fn test_connstr_quoting() {
        let mut cldata = cluster_data("md5");
        cldata.pg_su_password = "it's a pass\\word".to_string();

        let connstr = superuser_connection_params(&cldata, &master()).to_connstr();
        assert_eq!(
            connstr,
            "dbname=postgres host=10.0.0.5 password='it\\'s a pass\\\\word' port=5433 user=postgres"
        );
    }
}
