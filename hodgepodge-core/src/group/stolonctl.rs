use super::GroupSpecUpdater;
use crate::cluster::{RepGroup, StolonSpec};
use crate::error::{HodgeError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Applies specs by running `stolonctl update` against the group's store.
#[derive(Debug, Clone)]
pub struct StolonctlUpdater {
    binary: PathBuf,
}

impl StolonctlUpdater {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn update_args(rg: &RepGroup, patch: bool) -> Vec<String> {
        let mut args = vec![
            "--cluster-name".to_string(),
            rg.stolon_name.clone(),
            "--store-backend".to_string(),
            rg.store_backend_or_default().to_string(),
            "--store-endpoints".to_string(),
            rg.store_endpoints.clone(),
        ];

        if let Some(prefix) = rg.store_prefix.as_deref().filter(|p| !p.trim().is_empty()) {
            args.push("--store-prefix".to_string());
            args.push(prefix.to_string());
        }

        args.push("update".to_string());
        if patch {
            args.push("--patch".to_string());
        }
        args.push("-f".to_string());
        args.push("-".to_string());
        args
    }
}

impl Default for StolonctlUpdater {
    fn default() -> Self {
        Self::new("stolonctl")
    }
}

#[async_trait]
impl GroupSpecUpdater for StolonctlUpdater {
    async fn apply_spec(
        &self,
        rgid: i32,
        rg: &RepGroup,
        patch: bool,
        spec: &StolonSpec,
    ) -> Result<()> {
        let payload = serde_json::to_vec(spec)?;
        let args = Self::update_args(rg, patch);
        tracing::debug!(
            "running stolonctl update: rgid={} binary={:?} args={:?}",
            rgid,
            self.binary,
            args
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        // feed stdin while draining output so neither side blocks the other
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HodgeError::GroupCommand(format!(
                "stolonctl update for '{}' exited with {}: {}",
                rg.stolon_name,
                output.status,
                stderr.trim()
            )));
        }

        match fed {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!(
                    "stolonctl closed stdin early for '{}': {}",
                    rg.stolon_name,
                    error
                );
            }
            Err(error) => return Err(error.into()),
        }

        Ok(())
    }
}
