use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::process::Command;

use super::NodeProvisioner;
use crate::config::ProvisionerSettings;
use crate::membership::types::NodeId;

const NAME_PLACEHOLDER: &str = "{name}";

/// Provisions nodes by running external commands (e.g. `docker run ... {name}`).
///
/// Without a spawn command the provisioner only derives addresses, which suits
/// backends whose lifecycle is managed elsewhere.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    address_template: String,
    spawn_command: Option<Vec<String>>,
    stop_command: Option<Vec<String>>,
}

impl CommandProvisioner {
    pub fn new(settings: &ProvisionerSettings) -> Self {
        Self {
            address_template: settings.address_template.clone(),
            spawn_command: settings.spawn_command.clone(),
            stop_command: settings.stop_command.clone(),
        }
    }

    pub fn address_for(&self, name: &NodeId) -> String {
        self.address_template.replace(NAME_PLACEHOLDER, name.as_str())
    }

    async fn run(&self, template: &[String], name: &NodeId) -> Result<()> {
        let argv: Vec<String> = template
            .iter()
            .map(|arg| arg.replace(NAME_PLACEHOLDER, name.as_str()))
            .collect();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("command template is empty"))?;

        tracing::debug!("Running {:?} for {}", argv, name);

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{}` exited with {}: {}", program, output.status, stderr.trim());
        }

        Ok(())
    }
}

#[async_trait]
impl NodeProvisioner for CommandProvisioner {
    async fn provision(&self, name: &NodeId) -> Result<String> {
        if let Some(command) = &self.spawn_command {
            self.run(command, name).await?;
            tracing::info!("Started backend {}", name);
        }
        Ok(self.address_for(name))
    }

    async fn deprovision(&self, name: &NodeId) -> Result<()> {
        if let Some(command) = &self.stop_command {
            self.run(command, name).await?;
            tracing::info!("Stopped backend {}", name);
        }
        Ok(())
    }
}
