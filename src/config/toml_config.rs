use crate::adapters::directory::StaticOwnershipDirectory;
use crate::domain::model::{MailroomId, OrganizationId};
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_positive_number, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub engine: EngineSection,
    #[serde(default)]
    pub organizations: Vec<OrganizationConfig>,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub id: String,
    #[serde(default)]
    pub mailrooms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EngineError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EngineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the environment value; unknown vars stay as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EngineError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("engine.name", &self.engine.name)?;
        validate_positive_number(
            "notifications.channel_capacity",
            self.notifications.channel_capacity,
            1,
        )?;

        let mut seen_orgs = HashSet::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for org in &self.organizations {
            validate_identifier("organizations.id", &org.id)?;
            if !seen_orgs.insert(org.id.as_str()) {
                return Err(EngineError::InvalidConfigValueError {
                    field: "organizations.id".to_string(),
                    value: org.id.clone(),
                    reason: "Duplicate organization".to_string(),
                });
            }

            for mailroom in &org.mailrooms {
                validate_identifier("organizations.mailrooms", mailroom)?;
                if let Some(owner) = owners.insert(mailroom.as_str(), org.id.as_str()) {
                    return Err(EngineError::InvalidConfigValueError {
                        field: "organizations.mailrooms".to_string(),
                        value: mailroom.clone(),
                        reason: format!("Mailroom already belongs to organization {}", owner),
                    });
                }
            }
        }

        Ok(())
    }

    /// Every configured (organization, mailroom) pair.
    pub fn mailrooms(&self) -> Vec<(OrganizationId, MailroomId)> {
        self.organizations
            .iter()
            .flat_map(|org| {
                let owner = OrganizationId::new(org.id.as_str());
                org.mailrooms
                    .iter()
                    .map(move |m| (owner.clone(), MailroomId::new(m.as_str())))
            })
            .collect()
    }

    pub fn ownership_directory(&self) -> StaticOwnershipDirectory {
        let mut directory = StaticOwnershipDirectory::new();
        for (organization, mailroom) in self.mailrooms() {
            directory.grant(organization, mailroom);
        }
        directory
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.enabled
    }

    pub fn channel_capacity(&self) -> usize {
        self.notifications.channel_capacity
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
