use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;
use crate::error::JobError;
use crate::sanitize;

/// Longest accepted client-supplied job id. Ids become directory names.
const MAX_JOB_ID_LEN: usize = 128;

/// Body of a job creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub combinations: Vec<Combination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub job_id: Option<String>,
    /// Project name mapped onto `[A-Za-z0-9_-]`.
    pub project: String,
    pub format: OutputFormat,
    pub combinations: Vec<Combination>,
}

impl GenerateRequest {
    pub fn new(project_name: impl Into<String>, combinations: Vec<Combination>) -> Self {
        Self {
            project_name: project_name.into(),
            format: None,
            combinations,
            job_id: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Checks the request without touching any job state.
    pub fn validate(&self, default_format: OutputFormat) -> Result<ValidatedRequest, JobError> {
        let project = sanitize::file_component(&self.project_name)
            .ok_or_else(|| JobError::validation("projectName has no usable characters"))?;

        if self.combinations.is_empty() {
            return Err(JobError::validation("combination list is empty"));
        }
        for (index, combination) in self.combinations.iter().enumerate() {
            if let Some(role) = combination.assets.iter().position(|a| a.trim().is_empty()) {
                return Err(JobError::validation(format!(
                    "combination {} has an empty role{}Asset",
                    index + 1,
                    role + 1
                )));
            }
        }

        let format = match self.format.as_deref() {
            None | Some("") => default_format,
            Some(ext) => OutputFormat::from_extension(ext)
                .ok_or_else(|| JobError::validation(format!("unsupported format '{}'", ext)))?,
        };

        if let Some(job_id) = &self.job_id {
            if !is_valid_job_id(job_id) {
                return Err(JobError::validation(format!("invalid jobId '{}'", job_id)));
            }
        }

        Ok(ValidatedRequest {
            job_id: self.job_id.clone(),
            project,
            format,
            combinations: self.combinations.clone(),
        })
    }
}

/// Client ids are limited to `[A-Za-z0-9_-]` so they are safe as a
/// directory name.
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Ordered triple of asset names: hook, body, call to action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combination {
    pub assets: [String; 3],
}

impl Combination {
    pub fn new(first: impl Into<String>, second: impl Into<String>, third: impl Into<String>) -> Self {
        Self {
            assets: [first.into(), second.into(), third.into()],
        }
    }
}

/// Role keys, each with the alias the upload form used.
const ROLE_KEYS: [(&str, &str); 3] = [
    ("role1Asset", "gancho"),
    ("role2Asset", "corpo"),
    ("role3Asset", "cta"),
];

/// Accepts `{"assets": [a, b, c]}` as well as the role-keyed object form.
impl<'de> Deserialize<'de> for Combination {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_json::Value;

        let value = Value::deserialize(deserializer)?;
        let Value::Object(map) = value else {
            return Err(D::Error::custom("combination must be an object"));
        };

        if let Some(assets) = map.get("assets") {
            let assets: [String; 3] = serde_json::from_value(assets.clone()).map_err(|e| {
                D::Error::custom(format!("assets must list exactly three names: {}", e))
            })?;
            return Ok(Self { assets });
        }

        let mut assets: [String; 3] = Default::default();
        for (slot, (key, alias)) in assets.iter_mut().zip(ROLE_KEYS) {
            let value = map
                .get(key)
                .or_else(|| map.get(alias))
                .ok_or_else(|| D::Error::missing_field(key))?;
            *slot = value
                .as_str()
                .ok_or_else(|| D::Error::custom(format!("{} must be a string", key)))?
                .to_string();
        }
        Ok(Self { assets })
    }
}
