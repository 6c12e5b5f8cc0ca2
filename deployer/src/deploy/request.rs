//! Deployment request, stack parameters and tags

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use stack_models::{Parameter, StackRequest, StackStatus, Tag};

use crate::errors::DeployError;

/// Parameter carrying the bundle version
pub const VERSION_PARAM: &str = "Version";

/// Parameter carrying the URL of the folder holding the uploaded templates
pub const TEMPLATE_BASE_URL_PARAM: &str = "TemplateBaseUrl";

/// Everything needed to deploy one bundle to one stack
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub stack_name: String,
    pub template_folder: PathBuf,
    pub main_template: String,
    pub region: String,
    pub bucket: String,
    pub bucket_folder: Option<String>,
    pub parameters: StackParameters,
    pub tags: StackTags,
}

impl DeploymentRequest {
    /// Key prefix under which this request's templates are uploaded
    pub fn upload_prefix(&self, version: &str) -> String {
        let prefix = bucket_prefix(
            self.bucket_folder.as_deref().unwrap_or_default(),
            &self.stack_name,
            version,
        );
        format!("{prefix}/templates")
    }
}

/// Whether a deployment creates a new stack or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Create,
    Update,
}

impl StackOperation {
    /// Pick the operation from whether the stack already exists
    pub fn for_existing(exists: bool) -> Self {
        if exists {
            StackOperation::Update
        } else {
            StackOperation::Create
        }
    }

    /// Terminal status that marks this operation as successful
    pub fn desired_status(&self) -> StackStatus {
        match self {
            StackOperation::Create => StackStatus::CreateComplete,
            StackOperation::Update => StackStatus::UpdateComplete,
        }
    }
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackOperation::Create => f.write_str("create"),
            StackOperation::Update => f.write_str("update"),
        }
    }
}

/// Stack parameters, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackParameters(BTreeMap<String, String>);

impl StackParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of these parameters with the reserved version and template base
    /// URL entries set, replacing any caller-supplied values for those keys
    pub fn with_reserved(&self, version: &str, main_template_url: &str) -> Self {
        let mut params = self.clone();
        params.insert(VERSION_PARAM, version);
        params.insert(TEMPLATE_BASE_URL_PARAM, base_url(main_template_url));
        params
    }

    pub fn to_wire(&self) -> Vec<Parameter> {
        self.0
            .iter()
            .map(|(k, v)| Parameter {
                parameter_key: k.clone(),
                parameter_value: v.clone(),
            })
            .collect()
    }
}

impl FromStr for StackParameters {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key_values(s).map(Self)
    }
}

/// Stack tags, keyed by tag name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTags(BTreeMap<String, String>);

impl StackTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_wire(&self) -> Vec<Tag> {
        self.0
            .iter()
            .map(|(k, v)| Tag {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }
}

impl FromStr for StackTags {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key_values(s).map(Self)
    }
}

/// Parse `k1=v1,k2=v2`. Whitespace around keys and values is trimmed and
/// the empty string is the empty map.
pub fn parse_key_values(s: &str) -> Result<BTreeMap<String, String>, DeployError> {
    let mut map = BTreeMap::new();

    if s.is_empty() {
        return Ok(map);
    }

    for pair in s.split(',') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => return Err(DeployError::MalformedPair(pair.to_string())),
        }
    }

    Ok(map)
}

/// Join the bucket folder, stack name and version into a key prefix,
/// skipping empty segments
pub fn bucket_prefix(bucket_folder: &str, stack_name: &str, version: &str) -> String {
    [bucket_folder, stack_name, version]
        .iter()
        .flat_map(|segment| segment.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Everything up to and including the last `/` of `url`
pub fn base_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) => &url[..=i],
        None => "",
    }
}

/// Build the create/update body shared by both operations
pub fn build_stack_request(
    stack_name: &str,
    template_url: &str,
    parameters: &StackParameters,
    tags: &StackTags,
) -> StackRequest {
    StackRequest {
        stack_name: stack_name.to_string(),
        template_url: template_url.to_string(),
        parameters: parameters.to_wire(),
        tags: tags.to_wire(),
        client_request_token: None,
    }
}
