//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::deploy::request::{DeploymentRequest, StackParameters, StackTags};
use crate::errors::DeployError;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Deploy versioned template bundles to a stack orchestration service
#[derive(Debug, Parser)]
#[command(name = "stackdeploy", version, long_version = LONG_VERSION)]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long, global = true, env = "STACKDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy templates
    Deploy(DeployArgs),
}

/// Arguments of the `deploy` command
#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Name of the stack to create or update
    #[arg(short = 'n', long, env = "STACKDEPLOY_STACK_NAME")]
    pub stack_name: String,

    /// Name of the main template, relative to the template folder
    #[arg(short, long, env = "STACKDEPLOY_MAIN", default_value = "Stack.json")]
    pub main: String,

    /// Region to deploy to
    #[arg(short, long, env = "STACKDEPLOY_REGION", default_value = "ap-southeast-2")]
    pub region: String,

    /// Bucket to upload templates to
    #[arg(short, long, env = "STACKDEPLOY_BUCKET")]
    pub bucket: String,

    /// Optional bucket folder to upload templates to
    #[arg(short = 'k', long, env = "STACKDEPLOY_BUCKET_FOLDER")]
    pub bucket_folder: Option<String>,

    /// Stack parameters, in the format ParamOne=ValueOne,ParamTwo=ValueTwo
    #[arg(short, long, env = "STACKDEPLOY_PARAMS", default_value = "")]
    pub params: String,

    /// Stack tags, in the format TagOne=ValueOne,TagTwo=ValueTwo
    #[arg(short, long, env = "STACKDEPLOY_TAGS", default_value = "")]
    pub tags: String,

    /// Do not stream stack events while waiting
    #[arg(long, env = "STACKDEPLOY_NO_EVENTS")]
    pub no_events: bool,

    /// Folder holding the template bundle
    pub template_folder: PathBuf,
}

impl DeployArgs {
    /// Build the deployment request, failing on malformed parameters or tags
    pub fn to_request(&self) -> Result<DeploymentRequest, DeployError> {
        let parameters: StackParameters = self.params.parse()?;
        let tags: StackTags = self.tags.parse()?;

        Ok(DeploymentRequest {
            stack_name: self.stack_name.clone(),
            template_folder: self.template_folder.clone(),
            main_template: self.main.clone(),
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            bucket_folder: self.bucket_folder.clone().filter(|f| !f.is_empty()),
            parameters,
            tags,
        })
    }
}
