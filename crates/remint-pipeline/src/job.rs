//! Per-version remap jobs.
//!
//! One job is strictly ordered: read the jar, build the hierarchy, run the
//! remap pass(es), restore bridges, rename locals, write the output jar,
//! then write mapping side-data. Jobs for different versions share nothing
//! and run in any order the scheduler finds convenient.

use std::path::PathBuf;

use remint_jar::{JarReader, JarWriter};
use remint_mappings::{
    write_comments_json, write_metadata_json, CombinedMappingTree, MappingFormat, MappingMetadata,
    MappingTree,
};
use remint_net::ProgressSink;
use remint_remap::{remap_class_set, ClassSet, RemapInput, RemapOptions};
use url::Url;

use crate::scheduler::TaskKind;
use crate::{PipelineEnv, PipelineError, Result};

/// The mapping stages of one job, owned so the job can move across threads.
pub enum JobMappings {
    Single(MappingTree),
    Chained(CombinedMappingTree),
}

impl JobMappings {
    fn side_data_tree(&self) -> &MappingTree {
        match self {
            JobMappings::Single(tree) => tree,
            JobMappings::Chained(combined) => combined.named(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemapJob {
    pub provider: String,
    pub version: String,
    pub input_jar: PathBuf,
    pub output_jar: PathBuf,
    /// Target namespace in the (final) mapping tree.
    pub namespace: String,
    pub options: RemapOptions,
    /// Written as `mappings-metadata.json` when present.
    pub metadata: Option<MappingMetadata>,
}

impl RemapJob {
    pub fn log_key(&self) -> String {
        format!("{}/{}", self.provider, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapSummary {
    pub classes: usize,
    pub resources: usize,
}

/// Ensures `dest` holds the artifact at `url`, through the at-most-once
/// download coordinator.
pub async fn fetch_artifact(
    env: &PipelineEnv,
    url: Url,
    dest: PathBuf,
    progress: Option<ProgressSink>,
) -> Result<()> {
    let downloads = env.downloads.clone();
    let token = env.job_token();
    env.scheduler
        .spawn_io(TaskKind::Download, token.clone(), move |token| async move {
            downloads
                .download(url, dest, progress, token)
                .await
                .map_err(PipelineError::from)
        })
        .join()
        .await
}

/// Reads and parses a mapping file, sniffing the format from its contents.
///
/// Proguard text carries no namespace labels of its own, so the caller
/// supplies them (left column first).
pub async fn load_mappings(
    env: &PipelineEnv,
    path: PathBuf,
    proguard_namespaces: (String, String),
) -> Result<MappingTree> {
    let token = env.job_token();
    env.scheduler
        .spawn_compute(TaskKind::ReadMappings, token, move |_token| {
            let contents = std::fs::read_to_string(&path)?;
            let format = MappingFormat::from_contents(&contents).ok_or_else(|| {
                PipelineError::Mapping(remint_mappings::MappingError::Unsupported(format!(
                    "unrecognized mapping format in {}",
                    path.display()
                )))
            })?;
            let tree = match format {
                MappingFormat::TinyV1 | MappingFormat::TinyV2 => {
                    remint_mappings::parse_tiny(&contents)?
                }
                MappingFormat::Proguard => remint_mappings::parse_proguard(
                    &contents,
                    &proguard_namespaces.0,
                    &proguard_namespaces.1,
                )?,
            };
            Ok(tree)
        })
        .join()
        .await
}

/// Runs one full remap job and writes the mapping side-data.
pub async fn remap_version(
    env: &PipelineEnv,
    job: RemapJob,
    mappings: JobMappings,
) -> Result<RemapSummary> {
    let key = job.log_key();
    env.logs.line(
        &key,
        &format!(
            "remapping {} -> {}",
            job.input_jar.display(),
            job.output_jar.display()
        ),
    );

    let side_tree = mappings.side_data_tree().clone();
    let token = env.job_token();

    let input_jar = job.input_jar.clone();
    let output_jar = job.output_jar.clone();
    let namespace = job.namespace.clone();
    let options = job.options;

    let summary = env
        .scheduler
        .spawn_compute(TaskKind::Remap, token.clone(), move |token| {
            let mut reader = JarReader::open(&input_jar)?;
            let mut class_bytes: Vec<Vec<u8>> = Vec::new();
            let mut resources: Vec<(String, Vec<u8>)> = Vec::new();
            for entry in reader.entries() {
                let (name, bytes) = entry?;
                if name.ends_with(".class") {
                    class_bytes.push(bytes);
                } else {
                    resources.push((name, bytes));
                }
            }

            let classes = ClassSet::parse_all(class_bytes.iter().map(Vec::as_slice))?;
            let input = match &mappings {
                JobMappings::Single(tree) => RemapInput::Single(tree),
                JobMappings::Chained(combined) => RemapInput::Chained(combined),
            };
            let remapped =
                remap_class_set(classes, input, &namespace, options, &|| token.is_cancelled())?;

            let mut writer = JarWriter::create(&output_jar)?;
            let classes = remapped.into_classes();
            for class in &classes {
                let name = class.this_class_name()?;
                writer.add(&format!("{name}.class"), &class.serialize())?;
            }
            for (name, bytes) in &resources {
                writer.add(name, bytes)?;
            }
            writer.finish()?;

            Ok(RemapSummary {
                classes: classes.len(),
                resources: resources.len(),
            })
        })
        .join()
        .await?;

    write_side_data(env, &job, side_tree, token).await?;

    env.logs.line(
        &key,
        &format!(
            "remapped {} classes, carried {} resources",
            summary.classes, summary.resources
        ),
    );
    Ok(summary)
}

async fn write_side_data(
    env: &PipelineEnv,
    job: &RemapJob,
    side_tree: MappingTree,
    token: tokio_util::sync::CancellationToken,
) -> Result<()> {
    let comments_path = env.layout.mappings_comments(&job.provider, &job.version);
    let metadata_path = env.layout.mappings_metadata(&job.provider, &job.version);
    let metadata = job.metadata.clone();

    env.scheduler
        .spawn_compute(TaskKind::PostProcess, token, move |_token| {
            write_comments_json(&side_tree, &comments_path)?;
            if let Some(metadata) = &metadata {
                write_metadata_json(metadata, &metadata_path)?;
            }
            Ok(())
        })
        .join()
        .await
}
