use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use diffbot::{
    Artifact, ArtifactStatus, Forge, GitHub, QuipDb, Registry, Repo, diff, parse_pr_url,
    synthesize,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

// Human-readable build info (for clap version display)
const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser)]
#[command(name = "diffbot")]
#[command(
    about = "Posts a character-voiced comment on a pull request, reacting to its metadata and linking rendered diff images for changed LabVIEW files"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct Cli {
    /// GitHub repository in format 'owner/repo' (required unless --pr is a
    /// URL)
    #[arg(short = 'r', long = "repo")]
    repo: Option<String>,

    /// Pull request number or URL
    #[arg(long, value_name = "PR-NUMBER|PR-URL")]
    pr: String,

    /// Directory containing rendered .png diff images
    #[arg(long, value_name = "DIR")]
    diffdir: PathBuf,

    /// Target ref for the diff (ex: 'origin/develop')
    #[arg(long)]
    target: String,

    /// URL to build artifacts, linked from the comment footer
    #[arg(long = "build-url")]
    build_url: String,

    /// Repository the diff images are uploaded to, in format 'owner/repo'
    #[arg(long = "diff-repo")]
    diff_repo: String,

    /// Character voice to comment in
    #[arg(long, default_value = "Shakespeare")]
    character: String,

    /// Path to the quip database
    #[arg(long, default_value = "quips.json")]
    quips: PathBuf,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn resolve_pr(cli: &Cli) -> Result<(Repo, u64)> {
    if let Ok(number) = cli.pr.parse::<u64>() {
        let repo = cli
            .repo
            .as_deref()
            .context("Repository (--repo) is required when --pr is a number")?;
        Ok((Repo::parse(repo)?, number))
    } else {
        parse_pr_url(&cli.pr)
    }
}

/// PNG files in the diff directory, as (file name, contents) pairs.
fn collect_diff_images(diffdir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(diffdir)
        .with_context(|| format!("Failed to read diff directory '{}'", diffdir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            images.push((name, data));
        }
    }
    images.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(images)
}

async fn upload_artifacts<F: Forge>(
    forge: &F,
    diff_repo: &Repo,
    pr_number: u64,
    images: Vec<(String, Vec<u8>)>,
    changes: &diff::ChangedFiles,
) -> Result<Vec<Artifact>> {
    let upload_dir = format!(
        "pull/{}/{}",
        pr_number,
        Utc::now().format("%Y-%m-%d/%H:%M:%S")
    );

    let mut artifacts = Vec::with_capacity(images.len());
    for (name, data) in images {
        let path = format!("{upload_dir}/{name}");
        let url = forge.upload_diff_image(diff_repo, &path, &data).await?;
        let status = diff::status_for_image(changes, &name);
        artifacts.push(Artifact {
            status: ArtifactStatus::from_letter(&status),
            name: name.trim_end_matches(".png").to_string(),
            url,
        });
    }
    Ok(artifacts)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (repo, pr_number) = resolve_pr(&cli)?;
    let diff_repo = Repo::parse(&cli.diff_repo)?;

    let changes = diff::changed_labview_files(&cli.target)?;
    let images = collect_diff_images(&cli.diffdir)?;
    if images.is_empty() {
        info!("no diff images found, skipping PR comment");
        return Ok(());
    }
    info!(images = images.len(), "found diff images, posting comment");

    let registry = Registry::builtin();
    let quips_json = std::fs::read_to_string(&cli.quips)
        .with_context(|| format!("Failed to read quip database '{}'", cli.quips.display()))?;
    let quips = QuipDb::from_json(&quips_json)
        .with_context(|| format!("Malformed quip database '{}'", cli.quips.display()))?;
    quips.validate(&registry, &[cli.character.as_str()])?;

    let github = GitHub::new()?;
    let artifacts = upload_artifacts(&github, &diff_repo, pr_number, images, &changes).await?;
    let pr = github.fetch_pull_request(&repo, pr_number).await?;

    let facts = registry.evaluate(&pr, Utc::now())?;
    info!(facts = facts.len(), "evaluated pull request");

    let mut rng = StdRng::from_entropy();
    let comment = synthesize(
        &mut rng,
        &cli.character,
        &facts,
        &quips,
        &artifacts,
        &cli.build_url,
    )?;

    github.post_comment(&repo, pr_number, &comment).await?;
    Ok(())
}
