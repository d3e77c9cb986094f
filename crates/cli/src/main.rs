use anyhow::Context;
use clap::{Parser, Subcommand};
use mdm_core::{
    thresholds_from_values, BaseRecord, CandidateAggregator, CandidateFinder,
    ExternalIdCandidateFinder, ExternalIdentifier, InMemoryGoldenStore, InMemorySimilarityIndex,
    InternalId, LinkedCandidateFinder, MatchConfig, MatchedCandidate, ScoredCandidateFinder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mdm")]
#[command(about = "MDM candidate matching CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find golden-record candidates for a record
    Candidates {
        /// MDM rules document (YAML)
        #[arg(long)]
        rules: PathBuf,
        /// Golden record store fixture (YAML)
        #[arg(long)]
        golden: PathBuf,
        /// Base record resource (YAML)
        #[arg(long)]
        record: PathBuf,
        /// Similarity results fixture (YAML)
        #[arg(long)]
        scores: Option<PathBuf>,
        /// Internal id the base record is persisted under
        #[arg(long)]
        source_pid: Option<u64>,
        /// Override the SCORED_MATCH threshold
        #[arg(long)]
        certain: Option<String>,
        /// Override the POSSIBLE_MATCH threshold
        #[arg(long)]
        possible: Option<String>,
        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the enterprise identifiers recognized on a record
    Eids {
        /// MDM rules document (YAML)
        #[arg(long)]
        rules: PathBuf,
        /// Base record resource (YAML)
        #[arg(long)]
        record: PathBuf,
    },
}

/// Inputs of a `candidates` run.
struct CandidateRequest<'a> {
    rules: &'a Path,
    golden: &'a Path,
    record: &'a Path,
    scores: Option<&'a Path>,
    source_pid: Option<u64>,
    certain: Option<String>,
    possible: Option<String>,
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_config(
    rules: &Path,
    certain: Option<String>,
    possible: Option<String>,
) -> anyhow::Result<MatchConfig> {
    let cfg = MatchConfig::parse_rules(&read(rules)?)
        .with_context(|| format!("invalid rules in {}", rules.display()))?;
    let thresholds = thresholds_from_values(cfg.thresholds(), certain, possible)?;
    Ok(cfg.with_thresholds(thresholds)?)
}

fn find_candidates(req: CandidateRequest<'_>) -> anyhow::Result<Vec<MatchedCandidate>> {
    let cfg = Arc::new(load_config(req.rules, req.certain, req.possible)?);

    let store = Arc::new(
        InMemoryGoldenStore::from_fixture(&read(req.golden)?)
            .with_context(|| format!("invalid golden records in {}", req.golden.display()))?,
    );
    let index = match req.scores {
        Some(path) => InMemorySimilarityIndex::from_fixture(&read(path)?)
            .with_context(|| format!("invalid scores in {}", path.display()))?,
        None => InMemorySimilarityIndex::new(),
    };

    let mut record = BaseRecord::parse(&read(req.record)?)
        .with_context(|| format!("invalid record in {}", req.record.display()))?;
    if let Some(pid) = req.source_pid {
        record = record.with_internal_id(InternalId::new(pid));
    }

    let finders: Vec<Arc<dyn CandidateFinder>> = vec![
        Arc::new(ExternalIdCandidateFinder::new(
            cfg.extractor().clone(),
            store.clone(),
            store.clone(),
        )),
        Arc::new(ScoredCandidateFinder::new(
            Arc::new(index),
            store.clone(),
            cfg.thresholds(),
        )),
        Arc::new(LinkedCandidateFinder::new(store.clone(), store)),
    ];
    let aggregator = CandidateAggregator::new(cfg, finders)?;
    Ok(aggregator.find_candidates(&record)?)
}

fn recognized_eids(rules: &Path, record: &Path) -> anyhow::Result<Vec<ExternalIdentifier>> {
    let cfg = load_config(rules, None, None)?;
    let record = BaseRecord::parse(&read(record)?)
        .with_context(|| format!("invalid record in {}", record.display()))?;
    Ok(cfg.extractor().extract(&record))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("mdm=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Candidates {
            rules,
            golden,
            record,
            scores,
            source_pid,
            certain,
            possible,
            json,
        }) => {
            let candidates = find_candidates(CandidateRequest {
                rules: &rules,
                golden: &golden,
                record: &record,
                scores: scores.as_deref(),
                source_pid,
                certain,
                possible,
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
            } else if candidates.is_empty() {
                println!("No candidates found.");
            } else {
                for candidate in &candidates {
                    println!("{candidate}");
                }
            }
        }
        Some(Commands::Eids { rules, record }) => {
            let eids = recognized_eids(&rules, &record)?;
            if eids.is_empty() {
                println!("No recognized identifiers.");
            }
            for eid in eids {
                println!("{eid}");
            }
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
