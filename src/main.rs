use claritas::cli::{Cli, Commands, ConfigAction};
use claritas::config::{Config, ConfigValidator};
use claritas::corpus::Book;
use claritas::embedding::{EmbeddingProvider, FastEmbedProvider};
use claritas::error::{ClaritasError, Result};
use claritas::ingestion::{self, Ingestor};
use claritas::retrieval::{QueryContext, Retrieval, RetrievalEngine};
use claritas::storage::{PassageStore, SqlitePassageStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PREVIEW_CHARS: usize = 240;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Retrieve {
            query,
            book,
            topics,
            keywords,
            top_k,
            threshold,
            profile,
            json,
        } => {
            let context = QueryContext::new(query)
                .with_topics(topics)
                .with_keywords(keywords);
            cmd_retrieve(cli.config, profile, &book, context, top_k, threshold, json)?;
        }
        Commands::Normalize {
            book,
            input,
            output,
        } => {
            cmd_normalize(&book, &input, &output)?;
        }
        Commands::Ingest {
            book,
            file,
            speaker,
        } => {
            cmd_ingest(cli.config, &book, &file, speaker)?;
        }
        Commands::Partitions { json } => {
            cmd_partitions(cli.config, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "claritas=debug" } else { "claritas=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_retrieve(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    book: &str,
    context: QueryContext,
    top_k: Option<usize>,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let threshold = threshold.unwrap_or(config.retrieval.score_threshold);

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(FastEmbedProvider::new(&config.embedding.model)?);
    let store: Arc<dyn PassageStore> = Arc::new(open_store(&config)?);
    let engine = RetrievalEngine::new(
        embedder,
        store,
        config.retrieval.clone(),
        &config.ranking,
    )?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| ClaritasError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let retrieval = rt.block_on(engine.retrieve_scored(book, &context, top_k, threshold))?;

    if json {
        print_json(&retrieval)?;
    } else {
        print_retrieval(book, &retrieval);
    }

    Ok(())
}

fn print_retrieval(book: &str, retrieval: &Retrieval) {
    if retrieval.is_empty() {
        println!("No passages found in {} ({:?})", book, retrieval.mode);
        return;
    }

    println!(
        "{} passages from {} ({:?})",
        retrieval.results.len(),
        book,
        retrieval.mode
    );
    for (rank, ranked) in retrieval.results.iter().enumerate() {
        let passage = &ranked.passage;
        println!();
        println!("{}. {} [score {:.3}]", rank + 1, passage.id, ranked.score);

        let mut details = Vec::new();
        if let Some(label) = passage.topic.as_deref().or(passage.sub_topic.as_deref()) {
            details.push(label.to_string());
        }
        if let Some(speaker) = &passage.speaker {
            details.push(speaker.clone());
        }
        if let Some(pages) = &passage.page_range {
            details.push(format!("pp. {}", pages));
        }
        if !details.is_empty() {
            println!("   {}", details.join(" | "));
        }
        println!("   {}", passage.preview(PREVIEW_CHARS));
    }
}

fn cmd_normalize(book: &str, input: &Path, output: &Path) -> Result<()> {
    let book = parse_book(book)?;

    let raw = ingestion::load_raw_chunks(input)?;
    let passages = ingestion::normalize_all(book, &raw)?;
    ingestion::save_normalized(output, &passages)?;

    println!(
        "✓ Normalized {} {} passages to {}",
        passages.len(),
        book,
        output.display()
    );
    Ok(())
}

fn cmd_ingest(
    config_path: Option<PathBuf>,
    book: &str,
    file: &Path,
    speaker: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, None)?;
    let book = parse_book(book)?;
    let passages = ingestion::load_normalized(file)?;

    let embedder = FastEmbedProvider::new(&config.embedding.model)?;
    if embedder.dimension() != config.embedding.dimension {
        tracing::warn!(
            "Model {} produces {} dims, config says {}",
            embedder.model_name(),
            embedder.dimension(),
            config.embedding.dimension
        );
    }

    let store: Arc<dyn PassageStore> = Arc::new(open_store(&config)?);
    let speaker = speaker.unwrap_or_else(|| config.ranking.primary_speaker.clone());
    let ingestor = Ingestor::new(Arc::new(embedder), store, config.embedding.batch_size)
        .with_default_speaker(speaker);

    let report = ingestor.ingest(book, passages)?;

    println!(
        "✓ Ingested {} passages into {} ({} dims, {}ms)",
        report.written, report.partition, report.dimension, report.duration_ms
    );
    Ok(())
}

fn cmd_partitions(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path, None)?;
    let store = open_store(&config)?;
    let partitions = store.list_partitions()?;

    if json {
        return print_json(&partitions);
    }

    if partitions.is_empty() {
        println!("No partitions yet. Run 'claritas ingest' to load a book.");
        return Ok(());
    }

    for info in partitions {
        println!(
            "{:<26} {:<14} {:>5} dims  {:>6} passages  ({})",
            info.name,
            info.book.name(),
            info.dimension,
            info.passage_count,
            info.distance.as_str()
        );
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            print_json(&config)?;
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ClaritasError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'claritas config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn open_store(config: &Config) -> Result<SqlitePassageStore> {
    let db_path = config.storage.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ClaritasError::Io {
            source: e,
            context: format!("Failed to create data directory: {:?}", parent),
        })?;
    }

    tracing::debug!("Opening passage store at {}", db_path.display());
    SqlitePassageStore::open(&db_path)
}

fn parse_book(name: &str) -> Result<Book> {
    Book::from_name(name).ok_or_else(|| {
        ClaritasError::Config(format!(
            "Unknown book '{}'. Expected one of: {}",
            name,
            Book::ALL.map(|b| b.name()).join(", ")
        ))
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ClaritasError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}
