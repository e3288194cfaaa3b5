use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use covidx::{
    Config,
    formats::{BamIngest, IngestOptions},
    handlers::{AppState, create_router},
    index::{CoverageIndex, LocalIndex, MemoryIndex},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = config.ingest_options()?;
    tracing::info!(
        chunk_size = %options.chunk_size,
        policy = ?options.policy,
        "Building coverage indexes from {:?}",
        config.data_dir
    );

    let mut indexes: HashMap<String, Arc<dyn CoverageIndex>> = HashMap::new();
    for (id, bam_path) in bam_files(&config.data_dir)? {
        let index = open_index(&config, &id, &options).await?;
        BamIngest::ingest_once(&bam_path, index.as_ref(), &options).await?;
        indexes.insert(id, index);
    }

    if indexes.is_empty() {
        tracing::warn!("No BAM files found in {:?}", config.data_dir);
    }

    let app = create_router(AppState::new(indexes));
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = config.bind_addr();
    tracing::info!("Starting covidx server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_index(
    config: &Config,
    id: &str,
    options: &IngestOptions,
) -> anyhow::Result<Arc<dyn CoverageIndex>> {
    let index: Arc<dyn CoverageIndex> = match &config.index_dir {
        Some(dir) => Arc::new(LocalIndex::open(dir.join(id), options.chunk_size).await?),
        None => Arc::new(MemoryIndex::new(options.chunk_size)),
    };
    Ok(index)
}

/// `(dataset id, path)` for every `.bam` file in `dir`, sorted by id.
fn bam_files(dir: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("bam") {
            continue;
        }
        if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
            files.push((id.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}
