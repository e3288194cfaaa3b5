use crate::Result;
use crate::coverage::{ChunkSize, DepthPolicy, ReadFilter};
use crate::formats::IngestOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "covidx")]
#[command(about = "Chunked read-depth coverage index and query server")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "COVIDX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "COVIDX_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory of BAM files to index; each file stem becomes a dataset id
    #[arg(long, env = "COVIDX_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Persist chunk buffers under this directory instead of keeping them in memory
    #[arg(long, env = "COVIDX_INDEX_DIR")]
    pub index_dir: Option<PathBuf>,

    /// Width of a genome chunk in bases; fixed for the lifetime of an index
    #[arg(long, env = "COVIDX_CHUNK_SIZE", default_value = "1000")]
    pub chunk_size: u64,

    /// Whether deleted and skipped reference bases count as covered
    #[arg(long, env = "COVIDX_DEPTH_POLICY", value_enum, default_value_t = DepthPolicy::Span)]
    pub depth_policy: DepthPolicy,

    /// Records accumulated before flushing chunk buffers into the index
    #[arg(long, env = "COVIDX_BATCH_SIZE", default_value = "100000")]
    pub batch_size: usize,

    /// Accumulation worker threads (0 = one per core)
    #[arg(long, env = "COVIDX_THREADS", default_value = "0")]
    pub threads: usize,

    /// Skip records with any of these SAM flag bits set
    #[arg(long, env = "COVIDX_EXCLUDE_FLAGS", default_value = "1796")]
    pub exclude_flags: u16,

    /// Skip records below this mapping quality
    #[arg(long, env = "COVIDX_MIN_MAPQ", default_value = "0")]
    pub min_mapq: u8,

    /// Enable CORS for all origins
    #[arg(long, env = "COVIDX_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn chunk_size(&self) -> Result<ChunkSize> {
        ChunkSize::new(self.chunk_size)
    }

    pub fn read_filter(&self) -> ReadFilter {
        ReadFilter::new(self.exclude_flags, self.min_mapq)
    }

    pub fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptions {
            chunk_size: self.chunk_size()?,
            policy: self.depth_policy,
            filter: self.read_filter(),
            batch_size: self.batch_size,
            threads: self.threads,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn config() -> Config {
        Config::parse_from(["covidx"])
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.chunk_size().unwrap().get(), 1000);
        assert_eq!(config.depth_policy, DepthPolicy::Span);
        assert_eq!(config.read_filter(), ReadFilter::default());
        assert!(config.index_dir.is_none());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = Config {
            chunk_size: 0,
            ..config()
        };
        assert!(matches!(config.chunk_size(), Err(Error::InvalidConfig(_))));
        assert!(config.ingest_options().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::parse_from([
            "covidx",
            "--chunk-size",
            "5000",
            "--depth-policy",
            "aligned",
            "--min-mapq",
            "20",
            "--index-dir",
            "/tmp/idx",
        ]);
        let options = config.ingest_options().unwrap();
        assert_eq!(options.chunk_size.get(), 5000);
        assert_eq!(options.policy, DepthPolicy::Aligned);
        assert_eq!(options.filter.min_mapping_quality, 20);
        assert_eq!(config.index_dir, Some(PathBuf::from("/tmp/idx")));
    }
}
