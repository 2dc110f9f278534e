use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "memc-load", version, about = "Load gzipped app-installation logs into memcached shards")]
pub struct Args {
    /// Input files (glob); files whose name starts with '.' are treated as already loaded
    #[arg(long, value_name = "GLOB", default_value = "/data/appsinstalled/*.tsv.gz")]
    pub pattern: String,

    /// memcached address for idfa devices
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:33013")]
    pub idfa: String,

    /// memcached address for gaid devices
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:33014")]
    pub gaid: String,

    /// memcached address for adid devices
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:33015")]
    pub adid: String,

    /// memcached address for dvid devices
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:33016")]
    pub dvid: String,

    /// Parse and encode only; log the payloads instead of writing them
    #[arg(long, default_value_t = false)]
    pub dry: bool,

    /// Debug log level (ignored when RUST_LOG is set)
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log: Option<String>,

    /// Worker threads (default: number of CPUs, capped at the file count)
    #[arg(long, value_name = "INT")]
    pub workers: Option<usize>,

    /// Bounded job queue capacity
    #[arg(long, value_name = "INT", default_value_t = 32)]
    pub queue_cap: usize,

    /// Store write attempts per record
    #[arg(long, value_name = "INT", default_value_t = 5)]
    pub max_attempts: u32,

    /// Delay between store write attempts (milliseconds)
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// memcached socket read/write timeout (milliseconds)
    #[arg(long, value_name = "MS", default_value_t = 3000)]
    pub store_timeout_ms: u64,

    /// Metrics log interval (seconds), 0 disables the periodic reporter
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub metrics_interval: u64,
}

pub fn parse() -> Args { Args::parse() }
