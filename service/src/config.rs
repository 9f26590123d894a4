use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP service computing daily player peaks from connect/disconnect logs
#[derive(Debug, Clone, Parser)]
#[command(name = "peak-service", version)]
pub struct ServiceConfig {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Directory where analysis sessions are stored
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = 64)]
    pub max_upload_mb: usize,
}

impl ServiceConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
