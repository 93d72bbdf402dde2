use std::path::PathBuf;

/// Errors that stop the simulator from starting
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Data directory unusable: {0}")]
    DataDir(PathBuf),

    #[error("Cannot bind HTTP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("NMEA replay file has no sentences: {0}")]
    EmptyReplay(PathBuf),

    #[error("Route table: {0}")]
    Routes(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
