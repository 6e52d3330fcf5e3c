/// Errors raised by host registry implementations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No host with the given hostname or endpoint is registered.
    #[error("Host '{0}' is not registered")]
    HostNotFound(String),

    /// Input rejected before touching the store.
    #[error("Invalid registry input: {0}")]
    Invalid(String),

    /// Reading or writing the backing file failed.
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry content could not be serialized.
    #[error("Registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
