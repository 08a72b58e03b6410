use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("failed to create store directory at {path}"))]
    CreateStoreDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize value for key '{key}'"))]
    SerializeValue {
        stage: &'static str,
        key: String,
        source: serde_json::Error,
    },
    #[snafu(display("failed to serialize store snapshot for {path}"))]
    SerializeSnapshot {
        stage: &'static str,
        path: String,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write store file at {path}"))]
    WriteStore {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to replace store file from {from} to {to}"))]
    RenameStore {
        stage: &'static str,
        from: String,
        to: String,
        source: std::io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
