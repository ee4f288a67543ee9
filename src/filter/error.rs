use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("unknown filter field: {0}")]
    UnknownFilterField(String),

    #[error("global search must not contains special character")]
    InvalidSearch,

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    #[error("invalid {param}: {source}")]
    Json {
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
