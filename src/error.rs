use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("recipe request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed recipe payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RemixError {
    #[error("no OpenAI API key configured")]
    MissingApiKey,

    #[error("remix request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("saved recipes storage failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode saved recipes: {0}")]
    Encode(#[from] serde_json::Error),
}
