pub type AaflineResult<T> = Result<T, AaflineError>;

#[derive(thiserror::Error, Debug)]
pub enum AaflineError {
    #[error("container open error: {0}")]
    Open(String),

    #[error("essence error: {0}")]
    Essence(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AaflineError {
    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    pub fn essence(msg: impl Into<String>) -> Self {
        Self::Essence(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
