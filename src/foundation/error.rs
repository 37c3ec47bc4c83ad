pub type CoverResult<T> = Result<T, CoverError>;

#[derive(thiserror::Error, Debug)]
pub enum CoverError {
    #[error("template error: {0}")]
    Template(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("color error: {0}")]
    Color(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("output collision: {0}")]
    OutputCollision(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoverError {
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn color(msg: impl Into<String>) -> Self {
        Self::Color(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn collision(msg: impl Into<String>) -> Self {
        Self::OutputCollision(msg.into())
    }
}
