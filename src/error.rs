use std::sync::Arc;
use thiserror::Error;

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("{0}")]
    Definition(String),
    #[error("Object id \"{0}\" already defined")]
    DuplicateId(String),
    #[error("{0}")]
    Resource(Arc<anyhow::Error>),
}

impl CompileError {
    pub fn definition(message: impl Into<String>) -> Self {
        CompileError::Definition(message.into())
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, CompileError::Definition(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CompileError::DuplicateId(_))
    }
}

impl From<anyhow::Error> for CompileError {
    fn from(err: anyhow::Error) -> Self {
        CompileError::Resource(Arc::new(err))
    }
}
