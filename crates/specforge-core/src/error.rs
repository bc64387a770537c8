use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("not initialized: run 'specforge init'")]
    NotInitialized,

    #[error("discovery not found: {0}")]
    DiscoveryNotFound(String),

    #[error("discovery already exists for project: {0}")]
    DiscoveryExists(String),

    #[error("discovery is already complete")]
    AlreadyComplete,

    #[error("invalid stage transition from {from}: {reason}")]
    InvalidStageTransition { from: String, reason: String },

    #[error("PRD not found: {0}")]
    PrdNotFound(String),

    #[error("PRD {prd} does not belong to project {project}")]
    PrdNotInProject { prd: String, project: String },

    #[error("PRD already exists for feature: {0}")]
    PrdExists(String),

    #[error("user story {0} not found")]
    UserStoryNotFound(String),

    #[error("invalid status change from {from} to {to}: {reason}")]
    InvalidStatusChange {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid status value: {0}")]
    InvalidStatus(String),

    #[error("maximum retries exceeded ({attempts} of {max} generation attempts used)")]
    MaxRetriesExceeded { attempts: u32, max: u32 },

    #[error("no active PRD")]
    NoActivePrd,

    #[error("no ready PRD available")]
    NoReadyPrd,

    #[error("{0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
