use thiserror::Error;

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Zone geometry error in {path}: {details}")]
    Geometry { path: String, details: String },

    #[error("Allow list error in {path}: {details}")]
    AllowList { path: String, details: String },

    #[error("Actuation error in {component}: {details}")]
    Actuation { component: String, details: String },

    #[error("Transport error: {details}")]
    Transport { details: String },

    #[error("Hardware unavailable ({resource}): {details}")]
    Hardware { resource: String, details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl StationError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn actuation<S: Into<String>>(component: S, details: S) -> Self {
        Self::Actuation {
            component: component.into(),
            details: details.into(),
        }
    }

    pub fn geometry<P: Into<String>, D: Into<String>>(path: P, details: D) -> Self {
        Self::Geometry {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn allow_list<P: Into<String>, D: Into<String>>(path: P, details: D) -> Self {
        Self::AllowList {
            path: path.into(),
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StationError>;
