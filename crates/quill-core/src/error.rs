pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid config JSON: {message}")]
    InvalidConfigJson { message: String },

    #[error("Config root must be a JSON object")]
    ConfigNotObject,

    #[error("Config key `{key}` has the wrong type (expected {expected})")]
    ConfigType { key: String, expected: &'static str },

    #[error("Unknown URL policy: {value}")]
    UnknownUrlPolicy { value: String },

    #[error("Unknown avatar size: {value}")]
    UnknownAvatarSize { value: String },

    #[error("Unknown resize mode: {value}")]
    UnknownResizeMode { value: String },

    #[error("Unknown avatar mode: {value}")]
    UnknownAvatarMode { value: String },

    #[error("Unknown toast event: {name}")]
    UnknownToastEvent { name: String },

    #[error("Toast event `{name}` requires an argument")]
    MissingToastArgument { name: String },
}
