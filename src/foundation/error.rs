/// Convenience result type used across scenecast.
pub type ScenecastResult<T> = Result<T, ScenecastError>;

/// Top-level error taxonomy.
///
/// Element-level failures (`Validation`, `UnitResolution`, `Fetch`) are normally recovered
/// locally and surface as diagnostics instead of being returned.
#[derive(thiserror::Error, Debug)]
pub enum ScenecastError {
    /// Malformed scene or element data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A size/position expression could not be resolved.
    #[error("unit resolution error: {0}")]
    UnitResolution(String),

    /// Nothing survived validation; there is no video to produce.
    #[error("no renderable content: {0}")]
    NoRenderableContent(String),

    /// A source asset could not be acquired.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The media engine failed to assemble or encode the artifact.
    #[error("render error: {0}")]
    Render(String),

    /// The job notification could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The job was aborted before hand-off.
    #[error("job cancelled")]
    Cancelled,

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScenecastError {
    /// Build a [`ScenecastError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ScenecastError::UnitResolution`] value.
    pub fn unit_resolution(msg: impl Into<String>) -> Self {
        Self::UnitResolution(msg.into())
    }

    /// Build a [`ScenecastError::NoRenderableContent`] value.
    pub fn no_renderable_content(msg: impl Into<String>) -> Self {
        Self::NoRenderableContent(msg.into())
    }

    /// Build a [`ScenecastError::Fetch`] value.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Build a [`ScenecastError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ScenecastError::Delivery`] value.
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Build a [`ScenecastError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
