/// Errors raised by the renderer and its devices.
///
/// Initialization failures are fatal and propagate to the caller. Per-frame
/// failures such as [`RenderError::BufferMap`] are logged by the renderer and
/// the affected work is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No suitable GPU adapter was found
    NoAdapter,
    /// The adapter refused to create a device
    RequestDevice(String),
    /// A device resource (buffer, shader, pipeline, texture) could not be created
    Initialization(String),
    /// A streaming buffer could not be written
    BufferMap(String),
    /// A resource was requested with zero or oversized dimensions
    InvalidDimensions { width: u32, height: u32 },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "No suitable GPU adapter found"),
            Self::RequestDevice(msg) => write!(f, "Failed to create device: {}", msg),
            Self::Initialization(msg) => write!(f, "Renderer initialization failed: {}", msg),
            Self::BufferMap(msg) => write!(f, "Buffer mapping failed: {}", msg),
            Self::InvalidDimensions { width, height } => {
                write!(f, "Invalid resource dimensions {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = RenderError::InvalidDimensions {
            width: 0,
            height: 16,
        };
        assert_eq!(err.to_string(), "Invalid resource dimensions 0x16");
        assert!(format!("{:?}", RenderError::NoAdapter).contains("NoAdapter"));
    }
}
