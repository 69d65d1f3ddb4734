use std::sync::Arc;

use vellum_core::math::UVec2;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Sentinel meaning "nothing bound".
            pub const INVALID: Self = Self(u32::MAX);

            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            /// `None` for the invalid sentinel.
            pub const fn valid(self) -> Option<Self> {
                if self.is_valid() { Some(self) } else { None }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

resource_id!(
    /// Identifies a texture (or render texture) owned by a device.
    TextureId
);
resource_id!(
    /// Identifies a vertex shader owned by a device.
    VertexShaderId
);
resource_id!(
    /// Identifies a pixel (fragment) shader owned by a device.
    PixelShaderId
);

/// Programmable stage a texture, sampler or constant buffer binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

#[derive(Debug)]
struct TextureInner {
    id: TextureId,
    size: UVec2,
    render_target: bool,
    label: Option<String>,
}

/// Shared handle to a device texture.
///
/// Handles are reference counted so the command manager can keep every
/// texture referenced by the current frame alive until the frame is
/// replayed. Devices use [`Texture::handle_count`] to find textures nobody
/// refers to anymore.
#[derive(Debug, Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub fn new(id: TextureId, size: UVec2, render_target: bool, label: Option<&str>) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                id,
                size,
                render_target,
                label: label.map(str::to_owned),
            }),
        }
    }

    pub fn id(&self) -> TextureId {
        self.inner.id
    }

    pub fn size(&self) -> UVec2 {
        self.inner.size
    }

    pub fn width(&self) -> u32 {
        self.inner.size.x
    }

    pub fn height(&self) -> u32 {
        self.inner.size.y
    }

    /// Whether this texture can be bound with `push_render_target`.
    pub fn is_render_target(&self) -> bool {
        self.inner.render_target
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Number of live handles to this texture.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Texture {}

macro_rules! shader_handle {
    ($(#[$meta:meta])* $name:ident, $id:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: $id,
            label: Arc<str>,
        }

        impl $name {
            pub fn new(id: $id, label: &str) -> Self {
                Self {
                    id,
                    label: Arc::from(label),
                }
            }

            pub fn id(&self) -> $id {
                self.id
            }

            pub fn label(&self) -> &str {
                &self.label
            }

            /// Number of live handles to this shader.
            pub fn handle_count(&self) -> usize {
                Arc::strong_count(&self.label)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $name {}
    };
}

shader_handle!(
    /// Shared handle to a device vertex shader.
    VertexShader,
    VertexShaderId
);
shader_handle!(
    /// Shared handle to a device pixel shader.
    PixelShader,
    PixelShaderId
);

/// IDs of the shaders every device ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardShaders {
    /// Transforms `Vertex2D` by the engine transform rows.
    pub sprite_vs: VertexShaderId,
    /// Generates a full-screen triangle from `vertex_index`; no vertex buffer.
    pub full_screen_triangle_vs: VertexShaderId,
    /// Outputs vertex colour, modulated by colour mul/add.
    pub shape_ps: PixelShaderId,
    /// Samples PS texture slot 0, modulated by vertex colour and colour mul/add.
    pub texture_ps: PixelShaderId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_ids() {
        assert!(!TextureId::INVALID.is_valid());
        assert_eq!(TextureId::default(), TextureId::INVALID);
        assert_eq!(PixelShaderId::new(3).valid(), Some(PixelShaderId(3)));
        assert_eq!(VertexShaderId::INVALID.valid(), None);
    }

    #[test]
    fn test_texture_handle_count() {
        let texture = Texture::new(TextureId(1), UVec2::new(16, 8), false, Some("atlas"));
        assert_eq!(texture.handle_count(), 1);
        let clone = texture.clone();
        assert_eq!(texture.handle_count(), 2);
        assert_eq!(clone, texture);
        drop(clone);
        assert_eq!(texture.handle_count(), 1);
        assert_eq!(texture.label(), Some("atlas"));
        assert_eq!(texture.width(), 16);
    }
}
