//! Render-visible vertex buffers.
//!
//! Effects write their results here once per tick. The buffer length is
//! fixed when the effect is built and vertex `i` always belongs to the same
//! particle slot or stage vertex, so a renderer can re-upload the whole
//! buffer in place whenever the revision changes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use verdant_common::WorldPlacement;

/// GPU-compatible point vertex.
/// Layout: 32 bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RenderVertex {
    /// Position XYZ in effect-local space (12 bytes).
    pub position: [f32; 3],
    /// Point size (4 bytes).
    pub size: f32,
    /// Color RGBA (16 bytes).
    pub color: [f32; 4],
}

impl Default for RenderVertex {
    fn default() -> Self {
        Self::HIDDEN
    }
}

impl RenderVertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// A vertex that draws nothing: zero size, zero alpha.
    pub const HIDDEN: Self = Self {
        position: [0.0; 3],
        size: 0.0,
        color: [0.0; 4],
    };

    /// Creates a vertex.
    #[must_use]
    pub fn new(position: Vec3, size: f32, rgb: Vec3, alpha: f32) -> Self {
        Self {
            position: position.to_array(),
            size,
            color: [rgb.x, rgb.y, rgb.z, alpha],
        }
    }

    /// Sets the position.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position.to_array();
    }

    /// Sets the color channels, leaving alpha alone.
    pub fn set_rgb(&mut self, rgb: Vec3) {
        self.color[0] = rgb.x;
        self.color[1] = rgb.y;
        self.color[2] = rgb.z;
    }

    /// Whether the vertex draws anything.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.size > 0.0 && self.color[3] > 0.0
    }
}

/// Fixed-length vertex buffer plus its placement in the world.
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    vertices: Vec<RenderVertex>,
    placement: WorldPlacement,
    revision: u64,
    consumed_revision: u64,
}

impl RenderBuffer {
    /// Creates a buffer of `len` hidden vertices.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            vertices: vec![RenderVertex::HIDDEN; len],
            placement: WorldPlacement::IDENTITY,
            revision: 0,
            consumed_revision: 0,
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the buffer holds no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Read-only vertex view for the renderer.
    #[must_use]
    pub fn vertices(&self) -> &[RenderVertex] {
        &self.vertices
    }

    /// Raw bytes for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Number of vertices that draw something.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_visible()).count()
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut [RenderVertex] {
        &mut self.vertices
    }

    /// Bumps the revision after the simulation rewrote the vertices.
    pub(crate) fn mark_changed(&mut self) {
        self.revision += 1;
    }

    /// Monotonic counter, incremented on every rewrite.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true once per change; the renderer re-uploads when it does.
    pub fn take_changed(&mut self) -> bool {
        if self.consumed_revision == self.revision {
            return false;
        }
        self.consumed_revision = self.revision;
        true
    }

    /// Placement applied by the renderer.
    #[must_use]
    pub const fn placement(&self) -> &WorldPlacement {
        &self.placement
    }

    /// Replaces the placement. Counts as a change.
    pub fn set_placement(&mut self, placement: WorldPlacement) {
        if self.placement != placement {
            self.placement = placement;
            self.mark_changed();
        }
    }

    /// Model matrix for the current placement.
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        self.placement.model_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vertex_size() {
        // Ensure proper alignment for GPU
        assert_eq!(RenderVertex::SIZE, 32);
    }

    #[test]
    fn test_hidden_vertex() {
        assert!(!RenderVertex::HIDDEN.is_visible());
        assert!(RenderVertex::new(Vec3::ZERO, 1.0, Vec3::ONE, 0.5).is_visible());
        assert_eq!(RenderVertex::default(), RenderVertex::HIDDEN);
    }

    #[test]
    fn test_set_rgb_keeps_alpha() {
        let mut vertex = RenderVertex::new(Vec3::ZERO, 1.0, Vec3::ZERO, 0.25);
        vertex.set_rgb(Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(vertex.color, [0.1, 0.2, 0.3, 0.25]);
    }

    #[test]
    fn test_change_signal() {
        let mut buffer = RenderBuffer::new(4);
        assert!(!buffer.take_changed());

        buffer.mark_changed();
        assert!(buffer.take_changed());
        assert!(!buffer.take_changed());

        buffer.set_placement(WorldPlacement::IDENTITY);
        assert!(!buffer.take_changed());
        buffer.set_placement(WorldPlacement::at(Vec3::X));
        assert!(buffer.take_changed());
        assert_eq!(buffer.revision(), 2);
    }

    #[test]
    fn test_bytes_cover_all_vertices() {
        let buffer = RenderBuffer::new(3);
        assert_eq!(buffer.as_bytes().len(), 3 * RenderVertex::SIZE);
        assert_eq!(buffer.visible_count(), 0);
    }
}
