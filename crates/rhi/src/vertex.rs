//! Vertex input descriptions.
//!
//! [`VertexLayout`] describes one interleaved vertex buffer at binding 0. The
//! vertex record type lives with the asset loaders; callers build the layout
//! from its field offsets.
//!
//! ```
//! use ash::vk;
//! use instancing_rhi::vertex::VertexLayout;
//!
//! let layout = VertexLayout::new(20)
//!     .attribute(vk::Format::R32G32B32_SFLOAT, 0)
//!     .attribute(vk::Format::R32G32_SFLOAT, 12);
//! assert_eq!(layout.attribute_descriptions()[1].location, 1);
//! ```

use ash::vk;

/// Interleaved per-vertex layout for binding 0.
#[derive(Clone, Debug)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexLayout {
    /// Starts a layout whose records are `stride` bytes apart.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute at the next shader location.
    pub fn attribute(mut self, format: vk::Format, offset: u32) -> Self {
        let location = self.attributes.len() as u32;
        self.attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset,
        });
        self
    }

    /// Record size in bytes.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The single per-vertex binding description.
    pub fn binding_description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions, one per location.
    #[inline]
    pub fn attribute_descriptions(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locations_follow_insertion_order() {
        let layout = VertexLayout::new(60)
            .attribute(vk::Format::R32G32B32_SFLOAT, 0)
            .attribute(vk::Format::R32G32B32A32_SFLOAT, 12)
            .attribute(vk::Format::R32G32B32_UINT, 48);

        let attributes = layout.attribute_descriptions();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[2].location, 2);
        assert_eq!(attributes[2].offset, 48);
        assert_eq!(attributes[2].format, vk::Format::R32G32B32_UINT);
        assert!(attributes.iter().all(|a| a.binding == 0));
    }

    #[test]
    fn test_binding_description() {
        let binding = VertexLayout::new(60).binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 60);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }
}
