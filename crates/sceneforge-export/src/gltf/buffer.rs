//! Binary channel buffer
//!
//! Every accessor in the output document is backed by one append-only
//! typed channel here. Channels are created once, written in element
//! units, and concatenated into a single blob at finalization; the
//! accessor and bufferView records fall out of that concatenation.

use tracing::debug;

use super::{Accessor, Buffer, BufferView};

/// Component types a channel can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    UnsignedByte,
    UnsignedShort,
    Float,
}

impl ComponentType {
    /// glTF componentType code
    pub fn code(self) -> u32 {
        match self {
            ComponentType::UnsignedByte => super::COMPONENT_TYPE_UNSIGNED_BYTE,
            ComponentType::UnsignedShort => super::COMPONENT_TYPE_UNSIGNED_SHORT,
            ComponentType::Float => super::COMPONENT_TYPE_FLOAT,
        }
    }

    /// Width of one component in bytes
    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::UnsignedByte => 1,
            ComponentType::UnsignedShort => 2,
            ComponentType::Float => 4,
        }
    }
}

/// Element arities a channel can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl ElementType {
    /// Components per element
    pub fn arity(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
            ElementType::Mat4 => 16,
        }
    }

    /// glTF accessor type name
    pub fn type_name(self) -> &'static str {
        match self {
            ElementType::Scalar => "SCALAR",
            ElementType::Vec2 => "VEC2",
            ElementType::Vec3 => "VEC3",
            ElementType::Vec4 => "VEC4",
            ElementType::Mat4 => "MAT4",
        }
    }
}

/// One typed append-only binary stream
#[derive(Debug)]
struct Channel {
    component_type: ComponentType,
    element_type: ElementType,
    count: usize,
    data: Vec<u8>,
}

/// Finalized buffer layout: accessors, bufferViews and the blob they
/// tile without gaps or overlaps
#[derive(Debug)]
pub struct ExportedBuffer {
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub blob: Vec<u8>,
}

impl ExportedBuffer {
    /// The single buffer record backing all views
    pub fn buffer_record(&self, uri: Option<String>) -> Buffer {
        Buffer {
            uri,
            byte_length: self.blob.len(),
        }
    }
}

/// The conversion-wide binary buffer. One instance per conversion run,
/// single writer, finalized exactly once by [`GltfBuffer::export`].
#[derive(Debug, Default)]
pub struct GltfBuffer {
    channels: Vec<Channel>,
}

impl GltfBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new empty channel and return its id.
    ///
    /// The id doubles as the accessor and bufferView index the channel
    /// will occupy after [`export`](Self::export); ids are never reused.
    pub fn add_channel(
        &mut self,
        component_type: ComponentType,
        element_type: ElementType,
    ) -> usize {
        self.channels.push(Channel {
            component_type,
            element_type,
            count: 0,
            data: Vec::new(),
        });
        self.channels.len() - 1
    }

    /// Append one element to a channel.
    ///
    /// `values` must hold exactly the channel's arity and integer
    /// channels must receive values in range; anything else is a
    /// programming error and panics rather than corrupting the stream.
    pub fn write(&mut self, channel_id: usize, values: &[f32]) {
        let channel = &mut self.channels[channel_id];
        assert_eq!(
            values.len(),
            channel.element_type.arity(),
            "channel {channel_id} expects {} components, got {}",
            channel.element_type.arity(),
            values.len()
        );

        match channel.component_type {
            ComponentType::UnsignedByte => {
                for &v in values {
                    assert!((0.0..256.0).contains(&v), "u8 channel value {v} out of range");
                    channel.data.push(v as u8);
                }
            }
            ComponentType::UnsignedShort => {
                for &v in values {
                    assert!(
                        (0.0..65536.0).contains(&v),
                        "u16 channel value {v} out of range"
                    );
                    channel.data.extend_from_slice(&(v as u16).to_le_bytes());
                }
            }
            ComponentType::Float => {
                for &v in values {
                    channel.data.extend_from_slice(&v.to_le_bytes());
                }
            }
        }

        channel.count += 1;
    }

    /// Elements written to a channel so far
    pub fn count(&self, channel_id: usize) -> usize {
        self.channels[channel_id].count
    }

    /// Number of channels allocated
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Finalize: concatenate all channels in creation order and emit
    /// the accessor/bufferView records describing the layout.
    ///
    /// Consumes the buffer: the layout is only valid once all writes
    /// are complete, and there is no second finalization.
    pub fn export(self) -> ExportedBuffer {
        let mut accessors = Vec::with_capacity(self.channels.len());
        let mut buffer_views = Vec::with_capacity(self.channels.len());
        let mut blob = Vec::new();

        let mut offset = 0;
        for channel in self.channels {
            accessors.push(Accessor {
                buffer_view: buffer_views.len(),
                component_type: channel.component_type.code(),
                count: channel.count,
                accessor_type: channel.element_type.type_name().to_string(),
            });
            buffer_views.push(BufferView {
                buffer: 0,
                byte_offset: offset,
                byte_length: channel.data.len(),
            });

            offset += channel.data.len();
            blob.extend_from_slice(&channel.data);
        }

        debug!(
            channels = accessors.len(),
            bytes = blob.len(),
            "finalized binary buffer"
        );

        ExportedBuffer {
            accessors,
            buffer_views,
            blob,
        }
    }
}
