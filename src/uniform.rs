/// Bind group and binding index of the runtime uniform block. Texture
/// bindings occupy the groups after it, in declaration order.
pub const UNIFORM_GROUP_ID: u32 = 0;

/// Per-frame values handed to the fragment stage. The layout is a binary
/// contract with the `RuntimeData` uniform block every shader declares at
/// group 0 binding 0: field order, padding and total size must match the
/// backend's uniform alignment rules (16-byte vectors, size rounded up to
/// a 16-byte multiple).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RuntimeUniforms {
    /// xy: cursor position in pixels, z: left button, w: right button.
    pub pointer: [f32; 4],
    pub resolution: [f32; 2],
    /// Seconds since the session started.
    pub time: f32,
    pub delta_time: f32,
    pub frame: i32,
    _padding: [u32; 3],
}

impl RuntimeUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeUniforms;
    use std::mem::size_of;

    #[test]
    fn block_is_48_bytes() {
        assert_eq!(size_of::<RuntimeUniforms>(), 48);
    }

    #[test]
    fn field_offsets_match_the_shader_declaration() {
        let uniforms = RuntimeUniforms {
            pointer: [1.0, 2.0, 3.0, 4.0],
            resolution: [5.0, 6.0],
            time: 7.0,
            delta_time: 8.0,
            frame: 9,
            ..Default::default()
        };

        let bytes = uniforms.as_bytes();
        assert_eq!(&bytes[0..4], 1.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], 4.0f32.to_le_bytes());
        assert_eq!(&bytes[16..20], 5.0f32.to_le_bytes());
        assert_eq!(&bytes[24..28], 7.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], 8.0f32.to_le_bytes());
        assert_eq!(&bytes[32..36], 9i32.to_le_bytes());
    }
}
