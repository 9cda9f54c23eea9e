use crate::textures::{ColorSpace, MapKind, TextureSettings, WrapMode};

/// Stores a WGPU texture along with its view.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuTexture {
    pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Upload a decoded RGBA image. Color data is sampled as sRGB, every other
    /// map is read as linear values.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &image::RgbaImage,
        color_space: ColorSpace,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = image.dimensions();
        Self::from_pixels(
            device,
            queue,
            image.as_raw(),
            width.max(1),
            height.max(1),
            color_space,
            label,
        )
    }

    /// A 1x1 texture standing in for a map that is missing or still loading.
    ///
    /// The value is chosen so the map has no visible effect: white for
    /// multiplicative maps, a flat normal, zero height.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue, kind: MapKind) -> Self {
        let pixel: [u8; 4] = match kind {
            MapKind::Normal => [128, 128, 255, 255],
            MapKind::Height => [0, 0, 0, 255],
            _ => [255, 255, 255, 255],
        };

        Self::from_pixels(
            device,
            queue,
            &pixel,
            1,
            1,
            kind.color_space(),
            Some(format!("{} placeholder", kind.file_stem()).as_str()),
        )
    }

    fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        width: u32,
        height: u32,
        color_space: ColorSpace,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: match color_space {
                ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
                ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
            },
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    /// Create a depth buffer. `sampled` adds `TEXTURE_BINDING` so the buffer
    /// can be read back by a later pass, which the shadow map needs.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        sampled: bool,
        label: Option<&str>,
    ) -> Self {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if sampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }
}

/// Create a filtering sampler matching a texture's wrap settings.
pub fn create_sampler(
    device: &wgpu::Device,
    settings: TextureSettings,
    label: Option<&str>,
) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label,
        address_mode_u: address_mode(settings.wrap_s),
        address_mode_v: address_mode(settings.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Create the comparison sampler used to read the shadow map. Samples outside
/// the map compare as lit.
pub fn create_shadow_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("shadow map sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        lod_min_clamp: 0.0,
        lod_max_clamp: 100.0,
        ..Default::default()
    })
}

pub fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_modes_map_to_address_modes() {
        assert_eq!(
            wgpu::AddressMode::ClampToEdge,
            address_mode(WrapMode::ClampToEdge)
        );
        assert_eq!(wgpu::AddressMode::Repeat, address_mode(WrapMode::Repeat));
    }
}
