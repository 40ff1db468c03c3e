/// Pixel formats, color spaces, present modes, extents and vertex formats

/// Image / attachment / surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    UNDEFINED,
    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    A2B10G10R10_UNORM_PACK32,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
    // Depth / stencil formats
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl Format {
    /// True for formats with a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM | Format::D32_SFLOAT | Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// True for formats with a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT)
    }

    /// Bytes per texel of an uploadable color format
    pub fn texel_size(&self) -> Option<u32> {
        match self {
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::A2B10G10R10_UNORM_PACK32
            | Format::R32_SFLOAT => Some(4),
            Format::R16G16B16A16_SFLOAT => Some(8),
            Format::R32G32B32A32_SFLOAT => Some(16),
            _ => None,
        }
    }
}

/// Surface color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    ExtendedSrgbLinear,
    DisplayP3Nonlinear,
    Hdr10St2084,
}

/// A (format, color space) pair as exposed by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: Format,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    /// BGRA8-UNORM + sRGB-nonlinear, preferred by adapter scoring and swapchain selection
    pub const PREFERRED: SurfaceFormat = SurfaceFormat {
        format: Format::B8G8R8A8_UNORM,
        color_space: ColorSpace::SrgbNonlinear,
    };
}

/// Presentation mode of a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No vertical sync, may tear
    Immediate,
    /// Triple-buffered, latest image replaces the queued one
    Mailbox,
    /// Vertical sync (always available)
    Fifo,
    /// Vertical sync, tears when a frame is late
    FifoRelaxed,
}

/// 2D size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp each dimension into `[min, max]`
    pub fn clamp(&self, min: Extent2D, max: Extent2D) -> Extent2D {
        Extent2D {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    /// 1 sample (no multisampling)
    S1,
    /// 2 samples
    S2,
    /// 4 samples
    S4,
    /// 8 samples
    S8,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_SINT,
    R32G32_SINT,
    R32G32B32_SINT,
    R32G32B32A32_SINT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
}

impl VertexFormat {
    /// Size in bytes of one attribute of this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::R32_SFLOAT | VertexFormat::R32_SINT | VertexFormat::R32_UINT => 4,
            VertexFormat::R32G32_SFLOAT | VertexFormat::R32G32_SINT | VertexFormat::R32G32_UINT => 8,
            VertexFormat::R32G32B32_SFLOAT | VertexFormat::R32G32B32_SINT | VertexFormat::R32G32B32_UINT => 12,
            VertexFormat::R32G32B32A32_SFLOAT
            | VertexFormat::R32G32B32A32_SINT
            | VertexFormat::R32G32B32A32_UINT => 16,
        }
    }

    /// Float vector format with `components` lanes (1..=4)
    pub fn float_vector(components: u32) -> Option<VertexFormat> {
        match components {
            1 => Some(VertexFormat::R32_SFLOAT),
            2 => Some(VertexFormat::R32G32_SFLOAT),
            3 => Some(VertexFormat::R32G32B32_SFLOAT),
            4 => Some(VertexFormat::R32G32B32A32_SFLOAT),
            _ => None,
        }
    }

    /// Signed integer vector format with `components` lanes (1..=4)
    pub fn sint_vector(components: u32) -> Option<VertexFormat> {
        match components {
            1 => Some(VertexFormat::R32_SINT),
            2 => Some(VertexFormat::R32G32_SINT),
            3 => Some(VertexFormat::R32G32B32_SINT),
            4 => Some(VertexFormat::R32G32B32A32_SINT),
            _ => None,
        }
    }

    /// Unsigned integer vector format with `components` lanes (1..=4)
    pub fn uint_vector(components: u32) -> Option<VertexFormat> {
        match components {
            1 => Some(VertexFormat::R32_UINT),
            2 => Some(VertexFormat::R32G32_UINT),
            3 => Some(VertexFormat::R32G32B32_UINT),
            4 => Some(VertexFormat::R32G32B32A32_UINT),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
