//! Pixel buffers effects draw into.

use std::collections::HashMap;

use lumen_errors::EffectError;
use lumen_wire::LedColor;

/// Canvas geometry handed to effect factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl CanvasInfo {
    /// Total pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

/// A pixel buffer owned by one site's render loop.
///
/// Pixels are addressed linearly; two-dimensional canvases lay rows out
/// one after another.
pub trait Canvas: Send {
    /// Factory name of the canvas type.
    fn kind(&self) -> &str;

    /// Allocate a `width` x `height` buffer cleared to black.
    fn initialize(&mut self, width: u32, height: u32) -> Result<(), EffectError>;

    /// Pixels, row-major.
    fn pixels(&self) -> &[LedColor];

    /// Mutable pixels, row-major.
    fn pixels_mut(&mut self) -> &mut [LedColor];

    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Geometry.
    fn info(&self) -> CanvasInfo {
        CanvasInfo {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Number of pixels.
    fn pixel_count(&self) -> usize {
        self.pixels().len()
    }

    /// Set every pixel to `color`.
    fn fill(&mut self, color: LedColor) {
        self.pixels_mut().fill(color);
    }

    /// Set the pixel at column `x`, row `y`; out-of-range writes are ignored.
    fn set_pixel(&mut self, x: u32, y: u32, color: LedColor) {
        if x >= self.width() {
            return;
        }
        let index = (y as usize)
            .saturating_mul(self.width() as usize)
            .saturating_add(x as usize);
        if let Some(pixel) = self.pixels_mut().get_mut(index) {
            *pixel = color;
        }
    }
}

/// Row-major in-memory canvas.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    kind: &'static str,
    width: u32,
    height: u32,
    pixels: Vec<LedColor>,
}

impl PixelCanvas {
    /// Factory name of the strip canvas.
    pub const STRIP: &'static str = "Canvas1D";
    /// Factory name of the matrix canvas.
    pub const MATRIX: &'static str = "Canvas2D";

    /// Uninitialized strip canvas.
    pub fn strip() -> Self {
        Self::with_kind(Self::STRIP)
    }

    /// Uninitialized matrix canvas.
    pub fn matrix() -> Self {
        Self::with_kind(Self::MATRIX)
    }

    fn with_kind(kind: &'static str) -> Self {
        Self {
            kind,
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }
}

impl Canvas for PixelCanvas {
    fn kind(&self) -> &str {
        self.kind
    }

    fn initialize(&mut self, width: u32, height: u32) -> Result<(), EffectError> {
        let count = (width as usize).saturating_mul(height as usize);
        if count == 0 {
            return Err(EffectError::render_fault(
                self.kind,
                format!("canvas {width}x{height} has no pixels"),
            ));
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![LedColor::BLACK; count];
        Ok(())
    }

    fn pixels(&self) -> &[LedColor] {
        &self.pixels
    }

    fn pixels_mut(&mut self) -> &mut [LedColor] {
        &mut self.pixels
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Canvas constructor.
pub type CanvasFactory = Box<dyn Fn() -> Box<dyn Canvas> + Send + Sync>;

/// Name to canvas constructor table, built once at startup.
pub struct CanvasRegistry {
    factories: HashMap<String, CanvasFactory>,
}

impl std::fmt::Debug for CanvasRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasRegistry")
            .field("canvases", &self.names())
            .finish()
    }
}

impl Default for CanvasRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CanvasRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding `Canvas1D` and `Canvas2D`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PixelCanvas::STRIP, || Box::new(PixelCanvas::strip()));
        registry.register(PixelCanvas::MATRIX, || Box::new(PixelCanvas::matrix()));
        registry
    }

    /// Register a factory. The first registration of a name wins; returns
    /// `false` if the name was already taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Box<dyn Canvas> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return false;
        }
        self.factories.insert(name, Box::new(factory));
        true
    }

    /// Construct and initialize a canvas, `None` if the name is unknown or
    /// the geometry is rejected.
    pub fn create(&self, name: &str, width: u32, height: u32) -> Option<Box<dyn Canvas>> {
        let mut canvas = self.factories.get(name).map(|factory| factory())?;
        canvas.initialize(width, height).ok()?;
        Some(canvas)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
