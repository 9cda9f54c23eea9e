//! The texture bank loads image based surface maps by name and hands out
//! shared handles to them.
//!
//! Loading never blocks: `TextureBank::load` returns a handle immediately and
//! the image is fetched and decoded in the background. Until the image arrives
//! (or if it never does) the handle reports itself as not ready and renderers
//! are expected to substitute a 1x1 placeholder.
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::PathBuf,
    rc::Rc,
    sync::{mpsc, Arc},
};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Controls how texture coordinates outside of [0, 1] are handled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Sampling settings shared by every user of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureSettings {
    /// Wrap mode along the U axis.
    pub wrap_s: WrapMode,
    /// Wrap mode along the V axis.
    pub wrap_t: WrapMode,
    /// Number of times the texture is tiled across a surface in U and V.
    pub repeat: Vec2,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            repeat: Vec2::ONE,
        }
    }
}

/// The color space that texel values are stored in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Color data authored in sRGB.
    Srgb,
    /// Non-color data (normals, roughness, masks...).
    Linear,
}

/// The kinds of surface maps a material can reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKind {
    Color,
    Alpha,
    AmbientOcclusion,
    Height,
    Normal,
    Metalness,
    Roughness,
}

impl MapKind {
    /// File stem used for this map inside a material's texture directory.
    pub fn file_stem(self) -> &'static str {
        match self {
            MapKind::Color => "color",
            MapKind::Alpha => "alpha",
            MapKind::AmbientOcclusion => "ambientOcclusion",
            MapKind::Height => "height",
            MapKind::Normal => "normal",
            MapKind::Metalness => "metalness",
            MapKind::Roughness => "roughness",
        }
    }

    /// Only color maps hold sRGB data.
    pub fn color_space(self) -> ColorSpace {
        match self {
            MapKind::Color => ColorSpace::Srgb,
            _ => ColorSpace::Linear,
        }
    }

    fn from_texture_name(name: &str) -> Option<Self> {
        let stem = name.rsplit('/').next()?;
        [
            MapKind::Color,
            MapKind::Alpha,
            MapKind::AmbientOcclusion,
            MapKind::Height,
            MapKind::Normal,
            MapKind::Metalness,
            MapKind::Roughness,
        ]
        .into_iter()
        .find(|kind| kind.file_stem() == stem)
    }
}

/// Load progress of a single texture.
#[derive(Clone, Debug)]
pub enum TextureState {
    /// The image is still being fetched or decoded.
    Pending,
    /// The image finished loading.
    Ready(Rc<image::RgbaImage>),
    /// The image could not be fetched or decoded and never will be.
    Failed(Rc<str>),
}

/// A named texture. Handles are shared, so changes to the sampling settings
/// are seen by every material using the texture.
#[derive(Debug)]
pub struct Texture {
    name: String,
    path: String,
    color_space: ColorSpace,
    settings: Cell<TextureSettings>,
    state: RefCell<TextureState>,
    /// Incremented every time the settings or load state change so consumers
    /// can cheaply detect stale copies.
    revision: Cell<u64>,
}

pub type TextureHandle = Rc<Texture>;

impl Texture {
    fn new(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            color_space: MapKind::from_texture_name(name)
                .map(MapKind::color_space)
                .unwrap_or(ColorSpace::Srgb),
            settings: Cell::new(TextureSettings::default()),
            state: RefCell::new(TextureState::Pending),
            revision: Cell::new(0),
        }
    }

    /// The logical name this texture was loaded with (e.g. `door/color`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the image file relative to the texture source.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn settings(&self) -> TextureSettings {
        self.settings.get()
    }

    /// Set the wrap mode along the U (`s`) and V (`t`) axes.
    pub fn set_wrap(&self, wrap_s: WrapMode, wrap_t: WrapMode) {
        let mut settings = self.settings.get();
        settings.wrap_s = wrap_s;
        settings.wrap_t = wrap_t;
        self.settings.set(settings);
        self.bump_revision();
    }

    /// Set how many times the texture tiles across the surface.
    pub fn set_repeat(&self, u: f32, v: f32) {
        let mut settings = self.settings.get();
        settings.repeat = Vec2::new(u, v);
        self.settings.set(settings);
        self.bump_revision();
    }

    pub fn state(&self) -> TextureState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), TextureState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.borrow(), TextureState::Failed(_))
    }

    /// Get the decoded image if it has finished loading.
    pub fn image(&self) -> Option<Rc<image::RgbaImage>> {
        match &*self.state.borrow() {
            TextureState::Ready(image) => Some(image.clone()),
            _ => None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    fn resolve(&self, state: TextureState) {
        *self.state.borrow_mut() = state;
        self.bump_revision();
    }

    fn bump_revision(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to fetch texture '{path}': {reason}")]
    Fetch { path: String, reason: String },
    #[error("failed to decode texture '{path}'")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Somewhere texture image bytes can be read from.
pub trait TextureSource: Send + Sync {
    /// Read the raw (encoded) bytes stored at `path`. This may block and is
    /// always called off the main thread on native targets.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TextureError>;

    /// The location `path` resolves to, used for logging and web fetches.
    fn locate(&self, path: &str) -> PathBuf {
        PathBuf::from(path)
    }
}

/// Reads textures from a directory on disk.
#[derive(Clone, Debug)]
pub struct FileTextureSource {
    root: PathBuf,
}

impl FileTextureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TextureSource for FileTextureSource {
    #[cfg(not(target_arch = "wasm32"))]
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TextureError> {
        crate::platform::load_as_binary(&self.root, path).map_err(|e| TextureError::Fetch {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    #[cfg(target_arch = "wasm32")]
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TextureError> {
        Err(TextureError::Fetch {
            path: path.to_string(),
            reason: "synchronous reads are not available on the web".to_string(),
        })
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

/// Serves textures from memory, keyed by path.
#[derive(Clone, Debug, Default)]
pub struct MemoryTextureSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }
}

impl TextureSource for MemoryTextureSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TextureError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| TextureError::Fetch {
                path: path.to_string(),
                reason: "not found".to_string(),
            })
    }
}

struct LoadResult {
    name: String,
    result: Result<image::RgbaImage, TextureError>,
}

fn decode(path: &str, bytes: &[u8]) -> Result<image::RgbaImage, TextureError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|source| TextureError::Decode {
            path: path.to_string(),
            source,
        })
}

/// Loads and caches textures by logical name.
pub struct TextureBank {
    source: Arc<dyn TextureSource>,
    textures: HashMap<String, TextureHandle>,
    sender: mpsc::Sender<LoadResult>,
    receiver: mpsc::Receiver<LoadResult>,
    in_flight: usize,
}

impl TextureBank {
    /// Texture files live under this directory of the texture source.
    pub const TEXTURE_DIR: &'static str = "textures";

    pub fn new(source: Arc<dyn TextureSource>) -> Self {
        let (sender, receiver) = mpsc::channel();

        Self {
            source,
            textures: HashMap::new(),
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Get the texture called `name`, starting a background load the first
    /// time the name is requested. `door/color` is read from
    /// `textures/door/color.jpg`.
    ///
    /// Repeated loads of the same name return the same shared handle.
    pub fn load(&mut self, name: &str) -> TextureHandle {
        if let Some(texture) = self.textures.get(name) {
            return texture.clone();
        }

        let path = format!("{}/{}.jpg", Self::TEXTURE_DIR, name);
        let texture = Rc::new(Texture::new(name, path.clone()));
        self.textures.insert(name.to_string(), texture.clone());

        self.spawn_fetch(name.to_string(), path);
        texture
    }

    /// Load the map of the given kind from a material texture directory, eg
    /// (`bricks`, `MapKind::Normal`) loads `bricks/normal`.
    pub fn load_map(&mut self, dir: &str, kind: MapKind) -> TextureHandle {
        self.load(&format!("{}/{}", dir, kind.file_stem()))
    }

    /// Get a previously loaded texture.
    pub fn get(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).cloned()
    }

    /// Number of textures still waiting on their image.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Apply any finished background loads to their textures. Returns the
    /// number of textures that changed state.
    pub fn poll(&mut self) -> usize {
        let mut completed = 0;

        while let Ok(finished) = self.receiver.try_recv() {
            self.apply(finished);
            completed += 1;
        }

        completed
    }

    /// Block until every in flight load finishes or `timeout` passes. Returns
    /// true if nothing is left pending.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn wait_idle(&mut self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;

        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(finished) => self.apply(finished),
                Err(_) => return false,
            }
        }

        true
    }

    fn apply(&mut self, finished: LoadResult) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Some(texture) = self.textures.get(&finished.name) else {
            return;
        };

        match finished.result {
            Ok(image) => {
                debug!(
                    "texture '{}' loaded ({}x{})",
                    finished.name,
                    image.width(),
                    image.height()
                );
                texture.resolve(TextureState::Ready(Rc::new(image)));
            }
            Err(e) => {
                warn!("texture '{}' unavailable, using placeholder: {e}", finished.name);
                texture.resolve(TextureState::Failed(e.to_string().into()));
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_fetch(&mut self, name: String, path: String) {
        let source = self.source.clone();
        let sender = self.sender.clone();
        let thread_name = format!("texture {name}");
        let task_name = name.clone();

        let spawned = std::thread::Builder::new().name(thread_name).spawn(move || {
            let result = source.fetch(&path).and_then(|bytes| decode(&path, &bytes));
            // The bank may have been dropped, in which case nobody cares.
            let _ = sender.send(LoadResult {
                name: task_name,
                result,
            });
        });

        self.in_flight += 1;

        if let Err(e) = spawned {
            self.apply(LoadResult {
                name,
                result: Err(TextureError::Fetch {
                    path: String::new(),
                    reason: format!("could not start loader thread: {e}"),
                }),
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn_fetch(&mut self, name: String, path: String) {
        let sender = self.sender.clone();
        let location = self.source.locate(&path);
        self.in_flight += 1;

        wasm_bindgen_futures::spawn_local(async move {
            let result = match crate::platform::fetch_as_binary(&location).await {
                Ok(bytes) => decode(&path, &bytes),
                Err(e) => Err(TextureError::Fetch {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            };
            let _ = sender.send(LoadResult { name, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, time::Duration};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn bank_with(files: &[(&str, Vec<u8>)]) -> TextureBank {
        let mut source = MemoryTextureSource::new();
        for (path, bytes) in files {
            source.insert(*path, bytes.clone());
        }
        TextureBank::new(Arc::new(source))
    }

    #[test]
    fn load_returns_same_handle_for_same_name() {
        let mut bank = bank_with(&[]);
        let a = bank.load("roof/color");
        let b = bank.load("roof/color");

        assert!(Rc::ptr_eq(&a, &b));

        a.set_repeat(4.0, 4.0);
        a.set_wrap(WrapMode::Repeat, WrapMode::Repeat);
        assert_eq!(a.settings(), b.settings());
        assert_eq!(Vec2::new(4.0, 4.0), b.settings().repeat);
    }

    #[test]
    fn handle_is_usable_before_load_finishes() {
        let mut bank = bank_with(&[]);
        let texture = bank.load("door/alpha");

        assert_eq!("textures/door/alpha.jpg", texture.path());
        assert_eq!(ColorSpace::Linear, texture.color_space());
        assert!(texture.image().is_none());
    }

    #[test]
    fn loaded_texture_becomes_ready() {
        let mut bank = bank_with(&[("textures/ground/color.jpg", png_bytes(2, 3))]);
        let texture = bank.load("ground/color");
        let revision = texture.revision();

        assert!(bank.wait_idle(Duration::from_secs(10)));

        assert!(texture.is_ready());
        assert!(texture.revision() > revision);
        let image = texture.image().unwrap();
        assert_eq!((2, 3), image.dimensions());
        assert_eq!(ColorSpace::Srgb, texture.color_space());
    }

    #[test]
    fn missing_texture_fails_without_aborting() {
        let mut bank = bank_with(&[]);
        let texture = bank.load("bricks/normal");

        assert!(bank.wait_idle(Duration::from_secs(10)));

        assert!(texture.is_failed());
        assert!(texture.image().is_none());
        assert_eq!(0, bank.pending());
    }

    #[test]
    fn undecodable_texture_fails() {
        let mut bank = bank_with(&[("textures/door/height.jpg", vec![0, 1, 2, 3])]);
        let texture = bank.load_map("door", MapKind::Height);

        assert!(bank.wait_idle(Duration::from_secs(10)));
        assert!(texture.is_failed());
        assert_eq!("door/height", texture.name());
    }

    #[test]
    fn poll_applies_finished_loads() {
        let mut bank = bank_with(&[("textures/roof/roughness.jpg", png_bytes(1, 1))]);
        let texture = bank.load_map("roof", MapKind::Roughness);

        let mut applied = 0;
        for _ in 0..1000 {
            applied += bank.poll();
            if applied > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(1, applied);
        assert!(texture.is_ready());
        assert!(bank.get("roof/roughness").is_some());
    }
}
