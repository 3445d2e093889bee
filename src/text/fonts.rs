//! Font lookup: stores that hand out font bytes and the ordered resolver chain

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Known family aliases and the font resource each maps to
pub const FONT_ALIASES: &[(&str, &str)] = &[
    ("Arial", "arial.ttf"),
    ("Times", "times.ttf"),
    ("Helvetica", "helvetica.ttf"),
    ("Georgia", "georgia.ttf"),
    ("Verdana", "verdana.ttf"),
];

const SCALABLE_EXTENSIONS: &[&str] = &[".ttf", ".otf", ".ttc"];

/// A scalable font file loaded into memory
#[derive(Clone)]
pub struct FontHandle {
    resource: String,
    data: Arc<Vec<u8>>,
}

impl FontHandle {
    pub fn new<S: Into<String>>(resource: S, data: Arc<Vec<u8>>) -> Self {
        Self {
            resource: resource.into(),
            data,
        }
    }

    /// Resource name the font was resolved from
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Raw font file bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("resource", &self.resource)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Source of scalable fonts, looked up by resource name
///
/// Lookups are best-effort: a missing font is `None`, never an error.
pub trait FontStore: Send + Sync {
    fn resolve(&self, resource: &str) -> Option<FontHandle>;
}

/// Font store that searches a list of directories on disk
#[derive(Debug, Clone)]
pub struct DirectoryFontStore {
    search_dirs: Vec<PathBuf>,
    max_depth: usize,
}

impl DirectoryFontStore {
    /// Store searching only the given directories
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_dirs: dirs.into_iter().map(Into::into).collect(),
            max_depth: 4,
        }
    }

    /// Store searching `fonts/` plus the usual system font directories
    #[must_use]
    pub fn with_default_dirs() -> Self {
        Self::new([
            "fonts",
            "/usr/share/fonts",
            "/usr/local/share/fonts",
            "/Library/Fonts",
            "/System/Library/Fonts",
            "C:\\Windows\\Fonts",
        ])
    }

    /// Add a directory searched before the existing ones
    #[must_use]
    pub fn with_priority_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.search_dirs.insert(0, dir.into());
        self
    }

    #[must_use]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    fn find_file(&self, resource: &str) -> Option<PathBuf> {
        let direct = Path::new(resource);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct.to_path_buf());
        }

        for dir in self.search_dirs.iter().filter(|dir| dir.is_dir()) {
            let candidate = dir.join(resource);
            if candidate.is_file() {
                return Some(candidate);
            }

            let found = WalkDir::new(dir)
                .max_depth(self.max_depth)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .find(|entry| {
                    entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.eq_ignore_ascii_case(resource))
                });
            if let Some(entry) = found {
                return Some(entry.into_path());
            }
        }
        None
    }
}

impl FontStore for DirectoryFontStore {
    fn resolve(&self, resource: &str) -> Option<FontHandle> {
        let path = self.find_file(resource)?;
        match std::fs::read(&path) {
            Ok(data) => {
                debug!(resource, path = %path.display(), "Loaded font from disk");
                Some(FontHandle::new(resource, Arc::new(data)))
            },
            Err(e) => {
                debug!(resource, path = %path.display(), error = %e, "Font file unreadable");
                None
            },
        }
    }
}

/// Font store backed by an in-memory table
#[derive(Default, Clone)]
pub struct MemoryFontStore {
    fonts: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryFontStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register font bytes under a resource name
    pub fn insert<S: Into<String>>(&mut self, resource: S, data: Vec<u8>) {
        self.fonts.insert(resource.into(), Arc::new(data));
    }

    #[must_use]
    pub fn with_font<S: Into<String>>(mut self, resource: S, data: Vec<u8>) -> Self {
        self.insert(resource, data);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl FontStore for MemoryFontStore {
    fn resolve(&self, resource: &str) -> Option<FontHandle> {
        self.fonts
            .get(resource)
            .map(|data| FontHandle::new(resource, Arc::clone(data)))
    }
}

/// Outcome of font resolution
#[derive(Debug, Clone)]
pub enum ResolvedFont {
    /// A scalable font; text gets an outline
    Scalable(FontHandle),
    /// The built-in bitmap font; fill only
    Bitmap,
}

impl ResolvedFont {
    #[must_use]
    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::Scalable(_))
    }
}

/// One step of the resolution chain
pub trait ResolverStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Try to produce a font for the family, or pass to the next strategy
    fn resolve(&self, family: &str, store: &dyn FontStore) -> Option<FontHandle>;
}

/// Looks the family up in the alias table
pub struct AliasResolver;

impl AliasResolver {
    #[must_use]
    pub fn resource_for(family: &str) -> Option<&'static str> {
        FONT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == family)
            .map(|(_, resource)| *resource)
    }
}

impl ResolverStrategy for AliasResolver {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn resolve(&self, family: &str, store: &dyn FontStore) -> Option<FontHandle> {
        store.resolve(Self::resource_for(family)?)
    }
}

/// Treats the family itself as a font file name
pub struct ExtensionResolver;

impl ExtensionResolver {
    #[must_use]
    pub fn resource_for(family: &str) -> String {
        let lower = family.trim().to_lowercase();
        if SCALABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            lower
        } else {
            format!("{lower}.ttf")
        }
    }
}

impl ResolverStrategy for ExtensionResolver {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn resolve(&self, family: &str, store: &dyn FontStore) -> Option<FontHandle> {
        if family.trim().is_empty() {
            return None;
        }
        store.resolve(&Self::resource_for(family))
    }
}

/// Ordered strategy chain ending in the built-in bitmap font
pub struct FontResolver {
    store: Arc<dyn FontStore>,
    strategies: Vec<Box<dyn ResolverStrategy>>,
}

impl FontResolver {
    /// Resolver with the alias and extension strategies
    pub fn new(store: Arc<dyn FontStore>) -> Self {
        Self {
            store,
            strategies: vec![Box::new(AliasResolver), Box::new(ExtensionResolver)],
        }
    }

    /// Resolver with a custom strategy list
    pub fn with_strategies(
        store: Arc<dyn FontStore>,
        strategies: Vec<Box<dyn ResolverStrategy>>,
    ) -> Self {
        Self { store, strategies }
    }

    /// Resolve a family; never fails
    #[must_use]
    pub fn resolve(&self, family: &str) -> ResolvedFont {
        for strategy in &self.strategies {
            if let Some(handle) = strategy.resolve(family, self.store.as_ref()) {
                debug!(
                    family,
                    strategy = strategy.name(),
                    resource = handle.resource(),
                    "Resolved scalable font"
                );
                return ResolvedFont::Scalable(handle);
            }
            trace!(family, strategy = strategy.name(), "Strategy found no font");
        }
        debug!(family, "No scalable font found, using built-in bitmap font");
        ResolvedFont::Bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(store: MemoryFontStore) -> FontResolver {
        FontResolver::new(Arc::new(store))
    }

    #[test]
    fn test_alias_table_lookup() {
        assert_eq!(AliasResolver::resource_for("Arial"), Some("arial.ttf"));
        assert_eq!(AliasResolver::resource_for("Verdana"), Some("verdana.ttf"));
        assert_eq!(AliasResolver::resource_for("Comic Sans"), None);
    }

    #[test]
    fn test_extension_resource_names() {
        assert_eq!(ExtensionResolver::resource_for("DejaVuSans"), "dejavusans.ttf");
        assert_eq!(ExtensionResolver::resource_for("Roboto.TTF"), "roboto.ttf");
        assert_eq!(ExtensionResolver::resource_for("Inter.otf"), "inter.otf");
    }

    #[test]
    fn test_chain_prefers_alias() {
        let store = MemoryFontStore::new()
            .with_font("arial.ttf", vec![1])
            .with_font("arial.ttf.ttf", vec![2]);
        match resolver_with(store).resolve("Arial") {
            ResolvedFont::Scalable(handle) => assert_eq!(handle.resource(), "arial.ttf"),
            ResolvedFont::Bitmap => panic!("expected alias hit"),
        }
    }

    #[test]
    fn test_chain_falls_through_to_extension() {
        let store = MemoryFontStore::new().with_font("lobster.ttf", vec![1, 2, 3]);
        let resolved = resolver_with(store).resolve("Lobster");
        match resolved {
            ResolvedFont::Scalable(handle) => {
                assert_eq!(handle.resource(), "lobster.ttf");
                assert_eq!(handle.data(), &[1, 2, 3]);
            },
            ResolvedFont::Bitmap => panic!("expected extension hit"),
        }
    }

    #[test]
    fn test_alias_miss_then_extension_on_lowercased_family() {
        // "Georgia" maps to georgia.ttf, which the extension rule also yields
        let store = MemoryFontStore::new().with_font("georgia.ttf", vec![7]);
        assert!(resolver_with(store).resolve("Georgia").is_scalable());
    }

    #[test]
    fn test_chain_ends_in_bitmap() {
        let resolver = resolver_with(MemoryFontStore::new());
        assert!(!resolver.resolve("Arial").is_scalable());
        assert!(!resolver.resolve("").is_scalable());
        assert!(!resolver.resolve("Nonexistent Family").is_scalable());
    }

    #[test]
    fn test_directory_store_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("truetype").join("custom");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Custom.ttf"), b"fontbytes").unwrap();

        let store = DirectoryFontStore::new([dir.path()]);
        let handle = store.resolve("custom.ttf").expect("case-insensitive nested match");
        assert_eq!(handle.data(), b"fontbytes");
        assert!(store.resolve("missing.ttf").is_none());
    }

    #[test]
    fn test_directory_store_ignores_missing_dirs() {
        let store = DirectoryFontStore::new(["/definitely/not/a/real/dir"]);
        assert!(store.resolve("arial.ttf").is_none());
    }
}
