/// File categorization: which folder under the root a file belongs in.
///
/// Categories are ordered lists of folder names (`["Documents", "Reports"]`).
/// They come from a [`ClassificationScheme`] when one is in use, and from the
/// file's MIME type otherwise. Source code always lands in `Code`.
///
/// # Examples
///
/// ```
/// use sortwise::file_category::CategoryResolver;
/// use sortwise::scheme::ClassificationScheme;
/// use std::path::Path;
///
/// let resolver = CategoryResolver::default();
/// let empty = ClassificationScheme::new();
/// assert_eq!(resolver.resolve(Path::new("a.png"), Some("image/png"), &empty), ["image"]);
/// assert_eq!(resolver.resolve(Path::new("a.zip"), Some("application/zip"), &empty), ["documents"]);
/// assert_eq!(resolver.resolve(Path::new("main.py"), Some("text/x-python"), &empty), ["Code"]);
/// ```
use crate::scheme::ClassificationScheme;
use std::collections::HashSet;
use std::path::Path;

/// Source code extensions. Files with these are always filed under [`CODE_CATEGORY`].
pub const CODE_EXTENSIONS: &[&str] = &[
    "c", "java", "py", "cpp", "h", "js", "cs", "rs", "ts", "go", "hpp",
];

/// Disk images and installer packages, deleted before categorization.
pub const EXCLUDED_EXTENSIONS: &[&str] = &["dmg", "pkg", "mpkg"];

pub const CODE_CATEGORY: &str = "Code";

/// Guesses the MIME type of a file.
///
/// The extension is tried first; for unknown extensions the file header is
/// sniffed. Returns `None` when neither gives an answer.
pub fn detect_mime(path: &Path) -> Option<String> {
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return Some(mime.to_string());
    }

    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_string())
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Maps files to category folders.
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    code_extensions: HashSet<String>,
    excluded_extensions: HashSet<String>,
}

impl CategoryResolver {
    /// Creates a resolver with the built-in code and excluded extension sets.
    pub fn new() -> Self {
        Self {
            code_extensions: CODE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            excluded_extensions: EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    /// Whether `path` is a source file (case-insensitive extension match).
    pub fn is_code(&self, path: &Path) -> bool {
        lowercase_extension(path).is_some_and(|ext| self.code_extensions.contains(&ext))
    }

    /// Whether `path` has an extension that is never organized, only deleted.
    pub fn is_excluded(&self, path: &Path) -> bool {
        lowercase_extension(path).is_some_and(|ext| self.excluded_extensions.contains(&ext))
    }

    /// Resolves the category folders for a file.
    ///
    /// With a non-empty scheme the lookup order is:
    /// 1. the lower-cased extension with its dot (`.pdf`)
    /// 2. the full MIME type (`application/pdf`)
    /// 3. the primary MIME type (`application`)
    /// 4. `application/drawing*` files go to `Images`
    /// 5. everything else goes to `Others`
    ///
    /// With an empty scheme the primary MIME type is the category, except that
    /// `application` becomes `documents`; files without a MIME type go to `others`.
    ///
    /// Source code overrides both and always resolves to `["Code"]`.
    pub fn resolve(
        &self,
        path: &Path,
        mime: Option<&str>,
        scheme: &ClassificationScheme,
    ) -> Vec<String> {
        if self.is_code(path) {
            return vec![CODE_CATEGORY.to_string()];
        }

        let mime = mime.map(str::to_lowercase);
        let primary = mime
            .as_deref()
            .and_then(|m| m.split('/').next())
            .filter(|p| !p.is_empty());

        if scheme.is_empty() {
            let category = match primary {
                Some("application") => "documents",
                Some(primary) => primary,
                None => "others",
            };
            return vec![category.to_string()];
        }

        if let Some(ext) = lowercase_extension(path)
            && let Some(segments) = scheme.get(&format!(".{ext}"))
        {
            return segments.to_vec();
        }

        if let Some(mime) = mime.as_deref()
            && let Some(segments) = scheme.get(mime)
        {
            return segments.to_vec();
        }

        if let Some(primary) = primary
            && let Some(segments) = scheme.get(primary)
        {
            return segments.to_vec();
        }

        if mime
            .as_deref()
            .is_some_and(|m| m.starts_with("application/drawing"))
        {
            return vec!["Images".to_string()];
        }

        vec!["Others".to_string()]
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new()
    }
}
