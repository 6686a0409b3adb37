//! Template Registry - resolve a template name to its field definitions
//!
//! Two catalogs sit behind one lookup:
//!
//! - [`BuiltinCatalog`] - templates embedded at compile time from `templates/`
//! - [`FileCatalog`] - `<dir>/<name>.json` files, read on every lookup
//!
//! Catalogs are consulted in order and the first hit wins. A miss in every
//! catalog is [`TemplateError::NotFound`].

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::{TemplateError, TemplateResult};
use crate::models::Template;

/// Directory where file templates are stored (relative to current dir)
pub const DEFAULT_TEMPLATES_DIR: &str = "data-store/templates";

/// Name of the default built-in template.
pub const DEFAULT_TEMPLATE: &str = "Account_Setup_and_Data_Load_PM-C_template";

/// Name of the built-in business-field template used by mapping preview.
pub const BUSINESS_FIELDS_TEMPLATE: &str = "Webhook_Business_Fields_template";

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    (
        DEFAULT_TEMPLATE,
        include_str!("../../templates/Account_Setup_and_Data_Load_PM-C_template.json"),
    ),
    (
        BUSINESS_FIELDS_TEMPLATE,
        include_str!("../../templates/Webhook_Business_Fields_template.json"),
    ),
];

/// A source of templates.
pub trait TemplateCatalog: Send + Sync {
    /// Short label for log messages.
    fn label(&self) -> &'static str;

    /// Find a template by name. `Ok(None)` means "not in this catalog".
    fn find(&self, name: &str) -> TemplateResult<Option<Template>>;

    /// All templates in this catalog.
    fn list(&self) -> TemplateResult<Vec<Template>>;
}

// =============================================================================
// Built-in catalog
// =============================================================================

/// Templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    pub fn names() -> Vec<&'static str> {
        BUILTIN_SOURCES.iter().map(|(name, _)| *name).collect()
    }

    pub fn contains(name: &str) -> bool {
        BUILTIN_SOURCES.iter().any(|(n, _)| *n == name)
    }

    fn parse(source: &str) -> TemplateResult<Template> {
        let template: Template = serde_json::from_str(source)?;
        template.check()?;
        Ok(template)
    }
}

impl TemplateCatalog for BuiltinCatalog {
    fn label(&self) -> &'static str {
        "built-in"
    }

    fn find(&self, name: &str) -> TemplateResult<Option<Template>> {
        BUILTIN_SOURCES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, source)| Self::parse(source))
            .transpose()
    }

    fn list(&self) -> TemplateResult<Vec<Template>> {
        BUILTIN_SOURCES
            .iter()
            .map(|(_, source)| Self::parse(source))
            .collect()
    }
}

// =============================================================================
// File catalog
// =============================================================================

/// Templates stored as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    dir: PathBuf,
}

impl FileCatalog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a template with this name is stored at.
    pub fn template_path(&self, name: &str) -> TemplateResult<PathBuf> {
        let unsafe_name = name.is_empty()
            || name.contains(['/', '\\'])
            || name == "."
            || name.contains("..");
        if unsafe_name {
            return Err(TemplateError::Invalid(format!(
                "'{}' is not a valid template name",
                name
            )));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// Read and parse one template file. A file without a `name` takes its
    /// name from the file stem.
    fn read(path: &Path, fallback_name: &str) -> TemplateResult<Template> {
        let content = fs::read_to_string(path)?;
        let mut value: Value = serde_json::from_str(&content)?;

        let object = value.as_object_mut().ok_or_else(|| {
            TemplateError::Invalid(format!("{} is not a JSON object", path.display()))
        })?;
        object
            .entry("name")
            .or_insert_with(|| Value::String(fallback_name.to_string()));

        let template: Template = serde_json::from_value(value)?;
        template.check()?;
        Ok(template)
    }

    /// Store a template, replacing any file with the same name.
    pub fn save(&self, template: &Template) -> TemplateResult<PathBuf> {
        template.check()?;
        if BuiltinCatalog::contains(&template.name) {
            return Err(TemplateError::Invalid(format!(
                "'{}' is a built-in template name",
                template.name
            )));
        }

        let path = self.template_path(&template.name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, serde_json::to_string_pretty(template)?)?;
        Ok(path)
    }

    /// Import a template JSON file, optionally renaming it.
    pub fn import(&self, source: &Path, name: Option<&str>) -> TemplateResult<Template> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("imported");
        let mut template = Self::read(source, stem)?;
        if let Some(name) = name {
            template.name = name.to_string();
        }
        self.save(&template)?;
        Ok(template)
    }

    /// Delete a stored template.
    pub fn delete(&self, name: &str) -> TemplateResult<()> {
        let path = self.template_path(name)?;
        if !path.exists() {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

impl TemplateCatalog for FileCatalog {
    fn label(&self) -> &'static str {
        "file"
    }

    fn find(&self, name: &str) -> TemplateResult<Option<Template>> {
        // A name that cannot be stored is simply absent from this catalog
        let Ok(path) = self.template_path(name) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path, name).map(Some)
    }

    fn list(&self) -> TemplateResult<Vec<Template>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let mut templates = Vec::new();
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            match Self::read(&path, &stem) {
                Ok(template) => templates.push(template),
                Err(e) => log_warning(format!("Skipping template {}: {}", path.display(), e)),
            }
        }
        Ok(templates)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered set of catalogs; the first catalog holding a name wins.
pub struct TemplateRegistry {
    catalogs: Vec<Box<dyn TemplateCatalog>>,
}

impl TemplateRegistry {
    /// Built-in templates, then files under [`DEFAULT_TEMPLATES_DIR`].
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_TEMPLATES_DIR)
    }

    /// Built-in templates, then files under `dir`.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_catalogs(vec![
            Box::new(BuiltinCatalog),
            Box::new(FileCatalog::new(dir)),
        ])
    }

    pub fn with_catalogs(catalogs: Vec<Box<dyn TemplateCatalog>>) -> Self {
        Self { catalogs }
    }

    /// Resolve a template by name.
    pub fn get(&self, name: &str) -> TemplateResult<Template> {
        for catalog in &self.catalogs {
            if let Some(template) = catalog.find(name)? {
                return Ok(template);
            }
        }
        Err(TemplateError::NotFound(name.to_string()))
    }

    /// Every template, earlier catalogs first. Later duplicates are hidden.
    pub fn list(&self) -> TemplateResult<Vec<Template>> {
        let mut all: Vec<Template> = Vec::new();
        for catalog in &self.catalogs {
            for template in catalog.list()? {
                if all.iter().any(|t| t.name == template.name) {
                    log_warning(format!(
                        "Template '{}' from {} catalog is shadowed",
                        template.name,
                        catalog.label()
                    ));
                    continue;
                }
                all.push(template);
            }
        }
        Ok(all)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
