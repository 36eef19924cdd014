//! Brand detection and logo lookup
//!
//! Brands are matched by case-insensitive substring against a product name.
//! A brand's sub-lines are checked before its generic mark, so "Adidas Samba"
//! resolves to the originals logo rather than the plain one.

use crate::error::{CatalogError, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// A brand mark and the keywords that select it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    /// Logo file stem, e.g. `new-balance`
    pub slug: String,
    pub keywords: Vec<String>,
    /// Product families with their own mark, checked first
    pub sublines: Vec<Brand>,
}

impl Brand {
    #[must_use]
    pub fn new(slug: &str, keywords: &[&str]) -> Self {
        Self {
            slug: slug.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            sublines: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subline(mut self, subline: Brand) -> Self {
        self.sublines.push(subline);
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }
}

/// Ordered brand keyword table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandCatalog {
    brands: Vec<Brand>,
}

impl Default for BrandCatalog {
    fn default() -> Self {
        let adidas_originals = Brand::new(
            "adidas-originals",
            &[
                "superstar",
                "stan smith",
                "gazelle",
                "campus",
                "samba",
                "forum",
                "continental",
                "nmd",
                "yeezy",
                "ozweego",
                "zx",
                "rivalry",
                "top ten",
                "sl 72",
                "handball spezial",
                "spezial",
                "prophere",
                "falcon",
            ],
        );

        Self::new(vec![
            Brand::new("adidas", &["adidas"]).with_subline(adidas_originals),
            Brand::new("airjordan", &["air jordan", "jordan"]),
            Brand::new("nike", &["nike"]),
            Brand::new("new-balance", &["new balance", "new-balance"]),
            Brand::new("asics", &["asics"]),
            Brand::new("puma", &["puma"]),
            Brand::new("veja", &["veja"]),
        ])
    }
}

impl BrandCatalog {
    #[must_use]
    pub fn new(brands: Vec<Brand>) -> Self {
        Self { brands }
    }

    /// Slug of the first brand mentioned in `product_name`, preferring sub-lines
    #[must_use]
    pub fn detect(&self, product_name: &str) -> Option<&str> {
        let name = product_name.to_lowercase();
        self.brands
            .iter()
            .find(|brand| brand.matches(&name))
            .map(|brand| {
                brand
                    .sublines
                    .iter()
                    .find(|subline| subline.matches(&name))
                    .unwrap_or(brand)
                    .slug
                    .as_str()
            })
    }
}

/// Directory of `{slug}.png` logo files
#[derive(Debug, Clone)]
pub struct LogoLibrary {
    root: PathBuf,
    catalog: BrandCatalog,
}

impl LogoLibrary {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            catalog: BrandCatalog::default(),
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: BrandCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &BrandCatalog {
        &self.catalog
    }

    /// Logo path for a product name, if a brand matches
    #[must_use]
    pub fn path_for(&self, product_name: &str) -> Option<PathBuf> {
        self.catalog
            .detect(product_name)
            .map(|slug| self.root.join(format!("{}.png", slug)))
    }

    /// Load and decode a logo file
    pub async fn load(path: &Path) -> Result<RgbaImage> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CatalogError::file_io_error("read logo", path, &e))?;
        let image = image::load_from_memory(&bytes)?;
        Ok(image.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subline_checked_before_generic_mark() {
        let catalog = BrandCatalog::default();
        assert_eq!(catalog.detect("Adidas Samba OG"), Some("adidas-originals"));
        assert_eq!(catalog.detect("ADIDAS Handball Spezial"), Some("adidas-originals"));
        assert_eq!(catalog.detect("adidas Ultraboost 22"), Some("adidas"));
    }

    #[test]
    fn test_brand_keywords() {
        let catalog = BrandCatalog::default();
        assert_eq!(catalog.detect("Air Jordan 1 Retro High"), Some("airjordan"));
        assert_eq!(catalog.detect("Jordan 4 Military Black"), Some("airjordan"));
        assert_eq!(catalog.detect("Nike Dunk Low"), Some("nike"));
        assert_eq!(catalog.detect("New-Balance 550"), Some("new-balance"));
        assert_eq!(catalog.detect("new balance 990v6"), Some("new-balance"));
        assert_eq!(catalog.detect("Asics Gel-Kayano"), Some("asics"));
        assert_eq!(catalog.detect("Puma Speedcat"), Some("puma"));
        assert_eq!(catalog.detect("Veja Campo"), Some("veja"));
        assert_eq!(catalog.detect("Unbranded canvas tote"), None);
    }

    #[test]
    fn test_table_order_wins() {
        // Both brands appear; the earlier table entry is chosen.
        let catalog = BrandCatalog::default();
        assert_eq!(catalog.detect("Nike x Jordan collab"), Some("airjordan"));
    }

    #[test]
    fn test_logo_paths() {
        let library = LogoLibrary::new("/srv/logos");
        assert_eq!(
            library.path_for("Adidas Gazelle Indoor"),
            Some(PathBuf::from("/srv/logos/adidas-originals.png"))
        );
        assert_eq!(library.path_for("plain mug"), None);
    }

    #[tokio::test]
    async fn test_load_missing_logo_fails() {
        let err = LogoLibrary::load(Path::new("/nonexistent/logo.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read logo"));
    }
}
