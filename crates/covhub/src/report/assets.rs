//! Static files referenced by HTML report pages.

/// Asset names and contents, in the order they are archived
pub const ASSETS: &[(&str, &str)] = &[
    ("base.css", include_str!("../../assets/base.css")),
    ("prettify.css", include_str!("../../assets/prettify.css")),
    ("prettify.js", include_str!("../../assets/prettify.js")),
    ("sorter.js", include_str!("../../assets/sorter.js")),
];

/// Look up an embedded asset by file name
#[must_use]
pub fn asset(name: &str) -> Option<&'static str> {
    ASSETS
        .iter()
        .find(|(asset, _)| *asset == name)
        .map(|(_, content)| *content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_assets_are_embedded() {
        for name in ["base.css", "sorter.js", "prettify.css", "prettify.js"] {
            assert!(asset(name).is_some_and(|c| !c.is_empty()), "{name}");
        }
    }

    #[test]
    fn test_unknown_asset_is_none() {
        assert!(asset("../Cargo.toml").is_none());
        assert!(asset("missing.css").is_none());
    }
}
