//! Metadata suggestion from file names

use crate::models::{ImageMetadata, MAX_KEYWORDS, MAX_TAGS};

struct Profile {
    title: &'static str,
    category: &'static str,
    caption: &'static str,
    keywords: &'static [&'static str],
    tags: &'static [&'static str],
}

const NATURE: Profile = Profile {
    title: "Nature Landscape Photography",
    category: "Nature & Landscape",
    caption: "A scenic outdoor landscape captured in natural light.",
    keywords: &["nature", "landscape", "outdoor", "scenic", "natural", "environment", "photography"],
    tags: &["nature", "landscape", "outdoor", "scenic"],
};

const PORTRAIT: Profile = Profile {
    title: "Professional Portrait Photography",
    category: "People & Lifestyle",
    caption: "A professional portrait with a lifestyle feel.",
    keywords: &["portrait", "people", "professional", "photography", "lifestyle", "human"],
    tags: &["portrait", "people", "lifestyle", "professional"],
};

const GENERAL: Profile = Profile {
    title: "Professional Stock Photography",
    category: "General",
    caption: "High-quality stock photograph suitable for commercial use.",
    keywords: &["stock", "photography", "professional", "commercial", "high-quality"],
    tags: &["stock", "photography", "professional"],
};

/// Suggest title, caption, keywords, tags and category for an uploaded file.
pub fn suggest_metadata(filename: &str) -> ImageMetadata {
    let name = filename.to_lowercase();
    let profile = if name.contains("nature") || name.contains("landscape") {
        &NATURE
    } else if name.contains("portrait") || name.contains("people") {
        &PORTRAIT
    } else {
        &GENERAL
    };

    ImageMetadata {
        title: profile.title.to_string(),
        caption: profile.caption.to_string(),
        keywords: profile
            .keywords
            .iter()
            .take(MAX_KEYWORDS)
            .map(|k| k.to_string())
            .collect(),
        tags: profile.tags.iter().take(MAX_TAGS).map(|t| t.to_string()).collect(),
        category: profile.category.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nature_and_landscape() {
        let meta = suggest_metadata("Mountain_LANDSCAPE_01.jpg");
        assert_eq!(meta.category, "Nature & Landscape");
        assert_eq!(meta.title, "Nature Landscape Photography");
        assert!(meta.keywords.contains(&"scenic".to_string()));
        assert_eq!(suggest_metadata("nature.png").category, "Nature & Landscape");
    }

    #[test]
    fn test_people() {
        let meta = suggest_metadata("people-at-market.webp");
        assert_eq!(meta.category, "People & Lifestyle");
        assert_eq!(meta.tags.len(), 4);
    }

    #[test]
    fn test_fallback() {
        let meta = suggest_metadata("IMG_0042.jpg");
        assert_eq!(meta.category, "General");
        assert_eq!(meta.title, "Professional Stock Photography");
    }

    #[test]
    fn test_limits() {
        for name in ["nature.jpg", "portrait.jpg", "x.jpg"] {
            let meta = suggest_metadata(name);
            assert!(meta.keywords.len() <= MAX_KEYWORDS);
            assert!(meta.tags.len() <= MAX_TAGS);
        }
    }
}
