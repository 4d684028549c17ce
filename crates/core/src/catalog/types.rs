use serde::{Deserialize, Serialize};

/// A clip that may be relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stream locator (HLS playlist URL).
    pub locator: String,
    pub title: String,
    /// Preview image URL.
    pub image_url: String,
    /// Opaque classification code from the catalog.
    pub code: String,
    /// Playable duration in seconds, known only after probing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl Candidate {
    pub fn new(locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            image_url: String::new(),
            code: String::new(),
            duration_secs: None,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

/// Catalog entry as served by the remote endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct CatalogEntry {
    pub m3u8_url: String,
    pub title: String,
    pub bg: String,
    #[serde(rename = "movieInfo")]
    pub movie_info: MovieInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MovieInfo {
    pub code: String,
}

impl From<CatalogEntry> for Candidate {
    fn from(entry: CatalogEntry) -> Self {
        Candidate::new(entry.m3u8_url, entry.title)
            .with_image_url(entry.bg)
            .with_code(entry.movie_info.code)
    }
}
