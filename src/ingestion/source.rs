//! Serde model of the source document set and body flattening.

use serde::Deserialize;

/// One item of the source JSON array.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceItem {
    /// Originating file name; falls back to the ingested path when absent.
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content: Option<SourceContent>,
}

/// The structured document payload.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub takeaway: String,
    #[serde(default)]
    pub podcast_details: Option<PodcastDetails>,
    #[serde(default)]
    pub key_insights: Vec<KeyInsight>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PodcastDetails {
    #[serde(default)]
    pub guest: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct KeyInsight {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub points: Vec<String>,
}

impl SourceContent {
    /// Flattens the structured fields into one embeddable text body.
    ///
    /// The field order is fixed: title, guest, overview, takeaway, then one
    /// paragraph per insight that has both a heading and points. A missing
    /// guest renders as `N/A`.
    pub fn flatten(&self) -> String {
        let guest = self
            .podcast_details
            .as_ref()
            .and_then(|details| details.guest.as_deref())
            .unwrap_or("N/A");

        let mut body = format!(
            "Title: {}\nGuest: {}\nOverview: {}\nTakeaway: {}",
            self.title, guest, self.overview, self.takeaway
        );
        for insight in &self.key_insights {
            if insight.heading.is_empty() || insight.points.is_empty() {
                continue;
            }
            body.push_str(&format!(
                "\n\nInsight: {}\n- {}",
                insight.heading,
                insight.points.join("\n- ")
            ));
        }
        body
    }
}
