use feedscan_core::{Card, FeedPage, Reaction};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
    /// The API signals the end of results with an empty body.
    Empty,
    Page(FeedPage),
}

#[derive(Debug, thiserror::Error)]
pub enum PageDecodeError {
    #[error("malformed feed page: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feed page has no sections")]
    NoSections,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    next_page_url: String,
    sections: Vec<WireSection>,
}

#[derive(Debug, Deserialize)]
struct WireSection {
    #[serde(default)]
    cards: Vec<WireCard>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCard {
    id: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    provider: Value,
    #[serde(default)]
    reaction_summary: Option<WireReactionSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReactionSummary {
    #[serde(default)]
    sub_reaction_summaries: Vec<WireReaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReaction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    total_count: i64,
}

/// Decodes one feed API response body. Only the first section's cards are scanned.
pub fn decode_page(bytes: &[u8]) -> Result<PageBody, PageDecodeError> {
    if bytes.is_empty() {
        return Ok(PageBody::Empty);
    }

    let wire: WirePage = serde_json::from_slice(bytes)?;
    let section = wire
        .sections
        .into_iter()
        .next()
        .ok_or(PageDecodeError::NoSections)?;

    Ok(PageBody::Page(FeedPage {
        cards: section.cards.into_iter().map(into_card).collect(),
        next_page_url: wire.next_page_url,
    }))
}

fn into_card(wire: WireCard) -> Card {
    Card {
        id: wire.id,
        item_type: wire.item_type,
        category: wire.category.unwrap_or_default(),
        title: wire.title.unwrap_or_default(),
        abstract_text: wire.abstract_text.unwrap_or_default(),
        url: wire.url.unwrap_or_default(),
        provider: provider_name(&wire.provider),
        reactions: wire
            .reaction_summary
            .unwrap_or_default()
            .sub_reaction_summaries
            .into_iter()
            .map(|reaction| Reaction {
                kind: reaction.kind,
                total_count: reaction.total_count,
            })
            .collect(),
    }
}

/// Providers arrive either as a plain name or as an object carrying `name`.
fn provider_name(provider: &Value) -> String {
    match provider {
        Value::Null => String::new(),
        Value::String(name) => name.clone(),
        Value::Object(fields) => fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}
