use std::fmt;
use std::str::FromStr;

/// Reaction kind that counts as a like.
pub const UPVOTE: &str = "upvote";

/// Like count reported when no card matched the filter.
pub const NO_CANDIDATE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub kind: String,
    pub total_count: i64,
}

/// One feed item as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Card {
    pub id: String,
    pub item_type: String,
    pub category: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub provider: String,
    pub reactions: Vec<Reaction>,
}

impl Card {
    /// Upvote counts carried by this card, in API order.
    pub fn upvotes(&self) -> impl Iterator<Item = i64> + '_ {
        self.reactions
            .iter()
            .filter(|reaction| reaction.kind == UPVOTE)
            .map(|reaction| reaction.total_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedPage {
    pub cards: Vec<Card>,
    pub next_page_url: String,
}

/// Snapshot of the best card found so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub item_type: String,
    pub category: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub provider: String,
    pub like_count: i64,
}

impl Candidate {
    pub fn from_card(card: &Card, like_count: i64) -> Self {
        Self {
            id: card.id.clone(),
            item_type: card.item_type.clone(),
            category: card.category.clone(),
            title: card.title.clone(),
            abstract_text: card.abstract_text.clone(),
            url: card.url.clone(),
            provider: card.provider.clone(),
            like_count,
        }
    }
}

/// Item-type filter; `all` admits every card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(String),
}

impl TypeFilter {
    pub fn admits(&self, card: &Card) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(kind) => card.item_type == *kind,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "all" => TypeFilter::All,
            other => TypeFilter::Only(other.to_string()),
        })
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => write!(f, "all"),
            TypeFilter::Only(kind) => write!(f, "{kind}"),
        }
    }
}
