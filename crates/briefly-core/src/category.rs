use serde::Serialize;

/// Categories used when a cycle request carries none.
pub const DEFAULT_CATEGORIES: &[&str] = &["technology", "business", "politics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The categories offered on the selection page. Submissions are not
/// restricted to this list; the news API accepts any query term.
pub const CATALOG: &[Category] = &[
    Category {
        id: "technology",
        name: "Technology",
        description: "Latest tech news and innovations",
    },
    Category {
        id: "business",
        name: "Business",
        description: "Business trends and market updates",
    },
    Category {
        id: "sports",
        name: "Sports",
        description: "Sports news and highlights",
    },
    Category {
        id: "entertainment",
        name: "Entertainment",
        description: "Movies, TV, and celebrity news",
    },
    Category {
        id: "science",
        name: "Science",
        description: "Scientific discoveries and research",
    },
    Category {
        id: "health",
        name: "Health",
        description: "Health and wellness updates",
    },
    Category {
        id: "politics",
        name: "Politics",
        description: "Political news and current events",
    },
    Category {
        id: "environment",
        name: "Environment",
        description: "Climate and environmental news",
    },
];

pub fn find(id: &str) -> Option<&'static Category> {
    CATALOG.iter().find(|c| c.id == id)
}
