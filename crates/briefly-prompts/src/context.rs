use briefly_core::Article;

/// What one summarization request is about.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub categories: Vec<String>,
    pub articles: Vec<Article>,
}

impl PromptContext {
    pub fn new(categories: &[String], articles: &[Article]) -> Self {
        Self {
            categories: categories.to_vec(),
            articles: articles.to_vec(),
        }
    }

    /// Render the request body: the categories line and one numbered entry
    /// per article, entries separated by a blank line.
    pub fn append_request(&self, prompt: &mut String) {
        prompt.push_str(
            "Create a newsletter summary for these articles from the past week.\n",
        );
        prompt.push_str(&format!(
            "Categories requested: {}\n\n",
            self.categories.join(", ")
        ));
        prompt.push_str("Articles:\n");

        let entries: Vec<String> = self
            .articles
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "{}. {}\n   {}\n   Source: {}\n",
                    i + 1,
                    a.title,
                    a.description,
                    a.url
                )
            })
            .collect();
        prompt.push_str(&entries.join("\n"));
    }
}
