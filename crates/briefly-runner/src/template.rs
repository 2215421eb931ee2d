use chrono::NaiveDate;
use minijinja::{context, Environment};

pub const SUBJECT: &str = "Your AI Newsletter";

/// The `.html` suffix turns on HTML auto-escaping for every value except
/// those marked `safe`.
const TEMPLATE_NAME: &str = "newsletter.html";
const TEMPLATE: &str = include_str!("../templates/newsletter.html");

/// Inputs of the newsletter email body.
#[derive(Debug, Clone)]
pub struct NewsletterEmail<'a> {
    pub categories: &'a [String],
    pub article_count: usize,
    pub date: NaiveDate,
    /// Already-rendered HTML; inserted as is.
    pub body_html: &'a str,
}

impl NewsletterEmail<'_> {
    pub fn render(&self) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, TEMPLATE)?;
        let tmpl = env.get_template(TEMPLATE_NAME)?;
        tmpl.render(context! {
            categories => self.categories.join(", "),
            article_count => self.article_count,
            date => self.date.format("%-m/%-d/%Y").to_string(),
            body => self.body_html,
        })
    }
}
