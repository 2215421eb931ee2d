pub mod context;
pub mod editor;

pub use context::PromptContext;

/// Assemble the full summarization prompt: editor instructions first, then
/// the requested categories and the numbered article list.
pub fn assemble_prompt(ctx: &PromptContext) -> String {
    let mut prompt = String::new();
    editor::append_instructions(&mut prompt);
    ctx.append_request(&mut prompt);
    prompt
}
