/// Append the newsletter-editor persona and formatting rules.
pub fn append_instructions(prompt: &mut String) {
    prompt.push_str(
        "You are an expert newsletter editor creating a personalized newsletter.\n\
         Write a concise, engaging summary that:\n\
         - Highlights the most important stories\n\
         - Provides context and insights\n\
         - Uses a friendly, conversational tone\n\
         - Is well-structured with clear sections\n\
         - Keeps the reader informed and engaged\n\
         Format the response as a proper newsletter with a title and organized content.\n\
         Make it email-friendly with clear sections and engaging subject lines.\n\n",
    );
}
