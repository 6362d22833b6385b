/// Builds the single user prompt sent to the model. An empty context still
/// produces the same framing.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Use the following context to answer the question:\n\n{}\n\nQuestion: {}",
        context, question
    )
}
