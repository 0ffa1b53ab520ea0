#[cfg(test)]
mod tests;

const PREAMBLE: &str = "Here are some relevant pieces of information:\n\n";

/// Grounded prompt: the preamble, each chunk in retrieval order, then the query.
///
/// Chunk text is inserted verbatim; no escaping or truncation.
#[inline]
pub fn synthesize<I, S>(query: &str, chunks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut prompt = String::from(PREAMBLE);
    for chunk in chunks {
        prompt.push_str(chunk.as_ref());
        prompt.push_str("\n\n");
    }
    prompt.push_str("Here is the original query: '");
    prompt.push_str(query);
    prompt.push_str("'\n\n");
    prompt
}

/// Ungrounded baseline prompt, used to compare against the grounded answer
#[inline]
pub fn raw_prompt(query: &str) -> String {
    query.to_string()
}
