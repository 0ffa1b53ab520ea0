use super::*;

#[test]
fn chunks_appear_in_order_between_preamble_and_query() {
    let prompt = synthesize("What is adam's last name?", ["adam green", "green eggs"]);

    assert_eq!(
        prompt,
        "Here are some relevant pieces of information:\n\n\
         adam green\n\n\
         green eggs\n\n\
         Here is the original query: 'What is adam's last name?'\n\n"
    );
}

#[test]
fn no_chunks_still_carries_the_query() {
    let prompt = synthesize("hello", Vec::<String>::new());

    assert_eq!(
        prompt,
        "Here are some relevant pieces of information:\n\n\
         Here is the original query: 'hello'\n\n"
    );
}

#[test]
fn chunk_text_is_not_escaped() {
    let chunk = "file: /docs/a.md\ncontent: it's 'quoted'";
    let prompt = synthesize("q", [chunk]);

    assert!(prompt.contains(chunk));
}

#[test]
fn raw_prompt_is_the_query() {
    assert_eq!(raw_prompt("What is adam's last name?"), "What is adam's last name?");
}
