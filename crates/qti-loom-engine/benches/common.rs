// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_item(interactions: usize) -> String {
    let mut declarations = String::new();
    let mut body = String::new();

    for i in 0..interactions {
        declarations.push_str(&format!(
            "  <responseDeclaration identifier=\"R{i}\" cardinality=\"single\" baseType=\"string\">\n    <correctResponse>\n      <value>answer {i}</value>\n    </correctResponse>\n  </responseDeclaration>\n"
        ));
        body.push_str(&format!(
            "    <p>Question <strong>{i}</strong> with <em>some</em> text: <textEntryInteraction responseIdentifier=\"R{i}\"/></p>\n"
        ));
        body.push_str(&format!(
            "    <feedbackBlock outcomeIdentifier=\"FEEDBACK\" identifier=\"R{i}_correct\" showHide=\"show\"><p>Well done.</p></feedbackBlock>\n"
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<assessmentItem identifier=\"bench\" title=\"Bench\" adaptive=\"false\" timeDependent=\"false\">\n{declarations}  <outcomeDeclaration identifier=\"SCORE\" cardinality=\"single\" baseType=\"float\"/>\n  <itemBody>\n{body}  </itemBody>\n</assessmentItem>\n"
    )
}
