//! Script text handling.

/// Paragraphs separated by blank lines, trimmed, empty ones dropped.
pub fn paragraphs(script: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in script.lines() {
        if line.trim().is_empty() {
            push_paragraph(&mut out, &mut current);
        } else {
            current.push(line.trim());
        }
    }
    push_paragraph(&mut out, &mut current);
    out
}

fn push_paragraph(out: &mut Vec<String>, current: &mut Vec<&str>) {
    if !current.is_empty() {
        out.push(current.join("\n"));
        current.clear();
    }
}

/// Text sent to speech synthesis: paragraphs joined with a space.
pub fn narration_text(paragraphs: &[String]) -> String {
    paragraphs.join(" ")
}
