use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, PartialEq)]
pub struct ParsedCard {
    pub title: String,
    pub golden: bool,
    pub tags: Vec<String>,
}

fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"^#([\p{L}\p{N}_-]+)$").expect("tag pattern is valid"))
}

/// Split quick-add input into a title, `#tag` tokens and a standalone `!`
/// golden marker.
pub fn parse_card_input(input: &str) -> ParsedCard {
    let mut golden = false;
    let mut tags: Vec<String> = Vec::new();
    let mut words = Vec::new();

    for token in input.split_whitespace() {
        if token == "!" {
            golden = true;
        } else if let Some(caps) = tag_re().captures(token) {
            let tag = caps[1].to_string();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        } else {
            words.push(token);
        }
    }

    ParsedCard {
        title: words.join(" "),
        golden,
        tags,
    }
}
