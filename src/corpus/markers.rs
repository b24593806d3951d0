use regex::Regex;
use thiserror::Error;

pub const DEFAULT_LINK_PREFIX: &str = "/billets/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub target: String,
    pub offset: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("unterminated `[[` marker on line {line}")]
    Unterminated { line: usize },
}

pub struct MarkerScanner {
    bracketed: Regex,
    path: Regex,
}

impl MarkerScanner {
    pub fn new(link_prefix: &str) -> Result<Self, regex::Error> {
        let bracketed = Regex::new(r"\[\[([^\]|\n]+)(?:\|[^\]\n]*)?\]\]")?;
        let path = Regex::new(&format!(
            r"\]\({}([^)#?\s/]+)[^)]*\)",
            regex::escape(link_prefix)
        ))?;
        Ok(Self { bracketed, path })
    }

    pub fn scan(&self, text: &str) -> Result<Vec<Marker>, MarkerError> {
        let mut markers = Vec::new();
        let mut covered = Vec::new();

        for captures in self.bracketed.captures_iter(text) {
            let (Some(whole), Some(target)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            covered.push(whole.range());
            let target = target.as_str().trim();
            if !target.is_empty() {
                markers.push(Marker {
                    target: target.to_string(),
                    offset: whole.start(),
                });
            }
        }

        check_unterminated(text, &covered)?;

        for captures in self.path.captures_iter(text) {
            let (Some(whole), Some(target)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            markers.push(Marker {
                target: target.as_str().to_string(),
                offset: whole.start(),
            });
        }

        markers.sort_by_key(|marker| marker.offset);
        Ok(markers)
    }
}

fn check_unterminated(text: &str, covered: &[std::ops::Range<usize>]) -> Result<(), MarkerError> {
    let mut line_start = 0;
    for (line_index, line) in text.split_inclusive('\n').enumerate() {
        let mut search_from = 0;
        while let Some(found) = line[search_from..].find("[[") {
            let local = search_from + found;
            let absolute = line_start + local;
            let inside_marker = covered
                .iter()
                .any(|range| range.start <= absolute && absolute < range.end);
            if !inside_marker && !line[local + 2..].contains("]]") {
                return Err(MarkerError::Unterminated {
                    line: line_index + 1,
                });
            }
            search_from = local + 2;
        }
        line_start += line.len();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> MarkerScanner {
        MarkerScanner::new(DEFAULT_LINK_PREFIX).expect("valid patterns")
    }

    fn targets(markers: &[Marker]) -> Vec<&str> {
        markers.iter().map(|marker| marker.target.as_str()).collect()
    }

    #[test]
    fn both_syntaxes_are_found_in_text_order() {
        let markers = scanner()
            .scan("See [text](/billets/mercure#part) then [[soufre]] and [[sel|le sel]].")
            .expect("scans");

        assert_eq!(targets(&markers), vec!["mercure", "soufre", "sel"]);
        assert!(markers.windows(2).all(|pair| pair[0].offset < pair[1].offset));
    }

    #[test]
    fn path_links_outside_the_prefix_are_ignored() {
        let markers = scanner()
            .scan("[a](/articles/x) [b](https://example.org/billets/y) [c](/billets/z?q=1)")
            .expect("scans");
        assert_eq!(targets(&markers), vec!["z"]);
    }

    #[test]
    fn custom_prefix_is_escaped() {
        let markers = MarkerScanner::new("/notes.v2/")
            .expect("valid")
            .scan("[a](/notes.v2/alpha) [b](/notesXv2/beta)")
            .expect("scans");
        assert_eq!(targets(&markers), vec!["alpha"]);
    }

    #[test]
    fn empty_targets_are_skipped() {
        let markers = scanner().scan("[[ ]] and [[]] and [[ok]]").expect("scans");
        assert_eq!(targets(&markers), vec!["ok"]);
    }

    #[test]
    fn unclosed_bracket_is_malformed() {
        let error = scanner()
            .scan("fine [[a]]\nbroken [[b and more\n")
            .expect_err("must fail");
        assert_eq!(error, MarkerError::Unterminated { line: 2 });
    }

    #[test]
    fn markers_do_not_span_lines() {
        assert!(scanner().scan("[[first\nsecond]]").is_err());
    }
}
