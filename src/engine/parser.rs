use once_cell::sync::Lazy;
use regex::Regex;

/// One question recovered from extracted document text. Order is positional:
/// whoever builds persistence records numbers the final list 1..N, never the
/// enumeration digits printed in the source (they repeat and lie).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub text: String,
    pub marks: i64,
}

/// Marks outside this range are treated as noise and replaced by the default.
pub const MARKS_RANGE: std::ops::RangeInclusive<i64> = 1..=100;
pub const DEFAULT_MARKS: i64 = 1;

/// How many lines past a question opener we scan for a marks marker.
const MARKS_LOOKAHEAD: usize = 2;

static QUESTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)]\s*(.*)$").expect("question start regex"));

static MARKS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\[(]?(\d+)\s*marks?[\])]?").expect("marks marker regex"));

type ParsePass = fn(&str) -> Vec<ParsedQuestion>;

/// Candidate passes in decreasing strictness. The first pass that yields
/// anything wins; an empty result is a normal outcome, not an error.
const PASSES: [ParsePass; 2] = [parse_enumerated, parse_freeform];

pub fn parse(text: &str) -> Vec<ParsedQuestion> {
    for pass in PASSES {
        let questions = pass(text);
        if !questions.is_empty() {
            return questions;
        }
    }
    Vec::new()
}

/// Strict pass: lines opening with `N.` or `N)` start a question, everything
/// else continues the current one. Marks come from a `[N marks]` / `(N marks)`
/// / `N marks` marker on the opening line or within the lookahead window.
fn parse_enumerated(text: &str) -> Vec<ParsedQuestion> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut out: Vec<ParsedQuestion> = Vec::new();
    let mut current: Option<ParsedQuestion> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = QUESTION_START.captures(line) {
            flush(&mut current, &mut out);
            let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            current = Some(ParsedQuestion {
                text: strip_marks_marker(rest),
                marks: discover_marks(rest, &lines[i + 1..]),
            });
        } else if let Some(q) = current.as_mut() {
            let continuation = strip_marks_marker(line);
            if !continuation.is_empty() {
                if !q.text.is_empty() {
                    q.text.push(' ');
                }
                q.text.push_str(&continuation);
            }
        }
        // Text before the first opener is preamble (instructions, headers); skip it.
    }
    flush(&mut current, &mut out);
    out
}

/// Coarse pass: every non-enumerated line longer than 5 characters becomes a
/// standalone question with default marks. Used when the strict pass found
/// nothing recognisable.
fn parse_freeform(text: &str) -> Vec<ParsedQuestion> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !QUESTION_START.is_match(l) && l.chars().count() > 5)
        .map(|l| ParsedQuestion {
            text: l.to_string(),
            marks: DEFAULT_MARKS,
        })
        .collect()
}

fn flush(current: &mut Option<ParsedQuestion>, out: &mut Vec<ParsedQuestion>) {
    if let Some(q) = current.take() {
        // An opener with no surviving text ("3." on its own) carries nothing gradable.
        if !q.text.is_empty() {
            out.push(q);
        }
    }
}

fn discover_marks(opening_rest: &str, following: &[&str]) -> i64 {
    if let Some(v) = marker_value(opening_rest) {
        return v;
    }
    for line in following.iter().take(MARKS_LOOKAHEAD) {
        // The next opener's marker belongs to the next question.
        if QUESTION_START.is_match(line) {
            break;
        }
        if let Some(v) = marker_value(line) {
            return v;
        }
    }
    DEFAULT_MARKS
}

fn marker_value(line: &str) -> Option<i64> {
    let caps = MARKS_MARKER.captures(line)?;
    let value = caps[1].parse::<i64>().ok()?;
    if MARKS_RANGE.contains(&value) {
        Some(value)
    } else {
        Some(DEFAULT_MARKS)
    }
}

/// Remove marks markers and collapse leftover whitespace. Marker text is
/// metadata, not question wording, so it never reaches the stored text.
fn strip_marks_marker(line: &str) -> String {
    let stripped = MARKS_MARKER.replace_all(line, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(text: &str, marks: i64) -> ParsedQuestion {
        ParsedQuestion {
            text: text.to_string(),
            marks,
        }
    }

    #[test]
    fn enumerated_lines_with_markers_parse_in_source_order() {
        let parsed = parse("1. What is 2+2? [2 marks]\n2. Name a prime. (1 mark)");
        assert_eq!(parsed, vec![q("What is 2+2?", 2), q("Name a prime.", 1)]);
    }

    #[test]
    fn bare_marks_marker_and_paren_enumeration() {
        let parsed = parse("1) Define osmosis. 3 marks\n2) State Ohm's law.");
        assert_eq!(parsed[0].marks, 3);
        assert_eq!(parsed[0].text, "Define osmosis.");
        assert_eq!(parsed[1].marks, DEFAULT_MARKS);
    }

    #[test]
    fn continuation_lines_join_with_spaces() {
        let parsed = parse("1. Explain why the sky\nappears blue during the day.\n[4 marks]");
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed[0].text,
            "Explain why the sky appears blue during the day."
        );
        assert_eq!(parsed[0].marks, 4);
    }

    #[test]
    fn marker_lookahead_stops_at_next_opener() {
        let parsed = parse("1. First question\n2. Second question [5 marks]");
        assert_eq!(parsed[0].marks, DEFAULT_MARKS);
        assert_eq!(parsed[1].marks, 5);
    }

    #[test]
    fn marker_beyond_lookahead_window_is_ignored() {
        let parsed = parse("1. Stem\nline two\nline three\n[9 marks]");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].marks, DEFAULT_MARKS);
        // The far marker line is still stripped from the body.
        assert_eq!(parsed[0].text, "Stem line two line three");
    }

    #[test]
    fn out_of_range_marks_fall_back_to_default() {
        let parsed = parse("1. Foo [150 marks]");
        assert_eq!(parsed, vec![q("Foo", DEFAULT_MARKS)]);
        let parsed = parse("1. Bar [0 marks]");
        assert_eq!(parsed[0].marks, DEFAULT_MARKS);
    }

    #[test]
    fn source_enumeration_numbers_do_not_drive_order() {
        let parsed = parse("7. Seventh?\n7. Also seventh?\n3. Third?");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].text, "Seventh?");
        assert_eq!(parsed[1].text, "Also seventh?");
        assert_eq!(parsed[2].text, "Third?");
    }

    #[test]
    fn preamble_before_first_opener_is_dropped() {
        let parsed = parse("Answer ALL questions.\nSection A\n1. Define energy. [2 marks]");
        assert_eq!(parsed, vec![q("Define energy.", 2)]);
    }

    #[test]
    fn freeform_pass_takes_over_when_nothing_is_enumerated() {
        let parsed = parse("Describe the water cycle\nok\nList three mammals found in Kenya");
        assert_eq!(
            parsed,
            vec![
                q("Describe the water cycle", 1),
                q("List three mammals found in Kenya", 1),
            ]
        );
    }

    #[test]
    fn empty_and_whitespace_input_parse_to_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\n  \t\n").is_empty());
        assert!(parse("ok\nhi").is_empty());
    }

    #[test]
    fn bare_opener_with_no_text_is_dropped() {
        let parsed = parse("1.\n2. Real question [2 marks]");
        assert_eq!(parsed, vec![q("Real question", 2)]);
    }

    #[test]
    fn parse_is_idempotent_over_identical_input() {
        let text = "1. Alpha [3 marks]\nbeta gamma\n2) Delta";
        assert_eq!(parse(text), parse(text));
    }
}
