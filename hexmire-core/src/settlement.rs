//! Settlement field extraction from hex markdown.
//!
//! The server emits one markdown document per hex. Settlement hexes carry a
//! marker glyph or a `Population:` field plus a loose set of labeled
//! sections. This scraper pulls structured fields out with first-match-wins
//! regex patterns. It is a heuristic, not a parser: reordered or malformed
//! markdown degrades to empty fields, it never errors.

use crate::entities::{LootSection, SettlementRecord, TavernInfo};
use once_cell::sync::Lazy;
use regex::Regex;

/// Glyph the generator places in settlement hex headings.
const SETTLEMENT_MARKER: &str = "\u{2302}"; // ⌂

static POPULATION: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\*\*Population:?\*\*:?\s*(.+)$").expect("static regex"),
        Regex::new(r"(?mi)^Population:\s*(.+)$").expect("static regex"),
    ]
});

static ATMOSPHERE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\*\*Atmosphere:?\*\*:?\s*(.+)$").expect("static regex"),
        Regex::new(r"(?mi)^Atmosphere:\s*(.+)$").expect("static regex"),
    ]
});

static NOTABLE_FEATURE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\*\*Notable Feature:?\*\*:?\s*(.+)$").expect("static regex"),
        Regex::new(r"(?mi)^Notable Feature:\s*(.+)$").expect("static regex"),
    ]
});

static INNKEEPER_QUIRK: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\*\*Innkeeper(?: Quirk)?:?\*\*:?\s*(.+)$").expect("static regex"),
        Regex::new(r"(?mi)^Innkeeper(?: Quirk)?:\s*(.+)$").expect("static regex"),
    ]
});

static PATRON_TRAIT: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^\*\*(?:Notable )?Patron(?: Trait)?:?\*\*:?\s*(.+)$")
            .expect("static regex"),
        Regex::new(r"(?mi)^(?:Notable )?Patron(?: Trait)?:\s*(.+)$").expect("static regex"),
    ]
});

static MENU_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s+(.+)$").expect("static regex"));

static LOOT_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[-*]?\s*\*?\*?([^:*\n]+?)\*?\*?:\s*(.+)$").expect("static regex"));

static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("static regex"));

/// Decide whether `markdown` describes a settlement and, if so, scrape its
/// labeled fields. Returns `None` when neither the settlement marker glyph
/// nor a `Population:` field is present.
pub fn extract_settlement(markdown: &str) -> Option<SettlementRecord> {
    let has_marker = markdown.contains(SETTLEMENT_MARKER);
    let population = first_match(&*POPULATION, markdown);

    if !has_marker && population.is_empty() {
        return None;
    }

    let tavern_section = section_body(markdown, &["Tavern", "Inn"]);
    let menu_items = tavern_section
        .as_deref()
        .map(extract_menu_items)
        .unwrap_or_default();

    let loot = section_body(markdown, &["Loot", "Treasure"])
        .map(|body| parse_loot(&body))
        .unwrap_or_default();

    let description = section_body(markdown, &["Denizen", "Denizens", "Encounter", "Encounters"])
        .map(|body| excerpt(&body, 3))
        .unwrap_or_default();

    Some(SettlementRecord {
        population,
        atmosphere: first_match(&*ATMOSPHERE, markdown),
        notable_feature: first_match(&*NOTABLE_FEATURE, markdown),
        description,
        tavern: TavernInfo {
            menu_items,
            innkeeper_quirk: first_match(&*INNKEEPER_QUIRK, markdown),
            patron_trait: first_match(&*PATRON_TRAIT, markdown),
        },
        loot,
    })
}

/// Try each candidate pattern in order, returning the first capture.
fn first_match(patterns: &[Regex], text: &str) -> String {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                return m.as_str().trim().to_string();
            }
        }
    }
    String::new()
}

/// Return the body of the first section whose heading contains one of
/// `titles` (case-insensitive), up to the next heading of any level.
fn section_body(markdown: &str, titles: &[&str]) -> Option<String> {
    let mut headings: Vec<(usize, usize, String)> = Vec::new();
    for m in SECTION_HEADING.find_iter(markdown) {
        let title = SECTION_HEADING
            .captures(&markdown[m.start()..m.end()])
            .and_then(|c| c.get(1))
            .map(|t| t.as_str().trim().to_string())
            .unwrap_or_default();
        headings.push((m.start(), m.end(), title));
    }

    for (idx, (_, end, title)) in headings.iter().enumerate() {
        let lowered = title.to_lowercase();
        if titles.iter().any(|t| lowered.contains(&t.to_lowercase())) {
            let body_end = headings
                .get(idx + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(markdown.len());
            let body = markdown[*end..body_end].trim();
            if body.is_empty() {
                return None;
            }
            return Some(body.to_string());
        }
    }
    None
}

/// Bulleted lines in a tavern section are the menu.
fn extract_menu_items(section: &str) -> Vec<String> {
    MENU_ITEM
        .captures_iter(section)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse a loot section as `key: value` pairs; keep the raw trimmed text
/// when no pair matches.
fn parse_loot(section: &str) -> LootSection {
    let entries: Vec<(String, String)> = LOOT_ENTRY
        .captures_iter(section)
        .filter_map(|caps| match (caps.get(1), caps.get(2)) {
            (Some(key), Some(value)) => {
                Some((key.as_str().trim().to_string(), value.as_str().trim().to_string()))
            }
            _ => None,
        })
        .filter(|(key, _)| !key.is_empty())
        .collect();

    if entries.is_empty() {
        LootSection::Raw(section.trim().to_string())
    } else {
        LootSection::Entries(entries)
    }
}

/// First `max_lines` non-empty lines of a section, joined by newlines.
fn excerpt(section: &str, max_lines: usize) -> String {
    section
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTLEMENT_DOC: &str = "\
# \u{2302} Gravenmoor

**Population:** 500
**Atmosphere:** grim
**Notable Feature:** A gallows that creaks with no wind

## Tavern: The Split Crow

- Boiled roots in grey broth
- Sour black ale
- Salted eel

**Innkeeper:** Hums the same three notes all night
**Patron:** A pale rider who never removes his gloves

## Denizens

A one-eyed tax collector with a ledger of names.
The names are all crossed out.
Nobody asks why.
He waits by the gate at dusk.

## Loot

- Rusted signet ring: 10s
- Vial of grave dirt: 5s
";

    #[test]
    fn test_population_and_atmosphere() {
        let record = extract_settlement(SETTLEMENT_DOC).expect("settlement should be detected");
        assert_eq!(record.population, "500");
        assert_eq!(record.atmosphere, "grim");
    }

    #[test]
    fn test_notable_feature_and_tavern() {
        let record = extract_settlement(SETTLEMENT_DOC).expect("settlement should be detected");
        assert_eq!(
            record.notable_feature,
            "A gallows that creaks with no wind"
        );
        assert_eq!(record.tavern.menu_items.len(), 3);
        assert_eq!(record.tavern.menu_items[0], "Boiled roots in grey broth");
        assert_eq!(
            record.tavern.innkeeper_quirk,
            "Hums the same three notes all night"
        );
        assert_eq!(
            record.tavern.patron_trait,
            "A pale rider who never removes his gloves"
        );
    }

    #[test]
    fn test_description_is_bounded_excerpt() {
        let record = extract_settlement(SETTLEMENT_DOC).expect("settlement should be detected");
        let lines: Vec<&str> = record.description.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "A one-eyed tax collector with a ledger of names.");
        assert!(!record.description.contains("waits by the gate"));
    }

    #[test]
    fn test_loot_parses_as_entries() {
        let record = extract_settlement(SETTLEMENT_DOC).expect("settlement should be detected");
        match record.loot {
            LootSection::Entries(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "Rusted signet ring");
                assert_eq!(entries[0].1, "10s");
            }
            LootSection::Raw(raw) => panic!("expected entries, got raw: {raw:?}"),
        }
    }

    #[test]
    fn test_loot_falls_back_to_raw_text() {
        let doc = "\u{2302} Hovel\n\n## Loot\n\nNothing but bones and regret\n";
        let record = extract_settlement(doc).expect("settlement should be detected");
        assert_eq!(
            record.loot,
            LootSection::Raw("Nothing but bones and regret".to_string())
        );
    }

    #[test]
    fn test_marker_alone_is_enough() {
        let doc = "# \u{2302} Nameless Camp\n\nTents in the mud.\n";
        let record = extract_settlement(doc).expect("marker should be enough");
        assert_eq!(record.population, "");
        assert_eq!(record.atmosphere, "");
    }

    #[test]
    fn test_population_field_alone_is_enough() {
        let doc = "# Somewhere\n\n**Population:** 12\n";
        let record = extract_settlement(doc).expect("population field should be enough");
        assert_eq!(record.population, "12");
    }

    #[test]
    fn test_plain_population_pattern_is_second_candidate() {
        let doc = "# Somewhere\n\npopulation: 40 souls\n";
        let record = extract_settlement(doc).expect("plain field should match");
        assert_eq!(record.population, "40 souls");
    }

    #[test]
    fn test_no_settlement_evidence_yields_none() {
        let doc = "# Empty Moor\n\nWind, lichen, and a broken cart wheel.\n";
        assert!(extract_settlement(doc).is_none());
    }

    #[test]
    fn test_malformed_markdown_degrades_to_empty_fields() {
        let doc = "\u{2302}**Population**Atmosphere## Tavern## Loot";
        let record = extract_settlement(doc).expect("marker should be enough");
        assert_eq!(record.population, "");
        assert_eq!(record.atmosphere, "");
        assert!(record.tavern.menu_items.is_empty());
        assert_eq!(record.loot, LootSection::default());
    }

    #[test]
    fn test_encounter_section_also_feeds_description() {
        let doc = "\u{2302} Ruin\n\n## Encounter\n\nA dog with too many teeth.\n";
        let record = extract_settlement(doc).expect("settlement should be detected");
        assert_eq!(record.description, "A dog with too many teeth.");
    }
}
