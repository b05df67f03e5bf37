//! Ingredient normalization.
//!
//! Turns raw ingredient strings ("2 cups brown rice, rinsed") into a
//! structured line and reduces ingredient names to a canonical core key
//! ("rice"). The same `core_key` runs at save-time and at match-time;
//! if the two ever diverge, matching silently degrades.

use lazy_static::lazy_static;
use regex::Regex;

/// A parsed ingredient line. Parsing is best-effort: input that does not
/// fit the `amount unit name, preparation` shape comes back with the
/// trimmed input as the name and everything else `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub amount: Option<f64>,
    pub unit: Option<String>,
    pub name: String,
    pub preparation: Option<String>,
}

lazy_static! {
    /// Leading quantity: integer, decimal, plain fraction or mixed number.
    static ref AMOUNT_RE: Regex =
        Regex::new(r"^(\d+\s+\d+/\d+|\d+/\d+|\d+\.\d+|\d+)\s*").unwrap();

    /// Unit vocabulary sorted longest-first so "tablespoons" wins over "tbs".
    static ref UNITS_SORTED: Vec<&'static str> = {
        let mut units = UNITS.to_vec();
        units.sort_by(|a, b| b.len().cmp(&a.len()));
        units
    };
}

const UNITS: &[&str] = &[
    // volume
    "tablespoons",
    "tablespoon",
    "teaspoons",
    "teaspoon",
    "tbsp",
    "tbs",
    "tsp",
    "cups",
    "cup",
    "quarts",
    "quart",
    "pints",
    "pint",
    "gallons",
    "gallon",
    "liters",
    "liter",
    "milliliters",
    "milliliter",
    "ml",
    "l",
    "fl oz",
    // weight
    "pounds",
    "pound",
    "lbs",
    "lb",
    "ounces",
    "ounce",
    "oz",
    "kilograms",
    "kilogram",
    "kg",
    "grams",
    "gram",
    "g",
    // count
    "cloves",
    "clove",
    "slices",
    "slice",
    "pieces",
    "piece",
    "cans",
    "can",
    "packages",
    "package",
    "bunches",
    "bunch",
    "heads",
    "head",
    "stalks",
    "stalk",
    "sticks",
    "stick",
    "pinches",
    "pinch",
    "dashes",
    "dash",
];

/// Descriptor words removed from names before alias lookup.
const DESCRIPTORS: &[&str] = &[
    "fresh", "dried", "frozen", "canned", "cooked", "raw", "whole", "ground", "minced", "diced",
    "chopped", "sliced",
];

/// Exact-match overrides applied after descriptor stripping. Keys and
/// values are already in core form (lowercase, single spaces).
const ALIASES: &[(&str, &str)] = &[
    ("chicken breast", "chicken"),
    ("chicken breasts", "chicken"),
    ("chicken thigh", "chicken"),
    ("chicken thighs", "chicken"),
    ("brown rice", "rice"),
    ("white rice", "rice"),
    ("jasmine rice", "rice"),
    ("basmati rice", "rice"),
    ("yellow onion", "onion"),
    ("red onion", "onion"),
    ("white onion", "onion"),
    ("onions", "onion"),
    ("roma tomato", "tomato"),
    ("roma tomatoes", "tomato"),
    ("cherry tomatoes", "tomato"),
    ("tomatoes", "tomato"),
    ("garlic cloves", "garlic"),
    ("garlic clove", "garlic"),
    ("carrots", "carrot"),
    ("potatoes", "potato"),
    ("russet potato", "potato"),
    ("russet potatoes", "potato"),
    ("bell peppers", "bell pepper"),
    ("eggs", "egg"),
    ("spring onion", "green onion"),
    ("scallion", "green onion"),
    ("scallions", "green onion"),
];

/// Parse one ingredient line into `{amount, unit, name, preparation}`.
/// Never fails; unparseable input degrades to a bare name.
pub fn parse(text: &str) -> ParsedLine {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedLine {
            amount: None,
            unit: None,
            name: String::new(),
            preparation: None,
        };
    }

    let mut rest = trimmed;
    let mut amount = None;

    if let Some(m) = AMOUNT_RE.find(rest) {
        if let Some(value) = parse_amount(m.as_str().trim()) {
            amount = Some(value);
            rest = &rest[m.end()..];
        }
    }

    let mut unit = None;
    if amount.is_some() {
        if let Some((u, after)) = take_unit(rest) {
            unit = Some(u);
            rest = after;
        }
    }

    let mut name = rest.trim();
    let mut preparation = None;
    if let Some(idx) = name.find(',') {
        let clause = name[idx + 1..].trim();
        if !clause.is_empty() {
            preparation = Some(clause.to_string());
        }
        name = name[..idx].trim_end();
    }

    if name.is_empty() {
        // Amount/unit with nothing after them ("2 cups") or similar noise.
        return ParsedLine {
            amount: None,
            unit: None,
            name: trimmed.to_string(),
            preparation: None,
        };
    }

    ParsedLine {
        amount,
        unit,
        name: name.to_string(),
        preparation,
    }
}

/// Reduce an ingredient name to its canonical core key: lowercase, strip
/// descriptor words, collapse whitespace, then apply the alias table.
pub fn core_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| !DESCRIPTORS.contains(word))
        .collect();
    let collapsed = if stripped.is_empty() {
        // The name was nothing but descriptors; keep it rather than
        // collapsing distinct inputs onto the empty key.
        lowered.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        stripped.join(" ")
    };

    for (from, to) in ALIASES {
        if collapsed == *from {
            return (*to).to_string();
        }
    }
    collapsed
}

fn parse_amount(s: &str) -> Option<f64> {
    if let Some((whole, frac)) = s.split_once(' ') {
        return Some(whole.trim().parse::<f64>().ok()? + parse_fraction(frac.trim())?);
    }
    if s.contains('/') {
        return parse_fraction(s);
    }
    s.parse::<f64>().ok()
}

fn parse_fraction(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

/// Match a unit token at the start of `s`, requiring a word boundary so
/// "gallon" does not swallow the "g" unit. Returns the canonical unit
/// and the remainder.
///
/// Comparison is ASCII-case-insensitive on the original string; full
/// Unicode case folding can change byte lengths (U+212A KELVIN SIGN
/// lowercases to "k"), which would make a lowercased-copy index invalid
/// for slicing `s`.
fn take_unit(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    for unit in UNITS_SORTED.iter() {
        let Some(after) = s.get(unit.len()..) else {
            continue;
        };
        if s[..unit.len()].eq_ignore_ascii_case(unit)
            && (after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '.'))
        {
            return Some(((*unit).to_string(), after.trim_start_matches('.').trim_start()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amount_unit_name() {
        let line = parse("2 cups broth");
        assert_eq!(line.amount, Some(2.0));
        assert_eq!(line.unit.as_deref(), Some("cups"));
        assert_eq!(line.name, "broth");
        assert_eq!(line.preparation, None);
    }

    #[test]
    fn parses_fraction_and_mixed_number() {
        assert_eq!(parse("1/2 cup sugar").amount, Some(0.5));
        assert_eq!(parse("1 1/2 cups water").amount, Some(1.5));
        assert_eq!(parse("1 1/2 cups water").name, "water");
    }

    #[test]
    fn parses_decimal_amount() {
        let line = parse("2.5 oz cream cheese");
        assert_eq!(line.amount, Some(2.5));
        assert_eq!(line.unit.as_deref(), Some("oz"));
        assert_eq!(line.name, "cream cheese");
    }

    #[test]
    fn parses_preparation_clause() {
        let line = parse("1 cup carrots, finely diced");
        assert_eq!(line.name, "carrots");
        assert_eq!(line.preparation.as_deref(), Some("finely diced"));
    }

    #[test]
    fn amount_without_unit() {
        let line = parse("3 eggs");
        assert_eq!(line.amount, Some(3.0));
        assert_eq!(line.unit, None);
        assert_eq!(line.name, "eggs");
    }

    #[test]
    fn unit_requires_word_boundary() {
        // "2 gallons" must not parse as unit "g" + name "allons".
        let line = parse("2 gallons stock");
        assert_eq!(line.unit.as_deref(), Some("gallons"));
        assert_eq!(line.name, "stock");
    }

    #[test]
    fn unit_matching_ignores_ascii_case() {
        let line = parse("2 CUPS flour");
        assert_eq!(line.unit.as_deref(), Some("cups"));
        assert_eq!(line.name, "flour");
    }

    #[test]
    fn multibyte_case_variants_do_not_panic() {
        // U+212A KELVIN SIGN lowercases to "k" but is 3 bytes wide; it
        // must fall through to the name, not split a char boundary.
        let line = parse("2 \u{212A}g flour");
        assert_eq!(line.amount, Some(2.0));
        assert_eq!(line.unit, None);
        assert_eq!(line.name, "\u{212A}g flour");

        let line = parse("caf\u{e9} au lait");
        assert_eq!(line.name, "caf\u{e9} au lait");
    }

    #[test]
    fn unparseable_input_degrades_to_name() {
        let line = parse("  salt to taste  ");
        assert_eq!(line.amount, None);
        assert_eq!(line.unit, None);
        assert_eq!(line.name, "salt to taste");
    }

    #[test]
    fn amount_with_nothing_after_degrades() {
        let line = parse("2 cups");
        assert_eq!(line.amount, None);
        assert_eq!(line.name, "2 cups");
    }

    #[test]
    fn empty_input() {
        let line = parse("");
        assert_eq!(line.name, "");
        assert_eq!(line.amount, None);
    }

    #[test]
    fn core_key_lowercases_and_strips_descriptors() {
        assert_eq!(core_key("Fresh Chopped Spinach"), "spinach");
        assert_eq!(core_key("ground  beef"), "beef");
        assert_eq!(core_key("canned diced tomatoes"), "tomato");
    }

    #[test]
    fn core_key_whitespace_and_case_insensitive() {
        assert_eq!(core_key("  Brown   Rice "), core_key("brown rice"));
        assert_eq!(core_key("CHICKEN BREAST"), core_key("chicken breast"));
    }

    #[test]
    fn alias_convergence() {
        assert_eq!(core_key("chicken breast"), "chicken");
        assert_eq!(core_key("chicken thighs"), "chicken");
        assert_eq!(core_key("brown rice"), "rice");
        assert_eq!(core_key("white rice"), "rice");
    }

    #[test]
    fn aliases_apply_after_descriptor_strip() {
        assert_eq!(core_key("fresh chicken breast"), "chicken");
        assert_eq!(core_key("cooked brown rice"), "rice");
    }

    #[test]
    fn core_key_is_idempotent() {
        for name in ["chicken breast", "Fresh Basil", "brown rice", "olive oil"] {
            let once = core_key(name);
            assert_eq!(core_key(&once), once);
        }
    }

    #[test]
    fn all_descriptor_name_keeps_words() {
        assert_eq!(core_key("ground"), "ground");
    }
}
