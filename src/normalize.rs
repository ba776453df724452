use crate::resolver::NOT_FOUND;

/// Ordered spelling-variant substitutions applied during normalization.
/// Earlier replacements can expose text matched by later ones, so the
/// order is part of the contract.
const SPELLING_VARIANTS: &[(&str, &str)] = &[
    ("dacca", "dhaka"),
    ("chittagong", "chattogram"),
    ("ctg", "chattogram"),
    ("barisal", "barishal"),
    ("cumilla", "comilla"),
    ("uttora", "uttara"),
    ("gulshan-1", "gulshan 1"),
    ("gulshan-2", "gulshan 2"),
    ("badda thana", "badda"),
    ("banani thana", "banani"),
    ("kotowali", "kotwali"),
    ("mohammad pur", "mohammadpur"),
];

/// Bangla place-name tokens mapped to their English equivalents. Applied
/// verbatim, only to build alternate geocoder query phrasings.
const SCRIPT_HINTS: &[(&str, &str)] = &[
    ("ঢাকা", "Dhaka"),
    ("চট্টগ্রাম", "Chattogram"),
    ("কমিল্লা", "Comilla"),
    ("কুমিল্লা", "Comilla"),
    ("বগুড়া", "Bogura"),
    ("নরসিংদী", "Narsingdi"),
    ("নরায়ণগঞ্জ", "Narayanganj"),
    ("সিলেট", "Sylhet"),
    ("খুলনা", "Khulna"),
    ("বরিশাল", "Barishal"),
    ("রাজশাহী", "Rajshahi"),
    ("কিশোরগঞ্জ", "Kishoreganj"),
    ("দিনাজপুর", "Dinajpur"),
    ("ফেনী", "Feni"),
    ("নোয়াখালী", "Noakhali"),
    ("লক্ষ্মীপুর", "Lakshmipur"),
    ("শ্যামলী", "Shyamoli"),
    ("গুলশান", "Gulshan"),
    ("বানানী", "Banani"),
    ("উত্তরা", "Uttara"),
    ("বাড্ডা", "Badda"),
    ("মতিঝিল", "Motijheel"),
    ("শাহবাগ", "Shahbag"),
];

/// English spelling variants collapsed when rendering a canonical label.
const LABEL_CANONICAL: &[(&str, &str)] = &[
    ("chittagong", "chattogram"),
    ("dacca", "dhaka"),
    ("barisal", "barishal"),
    ("cumilla", "comilla"),
    ("bogra", "bogura"),
    ("jessore", "jashore"),
    ("laxmipur", "lakshmipur"),
    ("kotowali", "kotwali"),
];

/// Canonicalizes raw address text for offline matching. Idempotent:
/// normalizing an already-normalized string yields the same string.
pub fn normalize(raw: &str) -> String {
    let text = raw.to_lowercase();
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, ',' | '/' | '-' | ' ') {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }
    let mut text = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    // Substitutions run on the stripped text, to a fixpoint: stripping can
    // expose a variant ("badda.thana" -> "badda thana"), and one pass can
    // expose text matched by a later entry.
    loop {
        let mut next = text.clone();
        for (variant, canonical) in SPELLING_VARIANTS {
            if next.contains(variant) {
                next = next.replace(variant, canonical);
            }
        }
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Replaces Bangla place-name tokens with English equivalents, leaving the
/// rest of the text untouched.
pub fn translate_script_hints(raw: &str) -> String {
    let mut text = raw.to_string();
    for (bangla, english) in SCRIPT_HINTS {
        if text.contains(bangla) {
            text = text.replace(bangla, english);
        }
    }
    text
}

/// Renders a district/thana value (offline guess, gazetteer entry, or
/// geocoder field) as a canonical title-cased label. The "Not found"
/// sentinel passes through unchanged.
pub fn to_canonical_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.eq_ignore_ascii_case(NOT_FOUND) {
        return NOT_FOUND.to_string();
    }

    let mut lowered = translate_script_hints(trimmed).to_lowercase();
    for (variant, canonical) in LABEL_CANONICAL {
        if lowered.contains(variant) {
            lowered = lowered.replace(variant, canonical);
        }
    }

    // "bashundhara r a" is the slash-stripped form of a residential-area key
    let spaced = lowered.replace(" r a", " r/a");
    title_case(&spaced).replace("R/a", "R/A")
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
