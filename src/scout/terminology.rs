use super::types::TerminologyAnchor;

/// One dictionary entry: a canonical term plus the aliases it may appear as.
#[derive(Debug, Clone)]
pub struct TermEntry {
    pub term: &'static str,
    pub aliases: &'static [&'static str],
    pub definition: &'static str,
    pub usage_hint: &'static str,
    pub source: &'static str,
}

const EXACT_CONFIDENCE: f64 = 1.0;
const ALIAS_CONFIDENCE: f64 = 0.9;
const FUZZY_CONFIDENCE: f64 = 0.7;

/// Words shorter than this carry no fuzzy-matching signal.
const SIGNIFICANT_WORD_LEN: usize = 3;

/// Match free text against a tradition's term dictionary merged with the
/// universal defaults, deduplicated by canonical term.
///
/// Three tiers per entry, first hit wins: exact containment of the canonical
/// term (1.0), containment of any alias (0.9), fuzzy match requiring at least
/// half of the term's significant words to appear (0.7). `top_k == 0` returns
/// an empty result.
pub fn match_terms(text: &str, tradition_terms: &[TermEntry], top_k: usize) -> Vec<TerminologyAnchor> {
    if top_k == 0 {
        return Vec::new();
    }

    let haystack = text.to_lowercase();
    let mut seen: Vec<&str> = Vec::new();
    let mut anchors = Vec::new();

    let universal = universal_terms();
    for entry in tradition_terms.iter().chain(universal.iter()) {
        if seen.contains(&entry.term) {
            continue;
        }
        seen.push(entry.term);

        if let Some(confidence) = match_entry(&haystack, entry) {
            anchors.push(TerminologyAnchor {
                term: entry.term.to_string(),
                definition: entry.definition.to_string(),
                usage_hint: entry.usage_hint.to_string(),
                confidence,
                source: entry.source.to_string(),
            });
        }
    }

    anchors.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    anchors.truncate(top_k);
    anchors
}

fn match_entry(haystack: &str, entry: &TermEntry) -> Option<f64> {
    if haystack.contains(&entry.term.to_lowercase()) {
        return Some(EXACT_CONFIDENCE);
    }

    if entry
        .aliases
        .iter()
        .any(|alias| haystack.contains(&alias.to_lowercase()))
    {
        return Some(ALIAS_CONFIDENCE);
    }

    let significant: Vec<String> = entry
        .term
        .split_whitespace()
        .filter(|w| w.len() > SIGNIFICANT_WORD_LEN)
        .map(str::to_lowercase)
        .collect();
    if significant.is_empty() {
        return None;
    }
    let present = significant.iter().filter(|w| haystack.contains(*w)).count();
    if present * 2 >= significant.len() {
        return Some(FUZZY_CONFIDENCE);
    }

    None
}

// ─── Dictionaries ───────────────────────────────────────────────────────────

/// Terms that apply regardless of tradition.
pub fn universal_terms() -> Vec<TermEntry> {
    vec![
        TermEntry {
            term: "composition",
            aliases: &["layout", "arrangement"],
            definition: "placement of visual elements within the frame",
            usage_hint: "mention focal structure and balance",
            source: "universal",
        },
        TermEntry {
            term: "negative space",
            aliases: &["empty space", "void"],
            definition: "deliberately unmarked area shaping the subject",
            usage_hint: "specify where the picture should breathe",
            source: "universal",
        },
        TermEntry {
            term: "brushwork",
            aliases: &["brush strokes", "stroke quality"],
            definition: "visible character of the marks forming the image",
            usage_hint: "describe stroke weight and rhythm",
            source: "universal",
        },
    ]
}

/// Tradition-scoped dictionary. Read-only after load; shared across runs.
pub fn tradition_terms(tradition: &str) -> Vec<TermEntry> {
    match tradition {
        "chinese_xieyi" => vec![
            TermEntry {
                term: "hemp-fiber strokes",
                aliases: &["hemp-fiber texture strokes", "pima cun", "pima texture"],
                definition: "long relaxed texture strokes for rounded southern hills",
                usage_hint: "layer loosely with dry ink for earthen mass",
                source: "xieyi_lexicon",
            },
            TermEntry {
                term: "shanshui landscape",
                aliases: &["landscape", "mountain-water"],
                definition: "mountain-and-water landscape as a vehicle for the scholar's mind",
                usage_hint: "compose with guest-host mountain relations",
                source: "xieyi_lexicon",
            },
            TermEntry {
                term: "ink wash",
                aliases: &["shuimo", "ink gradation"],
                definition: "graded dilutions of ink standing in for the full palette",
                usage_hint: "reserve the darkest ink for structural accents",
                source: "xieyi_lexicon",
            },
            TermEntry {
                term: "qiyun",
                aliases: &["spirit resonance", "breath resonance"],
                definition: "vitality of spirit the work must transmit before all else",
                usage_hint: "favor gesture over finish",
                source: "xieyi_lexicon",
            },
        ],
        "chinese_gongbi" => vec![
            TermEntry {
                term: "fine-line outline",
                aliases: &["gongbi outline", "baimiao"],
                definition: "precise even-width contour drawing preceding color",
                usage_hint: "keep line weight disciplined and continuous",
                source: "gongbi_lexicon",
            },
            TermEntry {
                term: "layered color wash",
                aliases: &["sandran", "triple wash"],
                definition: "repeated translucent mineral color layers",
                usage_hint: "build saturation gradually, never opaquely",
                source: "gongbi_lexicon",
            },
        ],
        "western_academic" => vec![
            TermEntry {
                term: "chiaroscuro",
                aliases: &["light-dark modelling", "tenebrism"],
                definition: "volumetric modelling through controlled light and shadow",
                usage_hint: "set one dominant light source",
                source: "academic_lexicon",
            },
            TermEntry {
                term: "linear perspective",
                aliases: &["vanishing point", "perspective grid"],
                definition: "geometric depth construction toward vanishing points",
                usage_hint: "anchor architecture to the horizon line",
                source: "academic_lexicon",
            },
            TermEntry {
                term: "figura serpentinata",
                aliases: &["serpentine figure"],
                definition: "spiralling figural pose prized in academic composition",
                usage_hint: "twist the torso against the hips",
                source: "academic_lexicon",
            },
        ],
        "japanese_sumi_e" => vec![
            TermEntry {
                term: "sumi ink",
                aliases: &["sumi", "carbon ink"],
                definition: "soot-based ink handled in five notional tones",
                usage_hint: "let a single loaded brush carry the tonal range",
                source: "sumi_e_lexicon",
            },
            TermEntry {
                term: "ensou circle",
                aliases: &["enso", "zen circle"],
                definition: "single-breath circle expressing the unadorned mind",
                usage_hint: "one uncorrected stroke only",
                source: "sumi_e_lexicon",
            },
        ],
        "islamic_geometric" => vec![
            TermEntry {
                term: "girih strapwork",
                aliases: &["girih", "strapwork lattice"],
                definition: "interlaced polygonal lattice built from a small tile set",
                usage_hint: "derive the lattice from an underlying grid, never freehand",
                source: "geometric_lexicon",
            },
            TermEntry {
                term: "arabesque scroll",
                aliases: &["islimi", "biomorphic scroll"],
                definition: "rhythmic vegetal scrollwork filling interstitial space",
                usage_hint: "keep growth rules consistent across the field",
                source: "geometric_lexicon",
            },
        ],
        _ => Vec::new(),
    }
}
