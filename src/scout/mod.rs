pub mod taboo;
pub mod terminology;
pub mod types;

pub use types::{
    CompositionReference, EvidencePack, StyleConstraint, TabooSeverity, TabooViolation,
    TerminologyAnchor,
};

use crate::culture::{Dimension, PipelineVariant};

/// How many terminology anchors a pack keeps at most.
const TERMINOLOGY_TOP_K: usize = 8;

// Coverage contributions per evidence item; clamped to 1.0 overall so the
// score stays a monotonic function of evidence volume.
const COVERAGE_PER_TERM: f64 = 0.25;
const COVERAGE_PER_REFERENCE: f64 = 0.20;
const COVERAGE_PER_STYLE: f64 = 0.10;

/// Evidence pack builder. Gathers cultural evidence for a subject + tradition
/// pair; finding nothing is a valid outcome, never an error.
pub struct Scout;

impl Scout {
    /// Build the evidence pack for one run.
    pub fn build(subject: &str, tradition: &str, variant: &PipelineVariant) -> EvidencePack {
        let terms = terminology::tradition_terms(tradition);
        let terminology = terminology::match_terms(subject, &terms, TERMINOLOGY_TOP_K);

        let compositions = match_compositions(subject, tradition);
        let styles = style_constraints(tradition, variant);

        let mut rules = taboo::universal_rules();
        rules.extend(taboo::tradition_rules(tradition));
        let taboos = taboo::evaluate(subject, &rules);

        let coverage = (COVERAGE_PER_TERM * terminology.len() as f64
            + COVERAGE_PER_REFERENCE * compositions.len() as f64
            + COVERAGE_PER_STYLE * styles.len() as f64)
            .min(1.0);

        let pack = EvidencePack {
            subject: subject.to_string(),
            tradition: tradition.to_string(),
            terminology,
            compositions,
            styles,
            taboos,
            coverage,
        };
        tracing::debug!(
            tradition,
            coverage = pack.coverage,
            terms = pack.terminology.len(),
            taboos = pack.taboos.len(),
            "scout evidence pack built"
        );
        pack
    }
}

// ─── Curated composition references ─────────────────────────────────────────

struct ReferenceEntry {
    title: &'static str,
    artist: &'static str,
    note: &'static str,
    /// Subject keywords that make this reference relevant.
    keywords: &'static [&'static str],
}

fn reference_catalog(tradition: &str) -> Vec<ReferenceEntry> {
    match tradition {
        "chinese_xieyi" => vec![
            ReferenceEntry {
                title: "Xiao and Xiang Rivers",
                artist: "Dong Yuan",
                note: "southern school hemp-fiber texture over low rolling hills",
                keywords: &["dong yuan", "hemp-fiber", "river", "landscape"],
            },
            ReferenceEntry {
                title: "Six Persimmons",
                artist: "Muqi",
                note: "tonal economy carrying the whole pictorial argument",
                keywords: &["persimmon", "still life", "ink wash"],
            },
        ],
        "chinese_gongbi" => vec![ReferenceEntry {
            title: "Court Ladies Adorning Their Hair with Flowers",
            artist: "Zhou Fang",
            note: "even outline discipline with layered mineral color",
            keywords: &["court", "figure", "ladies"],
        }],
        "western_academic" => vec![ReferenceEntry {
            title: "Oath of the Horatii",
            artist: "Jacques-Louis David",
            note: "stage-lit neoclassical composition on a perspective grid",
            keywords: &["oath", "neoclassical", "history painting", "figures"],
        }],
        "japanese_sumi_e" => vec![ReferenceEntry {
            title: "Pine Trees screen",
            artist: "Hasegawa Tohaku",
            note: "atmospheric void doing the compositional work",
            keywords: &["pine", "mist", "screen"],
        }],
        "islamic_geometric" => vec![ReferenceEntry {
            title: "Darb-i Imam girih spandrels",
            artist: "Isfahan workshop",
            note: "quasi-periodic girih lattice from a five-tile set",
            keywords: &["girih", "lattice", "tile"],
        }],
        _ => Vec::new(),
    }
}

fn match_compositions(subject: &str, tradition: &str) -> Vec<CompositionReference> {
    let needle = subject.to_lowercase();
    reference_catalog(tradition)
        .into_iter()
        .filter(|entry| {
            entry.keywords.iter().any(|k| needle.contains(k))
                || needle.contains(&entry.artist.to_lowercase())
        })
        .map(|entry| CompositionReference {
            title: entry.title.to_string(),
            artist: entry.artist.to_string(),
            note: entry.note.to_string(),
        })
        .collect()
}

// ─── Style constraints ──────────────────────────────────────────────────────

/// Tradition style constraints, followed by emphasis entries for the
/// dimensions a focused variant concentrates its reading on.
fn style_constraints(tradition: &str, variant: &PipelineVariant) -> Vec<StyleConstraint> {
    let pairs: &[(&str, &str)] = match tradition {
        "chinese_xieyi" => &[
            ("ink wash", "graded ink over mineral color; leave deliberate voids"),
            ("calligraphic line", "strokes carry gesture, not contour fidelity"),
        ],
        "chinese_gongbi" => &[
            ("fine outline", "even-width contour before any color"),
            ("silk ground", "translucent layered washes on a toned ground"),
        ],
        "western_academic" => &[
            ("chiaroscuro", "single dominant light source, modelled volume"),
            ("perspective", "architecture locked to the horizon line"),
        ],
        "japanese_sumi_e" => &[("sumi ink", "five tones from one loaded brush")],
        "islamic_geometric" => &[
            ("girih", "lattice derived from the underlying grid"),
            ("tessellation", "no figurative elements in the sacred field"),
        ],
        _ => &[],
    };
    let mut styles: Vec<StyleConstraint> = pairs
        .iter()
        .map(|(keyword, guidance)| StyleConstraint {
            keyword: (*keyword).to_string(),
            guidance: (*guidance).to_string(),
        })
        .collect();

    // A variant focusing on a subset of dimensions gets one emphasis entry
    // per focused dimension; broad variants add nothing.
    if variant.scout_focus.len() < Dimension::ALL.len() {
        styles.extend(variant.scout_focus.iter().copied().map(focus_constraint));
    }
    styles
}

fn focus_constraint(dimension: Dimension) -> StyleConstraint {
    let (keyword, guidance) = match dimension {
        Dimension::VisualPerception => ("visual field", "settle the value structure first"),
        Dimension::TechnicalAnalysis => ("material honesty", "keep the medium's marks visible"),
        Dimension::CulturalContext => ("cultural grounding", "anchor motifs in period sources"),
        Dimension::CriticalInterpretation => ("layered reading", "leave room for a second reading"),
        Dimension::PhilosophicalAesthetic => ("aesthetic intent", "lead with the governing mood"),
    };
    StyleConstraint {
        keyword: keyword.to_string(),
        guidance: guidance.to_string(),
    }
}
