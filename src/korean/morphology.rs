//! Heuristic Korean stemmer: particle and verb-suffix stripping.
//! Not a morphological analyzer. It only produces the few stem variants that
//! are likely to equal a glossary term.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// First Hangul syllable (가).
const HANGUL_SYLLABLE_BASE: u32 = 0xAC00;
/// Lead consonant count.
const CHOSEONG_COUNT: u32 = 19;
/// Vowel count.
const JUNGSEONG_COUNT: u32 = 21;
/// Tail consonant count (including "no tail").
const JONGSEONG_COUNT: u32 = 28;

/// Multi-syllable particles, tried before the single lists.
const COMPLEX_PARTICLES: &[&str] = &[
    "에서부터", "으로부터", "에게서", "한테서", "에서는", "에서도", "으로는", "으로도",
    "으로서", "으로써", "에게는", "에게도", "까지는", "까지도", "부터는", "이라도",
    "이라는", "이랑은", "에서", "에게", "한테", "께서", "까지", "부터", "마다", "처럼",
    "보다", "에는", "에도", "와의", "과의", "로서", "로써", "로는", "하고", "조차", "밖에",
    "만큼", "이나", "이랑", "라도", "라는", "이며", "의",
];

/// Particles that follow a syllable ending in a consonant.
const PARTICLES_WITH_BATCHIM: &[&str] = &["으로", "이다", "은", "이", "을", "과", "에", "도", "만"];

/// Particles that follow a syllable ending in a vowel.
const PARTICLES_WITHOUT_BATCHIM: &[&str] = &["로", "는", "가", "를", "와", "에", "도", "만", "랑", "나"];

/// Copula and verb/adjective endings.
const VERB_SUFFIXES: &[&str] = &[
    "하겠습니다", "해주세요", "하십시오", "했습니다", "합니다", "입니다", "습니다", "하세요",
    "했어요", "해요", "이에요", "예요", "하기", "하다", "하는", "했다", "한다", "된다",
    "되다", "되는", "됩니다", "하고", "해서", "하면", "이다", "해", "한", "할", "된",
];

fn longest_first(list: &[&'static str]) -> Vec<&'static str> {
    let mut sorted = list.to_vec();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    sorted
}

static COMPLEX_SORTED: Lazy<Vec<&'static str>> = Lazy::new(|| longest_first(COMPLEX_PARTICLES));
static WITH_BATCHIM_SORTED: Lazy<Vec<&'static str>> =
    Lazy::new(|| longest_first(PARTICLES_WITH_BATCHIM));
static WITHOUT_BATCHIM_SORTED: Lazy<Vec<&'static str>> =
    Lazy::new(|| longest_first(PARTICLES_WITHOUT_BATCHIM));
static VERB_SUFFIXES_SORTED: Lazy<Vec<&'static str>> = Lazy::new(|| longest_first(VERB_SUFFIXES));

/// Whether a Hangul syllable has a final consonant (batchim).
/// Returns false for anything that is not a composed syllable.
pub fn has_batchim(c: char) -> bool {
    let code = c as u32;
    let last = HANGUL_SYLLABLE_BASE + CHOSEONG_COUNT * JUNGSEONG_COUNT * JONGSEONG_COUNT - 1;
    if !(HANGUL_SYLLABLE_BASE..=last).contains(&code) {
        return false;
    }
    (code - HANGUL_SYLLABLE_BASE) % JONGSEONG_COUNT != 0
}

/// Strip `suffix` from `word` if a non-empty remainder is left.
fn strip_suffix<'a>(word: &'a str, suffix: &str) -> Option<&'a str> {
    word.strip_suffix(suffix).filter(|rest| !rest.is_empty())
}

/// Remove one particle. Complex particles win over single ones; the single
/// table is picked by whether the remaining stem ends in a batchim.
pub fn strip_particle(word: &str) -> Option<&str> {
    for particle in COMPLEX_SORTED.iter() {
        if let Some(rest) = strip_suffix(word, particle) {
            return Some(rest);
        }
    }

    let with = WITH_BATCHIM_SORTED.iter().map(|p| (p, true));
    let without = WITHOUT_BATCHIM_SORTED.iter().map(|p| (p, false));
    let mut singles: Vec<(&&str, bool)> = with.chain(without).collect();
    singles.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    for (particle, needs_batchim) in singles {
        if let Some(rest) = strip_suffix(word, particle) {
            let Some(last) = rest.chars().last() else {
                continue;
            };
            if has_batchim(last) == needs_batchim {
                return Some(rest);
            }
        }
    }
    None
}

/// Remove one verb/copula ending, longest first.
pub fn strip_verb_suffix(word: &str) -> Option<&str> {
    VERB_SUFFIXES_SORTED
        .iter()
        .find_map(|suffix| strip_suffix(word, suffix))
}

/// Stem candidates for `word`. Always contains `word` itself (when non-empty).
pub fn stem(word: &str) -> HashSet<String> {
    let mut stems = HashSet::new();
    let word = word.trim();
    if word.is_empty() {
        return stems;
    }
    stems.insert(word.to_string());

    if let Some(verb_stem) = strip_verb_suffix(word) {
        stems.insert(verb_stem.to_string());
    }

    if let Some(particle_stem) = strip_particle(word) {
        stems.insert(particle_stem.to_string());
        if let Some(both) = strip_verb_suffix(particle_stem) {
            stems.insert(both.to_string());
        }
    }

    stems.retain(|s| !s.is_empty());
    stems
}
