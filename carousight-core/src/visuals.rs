//! Visual attributes of generated carousels.
//!
//! The generator writes one prose image prompt per slide. Each prompt is
//! classified against seven fixed keyword maps by case-insensitive substring
//! search. Deterministic and offline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type KeywordMap = &'static [(&'static str, &'static [&'static str])];

const PHOTOGRAPHY_STYLE: KeywordMap = &[
    (
        "iphone_authentic",
        &["iphone", "phone photo", "authentic", "candid", "real life", "not posed", "casual snapshot"],
    ),
    (
        "illustration",
        &["illustration", "illustrated", "hand drawn", "watercolor", "sketch", "cartoon", "graphic"],
    ),
    ("studio", &["studio", "professional lighting", "backdrop", "product shot", "white background"]),
    ("cinematic", &["cinematic", "film still", "movie", "dramatic angle", "widescreen", "anamorphic"]),
];

const LIGHTING: KeywordMap = &[
    ("golden_hour", &["golden hour", "golden light", "sunset light", "warm sunset"]),
    ("natural", &["natural light", "daylight", "window light", "sun light", "sunlit"]),
    ("moody", &["moody light", "low light", "dark", "shadow", "silhouette", "backlit"]),
    ("soft", &["soft light", "diffused", "overcast", "even lighting", "gentle light"]),
    ("warm", &["warm light", "warm glow", "lamp light", "cozy light", "candlelight"]),
];

const COLOR_PALETTE: KeywordMap = &[
    ("cream_navy", &["cream", "navy", "ivory", "off-white", "deep blue"]),
    ("warm_golden", &["golden", "amber", "honey", "warm tone", "gold"]),
    (
        "earth_tones",
        &["earth tone", "brown", "terracotta", "olive", "sage", "muted green", "rust"],
    ),
    ("bright", &["bright", "vivid", "saturated", "bold color", "pop of color", "colorful"]),
    ("pastel", &["pastel", "soft pink", "baby blue", "lavender", "mint", "blush"]),
];

const COMPOSITION: KeywordMap = &[
    ("closeup", &["close-up", "closeup", "close up", "macro", "detail shot", "tight shot"]),
    (
        "overhead",
        &["overhead", "flat lay", "flatlay", "bird's eye", "birds eye", "top-down", "top down"],
    ),
    ("low_angle", &["low angle", "looking up", "from below", "upward angle"]),
    ("profile", &["profile", "side view", "side angle", "from the side"]),
    ("wide", &["wide shot", "wide angle", "full scene", "establishing shot", "pulled back"]),
    ("medium", &["medium shot", "waist up", "mid-shot", "three-quarter"]),
];

const SCENE_SETTING: KeywordMap = &[
    ("playground", &["playground", "park", "swing", "slide", "sandbox", "jungle gym"]),
    ("bedroom", &["bedroom", "nursery", "crib", "bed", "pillow", "blanket"]),
    (
        "kitchen",
        &["kitchen", "counter", "stove", "cooking", "baking", "highchair", "dining"],
    ),
    (
        "living_room",
        &["living room", "couch", "sofa", "carpet", "tv", "family room", "playroom"],
    ),
    (
        "outdoor",
        &["outdoor", "backyard", "garden", "yard", "porch", "patio", "nature", "trail", "beach"],
    ),
    ("car", &["car seat", "car", "vehicle", "driving", "backseat"]),
];

const SUBJECT_FOCUS: KeywordMap = &[
    ("hands_detail", &["hands", "fingers", "holding", "gripping", "reaching", "hand detail"]),
    (
        "parent_child",
        &[
            "parent and child", "parent child", "mother and", "father and", "mom and", "dad and",
            "holding baby", "carrying",
        ],
    ),
    (
        "child_solo",
        &["child alone", "toddler", "baby solo", "kid playing", "child playing", "little one"],
    ),
    (
        "face_expression",
        &["face", "expression", "smile", "crying", "laughing", "emotion", "eyes", "looking at camera"],
    ),
];

const MOOD: KeywordMap = &[
    ("warm_cozy", &["warm", "cozy", "comfort", "snuggle", "cuddle", "intimate", "tender"]),
    (
        "energetic",
        &["energetic", "active", "running", "jumping", "playful", "dynamic", "movement", "action"],
    ),
    (
        "calm",
        &["calm", "peaceful", "serene", "quiet", "still", "gentle", "tranquil", "relaxed"],
    ),
    (
        "moody_dramatic",
        &["moody", "dramatic", "intense", "stark", "contrast", "shadow", "tension"],
    ),
    (
        "joyful",
        &["joyful", "happy", "bright", "cheerful", "fun", "delight", "excited", "laughter"],
    ),
];

/// One classified dimension of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualAttribute {
    PhotographyStyle,
    Lighting,
    ColorPalette,
    Composition,
    SceneSetting,
    SubjectFocus,
    Mood,
}

impl VisualAttribute {
    pub const ALL: [VisualAttribute; 7] = [
        VisualAttribute::PhotographyStyle,
        VisualAttribute::Lighting,
        VisualAttribute::ColorPalette,
        VisualAttribute::Composition,
        VisualAttribute::SceneSetting,
        VisualAttribute::SubjectFocus,
        VisualAttribute::Mood,
    ];

    /// Also the column name in `post_visuals`
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualAttribute::PhotographyStyle => "photography_style",
            VisualAttribute::Lighting => "lighting",
            VisualAttribute::ColorPalette => "color_palette",
            VisualAttribute::Composition => "composition",
            VisualAttribute::SceneSetting => "scene_setting",
            VisualAttribute::SubjectFocus => "subject_focus",
            VisualAttribute::Mood => "mood",
        }
    }

    /// Human label, as used in generator guidance
    pub fn label(&self) -> &'static str {
        match self {
            VisualAttribute::PhotographyStyle => "style",
            VisualAttribute::ColorPalette => "color palette",
            VisualAttribute::SceneSetting => "setting",
            VisualAttribute::SubjectFocus => "subject focus",
            other => other.as_str(),
        }
    }

    fn keywords(&self) -> KeywordMap {
        match self {
            VisualAttribute::PhotographyStyle => PHOTOGRAPHY_STYLE,
            VisualAttribute::Lighting => LIGHTING,
            VisualAttribute::ColorPalette => COLOR_PALETTE,
            VisualAttribute::Composition => COMPOSITION,
            VisualAttribute::SceneSetting => SCENE_SETTING,
            VisualAttribute::SubjectFocus => SUBJECT_FOCUS,
            VisualAttribute::Mood => MOOD,
        }
    }
}

impl std::fmt::Display for VisualAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VisualAttribute {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VisualAttribute::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown visual attribute: {}", s))
    }
}

/// Values of `attribute` whose keywords appear in `text`, strongest first.
///
/// Strength is the number of distinct keywords hit. Equal strengths keep
/// the keyword map's order.
pub fn classify_attribute(text: &str, attribute: VisualAttribute) -> Vec<&'static str> {
    let text = text.to_lowercase();
    let mut hits: Vec<(&'static str, usize)> = attribute
        .keywords()
        .iter()
        .filter_map(|(value, keywords)| {
            let count = keywords.iter().filter(|kw| text.contains(*kw)).count();
            (count > 0).then_some((*value, count))
        })
        .collect();
    // stable: ties stay in map order
    hits.sort_by(|a, b| b.1.cmp(&a.1));
    hits.into_iter().map(|(value, _)| value).collect()
}

/// Every attribute with at least one match in a single prompt
pub fn extract_from_prompt(prompt: &str) -> BTreeMap<VisualAttribute, Vec<&'static str>> {
    VisualAttribute::ALL
        .into_iter()
        .filter_map(|attr| {
            let values = classify_attribute(prompt, attr);
            (!values.is_empty()).then_some((attr, values))
        })
        .collect()
}

/// Visual profile of a whole carousel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostVisuals {
    /// Heaviest value per attribute across all slides
    pub dominant: BTreeMap<VisualAttribute, String>,
    /// Strongest value per attribute on the first slide
    pub hook: BTreeMap<VisualAttribute, String>,
    /// Accumulated weight of every value seen
    pub all_attributes: BTreeMap<VisualAttribute, BTreeMap<String, u32>>,
}

impl PostVisuals {
    pub fn is_empty(&self) -> bool {
        self.dominant.is_empty() && self.hook.is_empty()
    }
}

/// Profile a carousel from its per-slide image prompts.
///
/// Within a slide, the k-th of n matched values for an attribute weighs
/// `n - k` (at least 1), so a slide's strongest reading counts most. On a
/// weight tie the value seen first wins.
pub fn extract_from_post<S: AsRef<str>>(image_prompts: &[S]) -> PostVisuals {
    let Some(first) = image_prompts.first() else {
        return PostVisuals::default();
    };

    let mut weights: BTreeMap<VisualAttribute, Vec<(&'static str, u32)>> = BTreeMap::new();
    for prompt in image_prompts {
        for (attr, values) in extract_from_prompt(prompt.as_ref()) {
            let seen = weights.entry(attr).or_default();
            let n = values.len();
            for (i, value) in values.into_iter().enumerate() {
                let weight = (n - i).max(1) as u32;
                match seen.iter_mut().find(|(v, _)| *v == value) {
                    Some((_, total)) => *total += weight,
                    None => seen.push((value, weight)),
                }
            }
        }
    }

    let mut visuals = PostVisuals::default();
    for (attr, seen) in weights {
        let mut best: Option<(&str, u32)> = None;
        for &(value, weight) in &seen {
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((value, weight));
            }
        }
        if let Some((value, _)) = best {
            visuals.dominant.insert(attr, value.to_string());
        }
        visuals.all_attributes.insert(
            attr,
            seen.into_iter().map(|(v, w)| (v.to_string(), w)).collect(),
        );
    }

    visuals.hook = extract_from_prompt(first.as_ref())
        .into_iter()
        .filter_map(|(attr, values)| values.first().map(|v| (attr, v.to_string())))
        .collect();

    visuals
}
