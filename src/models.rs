use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_WORKPLACE_RATING: u8 = 3;
pub const DEFAULT_SIZE_RATING: u8 = 2;

/// Company details as produced by extraction or manual entry, before the
/// card has been saved.
///
/// Ratings are normalised here and nowhere else: a missing (or zero) rating
/// becomes the default, anything else is clamped to 1..=5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyData {
    pub company_name: String,
    #[serde(rename = "type", default, deserialize_with = "text")]
    pub kind: String, // "Product", "Tech", "Service", "Platform"
    #[serde(default, deserialize_with = "text")]
    pub website: String,
    #[serde(default, deserialize_with = "text")]
    pub country: String,
    #[serde(default, deserialize_with = "text")]
    pub company_type: String, // "Startup", "Scale-up", "Enterprise", ...
    #[serde(default, deserialize_with = "text")]
    pub industry_domain: String,
    #[serde(default, deserialize_with = "salary")]
    pub entry_level_salary: u64,
    #[serde(default, deserialize_with = "salary")]
    pub mid_level_salary: u64,
    #[serde(default, deserialize_with = "text")]
    pub currency: String,
    pub role: String,
    #[serde(default, deserialize_with = "text")]
    pub salary_explanation: String,
    #[serde(default = "default_workplace", deserialize_with = "workplace_rating")]
    pub workplace_rating: u8,
    #[serde(default = "default_size", deserialize_with = "size_rating")]
    pub size_rating: u8,
}

impl CompanyData {
    /// Defaults used by the manual entry form.
    pub fn manual(company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            kind: "Product".to_string(),
            website: String::new(),
            country: "United States".to_string(),
            company_type: "Startup".to_string(),
            industry_domain: "SaaS".to_string(),
            entry_level_salary: 0,
            mid_level_salary: 0,
            currency: "USD".to_string(),
            role: "Product Designer".to_string(),
            salary_explanation: "Manual Entry".to_string(),
            workplace_rating: DEFAULT_WORKPLACE_RATING,
            size_rating: DEFAULT_SIZE_RATING,
        }
    }
}

/// Clamp a rating into 1..=5, treating 0 as "not given".
pub fn normalize_rating(value: Option<f64>, default: u8) -> u8 {
    match value {
        Some(v) if v.is_finite() && v != 0.0 => v.round().clamp(1.0, 5.0) as u8,
        _ => default,
    }
}

fn default_workplace() -> u8 {
    DEFAULT_WORKPLACE_RATING
}

fn default_size() -> u8 {
    DEFAULT_SIZE_RATING
}

fn workplace_rating<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = Option::<f64>::deserialize(d)?;
    Ok(normalize_rating(v, DEFAULT_WORKPLACE_RATING))
}

fn size_rating<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = Option::<f64>::deserialize(d)?;
    Ok(normalize_rating(v, DEFAULT_SIZE_RATING))
}

// "website": null is common for fields the model could not find
fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

// Models sometimes answer with 85000.0 or a negative guess
fn salary<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = Option::<f64>::deserialize(d)?;
    Ok(match v {
        Some(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
        _ => 0,
    })
}

/// A saved company card. The store owns these; everything else works on copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(flatten)]
    pub data: CompanyData,
    pub timestamp: i64, // epoch millis
    #[serde(default)]
    pub theme_color: ThemeColor,
    #[serde(default)]
    pub icon: CardIcon,
}

/// What the user is about to save: fresh extraction output (with the look
/// it should be saved with), or an existing card being edited.
#[derive(Debug, Clone)]
pub enum CardDraft {
    Unsaved {
        data: CompanyData,
        theme_color: ThemeColor,
        icon: CardIcon,
    },
    Saved(Card),
}

impl CardDraft {
    /// A new card with the default theme and icon.
    pub fn new(data: CompanyData) -> Self {
        CardDraft::Unsaved {
            data,
            theme_color: ThemeColor::default(),
            icon: CardIcon::default(),
        }
    }

    /// Override the look of the draft; `None` leaves the current value.
    pub fn with_look(mut self, theme: Option<ThemeColor>, glyph: Option<CardIcon>) -> Self {
        let (theme_color, icon) = match &mut self {
            CardDraft::Unsaved { theme_color, icon, .. } => (theme_color, icon),
            CardDraft::Saved(card) => (&mut card.theme_color, &mut card.icon),
        };
        if let Some(theme) = theme {
            *theme_color = theme;
        }
        if let Some(glyph) = glyph {
            *icon = glyph;
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            CardDraft::Unsaved { .. } => None,
            CardDraft::Saved(card) => Some(&card.id),
        }
    }

    pub fn data(&self) -> &CompanyData {
        match self {
            CardDraft::Unsaved { data, .. } => data,
            CardDraft::Saved(card) => &card.data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeColor {
    #[default]
    Zinc,
    Slate,
    Red,
    Orange,
    Amber,
    Yellow,
    Lime,
    Green,
    Emerald,
    Teal,
    Cyan,
    Sky,
    Blue,
    Indigo,
    Violet,
    Purple,
    Fuchsia,
    Pink,
    Rose,
    Black,
}

impl ThemeColor {
    pub const ALL: [ThemeColor; 20] = [
        ThemeColor::Zinc,
        ThemeColor::Slate,
        ThemeColor::Red,
        ThemeColor::Orange,
        ThemeColor::Amber,
        ThemeColor::Yellow,
        ThemeColor::Lime,
        ThemeColor::Green,
        ThemeColor::Emerald,
        ThemeColor::Teal,
        ThemeColor::Cyan,
        ThemeColor::Sky,
        ThemeColor::Blue,
        ThemeColor::Indigo,
        ThemeColor::Violet,
        ThemeColor::Purple,
        ThemeColor::Fuchsia,
        ThemeColor::Pink,
        ThemeColor::Rose,
        ThemeColor::Black,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ThemeColor::Zinc => "zinc",
            ThemeColor::Slate => "slate",
            ThemeColor::Red => "red",
            ThemeColor::Orange => "orange",
            ThemeColor::Amber => "amber",
            ThemeColor::Yellow => "yellow",
            ThemeColor::Lime => "lime",
            ThemeColor::Green => "green",
            ThemeColor::Emerald => "emerald",
            ThemeColor::Teal => "teal",
            ThemeColor::Cyan => "cyan",
            ThemeColor::Sky => "sky",
            ThemeColor::Blue => "blue",
            ThemeColor::Indigo => "indigo",
            ThemeColor::Violet => "violet",
            ThemeColor::Purple => "purple",
            ThemeColor::Fuchsia => "fuchsia",
            ThemeColor::Pink => "pink",
            ThemeColor::Rose => "rose",
            ThemeColor::Black => "black",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThemeColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|c| c.name()).collect();
                format!("Unknown theme color '{}'. Available: {}", s, names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardIcon {
    #[default]
    #[serde(rename = "briefcase")]
    Briefcase,
    #[serde(rename = "✦")]
    Sparkle,
    #[serde(rename = "★")]
    Star,
    #[serde(rename = "✿")]
    Flower,
    #[serde(rename = "●")]
    Circle,
    #[serde(rename = "■")]
    Square,
    #[serde(rename = "▲")]
    Triangle,
    #[serde(rename = "⚡")]
    Bolt,
    #[serde(rename = "⚓")]
    Anchor,
    #[serde(rename = "⚛")]
    Atom,
    #[serde(rename = "⚜")]
    FleurDeLis,
    #[serde(rename = "✺")]
    Burst,
    #[serde(rename = "❄")]
    Snowflake,
    #[serde(rename = "◉")]
    Target,
    #[serde(rename = "◈")]
    Diamond,
    #[serde(rename = "⚔")]
    Swords,
    #[serde(rename = "✎")]
    Pencil,
}

impl CardIcon {
    pub const ALL: [CardIcon; 17] = [
        CardIcon::Briefcase,
        CardIcon::Sparkle,
        CardIcon::Star,
        CardIcon::Flower,
        CardIcon::Circle,
        CardIcon::Square,
        CardIcon::Triangle,
        CardIcon::Bolt,
        CardIcon::Anchor,
        CardIcon::Atom,
        CardIcon::FleurDeLis,
        CardIcon::Burst,
        CardIcon::Snowflake,
        CardIcon::Target,
        CardIcon::Diamond,
        CardIcon::Swords,
        CardIcon::Pencil,
    ];

    pub fn glyph(&self) -> &'static str {
        match self {
            CardIcon::Briefcase => "💼",
            CardIcon::Sparkle => "✦",
            CardIcon::Star => "★",
            CardIcon::Flower => "✿",
            CardIcon::Circle => "●",
            CardIcon::Square => "■",
            CardIcon::Triangle => "▲",
            CardIcon::Bolt => "⚡",
            CardIcon::Anchor => "⚓",
            CardIcon::Atom => "⚛",
            CardIcon::FleurDeLis => "⚜",
            CardIcon::Burst => "✺",
            CardIcon::Snowflake => "❄",
            CardIcon::Target => "◉",
            CardIcon::Diamond => "◈",
            CardIcon::Swords => "⚔",
            CardIcon::Pencil => "✎",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|i| *i == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl FromStr for CardIcon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("briefcase") {
            return Ok(CardIcon::Briefcase);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.glyph() == s)
            .ok_or_else(|| {
                let glyphs: Vec<&str> = Self::ALL.iter().skip(1).map(|i| i.glyph()).collect();
                format!("Unknown icon '{}'. Available: briefcase {}", s, glyphs.join(" "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_ratings_take_defaults() {
        let data: CompanyData =
            serde_json::from_str(r#"{"companyName": "Acme", "role": "Product Designer"}"#).unwrap();
        assert_eq!(data.workplace_rating, 3);
        assert_eq!(data.size_rating, 2);
        assert_eq!(data.entry_level_salary, 0);
    }

    #[test]
    fn test_ratings_are_clamped() {
        let data: CompanyData = serde_json::from_str(
            r#"{"companyName": "Acme", "role": "Designer", "workplaceRating": 9, "sizeRating": -4}"#,
        )
        .unwrap();
        assert_eq!(data.workplace_rating, 5);
        assert_eq!(data.size_rating, 1);
    }

    #[test]
    fn test_zero_or_null_rating_means_default() {
        let data: CompanyData = serde_json::from_str(
            r#"{"companyName": "Acme", "role": "Designer", "workplaceRating": 0, "sizeRating": null}"#,
        )
        .unwrap();
        assert_eq!(data.workplace_rating, 3);
        assert_eq!(data.size_rating, 2);
    }

    #[test]
    fn test_fractional_and_negative_salaries() {
        let data: CompanyData = serde_json::from_str(
            r#"{"companyName": "Acme", "role": "Designer", "entryLevelSalary": 85000.7, "midLevelSalary": -10}"#,
        )
        .unwrap();
        assert_eq!(data.entry_level_salary, 85000);
        assert_eq!(data.mid_level_salary, 0);
    }

    #[test]
    fn test_null_text_fields_become_empty() {
        let data: CompanyData = serde_json::from_str(
            r#"{"companyName": "Acme", "role": "Product Designer", "website": null, "type": null, "salaryExplanation": null}"#,
        )
        .unwrap();
        assert_eq!(data.website, "");
        assert_eq!(data.kind, "");
        assert_eq!(data.salary_explanation, "");
    }

    #[test]
    fn test_card_json_uses_camel_case_and_flat_fields() {
        let card = Card {
            id: "abc".to_string(),
            data: CompanyData::manual("Acme"),
            timestamp: 1_700_000_000_000,
            theme_color: ThemeColor::Indigo,
            icon: CardIcon::Star,
        };
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["companyName"], "Acme");
        assert_eq!(value["type"], "Product");
        assert_eq!(value["themeColor"], "indigo");
        assert_eq!(value["icon"], "★");

        let back: Card = serde_json::from_value(value).unwrap();
        assert_eq!(back, card);
    }

    #[test]
    fn test_theme_color_cycles() {
        assert_eq!(ThemeColor::Zinc.next(), ThemeColor::Slate);
        assert_eq!(ThemeColor::Black.next(), ThemeColor::Zinc);
        assert_eq!(ThemeColor::Zinc.prev(), ThemeColor::Black);
        assert_eq!("Teal".parse::<ThemeColor>().unwrap(), ThemeColor::Teal);
        assert!("mauve".parse::<ThemeColor>().is_err());
    }

    #[test]
    fn test_icon_parse() {
        assert_eq!("⚡".parse::<CardIcon>().unwrap(), CardIcon::Bolt);
        assert_eq!("briefcase".parse::<CardIcon>().unwrap(), CardIcon::Briefcase);
        assert_eq!(CardIcon::Pencil.next(), CardIcon::Briefcase);
    }

    #[test]
    fn test_draft_variants() {
        let draft = CardDraft::new(CompanyData::manual("Acme"));
        assert!(draft.id().is_none());
        assert_eq!(draft.data().company_name, "Acme");

        let draft = draft.with_look(Some(ThemeColor::Teal), None);
        assert!(matches!(
            draft,
            CardDraft::Unsaved { theme_color: ThemeColor::Teal, icon: CardIcon::Briefcase, .. }
        ));
    }
}
