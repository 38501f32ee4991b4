use std::fmt;
use std::str::FromStr;

use crate::models::Card;

pub const ALL_TYPES: &str = "All";

/// Soft limit for the storage indicator. Nothing is rejected past it.
pub const STORAGE_SOFT_LIMIT_BYTES: usize = 5 * 1024 * 1024;

/// Cards whose company name or role contains `search` (case-insensitive) and
/// whose company type equals `type_filter`, unless the filter is "All".
pub fn filter_by(cards: &[Card], search: &str, type_filter: &str) -> Vec<Card> {
    let needle = search.to_lowercase();
    cards
        .iter()
        .filter(|card| {
            let matches_search = card.data.company_name.to_lowercase().contains(&needle)
                || card.data.role.to_lowercase().contains(&needle);
            let matches_type = type_filter == ALL_TYPES || card.data.company_type == type_filter;
            matches_search && matches_type
        })
        .cloned()
        .collect()
}

/// "All" followed by each company type in first-seen order.
pub fn distinct_types(cards: &[Card]) -> Vec<String> {
    let mut types = vec![ALL_TYPES.to_string()];
    for card in cards {
        if !types.iter().any(|t| *t == card.data.company_type) {
            types.push(card.data.company_type.clone());
        }
    }
    types
}

pub fn usage_percentage(used_bytes: usize, limit_bytes: usize) -> f64 {
    if limit_bytes == 0 {
        return 0.0;
    }
    used_bytes as f64 / limit_bytes as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Year,
    Month,
}

impl Period {
    pub fn toggle(self) -> Self {
        match self {
            Period::Year => Period::Month,
            Period::Month => Period::Year,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year => write!(f, "year"),
            Period::Month => write!(f, "month"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "year" | "yearly" | "annual" => Ok(Period::Year),
            "month" | "monthly" => Ok(Period::Month),
            _ => Err(format!("Unknown period '{}'. Use 'year' or 'month'", s)),
        }
    }
}

/// Annual salary expressed per period. Rounding is left to the caller.
pub fn salary_for_period(annual: u64, period: Period) -> f64 {
    match period {
        Period::Year => annual as f64,
        Period::Month => annual as f64 / 12.0,
    }
}

/// Whole-unit salary with thousands separators, or "N/A" for zero.
pub fn format_salary(annual: u64, currency: &str, period: Period) -> String {
    if annual == 0 {
        return "N/A".to_string();
    }
    let amount = salary_for_period(annual, period).round() as u64;
    let digits = amount.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{} {}", grouped, currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardIcon, CompanyData, ThemeColor};
    use pretty_assertions::assert_eq;

    fn card(id: &str, name: &str, role: &str, company_type: &str) -> Card {
        let mut data = CompanyData::manual(name);
        data.role = role.to_string();
        data.company_type = company_type.to_string();
        Card {
            id: id.to_string(),
            data,
            timestamp: 0,
            theme_color: ThemeColor::Zinc,
            icon: CardIcon::Briefcase,
        }
    }

    fn snapshot() -> Vec<Card> {
        vec![
            card("1", "Acme Corp", "Product Designer", "Startup"),
            card("2", "Globex", "UX Lead at ACME labs", "Enterprise"),
            card("3", "Initech", "Designer", "Startup"),
            card("4", "Umbrella", "Researcher", "Scale-up"),
        ]
    }

    fn ids(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_filter_by_search_matches_name_or_role() {
        let result = filter_by(&snapshot(), "acme", ALL_TYPES);
        assert_eq!(ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn test_filter_by_type_is_exact() {
        let result = filter_by(&snapshot(), "", "Startup");
        assert_eq!(ids(&result), vec!["1", "3"]);

        assert!(filter_by(&snapshot(), "", "startup").is_empty());
    }

    #[test]
    fn test_filter_by_combines_predicates() {
        let result = filter_by(&snapshot(), "design", "Startup");
        assert_eq!(ids(&result), vec!["1", "3"]);

        let result = filter_by(&snapshot(), "acme", "Enterprise");
        assert_eq!(ids(&result), vec!["2"]);
    }

    #[test]
    fn test_empty_search_and_all_returns_everything() {
        let cards = snapshot();
        assert_eq!(filter_by(&cards, "", ALL_TYPES), cards);
    }

    #[test]
    fn test_distinct_types() {
        assert_eq!(
            distinct_types(&snapshot()),
            vec!["All", "Startup", "Enterprise", "Scale-up"]
        );
        assert_eq!(distinct_types(&[]), vec!["All"]);
    }

    #[test]
    fn test_usage_percentage_is_unclamped() {
        assert_eq!(usage_percentage(0, STORAGE_SOFT_LIMIT_BYTES), 0.0);
        assert_eq!(usage_percentage(512, 1024), 50.0);
        assert_eq!(usage_percentage(3072, 1024), 300.0);
    }

    #[test]
    fn test_salary_for_period() {
        assert_eq!(salary_for_period(120_000, Period::Year), 120_000.0);
        assert_eq!(salary_for_period(120_000, Period::Month), 10_000.0);
        assert_eq!(salary_for_period(100_000, Period::Month), 100_000.0 / 12.0);
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(format_salary(0, "USD", Period::Year), "N/A");
        assert_eq!(format_salary(1_234_567, "USD", Period::Year), "1,234,567 USD");
        assert_eq!(format_salary(100_000, "EUR", Period::Month), "8,333 EUR");
        assert_eq!(format_salary(999, "VND", Period::Year), "999 VND");
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!(Period::Year.toggle(), Period::Month);
        assert!("week".parse::<Period>().is_err());
    }
}
