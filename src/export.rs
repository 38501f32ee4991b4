use crate::models::Card;

const HEADERS: [&str; 11] = [
    "Company",
    "Role",
    "Entry Salary",
    "Mid Salary",
    "Currency",
    "Location",
    "Type",
    "Domain",
    "Website",
    "Workplace Rating",
    "Size Rating",
];

/// Tab-separated rows, ready to paste into a spreadsheet.
pub fn to_tsv(cards: &[Card]) -> String {
    let mut out = HEADERS.join("\t");
    for card in cards {
        let d = &card.data;
        let row = [
            clean_tsv(&d.company_name),
            clean_tsv(&d.role),
            d.entry_level_salary.to_string(),
            d.mid_level_salary.to_string(),
            clean_tsv(&d.currency),
            clean_tsv(&d.country),
            clean_tsv(&d.company_type),
            clean_tsv(&d.industry_domain),
            clean_tsv(&d.website),
            d.workplace_rating.to_string(),
            d.size_rating.to_string(),
        ];
        out.push('\n');
        out.push_str(&row.join("\t"));
    }
    out
}

pub fn to_csv(cards: &[Card]) -> String {
    let mut out = HEADERS.join(",");
    for card in cards {
        let d = &card.data;
        let row = [
            quote(&d.company_name),
            quote(&d.role),
            d.entry_level_salary.to_string(),
            d.mid_level_salary.to_string(),
            quote(&d.currency),
            quote(&d.country),
            quote(&d.company_type),
            quote(&d.industry_domain),
            quote(&d.website),
            d.workplace_rating.to_string(),
            d.size_rating.to_string(),
        ];
        out.push('\n');
        out.push_str(&row.join(","));
    }
    out
}

pub fn default_csv_name(date: chrono::NaiveDate) -> String {
    format!("company_intel_data_{}.csv", date.format("%Y-%m-%d"))
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

// Tabs and newlines would break the grid
fn clean_tsv(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}
