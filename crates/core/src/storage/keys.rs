//! Object key layout: `{category}/ProcessDate={date}/...`.

use chrono::NaiveDate;

use crate::feed::ArticleRecord;

/// Directory-style prefix shared by every object of one run.
pub fn prefix(category: &str, process_date: NaiveDate) -> String {
    format!("{}/ProcessDate={}/", category, process_date.format("%Y-%m-%d"))
}

pub fn raw_key(category: &str, process_date: NaiveDate) -> String {
    format!("{}raw.xml", prefix(category, process_date))
}

pub fn article_key(category: &str, process_date: NaiveDate, article: &ArticleRecord) -> String {
    format!(
        "{}{}.json",
        prefix(category, process_date),
        article.key_safe_identifier()
    )
}

pub fn metadata_key(category: &str, process_date: NaiveDate) -> String {
    format!("{}metadata.json", prefix(category, process_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(raw_key("cs", date()), "cs/ProcessDate=2024-01-01/raw.xml");
        assert_eq!(
            metadata_key("cs", date()),
            "cs/ProcessDate=2024-01-01/metadata.json"
        );
    }

    #[test]
    fn test_article_key_replaces_slashes() {
        let article = ArticleRecord {
            identifier: "math/0101001v2".to_string(),
            title: String::new(),
            link: String::new(),
            description: String::new(),
            creator: None,
            published: None,
            doi: None,
        };
        assert_eq!(
            article_key("math", date(), &article),
            "math/ProcessDate=2024-01-01/math_0101001v2.json"
        );
    }
}
