//! Catalog row source backed by the Google Sheets values API.
//!
//! The pipeline reads four (optionally five) parallel column ranges and zips
//! them by index; short API responses are padded with blanks so every row
//! keeps its position.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

pub const COL_NAME: &str = "A";
pub const COL_COLOR: &str = "B";
pub const COL_ARTICLE: &str = "C";
pub const COL_PHOTO: &str = "O";

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("http: {0}")]
    Http(String),
    #[error("sheets api error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("malformed sheets response: {0}")]
    Malformed(String),
}

/// One cell value per requested row, blanks preserved.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn get_range(&self, range: &str) -> Result<Vec<String>, SheetError>;
}

/// One catalog row, immutable for the duration of the run.
#[derive(Clone, Debug)]
pub struct RowInput {
    pub article: String,
    pub name: String,
    pub color: Option<String>,
    pub source_url: Option<String>,
    pub price: Option<String>,
}

impl RowInput {
    /// Dedup and storage key for this card variant.
    pub fn identity(&self) -> String {
        match &self.color {
            Some(color) => format!("{}_{}", self.article, color.replace(' ', "_")),
            None => self.article.clone(),
        }
    }
}

/// Read the column ranges for rows `start..=end` and assemble them into
/// per-row inputs. Empty names get a placeholder; empty colors, and URLs
/// that are blank or the `-` marker, map to `None`.
pub async fn fetch_rows(
    source: &dyn RowSource,
    start: u32,
    end: u32,
    price_column: Option<&str>,
) -> Result<Vec<RowInput>, SheetError> {
    let len = (end - start + 1) as usize;
    let column = |c: &str| format!("{c}{start}:{c}{end}");

    let articles = pad(source.get_range(&column(COL_ARTICLE)).await?, len);
    let names = pad(source.get_range(&column(COL_NAME)).await?, len);
    let colors = pad(source.get_range(&column(COL_COLOR)).await?, len);
    let urls = pad(source.get_range(&column(COL_PHOTO)).await?, len);
    let prices = match price_column {
        Some(col) => pad(source.get_range(&column(col)).await?, len),
        None => vec![String::new(); len],
    };

    let rows = articles
        .into_iter()
        .zip(names)
        .zip(colors)
        .zip(urls)
        .zip(prices)
        .map(|((((article, name), color), url), price)| RowInput {
            article: article.trim().to_string(),
            name: non_blank(&name).unwrap_or_else(|| "Untitled".to_string()),
            color: non_blank(&color),
            source_url: non_blank(&url).filter(|u| u.as_str() != "-"),
            price: non_blank(&price),
        })
        .collect();
    Ok(rows)
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn pad(mut cells: Vec<String>, len: usize) -> Vec<String> {
    cells.resize(len, String::new());
    cells
}

fn sheets_api_url() -> String {
    std::env::var("SHEETS_API_URL")
        .unwrap_or_else(|_| "https://sheets.googleapis.com/v4/spreadsheets".to_string())
}

pub struct SheetsClient {
    http: reqwest::Client,
    api_key: String,
    sheet_id: String,
    tab: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, api_key: String, sheet_id: String, tab: String) -> Self {
        Self {
            http,
            api_key,
            sheet_id,
            tab,
        }
    }
}

#[async_trait]
impl RowSource for SheetsClient {
    async fn get_range(&self, range: &str) -> Result<Vec<String>, SheetError> {
        let scoped = format!("{}!{}", self.tab, range);
        let url = format!(
            "{}/{}/values/{}?key={}&majorDimension=COLUMNS",
            sheets_api_url(),
            self.sheet_id,
            urlencoding::encode(&scoped),
            self.api_key
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SheetError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SheetError::Api { status, body });
        }

        let json = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SheetError::Http(e.to_string()))?;

        // An entirely blank range has no "values" key at all.
        let Some(values) = json.get("values") else {
            return Ok(Vec::new());
        };
        let column = values
            .as_array()
            .and_then(|cols| cols.first())
            .and_then(|col| col.as_array())
            .ok_or_else(|| SheetError::Malformed("expected one column of values".into()))?;

        Ok(column
            .iter()
            .map(|cell| cell.as_str().unwrap_or_default().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedColumns;

    #[async_trait]
    impl RowSource for FixedColumns {
        async fn get_range(&self, range: &str) -> Result<Vec<String>, SheetError> {
            // Short responses on purpose; fetch_rows must pad them.
            Ok(match &range[..1] {
                COL_ARTICLE => vec!["3001".into(), "3002".into()],
                COL_NAME => vec!["Brick 2x4".into()],
                COL_COLOR => vec!["Red".into(), "".into(), "Dark Blue".into()],
                COL_PHOTO => vec!["http://example/x.jpg".into(), "-".into()],
                _ => vec![],
            })
        }
    }

    #[tokio::test]
    async fn rows_are_zipped_and_padded() {
        let rows = fetch_rows(&FixedColumns, 3, 5, None).await.unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].article, "3001");
        assert_eq!(rows[0].name, "Brick 2x4");
        assert_eq!(rows[0].color.as_deref(), Some("Red"));
        assert_eq!(rows[0].source_url.as_deref(), Some("http://example/x.jpg"));

        // blank name gets the placeholder, "-" URL reads as missing
        assert_eq!(rows[1].name, "Untitled");
        assert_eq!(rows[1].color, None);
        assert_eq!(rows[1].source_url, None);

        // padded row beyond every short column
        assert_eq!(rows[2].article, "");
        assert_eq!(rows[2].color.as_deref(), Some("Dark Blue"));
    }

    #[test]
    fn identity_normalizes_color() {
        let row = RowInput {
            article: "3001".into(),
            name: "Brick 2x4".into(),
            color: Some("Dark Blue".into()),
            source_url: None,
            price: None,
        };
        assert_eq!(row.identity(), "3001_Dark_Blue");

        let colorless = RowInput { color: None, ..row };
        assert_eq!(colorless.identity(), "3001");
    }
}
