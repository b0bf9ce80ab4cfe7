//! Sheets v4 REST client

use super::{CellRef, Color, SheetClient, Worksheet};
use crate::config::SheetsConfig;
use crate::error::{CrabError, ErrorCode, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct GoogleSheetsClient {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsClient {
    pub fn new(
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                CrabError::config("failed to create HTTP client for the spreadsheet API")
                    .with_source(e)
            })?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Needs both `sheets.spreadsheet_id` and `sheets.access_token`
    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        let missing = |key: &str| {
            CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("spreadsheet updates need sheets.{key}"),
            )
        };
        let id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| missing("spreadsheet_id"))?;
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| missing("access_token"))?;
        Self::new(config.api_base.clone(), id, token)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("invalid sheets.api_base '{}'", self.api_base),
            )
            .with_source(e)
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                CrabError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("sheets.api_base '{}' cannot take a path", self.api_base),
                )
            })?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, sheet: &Worksheet, range: &str) -> Result<Url> {
        let range = format!("'{}'!{}", sheet.title.replace('\'', "''"), range);
        self.url(&["values", &range])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            CrabError::external_tool(
                ErrorCode::EXEC_HTTP_FAILED,
                format!("{what}: request failed"),
                what,
                None,
                "",
                e.to_string(),
            )
        })?;

        match response.status() {
            status if status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                if text.trim().is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(serde_json::from_str(&text)?)
                }
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(CrabError::rate_limit(format!("{what}: spreadsheet API quota exceeded")))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CrabError::external_tool(
                    ErrorCode::EXEC_HTTP_FAILED,
                    format!("{what}: spreadsheet API returned {status}"),
                    what,
                    Some(i32::from(status.as_u16())),
                    "",
                    body,
                ))
            }
        }
    }

    async fn all_values(&self, sheet: &Worksheet) -> Result<Vec<Vec<Value>>> {
        let range = format!("'{}'", sheet.title.replace('\'', "''"));
        let url = self.url(&["values", &range])?;
        let value = self
            .send(self.request(Method::GET, url), "read worksheet")
            .await?;
        let range: ValueRange = serde_json::from_value(value)?;
        Ok(range.values)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn find_worksheet(&self, era: &str, version: &str) -> Result<Option<Worksheet>> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let value = self
            .send(self.request(Method::GET, url), "list worksheets")
            .await?;
        let meta: SpreadsheetMeta = serde_json::from_value(value)?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title.contains(era) && p.title.contains(version))
            .map(|p| Worksheet {
                id: p.sheet_id,
                title: p.title,
            }))
    }

    async fn find_cell(&self, sheet: &Worksheet, text: &str) -> Result<Option<CellRef>> {
        let rows = self.all_values(sheet).await?;
        for (r, row) in rows.iter().enumerate() {
            if let Some(c) = row.iter().position(|v| cell_text(v) == text) {
                return Ok(Some(CellRef {
                    row: r as u32 + 1,
                    col: c as u32 + 1,
                }));
            }
        }
        Ok(None)
    }

    async fn read_cell(&self, sheet: &Worksheet, cell: CellRef) -> Result<Option<String>> {
        let url = self.values_url(sheet, &cell.a1())?;
        let value = self
            .send(self.request(Method::GET, url), "read cell")
            .await?;
        let range: ValueRange = serde_json::from_value(value)?;
        Ok(range
            .values
            .first()
            .and_then(|row| row.first())
            .map(cell_text))
    }

    async fn write_cell(&self, sheet: &Worksheet, cell: CellRef, value: &str) -> Result<()> {
        let mut url = self.values_url(sheet, &cell.a1())?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "values": [[value]] });
        self.send(self.request(Method::PUT, url).json(&body), "write cell")
            .await
            .map(|_| ())
    }

    async fn format_cell(&self, sheet: &Worksheet, cell: CellRef, color: Color) -> Result<()> {
        let base = self.url(&[])?;
        let url = Url::parse(&format!("{base}:batchUpdate")).map_err(|e| {
            CrabError::config("cannot build spreadsheet batchUpdate URL").with_source(e)
        })?;
        let body = json!({
            "requests": [{
                "repeatCell": {
                    "range": {
                        "sheetId": sheet.id,
                        "startRowIndex": cell.row - 1,
                        "endRowIndex": cell.row,
                        "startColumnIndex": cell.col - 1,
                        "endColumnIndex": cell.col,
                    },
                    "cell": {
                        "userEnteredFormat": {
                            "backgroundColor": {
                                "red": color.red,
                                "green": color.green,
                                "blue": color.blue,
                            }
                        }
                    },
                    "fields": "userEnteredFormat.backgroundColor",
                }
            }]
        });
        self.send(self.request(Method::POST, url).json(&body), "format cell")
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleSheetsClient {
        GoogleSheetsClient::new("https://sheets.googleapis.com/v4", "abc123", "token").unwrap()
    }

    #[test]
    fn test_spreadsheet_url() {
        let url = client().url(&[]).unwrap();
        assert_eq!(url.as_str(), "https://sheets.googleapis.com/v4/spreadsheets/abc123");
    }

    #[test]
    fn test_values_url_quotes_title() {
        let sheet = Worksheet {
            id: 0,
            title: "2023C v1".to_string(),
        };
        let url = client().values_url(&sheet, "B3").unwrap();
        assert!(url.path().starts_with("/v4/spreadsheets/abc123/values/"));
        assert!(url.path().ends_with("!B3"));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let err = GoogleSheetsClient::from_config(&SheetsConfig::default()).err().unwrap();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("x")), "x");
        assert_eq!(cell_text(&json!(3)), "3");
        assert_eq!(cell_text(&Value::Null), "");
    }
}
