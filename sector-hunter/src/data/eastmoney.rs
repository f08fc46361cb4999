//! Eastmoney source for concept board and spot data.
//!
//! The three screening datasets come from the same list endpoint, selected
//! by the `fs` filter:
//!
//! - Concept board ranking: `m:90 t:3 f:!50`, one page sorted by `f3`
//! - Board constituents: `b:<board code> f:!50`
//! - Whole-market spot list: Shanghai/Shenzhen/ChiNext/STAR/Beijing boards
//!
//! Multi-page lists are ordered by code (`f12`). Ordering by a live field
//! such as change percentage lets rows migrate across page boundaries while
//! the pages are being fetched, which duplicates some rows and loses others.
//!
//! The hot-stock overlap uses two more endpoints: the per-stock board index
//! (`slist/get`) and the popular-board ranking (`qry_tzzh_v2`).
//!
//! Requests use `fltt=2`, which returns prices and percentages as plain
//! decimals and `"-"` for values the exchange has not published.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use sector_common::config::SourceConfig;

use super::provider::{MarketDataSource, ProviderError};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{BoardRef, Column, ConstituentSet, MarketSnapshot, SectorRank, SpotQuote};

// ============================================================================
// Constants
// ============================================================================

/// Quote API host (list and per-stock board endpoints)
const QUOTE_BASE_URL: &str = "https://push2.eastmoney.com";

/// Simulated-trading host serving the popular-board ranking
const HOT_RANK_BASE_URL: &str = "https://simqry2.eastmoney.com";

const CLIST_PATH: &str = "/api/qt/clist/get";
const SLIST_PATH: &str = "/api/qt/slist/get";
const HOT_RANK_PATH: &str = "/qry_tzzh_v2";

/// Public tokens used by the eastmoney web client
const UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";
const SLIST_UT: &str = "f057cbcbce2a86e2866ab8877db1d059";

/// Largest page the list endpoint serves
const PAGE_SIZE: usize = 100;

/// Hard stop for paging; the whole market is ~55 pages
const MAX_PAGES: usize = 120;

/// Boards returned per stock by the board index
const STOCK_BOARD_LIMIT: &str = "30";

/// Entries requested from the popular-board ranking
const POPULAR_BOARD_COUNT: &str = "15";

const BOARD_FILTER: &str = "m:90 t:3 f:!50";
const SPOT_FILTER: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";
const BOARD_FIELDS: &str = "f12,f14,f3";
const SPOT_FIELDS: &str = "f12,f14,f2,f3,f20,f10,f8,f7,f6";

/// Upstream field → screening column.
const SPOT_COLUMNS: &[(&str, Column)] = &[
    ("f2", Column::LastPrice),
    ("f3", Column::ChangePct),
    ("f20", Column::MarketCap),
    ("f10", Column::VolumeRatio),
    ("f8", Column::TurnoverRate),
    ("f7", Column::Amplitude),
    ("f6", Column::Amount),
];

/// Sort order of a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListOrder {
    /// Change percentage, best first. Single-page reads only.
    ChangeDesc,
    /// Code, ascending. Stable across pages.
    CodeAsc,
}

impl ListOrder {
    /// `(fid, po)` query values.
    fn params(self) -> (&'static str, &'static str) {
        match self {
            Self::ChangeDesc => ("f3", "1"),
            Self::CodeAsc => ("f12", "0"),
        }
    }
}

// ============================================================================
// Eastmoney Source
// ============================================================================

/// Eastmoney adapter.
///
/// Constituent lookups are by board name, but the upstream filters by board
/// code, so the adapter remembers the name → code mapping from every ranking
/// it fetches.
pub struct EastmoneySource {
    client: reqwest::Client,
    limiter: SharedRateLimiter,
    board_codes: RwLock<HashMap<String, String>>,
    quote_base: String,
    hot_rank_base: String,
}

impl EastmoneySource {
    /// Create with default settings.
    pub fn new() -> Self {
        Self::from_config(&SourceConfig::default())
    }

    /// Create from source configuration.
    pub fn from_config(config: &SourceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            limiter: shared_limiter("eastmoney", config.requests_per_minute),
            board_codes: RwLock::new(HashMap::new()),
            quote_base: QUOTE_BASE_URL.to_string(),
            hot_rank_base: HOT_RANK_BASE_URL.to_string(),
        }
    }

    /// Send every request to `url` instead of the eastmoney hosts.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.quote_base = url.clone();
        self.hot_rank_base = url;
        self
    }

    /// Rate-limited GET with status handling.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ProviderError> {
        self.limiter.acquire().await;

        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", status)));
        }
        Ok(response)
    }

    /// Fetch one page of the list endpoint.
    async fn fetch_page(
        &self,
        filter: &str,
        fields: &str,
        order: ListOrder,
        page: usize,
        page_size: usize,
    ) -> Result<ClistPage, ProviderError> {
        let url = format!("{}{}", self.quote_base, CLIST_PATH);
        let page_str = page.to_string();
        let size_str = page_size.to_string();
        let (fid, po) = order.params();
        let query = [
            ("pn", page_str.as_str()),
            ("pz", size_str.as_str()),
            ("po", po),
            ("np", "1"),
            ("ut", UT),
            ("fltt", "2"),
            ("invt", "2"),
            ("fid", fid),
            ("fs", filter),
            ("fields", fields),
        ];

        debug!(filter, page, fid, "Fetching eastmoney list page");

        let body: ClistResponse = self.get(&url, &query).await?.json().await?;
        body.into_page()
    }

    /// Fetch every page of a list, in code order.
    async fn fetch_all(&self, filter: &str, fields: &str) -> Result<Vec<Map<String, Value>>, ProviderError> {
        let mut rows = Vec::new();

        for page in 1..=MAX_PAGES {
            let batch = self
                .fetch_page(filter, fields, ListOrder::CodeAsc, page, PAGE_SIZE)
                .await?;
            let received = batch.rows.len();
            rows.extend(batch.rows);

            if received == 0 || rows.len() >= batch.total {
                return Ok(rows);
            }
        }

        warn!(filter, pages = MAX_PAGES, "Stopped paging before reaching reported total");
        Ok(rows)
    }

    fn remember_boards(&self, ranks: &[SectorRank]) {
        if let Ok(mut codes) = self.board_codes.write() {
            for rank in ranks {
                codes.insert(rank.name.clone(), rank.code.clone());
            }
        }
    }

    fn board_code(&self, sector_name: &str) -> Option<String> {
        self.board_codes.read().ok()?.get(sector_name).cloned()
    }
}

impl Default for EastmoneySource {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MarketDataSource Implementation
// ============================================================================

#[async_trait]
impl MarketDataSource for EastmoneySource {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let page = self
            .fetch_page(BOARD_FILTER, BOARD_FIELDS, ListOrder::ChangeDesc, 1, 1)
            .await?;
        if page.rows.is_empty() {
            return Err(ProviderError::Unavailable(
                "Health check returned no boards".into(),
            ));
        }
        Ok(())
    }

    async fn fetch_sector_ranking(&self, top_n: usize) -> Result<Vec<SectorRank>, ProviderError> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let page = self
            .fetch_page(
                BOARD_FILTER,
                BOARD_FIELDS,
                ListOrder::ChangeDesc,
                1,
                top_n.min(PAGE_SIZE),
            )
            .await?;
        let ranks: Vec<SectorRank> = page.rows.iter().filter_map(parse_board_row).collect();

        self.remember_boards(&ranks);
        Ok(ranks)
    }

    async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let rows = self.fetch_all(SPOT_FILTER, SPOT_FIELDS).await?;
        let snapshot: MarketSnapshot = rows.iter().filter_map(parse_spot_row).collect();

        debug!(rows = rows.len(), quotes = snapshot.len(), "Fetched market snapshot");
        Ok(snapshot)
    }

    async fn fetch_sector_constituents(
        &self,
        sector_name: &str,
    ) -> Result<ConstituentSet, ProviderError> {
        let code = match self.board_code(sector_name) {
            Some(code) => code,
            None => {
                // Not seen in a ranking yet: load the full board list once
                let rows = self.fetch_all(BOARD_FILTER, BOARD_FIELDS).await?;
                let ranks: Vec<SectorRank> = rows.iter().filter_map(parse_board_row).collect();
                self.remember_boards(&ranks);
                self.board_code(sector_name).ok_or_else(|| {
                    ProviderError::DataNotAvailable(format!("unknown sector {}", sector_name))
                })?
            }
        };

        let filter = format!("b:{} f:!50", code);
        let rows = self.fetch_all(&filter, "f12").await?;
        Ok(rows.iter().filter_map(|row| string_field(row, "f12")).collect())
    }

    async fn fetch_stock_boards(&self, code: &str) -> Result<Vec<BoardRef>, ProviderError> {
        let secid = secid(code)
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("no exchange for code {}", code)))?;

        let url = format!("{}{}", self.quote_base, SLIST_PATH);
        let query = [
            ("secid", secid.as_str()),
            ("spt", "3"),
            ("pi", "0"),
            ("pz", STOCK_BOARD_LIMIT),
            ("po", "1"),
            ("np", "1"),
            ("fid", "f3"),
            ("fltt", "2"),
            ("invt", "2"),
            ("ut", SLIST_UT),
            ("fields", "f12,f14,f3"),
        ];

        let body: ClistResponse = self.get(&url, &query).await?.json().await?;
        let boards: Vec<BoardRef> = body.into_page()?.rows.iter().filter_map(parse_board_ref).collect();

        debug!(code, boards = boards.len(), "Fetched stock boards");
        Ok(boards)
    }

    async fn fetch_popular_boards(&self) -> Result<Vec<BoardRef>, ProviderError> {
        let url = format!("{}{}", self.hot_rank_base, HOT_RANK_PATH);
        let query = [
            ("type", "spo_rank_hot"),
            ("plat", "2"),
            ("ver", "web20"),
            ("rankType", "40002"),
            ("recIdx", "1"),
            ("recCnt", POPULAR_BOARD_COUNT),
        ];

        let text = self.get(&url, &query).await?.text().await?;
        parse_popular_boards(&text)
    }
}

// ============================================================================
// Row Parsing
// ============================================================================

/// Eastmoney security id: `1.` for Shanghai, `0.` for Shenzhen and Beijing.
fn secid(code: &str) -> Option<String> {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let market = if code.starts_with('6') || code.starts_with("900") {
        1
    } else if code.starts_with(|c: char| matches!(c, '0' | '2' | '3' | '4' | '8')) || code.starts_with("92") {
        0
    } else {
        return None;
    };
    Some(format!("{}.{}", market, code))
}

fn string_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.is_empty() && s != "-" => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Board row → ranked sector. Rows without a numeric change are skipped.
fn parse_board_row(row: &Map<String, Value>) -> Option<SectorRank> {
    let code = string_field(row, "f12")?;
    let name = string_field(row, "f14")?;
    let change_pct = match row.get("f3")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };

    Some(SectorRank::new(name, code, change_pct))
}

fn parse_board_ref(row: &Map<String, Value>) -> Option<BoardRef> {
    Some(BoardRef::new(string_field(row, "f12")?, string_field(row, "f14")?))
}

/// Spot row → raw quote. Numeric cells are copied untouched.
fn parse_spot_row(row: &Map<String, Value>) -> Option<SpotQuote> {
    let code = string_field(row, "f12")?;
    let name = string_field(row, "f14").unwrap_or_default();

    let mut quote = SpotQuote::new(code, name);
    for (field, column) in SPOT_COLUMNS {
        if let Some(value) = row.get(*field) {
            quote.values.insert(*column, value.clone());
        }
    }
    Some(quote)
}

/// Popular-board ranking body → boards, in ranking order.
///
/// The endpoint answers in JSON or JSONP and nests the entries differently
/// between versions, so every object carrying `plateCode`/`plateName` is
/// collected wherever it sits.
fn parse_popular_boards(text: &str) -> Result<Vec<BoardRef>, ProviderError> {
    let value: Value = serde_json::from_str(strip_jsonp(text))
        .map_err(|e| ProviderError::Parse(format!("popular boards: {}", e)))?;

    let mut boards = Vec::new();
    collect_plates(&value, &mut boards);
    Ok(boards)
}

fn strip_jsonp(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('{') || text.starts_with('[') {
        return text;
    }
    match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if open < close => &text[open + 1..close],
        _ => text,
    }
}

fn collect_plates(value: &Value, out: &mut Vec<BoardRef>) {
    match value {
        Value::Object(map) => {
            let code = map.get("plateCode").and_then(Value::as_str);
            let name = map.get("plateName").and_then(Value::as_str);
            if let (Some(code), Some(name)) = (code, name) {
                let board = BoardRef::new(code, name);
                if !out.contains(&board) {
                    out.push(board);
                }
                return;
            }
            for item in map.values() {
                collect_plates(item, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_plates(item, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Eastmoney API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClistResponse {
    /// Return code (0 = success)
    rc: i32,
    data: Option<ClistData>,
}

impl ClistResponse {
    fn into_page(self) -> Result<ClistPage, ProviderError> {
        if self.rc != 0 {
            return Err(ProviderError::Unavailable(format!(
                "Eastmoney API error: rc={}",
                self.rc
            )));
        }
        Ok(self.data.map(ClistData::into_page).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    total: usize,
    /// Array with `np=1`; older clients receive an index-keyed object
    #[serde(default)]
    diff: Option<Value>,
}

impl ClistData {
    fn into_page(self) -> ClistPage {
        let rows = match self.diff {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(_, item)| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        ClistPage {
            total: self.total,
            rows,
        }
    }
}

#[derive(Debug, Default)]
struct ClistPage {
    total: usize,
    rows: Vec<Map<String, Value>>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn list_body(total: usize, diff: Value) -> Value {
        json!({"rc": 0, "data": {"total": total, "diff": diff}})
    }

    #[test]
    fn test_parse_board_row() {
        let row = as_map(json!({"f12": "BK1184", "f14": "人形机器人", "f3": 4.87}));
        let rank = parse_board_row(&row).unwrap();
        assert_eq!(rank.code, "BK1184");
        assert_eq!(rank.name, "人形机器人");
        assert!((rank.change_pct - 4.87).abs() < 1e-9);
    }

    #[test]
    fn test_parse_board_row_without_change() {
        let row = as_map(json!({"f12": "BK0001", "f14": "停牌板块", "f3": "-"}));
        assert!(parse_board_row(&row).is_none());
    }

    #[test]
    fn test_parse_spot_row_keeps_placeholders() {
        let row = as_map(json!({
            "f12": "600000", "f14": "浦发银行",
            "f2": 8.12, "f3": "-", "f20": 238000000000.0, "f10": 1.2, "f8": 0.35
        }));
        let quote = parse_spot_row(&row).unwrap();

        assert_eq!(quote.code, "600000");
        assert_eq!(quote.values[&Column::ChangePct], json!("-"));
        assert_eq!(quote.values[&Column::LastPrice], json!(8.12));
        // Fields absent upstream stay absent
        assert!(!quote.values.contains_key(&Column::Amplitude));
    }

    #[test]
    fn test_parse_spot_row_requires_code() {
        let row = as_map(json!({"f14": "无代码", "f2": 1.0}));
        assert!(parse_spot_row(&row).is_none());
    }

    #[test]
    fn test_clist_array_and_object_diff() {
        let array: ClistResponse = serde_json::from_value(list_body(
            2,
            json!([{"f12": "000001"}, {"f12": "000002"}]),
        ))
        .unwrap();
        assert_eq!(array.into_page().unwrap().rows.len(), 2);

        let object: ClistResponse =
            serde_json::from_value(list_body(1, json!({"0": {"f12": "000001"}}))).unwrap();
        assert_eq!(object.into_page().unwrap().rows.len(), 1);
    }

    #[test]
    fn test_clist_null_data_and_error_code() {
        let body: ClistResponse = serde_json::from_value(json!({"rc": 0, "data": null})).unwrap();
        assert!(body.into_page().unwrap().rows.is_empty());

        let body: ClistResponse = serde_json::from_value(json!({"rc": 102, "data": null})).unwrap();
        assert!(matches!(body.into_page(), Err(ProviderError::Unavailable(_))));
    }

    #[test]
    fn test_secid() {
        assert_eq!(secid("600000").as_deref(), Some("1.600000"));
        assert_eq!(secid("688981").as_deref(), Some("1.688981"));
        assert_eq!(secid("000001").as_deref(), Some("0.000001"));
        assert_eq!(secid("300750").as_deref(), Some("0.300750"));
        assert_eq!(secid("830799").as_deref(), Some("0.830799"));
        assert_eq!(secid("BK1184"), None);
        assert_eq!(secid("60000"), None);
    }

    #[test]
    fn test_parse_popular_boards_jsonp() {
        let text = r#"jQuery112305533330907282918_1766982360609({"result":"0","data":[
            {"plateCode":"BK1184","plateName":"人形机器人","rank":1},
            {"plateCode":"BK0800","plateName":"人工智能","rank":2},
            {"plateCode":"BK1184","plateName":"人形机器人","rank":3}
        ]});"#;

        let boards = parse_popular_boards(text).unwrap();
        assert_eq!(
            boards,
            vec![
                BoardRef::new("BK1184", "人形机器人"),
                BoardRef::new("BK0800", "人工智能"),
            ]
        );
    }

    #[test]
    fn test_parse_popular_boards_nested_json() {
        let text = r#"{"data":{"list":[{"plateCode":"BK0500","plateName":"半导体"}]}}"#;
        assert_eq!(
            parse_popular_boards(text).unwrap(),
            vec![BoardRef::new("BK0500", "半导体")]
        );
        assert!(matches!(
            parse_popular_boards("<html>"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_board_code_memory() {
        let source = EastmoneySource::new();
        assert!(source.board_code("算力").is_none());

        source.remember_boards(&[SectorRank::new("算力", "BK1134", 3.1)]);
        assert_eq!(source.board_code("算力").as_deref(), Some("BK1134"));
    }

    #[tokio::test]
    async fn test_snapshot_paged_in_code_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CLIST_PATH))
            .and(query_param("fs", SPOT_FILTER))
            .and(query_param("fid", "f12"))
            .and(query_param("po", "0"))
            .and(query_param("pn", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
                3,
                json!([
                    {"f12": "000001", "f14": "平安银行", "f3": 1.2, "f20": 2.1e11},
                    {"f12": "000002", "f14": "万科A", "f3": -0.5, "f20": "-"}
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(CLIST_PATH))
            .and(query_param("fs", SPOT_FILTER))
            .and(query_param("fid", "f12"))
            .and(query_param("po", "0"))
            .and(query_param("pn", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
                3,
                json!([{"f12": "600000", "f14": "浦发银行", "f3": 0.3, "f20": 2.4e11}]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        let snapshot = source.fetch_market_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.get("600000").is_some());
    }

    #[tokio::test]
    async fn test_ranking_is_one_page_by_change() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CLIST_PATH))
            .and(query_param("fs", BOARD_FILTER))
            .and(query_param("fid", "f3"))
            .and(query_param("po", "1"))
            .and(query_param("pz", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
                400,
                json!([
                    {"f12": "BK1184", "f14": "人形机器人", "f3": 4.87},
                    {"f12": "BK1134", "f14": "算力", "f3": 3.1}
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        let ranks = source.fetch_sector_ranking(5).await.unwrap();

        assert_eq!(ranks.len(), 2);
        assert_eq!(source.board_code("算力").as_deref(), Some("BK1134"));
    }

    #[tokio::test]
    async fn test_constituents_paged_in_code_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CLIST_PATH))
            .and(query_param("fs", "b:BK1134 f:!50"))
            .and(query_param("fid", "f12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
                2,
                json!([{"f12": "000977"}, {"f12": "603019"}]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        source.remember_boards(&[SectorRank::new("算力", "BK1134", 3.1)]);

        let members = source.fetch_sector_constituents("算力").await.unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.contains("603019"));
    }

    #[tokio::test]
    async fn test_stock_boards() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SLIST_PATH))
            .and(query_param("secid", "1.600000"))
            .and(query_param("spt", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_body(
                2,
                json!([
                    {"f12": "BK0475", "f14": "银行", "f3": 0.4},
                    {"f12": "BK0707", "f14": "沪股通", "f3": 0.9}
                ]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        let boards = source.fetch_stock_boards("600000").await.unwrap();
        assert_eq!(boards[0], BoardRef::new("BK0475", "银行"));

        // Unknown exchange never reaches the network
        assert!(matches!(
            source.fetch_stock_boards("ABC").await,
            Err(ProviderError::DataNotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_popular_boards() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(HOT_RANK_PATH))
            .and(query_param("type", "spo_rank_hot"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"cb({"data":[{"plateCode":"BK1184","plateName":"人形机器人"}]});"#,
            ))
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        assert_eq!(
            source.fetch_popular_boards().await.unwrap(),
            vec![BoardRef::new("BK1184", "人形机器人")]
        );
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = EastmoneySource::new().with_base_url(server.uri());
        assert!(matches!(
            source.fetch_sector_ranking(5).await,
            Err(ProviderError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_ranking_live() {
        let source = EastmoneySource::new();
        let ranks = source.fetch_sector_ranking(5).await.unwrap();
        assert!(!ranks.is_empty());
        assert!(ranks.len() <= 5);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_constituents_live() {
        let source = EastmoneySource::new();
        let ranks = source.fetch_sector_ranking(1).await.unwrap();
        let members = source
            .fetch_sector_constituents(&ranks[0].name)
            .await
            .unwrap();
        assert!(!members.is_empty());
    }
}
