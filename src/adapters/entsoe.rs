use crate::config::DayAheadConfig;
use crate::domain::model::{PriceRecord, UtcRange};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use roxmltree::{Document, Node};

pub const ACKNOWLEDGEMENT_NS: &str = "urn:iec62325.351:tc57wg16:451-1:acknowledgementdocument:7:0";

/// 依優先順序排列的 publication document 命名空間
pub const PUBLICATION_NAMESPACES: [&str; 3] = [
    "urn:iec62325.351:tc57wg16:451-3:publicationdocument:7:3",
    "urn:iec62325.351:tc57wg16:451-3:publicationdocument:7:0",
    "urn:iec62325.351:tc57wg16:451-3:publicationdocument:6:0",
];

const BODY_EXCERPT_CHARS: usize = 300;

/// API 要求的時間格式：yyyyMMddHHmm (UTC)
pub fn format_compact(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d%H%M").to_string()
}

/// 接受 RFC 3339 以及 API 常見的不含秒數格式，例如 `2023-01-01T00:00Z`
pub fn parse_interval_start(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// 以 1 為起點的 position 轉成時間戳；固定為每小時一筆，超出範圍回傳 None
pub fn position_timestamp(interval_start: DateTime<Utc>, position: i64) -> Option<DateTime<Utc>> {
    let offset = TimeDelta::try_hours(position.checked_sub(1)?)?;
    interval_start.checked_add_signed(offset)
}

fn child<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    ns: &str,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name((ns, name)))
}

fn child_text<'a, 'input: 'a>(node: Node<'a, 'input>, ns: &str, name: &str) -> Option<&'a str> {
    child(node, ns, name).and_then(|c| c.text()).map(str::trim)
}

fn acknowledgement_reasons(doc: &Document) -> Vec<(String, String)> {
    doc.descendants()
        .filter(|n| n.has_tag_name((ACKNOWLEDGEMENT_NS, "Reason")))
        .map(|reason| {
            (
                child_text(reason, ACKNOWLEDGEMENT_NS, "code")
                    .unwrap_or_default()
                    .to_string(),
                child_text(reason, ACKNOWLEDGEMENT_NS, "text")
                    .unwrap_or_default()
                    .to_string(),
            )
        })
        .collect()
}

/// 解析 Acknowledgement_MarketDocument 的 (code, text)；無法解析時回傳空列表
pub fn parse_acknowledgement(xml: &str) -> Vec<(String, String)> {
    match Document::parse(xml) {
        Ok(doc) => acknowledgement_reasons(&doc),
        Err(_) => Vec::new(),
    }
}

pub fn format_reasons(reasons: &[(String, String)]) -> String {
    if reasons.is_empty() {
        "N/A".to_string()
    } else {
        format!("{:?}", reasons)
    }
}

/// 一種文件格式的判斷與解析
pub trait DocumentStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn matches(&self, doc: &Document) -> bool;
    fn parse(&self, doc: &Document) -> Vec<PriceRecord>;
}

#[derive(Debug, Clone)]
pub struct PublicationDocumentStrategy {
    namespace: String,
}

impl PublicationDocumentStrategy {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn parse_time_series(&self, series: Node) -> Vec<PriceRecord> {
        let ns = self.namespace.as_str();

        let Some(period) = series.descendants().find(|n| n.has_tag_name((ns, "Period"))) else {
            return Vec::new();
        };
        let Some(interval_start) = child(period, ns, "timeInterval")
            .and_then(|interval| child_text(interval, ns, "start"))
            .and_then(parse_interval_start)
        else {
            tracing::debug!("Skipping period without a readable interval start");
            return Vec::new();
        };

        period
            .children()
            .filter(|n| n.has_tag_name((ns, "Point")))
            .filter_map(|point| {
                let position = child_text(point, ns, "position")?.parse::<i64>().ok()?;
                let price = child_text(point, ns, "price.amount")?.parse::<f64>().ok()?;
                Some(PriceRecord {
                    timestamp: position_timestamp(interval_start, position)?,
                    price,
                })
            })
            .collect()
    }
}

impl DocumentStrategy for PublicationDocumentStrategy {
    fn name(&self) -> &str {
        &self.namespace
    }

    fn matches(&self, doc: &Document) -> bool {
        doc.descendants()
            .any(|n| n.has_tag_name((self.namespace.as_str(), "TimeSeries")))
    }

    fn parse(&self, doc: &Document) -> Vec<PriceRecord> {
        doc.descendants()
            .filter(|n| n.has_tag_name((self.namespace.as_str(), "TimeSeries")))
            .flat_map(|series| self.parse_time_series(series))
            .collect()
    }
}

pub fn default_strategies() -> Vec<Box<dyn DocumentStrategy>> {
    PUBLICATION_NAMESPACES
        .iter()
        .map(|ns| Box::new(PublicationDocumentStrategy::new(*ns)) as Box<dyn DocumentStrategy>)
        .collect()
}

/// 第一個 matches 的策略勝出，其餘忽略
pub fn select_strategy<'s>(
    doc: &Document,
    strategies: &'s [Box<dyn DocumentStrategy>],
) -> Option<&'s dyn DocumentStrategy> {
    strategies
        .iter()
        .find(|strategy| strategy.matches(doc))
        .map(|strategy| strategy.as_ref())
}

pub fn parse_price_document(
    xml: &str,
    strategies: &[Box<dyn DocumentStrategy>],
) -> Result<Vec<PriceRecord>> {
    let doc = Document::parse(xml)?;

    match select_strategy(&doc, strategies) {
        Some(strategy) => {
            tracing::debug!("Using document strategy {}", strategy.name());
            Ok(strategy.parse(&doc))
        }
        None => {
            // 200 也可能回傳 acknowledgement 文件
            let reasons = acknowledgement_reasons(&doc);
            let detail = if reasons.is_empty() {
                String::new()
            } else {
                format!("; Reasons: {}", format_reasons(&reasons))
            };
            Err(EtlError::UnexpectedDocumentError { detail })
        }
    }
}

pub struct EntsoeClient {
    client: Client,
    api_url: String,
    security_token: String,
    document_type: String,
    in_domain: String,
    out_domain: String,
    strategies: Vec<Box<dyn DocumentStrategy>>,
}

impl EntsoeClient {
    pub fn new(config: &DayAheadConfig) -> Result<Self> {
        let security_token =
            config
                .resolved_token()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "day_ahead.security_token".to_string(),
                })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            security_token,
            document_type: config.document_type.clone(),
            in_domain: config.in_domain.clone(),
            out_domain: config.out_domain.clone(),
            strategies: default_strategies(),
        })
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn DocumentStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// 取得 [start, end) 的 day-ahead 價格
    pub async fn fetch_window(&self, window: &UtcRange) -> Result<Vec<PriceRecord>> {
        let params = [
            ("securityToken", self.security_token.clone()),
            ("documentType", self.document_type.clone()),
            ("in_Domain", self.in_domain.clone()),
            ("out_Domain", self.out_domain.clone()),
            ("periodStart", format_compact(&window.start)),
            ("periodEnd", format_compact(&window.end)),
        ];

        tracing::debug!(
            "Requesting {} for {} -> {}",
            self.api_url,
            params[4].1,
            params[5].1
        );
        let response = self.client.get(&self.api_url).query(&params).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let text = String::from_utf8_lossy(&body);
        tracing::debug!("API response status: {} ({} bytes)", status, body.len());

        if status == StatusCode::UNAUTHORIZED {
            let reasons = parse_acknowledgement(&text);
            return Err(EtlError::UnauthorizedError {
                reasons: format_reasons(&reasons),
            });
        }
        if status != StatusCode::OK {
            let excerpt: String = text.chars().take(BODY_EXCERPT_CHARS).collect();
            return Err(EtlError::HttpStatusError {
                status: status.as_u16(),
                body: excerpt.replace('\n', " "),
            });
        }

        parse_price_document(&text, &self.strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn publication_xml(ns: &str, start: &str, points: &[(&str, &str)]) -> String {
        let points: String = points
            .iter()
            .map(|(pos, price)| {
                format!(
                    "<Point><position>{}</position><price.amount>{}</price.amount></Point>",
                    pos, price
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Publication_MarketDocument xmlns="{ns}">
  <mRID>1</mRID>
  <TimeSeries>
    <mRID>1</mRID>
    <Period>
      <timeInterval><start>{start}</start><end>2023-01-02T00:00Z</end></timeInterval>
      <resolution>PT60M</resolution>
      {points}
    </Period>
  </TimeSeries>
</Publication_MarketDocument>"#
        )
    }

    #[test]
    fn test_position_timestamp() {
        let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 23, 0, 0).unwrap();
        assert_eq!(position_timestamp(t0, 1), Some(t0));
        assert_eq!(position_timestamp(t0, 24), Some(t0 + TimeDelta::hours(23)));
        assert_eq!(
            position_timestamp(t0, 100),
            Some(Utc.with_ymd_and_hms(2023, 1, 6, 2, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_position_timestamp_out_of_range() {
        let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(position_timestamp(t0, i64::MIN), None);
        assert_eq!(position_timestamp(t0, i64::MAX), None);
        assert_eq!(position_timestamp(t0, 10_000_000_000), None);
    }

    #[test]
    fn test_huge_position_point_is_dropped() {
        let xml = publication_xml(
            PUBLICATION_NAMESPACES[0],
            "2023-01-01T00:00Z",
            &[("1", "10"), ("10000000000", "20"), ("-9223372036854775808", "30")],
        );
        let records = parse_price_document(&xml, &default_strategies()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 10.0);
    }

    #[test]
    fn test_format_compact() {
        let t = Utc.with_ymd_and_hms(2023, 2, 1, 7, 5, 59).unwrap();
        assert_eq!(format_compact(&t), "202302010705");
    }

    #[test]
    fn test_parse_interval_start_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 23, 0, 0).unwrap();
        assert_eq!(parse_interval_start("2023-01-01T23:00Z"), Some(expected));
        assert_eq!(parse_interval_start("2023-01-01T23:00:00Z"), Some(expected));
        assert_eq!(parse_interval_start("2023-01-02T00:00:00+01:00"), Some(expected));
        assert_eq!(parse_interval_start("yesterday"), None);
    }

    #[test]
    fn test_second_namespace_selected() {
        let xml = publication_xml(
            PUBLICATION_NAMESPACES[1],
            "2023-01-01T00:00Z",
            &[("1", "10.5"), ("2", "20.25")],
        );
        let doc = Document::parse(&xml).unwrap();
        let strategies = default_strategies();

        let selected = select_strategy(&doc, &strategies).unwrap();
        assert_eq!(selected.name(), PUBLICATION_NAMESPACES[1]);

        let records = parse_price_document(&xml, &strategies).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].price, 20.25);
        assert_eq!(
            records[1].timestamp,
            Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_first_matching_strategy_wins_over_later_ones() {
        // 7:0 與 6:0 的 TimeSeries 並存時只取 7:0
        let xml = format!(
            r#"<Publication_MarketDocument xmlns="{second}" xmlns:old="{third}">
  <TimeSeries>
    <Period>
      <timeInterval><start>2023-01-01T00:00Z</start></timeInterval>
      <Point><position>1</position><price.amount>42</price.amount></Point>
    </Period>
  </TimeSeries>
  <old:TimeSeries>
    <old:Period>
      <old:timeInterval><old:start>2023-01-01T00:00Z</old:start></old:timeInterval>
      <old:Point><old:position>1</old:position><old:price.amount>-1</old:price.amount></old:Point>
    </old:Period>
  </old:TimeSeries>
</Publication_MarketDocument>"#,
            second = PUBLICATION_NAMESPACES[1],
            third = PUBLICATION_NAMESPACES[2],
        );

        let records = parse_price_document(&xml, &default_strategies()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 42.0);
    }

    #[test]
    fn test_bad_points_are_skipped() {
        let xml = publication_xml(
            PUBLICATION_NAMESPACES[0],
            "2023-01-01T00:00Z",
            &[("1", "10"), ("2", "n/a"), ("x", "30"), ("4", "40")],
        );
        let records = parse_price_document(&xml, &default_strategies()).unwrap();

        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![10.0, 40.0]);
        assert_eq!(
            records[1].timestamp,
            Utc.with_ymd_and_hms(2023, 1, 1, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unknown_document_is_unexpected() {
        let xml = r#"<Something xmlns="urn:other"><TimeSeries/></Something>"#;
        let err = parse_price_document(xml, &default_strategies()).unwrap_err();
        assert!(matches!(err, EtlError::UnexpectedDocumentError { .. }));
    }

    #[test]
    fn test_acknowledgement_with_ok_status_reports_reasons() {
        let xml = format!(
            r#"<Acknowledgement_MarketDocument xmlns="{ACKNOWLEDGEMENT_NS}">
  <Reason><code>999</code><text>No matching data found</text></Reason>
</Acknowledgement_MarketDocument>"#
        );
        let err = parse_price_document(&xml, &default_strategies()).unwrap_err();
        assert!(err.to_string().contains(r#"("999", "No matching data found")"#));
    }

    #[test]
    fn test_parse_acknowledgement() {
        let xml = format!(
            r#"<Acknowledgement_MarketDocument xmlns="{ACKNOWLEDGEMENT_NS}">
  <Reason><code>999</code><text>blocked</text></Reason>
</Acknowledgement_MarketDocument>"#
        );
        let reasons = parse_acknowledgement(&xml);
        assert_eq!(reasons, vec![("999".to_string(), "blocked".to_string())]);
        assert_eq!(format_reasons(&reasons), r#"[("999", "blocked")]"#);

        assert!(parse_acknowledgement("not xml").is_empty());
        assert_eq!(format_reasons(&[]), "N/A");
    }

    fn client_for(server: &httpmock::MockServer) -> EntsoeClient {
        let config = DayAheadConfig {
            api_url: server.url("/api"),
            security_token: Some("test-token".to_string()),
            ..DayAheadConfig::default()
        };
        EntsoeClient::new(&config).unwrap()
    }

    fn one_day() -> UtcRange {
        UtcRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fetch_window_unauthorized_reports_reasons() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api")
                .query_param("securityToken", "test-token");
            then.status(401).body(format!(
                r#"<Acknowledgement_MarketDocument xmlns="{ACKNOWLEDGEMENT_NS}"><Reason><code>999</code><text>blocked</text></Reason></Acknowledgement_MarketDocument>"#
            ));
        });

        let err = client_for(&server).fetch_window(&one_day()).await.unwrap_err();

        mock.assert();
        assert!(matches!(err, EtlError::UnauthorizedError { .. }));
        assert_eq!(
            err.to_string(),
            r#"401 Unauthorized; Reasons: [("999", "blocked")]"#
        );
    }

    #[tokio::test]
    async fn test_fetch_window_non_ok_status_keeps_short_excerpt() {
        let server = httpmock::MockServer::start();
        let body = format!("line one\nline two\n{}", "z".repeat(400));
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/api");
            then.status(503).body(body);
        });

        let err = client_for(&server).fetch_window(&one_day()).await.unwrap_err();

        match err {
            EtlError::HttpStatusError { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body.chars().count(), BODY_EXCERPT_CHARS);
                assert!(body.starts_with("line one line two zzz"));
                assert!(!body.contains('\n'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_strategy_list_limits_accepted_documents() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api")
                .query_param("periodStart", "202301010000");
            then.status(200).body(publication_xml(
                PUBLICATION_NAMESPACES[0],
                "2023-01-01T00:00Z",
                &[("1", "10")],
            ));
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api")
                .query_param("periodStart", "202301020000");
            then.status(200).body(publication_xml(
                PUBLICATION_NAMESPACES[2],
                "2023-01-02T00:00Z",
                &[("1", "7.5"), ("2", "8.5")],
            ));
        });

        // 只接受最舊的命名空間
        let client = client_for(&server).with_strategies(vec![Box::new(
            PublicationDocumentStrategy::new(PUBLICATION_NAMESPACES[2]),
        )]);

        let err = client.fetch_window(&one_day()).await.unwrap_err();
        assert!(matches!(err, EtlError::UnexpectedDocumentError { .. }));

        let next_day = UtcRange::new(
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap(),
        );
        let records = client.fetch_window(&next_day).await.unwrap();
        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![7.5, 8.5]);
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_price_document("<open>", &default_strategies()).unwrap_err();
        assert!(matches!(err, EtlError::XmlParseError(_)));
    }
}
