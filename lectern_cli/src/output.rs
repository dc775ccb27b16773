use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use lectern_lib::{CacheStats, GuardConfig, LimiterStats};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

#[derive(Tabled, Serialize, Clone, Debug)]
pub struct CacheCallRow {
    #[tabled(rename = "Call")]
    #[serde(rename = "Call")]
    pub call: u32,
    #[tabled(rename = "At (ms)")]
    #[serde(rename = "At (ms)")]
    pub at_ms: u128,
    #[tabled(rename = "User")]
    #[serde(rename = "User")]
    pub user: String,
    #[tabled(rename = "Key")]
    #[serde(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Outcome")]
    #[serde(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Tabled, Serialize, Clone, Debug)]
pub struct LimitCallRow {
    #[tabled(rename = "Request")]
    #[serde(rename = "Request")]
    pub request: u32,
    #[tabled(rename = "At (ms)")]
    #[serde(rename = "At (ms)")]
    pub at_ms: u128,
    #[tabled(rename = "Outcome")]
    #[serde(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Remaining")]
    #[serde(rename = "Remaining")]
    pub remaining: u64,
}

#[derive(Tabled, Serialize)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    #[serde(rename = "Setting")]
    setting: &'static str,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
pub struct CacheReport<'a> {
    pub calls: &'a [CacheCallRow],
    pub stats: CacheStats,
    pub backend_calls: u64,
}

#[derive(Serialize)]
pub struct LimitReport<'a> {
    pub key: &'a str,
    pub requests: &'a [LimitCallRow],
    pub stats: LimiterStats,
}

fn build_setting_rows(config: &GuardConfig) -> Vec<SettingRow> {
    vec![
        SettingRow {
            setting: "cache_ttl_ms",
            value: config.cache_ttl_ms.to_string(),
        },
        SettingRow {
            setting: "rate_limit_max_requests",
            value: config.rate_limit_max_requests.to_string(),
        },
        SettingRow {
            setting: "rate_limit_window_ms",
            value: config.rate_limit_window_ms.to_string(),
        },
    ]
}

pub fn print_cache_report(report: &CacheReport<'_>, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new(report.calls);
            table.with(Style::rounded());
            println!("{}", table);
            println!(
                "hits: {}  misses: {}  expired: {}  backend calls: {}",
                report.stats.hits, report.stats.misses, report.stats.expired, report.backend_calls
            );
        }
    }
}

pub fn print_limit_report(report: &LimitReport<'_>, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new(report.requests);
            table.with(Style::rounded());
            println!("{}", table);
            println!(
                "key: {}  admitted: {}  throttled: {}",
                report.key, report.stats.admitted, report.stats.rejected
            );
        }
    }
}

pub fn print_config(config: &GuardConfig, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => println!("{}", Table::new(build_setting_rows(config))),
    }
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_output_format() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Table);
    }

    #[test]
    fn setting_rows_cover_every_field() {
        let rows = build_setting_rows(&GuardConfig::default());
        let names: Vec<_> = rows.iter().map(|r| r.setting).collect();
        assert_eq!(
            names,
            vec![
                "cache_ttl_ms",
                "rate_limit_max_requests",
                "rate_limit_window_ms"
            ]
        );
        assert_eq!(rows[0].value, "300000");
    }

    #[test]
    fn cache_report_json_uses_column_names() {
        let rows = vec![CacheCallRow {
            call: 1,
            at_ms: 0,
            user: "me".into(),
            key: "profile".into(),
            outcome: "miss".into(),
            value: "Student me".into(),
        }];
        let report = CacheReport {
            calls: &rows,
            stats: CacheStats::default(),
            backend_calls: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["calls"][0]["Outcome"], "miss");
        assert_eq!(json["backend_calls"], 1);
        assert_eq!(json["stats"]["hits"], 0);
    }

    #[test]
    fn limit_table_renders_headers() {
        let rows = vec![LimitCallRow {
            request: 1,
            at_ms: 0,
            outcome: "admitted".into(),
            remaining: 2,
        }];
        let rendered = Table::new(&rows).to_string();
        assert!(rendered.contains("Request"));
        assert!(rendered.contains("Remaining"));
        assert!(rendered.contains("admitted"));
    }
}
