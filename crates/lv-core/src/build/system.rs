//! The `environment.system` blob.

use lv_telemetry::Cell;
use serde::{Deserialize, Deserializer};

/// Parsed `environment.system`. Unknown keys are ignored, missing ones are null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    #[serde(rename = "memoryMB", deserialize_with = "lenient_int")]
    pub memory_mb: Option<i64>,
    #[serde(rename = "virtualMaxMB", deserialize_with = "lenient_int")]
    pub virtual_max_mb: Option<i64>,
    #[serde(rename = "isWow64")]
    pub is_wow64: Option<bool>,
    pub cpu: Option<CpuInfo>,
    pub os: Option<OsInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpuInfo {
    #[serde(deserialize_with = "lenient_int")]
    pub count: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub cores: Option<i64>,
    pub vendor: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub family: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub model: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub stepping: Option<i64>,
    #[serde(rename = "l2cacheKB", deserialize_with = "lenient_int")]
    pub l2cache_kb: Option<i64>,
    #[serde(rename = "l3cacheKB", deserialize_with = "lenient_int")]
    pub l3cache_kb: Option<i64>,
    #[serde(rename = "speedMHz", deserialize_with = "lenient_int")]
    pub speed_mhz: Option<i64>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OsInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub locale: Option<String>,
}

/// Integers sometimes arrive as `2400.0`; anything fractional is rejected.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    let Some(number) = value else {
        return Ok(None);
    };
    if let Some(v) = number.as_i64() {
        return Ok(Some(v));
    }
    match number.as_f64() {
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(serde::de::Error::custom(format!(
            "expected an integer, got {number}"
        ))),
    }
}

fn int(v: Option<i64>) -> Cell {
    v.map(Cell::Int).unwrap_or(Cell::Null)
}

fn text(v: Option<String>) -> Cell {
    v.map(Cell::Str).unwrap_or(Cell::Null)
}

impl SystemInfo {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Struct cell in `system_type()` field order.
    pub fn into_cell(self) -> Cell {
        let cpu = self.cpu.map_or(Cell::Null, |cpu| {
            Cell::Struct(vec![
                int(cpu.count),
                int(cpu.cores),
                text(cpu.vendor),
                int(cpu.family),
                int(cpu.model),
                int(cpu.stepping),
                int(cpu.l2cache_kb),
                int(cpu.l3cache_kb),
                int(cpu.speed_mhz),
                cpu.extensions.map_or(Cell::Null, |exts| {
                    Cell::List(exts.into_iter().map(Cell::Str).collect())
                }),
            ])
        });
        let os = self.os.map_or(Cell::Null, |os| {
            Cell::Struct(vec![text(os.name), text(os.version), text(os.locale)])
        });
        Cell::Struct(vec![
            int(self.memory_mb),
            int(self.virtual_max_mb),
            self.is_wow64.map_or(Cell::Null, Cell::Bool),
            cpu,
            os,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_telemetry::system_type;

    const SAMPLE: &str = r#"{
        "memoryMB": 8192,
        "virtualMaxMB": 4096.0,
        "isWow64": false,
        "cpu": {"count": 4, "cores": 2, "vendor": "GenuineIntel", "family": 6,
                "speedMHz": 2400, "l2cacheKB": 256, "extensions": ["SSE2", "AVX"]},
        "os": {"name": "Windows_NT", "version": "10.0", "locale": "en-US"},
        "gfx": {"adapters": []}
    }"#;

    #[test]
    fn parses_and_conforms_to_schema() {
        let info = SystemInfo::from_json(SAMPLE).unwrap();
        assert_eq!(info.memory_mb, Some(8192));
        assert_eq!(info.virtual_max_mb, Some(4096));
        assert_eq!(info.cpu.as_ref().unwrap().l3cache_kb, None);
        assert!(info.into_cell().conforms_to(&system_type()));
    }

    #[test]
    fn empty_object_is_all_null() {
        let cell = SystemInfo::from_json("{}").unwrap().into_cell();
        assert_eq!(
            cell,
            Cell::Struct(vec![Cell::Null, Cell::Null, Cell::Null, Cell::Null, Cell::Null])
        );
        assert!(cell.conforms_to(&system_type()));
    }

    #[test]
    fn fractional_integer_is_rejected() {
        assert!(SystemInfo::from_json(r#"{"memoryMB": 1.5}"#).is_err());
        assert!(SystemInfo::from_json(r#"{"memoryMB": "lots"}"#).is_err());
    }
}
