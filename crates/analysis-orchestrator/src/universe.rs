use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display name used for symbols missing from the universe mapping
pub const UNKNOWN_NAME: &str = "Unknown";

const IDX_MOST_ACTIVE: [(&str, &str); 20] = [
    ("BBCA.JK", "Bank Central Asia Tbk"),
    ("BBRI.JK", "Bank Rakyat Indonesia Tbk"),
    ("BMRI.JK", "Bank Mandiri Tbk"),
    ("ASII.JK", "Astra International Tbk"),
    ("TLKM.JK", "Telkom Indonesia Tbk"),
    ("ICBP.JK", "Indofood CBP Sukses Makmur Tbk"),
    ("UNVR.JK", "Unilever Indonesia Tbk"),
    ("PGAS.JK", "Perusahaan Gas Negara Tbk"),
    ("KLBF.JK", "Kalbe Farma Tbk"),
    ("INDF.JK", "Indofood Sukses Makmur Tbk"),
    ("SMGR.JK", "Semen Indonesia Tbk"),
    ("ANTM.JK", "Aneka Tambang Tbk"),
    ("PTBA.JK", "Bukit Asam Tbk"),
    ("INTP.JK", "Indocement Tunggal Prakarsa Tbk"),
    ("JSMR.JK", "Jasa Marga Tbk"),
    ("WIKA.JK", "Wijaya Karya Tbk"),
    ("ADRO.JK", "Adaro Energy Tbk"),
    ("BBNI.JK", "Bank Negara Indonesia Tbk"),
    ("BRIS.JK", "Bank Syariah Indonesia Tbk"),
    ("GOTO.JK", "GoTo Gojek Tokopedia Tbk"),
];

/// The set of symbols to screen, each with a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum StockUniverse {
    /// Twenty large, liquid Indonesia Stock Exchange listings
    #[default]
    IdxMostActive,
    Custom(BTreeMap<String, String>),
}

impl StockUniverse {
    /// Build a universe from bare symbols; names default to the IDX table
    /// when known.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = symbols
            .into_iter()
            .map(|s| {
                let symbol = s.into();
                let name = idx_name(&symbol).unwrap_or(UNKNOWN_NAME).to_string();
                (symbol, name)
            })
            .collect();
        StockUniverse::Custom(map)
    }

    /// Parse `SYM=Name` pairs separated by commas. The name is optional.
    pub fn parse(list: &str) -> Result<Self, AnalysisError> {
        let mut map = BTreeMap::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (symbol, name) = match item.split_once('=') {
                Some((symbol, name)) => (symbol.trim(), Some(name.trim())),
                None => (item, None),
            };
            if symbol.is_empty() {
                return Err(AnalysisError::InvalidData(format!(
                    "missing symbol in universe entry '{}'",
                    item
                )));
            }
            let name = name
                .filter(|n| !n.is_empty())
                .or_else(|| idx_name(symbol))
                .unwrap_or(UNKNOWN_NAME);
            map.insert(symbol.to_uppercase(), name.to_string());
        }

        if map.is_empty() {
            return Err(AnalysisError::InvalidData(
                "universe contains no symbols".to_string(),
            ));
        }
        Ok(StockUniverse::Custom(map))
    }

    /// Symbol to display name, ordered by symbol
    pub fn entries(&self) -> BTreeMap<String, String> {
        match self {
            StockUniverse::IdxMostActive => IDX_MOST_ACTIVE
                .iter()
                .map(|(s, n)| (s.to_string(), n.to_string()))
                .collect(),
            StockUniverse::Custom(map) => map.clone(),
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries().into_keys().collect()
    }

    pub fn len(&self) -> usize {
        match self {
            StockUniverse::IdxMostActive => IDX_MOST_ACTIVE.len(),
            StockUniverse::Custom(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn display_name(&self, symbol: &str) -> &str {
        let name = match self {
            StockUniverse::IdxMostActive => idx_name(symbol),
            StockUniverse::Custom(map) => map.get(symbol).map(String::as_str),
        };
        name.unwrap_or(UNKNOWN_NAME)
    }
}

fn idx_name(symbol: &str) -> Option<&'static str> {
    IDX_MOST_ACTIVE
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, n)| *n)
}
