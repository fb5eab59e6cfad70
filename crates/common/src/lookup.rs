//! Wallet lookup against the score table and the display form of a hit.

use crate::scores::{ScoreTable, WalletRecord};

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a wallet address.";
pub const FOUND_MESSAGE: &str = "Wallet Found!";
pub const NOT_FOUND_MESSAGE: &str = "Wallet address not found in our dataset. This tool can only look up wallets from the processed data sample.";

/// Lower-case, then trim. Applied to user input and to artifact keys alike.
pub fn normalize_address(raw: &str) -> String {
    raw.to_lowercase().trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome<'a> {
    EmptyInput,
    Found {
        address: String,
        record: &'a WalletRecord,
    },
    NotFound {
        address: String,
    },
}

impl LookupOutcome<'_> {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::Found { .. } => "found",
            Self::NotFound { .. } => "not_found",
        }
    }
}

pub fn check_score<'a>(raw_input: &str, table: &'a ScoreTable) -> LookupOutcome<'a> {
    let address = normalize_address(raw_input);
    if address.is_empty() {
        return LookupOutcome::EmptyInput;
    }
    match table.get(&address) {
        Some(record) => LookupOutcome::Found { address, record },
        None => LookupOutcome::NotFound { address },
    }
}

/// Score progress in `0..=100`. Truncates toward zero, clamps out-of-range scores, NaN is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn progress_value(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.trunc().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub label: &'static str,
    pub value: String,
}

/// Everything the page shows for a found wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub address: String,
    pub score_display: String,
    pub progress: u8,
    pub features: Vec<Feature>,
}

impl ScoreCard {
    pub fn from_record(address: &str, record: &WalletRecord) -> Self {
        let features = vec![
            Feature {
                label: "Net Deposit (USD)",
                value: record.net_deposit_usd.to_string(),
            },
            Feature {
                label: "Repayment Ratio",
                value: record.repay_borrow_ratio_usd.to_string(),
            },
            Feature {
                label: "Wallet Age (Days)",
                value: record.wallet_age_days.to_string(),
            },
            Feature {
                label: "Total Transactions",
                value: record.total_tx_count.to_string(),
            },
            Feature {
                label: "Was Liquidated?",
                value: if record.is_liquidated { "Yes" } else { "No" }.to_string(),
            },
        ];

        Self {
            address: address.to_string(),
            score_display: format!("{:.2}", record.credit_score),
            progress: progress_value(record.credit_score),
            features,
        }
    }

    pub fn feature(&self, label: &str) -> Option<&str> {
        self.features
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }
}
