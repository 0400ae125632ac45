use serde::{Deserialize, Serialize};

/// Risk classification of one account at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    #[serde(rename = "at-risk")]
    AtRisk,
    #[serde(rename = "safe")]
    Safe,
}

/// Evaluated position of one account, as persisted in the health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHealth {
    /// Health factor formatted with four decimal places.
    pub health_factor: String,
    #[serde(rename = "collateralUSD")]
    pub collateral_usd: String,
    #[serde(rename = "debtUSD")]
    pub debt_usd: String,
    pub status: RiskStatus,
}
