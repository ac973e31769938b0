use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::types::CreditScore;

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub credit_policy: CreditPolicy,
    pub limits: LoanLimits,
}

/// credit-score gates applied by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPolicy {
    /// minimum score to submit an application
    pub min_score_to_apply: CreditScore,
    /// minimum score for an application to be approved
    pub min_score_to_approve: CreditScore,
}

/// limits on loan terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLimits {
    pub max_term_months: u32,
}

impl LedgerConfig {
    /// thresholds 50.0 / 70.0, terms up to 30 years
    pub fn standard() -> Self {
        Self {
            credit_policy: CreditPolicy {
                min_score_to_apply: CreditScore::from_decimal_unchecked(dec!(50.0)),
                min_score_to_approve: CreditScore::from_decimal_unchecked(dec!(70.0)),
            },
            limits: LoanLimits {
                max_term_months: 360,
            },
        }
    }

    /// stricter preset for a pilot branch
    pub fn conservative() -> Self {
        Self {
            credit_policy: CreditPolicy {
                min_score_to_apply: CreditScore::from_decimal_unchecked(dec!(60.0)),
                min_score_to_approve: CreditScore::from_decimal_unchecked(dec!(80.0)),
            },
            limits: LoanLimits {
                max_term_months: 60,
            },
        }
    }

    pub fn with_thresholds(mut self, apply: CreditScore, approve: CreditScore) -> Self {
        self.credit_policy.min_score_to_apply = apply;
        self.credit_policy.min_score_to_approve = approve;
        self
    }

    pub fn with_max_term_months(mut self, months: u32) -> Self {
        self.limits.max_term_months = months;
        self
    }

    /// parse and validate a json document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<()> {
        let policy = &self.credit_policy;
        if policy.min_score_to_approve < policy.min_score_to_apply {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "approval threshold {} is below application threshold {}",
                    policy.min_score_to_approve, policy.min_score_to_apply
                ),
            });
        }
        if self.limits.max_term_months == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "max_term_months must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::standard()
    }
}
