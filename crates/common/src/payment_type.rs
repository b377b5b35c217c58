use serde::{Deserialize, Serialize};

/// How a purchase is funded: from the customer's cash balance or against
/// their credit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Credit,
}

impl PaymentType {
    /// Returns the wire name of the payment type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Credit => "credit",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentType::Cash),
            "credit" => Ok(PaymentType::Credit),
            other => Err(format!("unsupported payment type: {other}")),
        }
    }
}
