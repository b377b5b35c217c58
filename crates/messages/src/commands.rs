//! Commands published by the orchestrator on `commands.*` topics.

use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::topics;

/// A command instructing a participant to perform a local transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    /// Reserve funds against the customer's balance or credit line.
    ReserveCredit(ReserveCreditData),

    /// Undo a prior credit reservation.
    ReleaseCredit(ReleaseCreditData),

    /// Reserve a vehicle so no concurrent purchase can take it.
    ReserveVehicle(ReserveVehicleData),

    /// Undo a prior vehicle reservation.
    ReleaseVehicle(ReleaseVehicleData),

    /// Mint a payment code for the purchase.
    GeneratePaymentCode(GeneratePaymentCodeData),

    /// Settle the purchase against a previously generated code.
    ProcessPayment(ProcessPaymentData),

    /// Refund a committed payment.
    RefundPayment(RefundPaymentData),
}

/// Data for ReserveCredit and ReleaseCredit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveCreditData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub payment_type: PaymentType,
}

/// Data for ReleaseCredit (same shape as the reserve).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCreditData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub payment_type: PaymentType,
}

/// Data for ReserveVehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveVehicleData {
    pub transaction_id: TransactionId,
    pub vehicle_id: VehicleId,
}

/// Data for ReleaseVehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseVehicleData {
    pub transaction_id: TransactionId,
    pub vehicle_id: VehicleId,
}

/// Data for GeneratePaymentCode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePaymentCodeData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
}

/// Data for ProcessPayment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPaymentData {
    pub transaction_id: TransactionId,
    pub payment_code: String,
    pub payment_method: String,
}

/// Data for RefundPayment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPaymentData {
    pub transaction_id: TransactionId,
    pub payment_id: String,
}

impl Command {
    /// Returns the command type name as it appears on the wire.
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::ReserveCredit(_) => "ReserveCredit",
            Command::ReleaseCredit(_) => "ReleaseCredit",
            Command::ReserveVehicle(_) => "ReserveVehicle",
            Command::ReleaseVehicle(_) => "ReleaseVehicle",
            Command::GeneratePaymentCode(_) => "GeneratePaymentCode",
            Command::ProcessPayment(_) => "ProcessPayment",
            Command::RefundPayment(_) => "RefundPayment",
        }
    }

    /// Returns the saga this command belongs to.
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Command::ReserveCredit(d) => d.transaction_id,
            Command::ReleaseCredit(d) => d.transaction_id,
            Command::ReserveVehicle(d) => d.transaction_id,
            Command::ReleaseVehicle(d) => d.transaction_id,
            Command::GeneratePaymentCode(d) => d.transaction_id,
            Command::ProcessPayment(d) => d.transaction_id,
            Command::RefundPayment(d) => d.transaction_id,
        }
    }

    /// Returns the short topic name this command is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            Command::ReserveCredit(_) => topics::CMD_CREDIT_RESERVE,
            Command::ReleaseCredit(_) => topics::CMD_CREDIT_RELEASE,
            Command::ReserveVehicle(_) => topics::CMD_VEHICLE_RESERVE,
            Command::ReleaseVehicle(_) => topics::CMD_VEHICLE_RELEASE,
            Command::GeneratePaymentCode(_) => topics::CMD_PAYMENT_GENERATE_CODE,
            Command::ProcessPayment(_) => topics::CMD_PAYMENT_PROCESS,
            Command::RefundPayment(_) => topics::CMD_PAYMENT_REFUND,
        }
    }
}
